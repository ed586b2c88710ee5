use serde::Serialize;
use sha2::{Digest, Sha256};
use strum::IntoEnumIterator;
use tracing::warn;

use crate::{
    context::ExtractionContext,
    error::Result,
    filters::FilterKind,
    settings::{FilterParams, Settings},
    traits::FeatureInfo,
};

/// A resolved filter: canonical name, the overrides it was enabled with and
/// the settings it runs with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnabledFilter {
    pub name: &'static str,
    pub params: FilterParams,
    #[serde(skip)]
    pub settings: Settings,
}

/// A resolved feature class and the features it computes, in declaration
/// order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnabledClass {
    pub name: &'static str,
    pub features: Vec<&'static str>,
    /// Selected features that are deprecated, with their notes
    #[serde(skip)]
    pub deprecated: Vec<(&'static str, &'static str)>,
}

/// Immutable, fully resolved extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionConfig {
    settings: Settings,
    filters: Vec<EnabledFilter>,
    classes: Vec<EnabledClass>,
}

impl ExtractionConfig {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn filters(&self) -> &[EnabledFilter] {
        &self.filters
    }

    pub fn classes(&self) -> &[EnabledClass] {
        &self.classes
    }

    /// `(name, overrides)` pairs in declaration order.
    pub fn enabled_image_types(&self) -> Vec<(String, FilterParams)> {
        self.filters
            .iter()
            .map(|f| (f.name.to_string(), f.params.clone()))
            .collect()
    }

    /// Number of feature keys each derived image contributes.
    pub fn features_per_image(&self) -> usize {
        self.classes.iter().map(|c| c.features.len()).sum()
    }

    /// SHA-256 (hex) of the serialized configuration.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }
}

/// Builder for [`ExtractionConfig`] with a fluent API.
///
/// Nothing is enabled by default: add `Original` explicitly to get features
/// on the unfiltered image. Names are only checked in [`ExtractorBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct ExtractorBuilder {
    settings: Settings,
    filters: Vec<(String, FilterParams)>,
    classes: Vec<(String, Vec<String>)>,
    all_classes: bool,
}

impl ExtractorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the global settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Enable a filter with per-filter setting overrides. Enabling a filter
    /// twice keeps its first position and the latest overrides.
    pub fn enable_filter(mut self, name: impl Into<String>, params: FilterParams) -> Self {
        let name = name.into();
        match self.filters.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(entry) => entry.1 = params,
            None => self.filters.push((name, params)),
        }
        self
    }

    pub fn disable_filter(mut self, name: &str) -> Self {
        self.filters.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self
    }

    /// Enable every built-in filter without overrides; already enabled
    /// filters keep theirs.
    pub fn enable_all_filters(self) -> Self {
        FilterKind::iter().fold(self, |builder, kind| {
            let name: &'static str = kind.into();
            if builder.filters.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
                builder
            } else {
                builder.enable_filter(name, FilterParams::new())
            }
        })
    }

    pub fn disable_all_filters(mut self) -> Self {
        self.filters.clear();
        self
    }

    /// Enable every non-deprecated feature of `class`.
    pub fn enable_feature_class(self, class: impl Into<String>) -> Self {
        self.enable_features(class, Vec::<String>::new())
    }

    /// Enable the named features of `class`; an empty list means every
    /// non-deprecated feature. Replaces an earlier selection for the class.
    pub fn enable_features<I, S>(mut self, class: impl Into<String>, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let class = class.into();
        let features: Vec<String> = features.into_iter().map(Into::into).collect();
        match self.classes.iter_mut().find(|(c, _)| c.eq_ignore_ascii_case(&class)) {
            Some(entry) => entry.1 = features,
            None => self.classes.push((class, features)),
        }
        self
    }

    /// Enable every registered class with its default features, after any
    /// explicitly enabled classes.
    pub fn enable_all_features(mut self) -> Self {
        self.all_classes = true;
        self
    }

    pub fn disable_all_features(mut self) -> Self {
        self.classes.clear();
        self.all_classes = false;
        self
    }

    /// Resolve every name against `context`, validate the settings and let
    /// each filter check the settings it will run with.
    pub fn build(self, context: &ExtractionContext) -> Result<ExtractionConfig> {
        self.settings.validate()?;

        let mut filters = Vec::with_capacity(self.filters.len());
        for (name, params) in self.filters {
            let filter = context.filters().get(&name)?;
            let settings = self.settings.with_overrides(&params)?;
            filter.check_settings(&settings)?;
            filters.push(EnabledFilter {
                name: filter.name(),
                params,
                settings,
            });
        }

        let mut requested = self.classes;
        if self.all_classes {
            for name in context.features().names() {
                if !requested.iter().any(|(c, _)| c.eq_ignore_ascii_case(name)) {
                    requested.push((name.to_string(), Vec::new()));
                }
            }
        }

        let mut classes = Vec::with_capacity(requested.len());
        for (name, selection) in requested {
            let class = context.features().get(&name)?;
            let infos: Vec<FeatureInfo> = if selection.is_empty() {
                class.features().into_iter().filter(|f| f.deprecated.is_none()).collect()
            } else {
                let mut infos = Vec::with_capacity(selection.len());
                for feature in &selection {
                    let info = context.features().resolve_feature(&name, feature)?;
                    if !infos.contains(&info) {
                        infos.push(info);
                    }
                }
                infos
            };
            classes.push(EnabledClass {
                name: class.name(),
                features: infos.iter().map(|f| f.name).collect(),
                deprecated: infos.iter().filter_map(|f| f.deprecated.map(|note| (f.name, note))).collect(),
            });
        }

        if filters.is_empty() || classes.is_empty() {
            warn!(
                filters = filters.len(),
                classes = classes.len(),
                "configuration enables no features; results will hold diagnostics only"
            );
        }

        Ok(ExtractionConfig {
            settings: self.settings,
            filters,
            classes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RadiomicsError;
    use serde_json::json;

    fn context() -> ExtractionContext {
        ExtractionContext::with_workers(1).unwrap()
    }

    fn params(value: serde_json::Value) -> FilterParams {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_names_are_canonicalized_in_order() {
        let config = ExtractorBuilder::new()
            .enable_filter("wavelet", FilterParams::new())
            .enable_filter("ORIGINAL", FilterParams::new())
            .enable_features("FirstOrder", ["mean", "Median"])
            .build(&context())
            .unwrap();

        let filters: Vec<&str> = config.filters().iter().map(|f| f.name).collect();
        assert_eq!(filters, vec!["Wavelet", "Original"]);
        assert_eq!(config.classes()[0].name, "firstorder");
        assert_eq!(config.classes()[0].features, vec!["Mean", "Median"]);
    }

    #[test]
    fn test_empty_selection_skips_deprecated() {
        let config = ExtractorBuilder::new()
            .enable_feature_class("glcm")
            .build(&context())
            .unwrap();
        let glcm = &config.classes()[0];
        assert_eq!(glcm.features.len(), 23);
        assert!(!glcm.features.contains(&"SumVariance"));
        assert!(glcm.deprecated.is_empty());
    }

    #[test]
    fn test_deprecated_features_run_when_named() {
        let config = ExtractorBuilder::new()
            .enable_features("firstorder", ["StandardDeviation", "Variance"])
            .build(&context())
            .unwrap();
        assert_eq!(config.classes()[0].deprecated.len(), 1);
        assert_eq!(config.classes()[0].deprecated[0].0, "StandardDeviation");
    }

    #[test]
    fn test_enable_all_features_appends_remaining_classes() {
        let config = ExtractorBuilder::new()
            .enable_features("glcm", ["Contrast"])
            .enable_all_features()
            .build(&context())
            .unwrap();
        let names: Vec<&str> = config.classes().iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["glcm", "firstorder"]);
        assert_eq!(config.features_per_image(), 1 + 18);
    }

    #[test]
    fn test_unknown_names_fail_at_build() {
        let err = ExtractorBuilder::new()
            .enable_filter("Gabor", FilterParams::new())
            .build(&context())
            .unwrap_err();
        assert!(matches!(err, RadiomicsError::UnknownFilter(_)));

        let err = ExtractorBuilder::new()
            .enable_features("firstorder", ["Bogus"])
            .build(&context())
            .unwrap_err();
        assert!(matches!(err, RadiomicsError::UnknownFeature { .. }));
    }

    #[test]
    fn test_filter_settings_are_checked_at_build() {
        let err = ExtractorBuilder::new()
            .enable_filter("LoG", FilterParams::new())
            .build(&context())
            .unwrap_err();
        assert!(matches!(err, RadiomicsError::InvalidSetting { .. }));

        let config = ExtractorBuilder::new()
            .enable_filter("LoG", params(json!({ "sigma": [1.0, 2.0] })))
            .build(&context())
            .unwrap();
        assert_eq!(config.filters()[0].settings.sigma, vec![1.0, 2.0]);
        assert!(config.settings().sigma.is_empty());
    }

    #[test]
    fn test_oversized_wavelet_level_fails_at_build() {
        let err = ExtractorBuilder::new()
            .with_settings(Settings {
                start_level: 64,
                ..Settings::default()
            })
            .enable_filter("Wavelet", FilterParams::new())
            .enable_features("firstorder", ["Mean"])
            .build(&context())
            .unwrap_err();
        assert!(matches!(err, RadiomicsError::InvalidSetting { ref name, .. } if name == "level"));

        let err = ExtractorBuilder::new()
            .enable_filter("Wavelet", params(json!({ "startLevel": 20, "level": 20 })))
            .build(&context())
            .unwrap_err();
        assert!(matches!(err, RadiomicsError::InvalidSetting { .. }));
    }

    #[test]
    fn test_reenabling_keeps_position_and_updates_params() {
        let builder = ExtractorBuilder::new()
            .enable_filter("Original", FilterParams::new())
            .enable_filter("Square", FilterParams::new())
            .enable_filter("original", params(json!({ "binWidth": 5.0 })))
            .disable_filter("square");
        let config = builder.build(&context()).unwrap();
        assert_eq!(config.filters().len(), 1);
        assert_eq!(config.filters()[0].settings.bin_width, 5.0);
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let build = |width: f64| {
            ExtractorBuilder::new()
                .with_settings(Settings {
                    bin_width: width,
                    ..Settings::default()
                })
                .enable_filter("Original", FilterParams::new())
                .enable_feature_class("firstorder")
                .build(&context())
                .unwrap()
        };
        assert_eq!(build(25.0).fingerprint().unwrap(), build(25.0).fingerprint().unwrap());
        assert_ne!(build(25.0).fingerprint().unwrap(), build(10.0).fingerprint().unwrap());
    }
}
