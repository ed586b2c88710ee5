//! Feature classes and their registry.
//!
//! A class is a table of named `fn(&Ctx) -> f64` plus one `prepare` step that
//! turns the (image, region, discretization) input into one or more contexts.
//! When a class prepares several contexts (e.g. one co-occurrence matrix per
//! direction), each feature is the mean of its per-context values.

pub mod firstorder;
pub mod glcm;

use std::{collections::BTreeMap, sync::Arc};

pub use firstorder::FIRST_ORDER;
pub use glcm::GLCM;

use crate::{
    error::{FeatureError, RadiomicsError, Result},
    traits::{Discretization, FeatureClass, FeatureInfo, FeatureInput},
};

pub struct FeatureDef<C> {
    pub name: &'static str,
    pub compute: fn(&C) -> f64,
    pub deprecated: Option<&'static str>,
}

impl<C> FeatureDef<C> {
    pub const fn new(name: &'static str, compute: fn(&C) -> f64) -> Self {
        Self {
            name,
            compute,
            deprecated: None,
        }
    }

    pub const fn deprecated(name: &'static str, compute: fn(&C) -> f64, note: &'static str) -> Self {
        Self {
            name,
            compute,
            deprecated: Some(note),
        }
    }
}

/// A feature class backed by a static table of feature functions.
pub struct FeatureTable<C: 'static> {
    name: &'static str,
    discretization: Discretization,
    prepare: fn(&FeatureInput<'_>) -> std::result::Result<Vec<C>, FeatureError>,
    features: &'static [FeatureDef<C>],
}

impl<C: 'static> FeatureTable<C> {
    pub const fn new(
        name: &'static str,
        discretization: Discretization,
        prepare: fn(&FeatureInput<'_>) -> std::result::Result<Vec<C>, FeatureError>,
        features: &'static [FeatureDef<C>],
    ) -> Self {
        Self {
            name,
            discretization,
            prepare,
            features,
        }
    }

    fn evaluate(&self, contexts: &[C], name: &str) -> std::result::Result<f64, FeatureError> {
        let def = self
            .features
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| FeatureError::Computation(format!("{name} is not a {} feature", self.name)))?;

        let values: Vec<f64> = contexts
            .iter()
            .map(def.compute)
            .filter(|v| !v.is_nan())
            .collect();
        if values.is_empty() {
            return Err(FeatureError::Computation(format!("{name} is undefined for this region")));
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        if mean.is_finite() {
            Ok(mean)
        } else {
            Err(FeatureError::Computation(format!("{name} is not finite")))
        }
    }
}

impl<C: 'static> FeatureClass for FeatureTable<C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn discretization(&self) -> Discretization {
        self.discretization
    }

    fn features(&self) -> Vec<FeatureInfo> {
        self.features
            .iter()
            .map(|d| FeatureInfo {
                name: d.name,
                deprecated: d.deprecated,
            })
            .collect()
    }

    fn compute(
        &self,
        input: &FeatureInput<'_>,
        selected: &[&'static str],
    ) -> Vec<std::result::Result<f64, FeatureError>> {
        let contexts = match (self.prepare)(input) {
            Ok(contexts) if !contexts.is_empty() => contexts,
            Ok(_) => {
                let err = FeatureError::Computation(format!("{} has nothing to compute on", self.name));
                return selected.iter().map(|_| Err(err.clone())).collect();
            }
            Err(err) => return selected.iter().map(|_| Err(err.clone())).collect(),
        };
        selected
            .iter()
            .map(|name| self.evaluate(&contexts, name))
            .collect()
    }
}

/// Name-to-class table. Lookup ignores ASCII case.
#[derive(Clone)]
pub struct FeatureRegistry {
    classes: BTreeMap<String, Arc<dyn FeatureClass>>,
}

impl FeatureRegistry {
    pub fn empty() -> Self {
        Self {
            classes: BTreeMap::new(),
        }
    }

    /// Registry with `firstorder` and `glcm`.
    pub fn builtin() -> Self {
        Self::empty()
            .register(Arc::new(FIRST_ORDER))
            .register(Arc::new(GLCM))
    }

    pub fn register(mut self, class: Arc<dyn FeatureClass>) -> Self {
        self.classes.insert(class.name().to_ascii_lowercase(), class);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn FeatureClass>> {
        self.classes
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| RadiomicsError::UnknownFeatureClass(name.to_string()))
    }

    /// Canonical name of `feature` within `class`, matched ignoring case.
    pub fn resolve_feature(&self, class: &str, feature: &str) -> Result<FeatureInfo> {
        self.get(class)?
            .features()
            .into_iter()
            .find(|f| f.name.eq_ignore_ascii_case(feature))
            .ok_or_else(|| RadiomicsError::UnknownFeature {
                class: class.to_string(),
                feature: feature.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.classes.values().map(|c| c.name()).collect()
    }
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for FeatureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureRegistry")
            .field("classes", &self.names())
            .finish()
    }
}
