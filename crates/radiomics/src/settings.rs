//! Extraction settings.
//!
//! Keys use the camelCase names parameter files are written with
//! (`binWidth`, `minimumROISize`, `force2D`, ...). A `Settings` value is never
//! mutated during a run; per-filter overrides produce a fresh copy.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{RadiomicsError, Result};

/// Per-filter setting overrides, keyed like [`Settings`] fields.
pub type FilterParams = serde_json::Map<String, serde_json::Value>;

/// Interpolation used when resampling the image. Masks are always resampled
/// with nearest neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Interpolator {
    NearestNeighbor,
    #[default]
    Linear,
}

/// How per-direction co-occurrence matrices are weighted when they are merged
/// into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum WeightingNorm {
    Manhattan,
    Euclidean,
    Infinity,
    NoWeighting,
}

/// Whether glcm statistics are averaged over directions, or directions are
/// averaged into one matrix before computing statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum GlcmAggregation {
    #[default]
    AverageFeatures,
    AverageMatrices,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    /// Mask label selecting the region of interest
    pub label: i64,
    /// Minimum number of bounding-box axes with extent > 1
    #[serde(rename = "minimumROIDimensions")]
    #[schemars(range(min = 1, max = 3))]
    pub minimum_roi_dimensions: usize,
    /// Minimum number of ROI voxels
    #[serde(rename = "minimumROISize")]
    pub minimum_roi_size: Option<usize>,
    /// Allowed difference between image and mask geometry
    pub geometry_tolerance: f64,

    /// Fixed bin width used for discretization
    pub bin_width: f64,
    /// Fixed number of bins; takes precedence over `binWidth`
    pub bin_count: Option<usize>,
    /// Constant added to intensities for energy features
    pub voxel_array_shift: f64,

    /// Z-score normalize the image before filtering
    pub normalize: bool,
    pub normalize_scale: f64,
    /// Clip normalized intensities to +/- this many standard deviations
    pub remove_outliers: Option<f64>,

    /// Target voxel spacing; 0 on an axis keeps the original spacing
    pub resampled_pixel_spacing: Option<[f64; 3]>,
    pub interpolator: Interpolator,
    /// Voxels of context kept around the ROI when cropping
    pub pad_distance: usize,

    /// LoG kernel widths in mm
    pub sigma: Vec<f64>,
    /// First wavelet level that is emitted
    pub start_level: u32,
    /// Number of wavelet levels that are emitted
    pub level: u32,

    /// Co-occurrence offsets in voxels
    pub distances: Vec<usize>,
    #[serde(rename = "symmetricalGLCM")]
    pub symmetrical_glcm: bool,
    pub weighting_norm: Option<WeightingNorm>,
    pub glcm_aggregation: GlcmAggregation,
    /// Restrict texture directions to in-plane offsets
    #[serde(rename = "force2D")]
    pub force_2d: bool,
    /// Axis orthogonal to the plane used with `force2D` (0 = z, 1 = y, 2 = x)
    #[serde(rename = "force2Ddimension")]
    pub force_2d_dimension: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            label: 1,
            minimum_roi_dimensions: 2,
            minimum_roi_size: None,
            geometry_tolerance: 1e-6,
            bin_width: 25.0,
            bin_count: None,
            voxel_array_shift: 0.0,
            normalize: false,
            normalize_scale: 1.0,
            remove_outliers: None,
            resampled_pixel_spacing: None,
            interpolator: Interpolator::default(),
            pad_distance: 5,
            sigma: Vec::new(),
            start_level: 0,
            level: 1,
            distances: vec![1],
            symmetrical_glcm: true,
            weighting_norm: None,
            glcm_aggregation: GlcmAggregation::default(),
            force_2d: false,
            force_2d_dimension: 0,
        }
    }
}

impl Settings {
    /// JSON schema of the settings mapping.
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Settings)
    }

    /// Reject values no extraction can run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.bin_width.is_finite() && self.bin_width > 0.0) {
            return Err(RadiomicsError::invalid_setting("binWidth", "must be a positive number"));
        }
        if self.bin_count == Some(0) {
            return Err(RadiomicsError::invalid_setting("binCount", "must be at least 1"));
        }
        if !(1..=3).contains(&self.minimum_roi_dimensions) {
            return Err(RadiomicsError::invalid_setting("minimumROIDimensions", "must be 1, 2 or 3"));
        }
        if self.minimum_roi_size == Some(0) {
            return Err(RadiomicsError::invalid_setting("minimumROISize", "must be at least 1"));
        }
        if !(self.geometry_tolerance >= 0.0) {
            return Err(RadiomicsError::invalid_setting("geometryTolerance", "must not be negative"));
        }
        if !(self.normalize_scale > 0.0) {
            return Err(RadiomicsError::invalid_setting("normalizeScale", "must be positive"));
        }
        if let Some(outliers) = self.remove_outliers {
            if !(outliers > 0.0) {
                return Err(RadiomicsError::invalid_setting("removeOutliers", "must be positive"));
            }
        }
        if let Some(spacing) = self.resampled_pixel_spacing {
            if spacing.iter().any(|s| !(s.is_finite() && *s >= 0.0)) {
                return Err(RadiomicsError::invalid_setting(
                    "resampledPixelSpacing",
                    "entries must be finite and not negative",
                ));
            }
        }
        if self.sigma.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(RadiomicsError::invalid_setting("sigma", "every sigma must be positive"));
        }
        if self.level == 0 {
            return Err(RadiomicsError::invalid_setting("level", "must be at least 1"));
        }
        if self.distances.is_empty() || self.distances.contains(&0) {
            return Err(RadiomicsError::invalid_setting(
                "distances",
                "needs at least one distance, all >= 1",
            ));
        }
        if self.force_2d_dimension > 2 {
            return Err(RadiomicsError::invalid_setting("force2Ddimension", "must be 0, 1 or 2"));
        }
        Ok(())
    }

    /// Copy of these settings with `overrides` applied on top.
    pub fn with_overrides(&self, overrides: &FilterParams) -> Result<Settings> {
        if overrides.is_empty() {
            return Ok(self.clone());
        }
        let mut value = serde_json::to_value(self)?;
        if let Some(fields) = value.as_object_mut() {
            for (key, v) in overrides {
                fields.insert(key.clone(), v.clone());
            }
        }
        let merged: Settings = serde_json::from_value(value)
            .map_err(|e| RadiomicsError::invalid_setting("filter parameters", e.to_string()))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_valid() {
        Settings::default().validate().expect("defaults validate");
    }

    #[test]
    fn test_camel_case_keys() {
        let settings: Settings = serde_json::from_value(json!({
            "binWidth": 5.0,
            "minimumROISize": 10,
            "force2D": true,
            "symmetricalGLCM": false,
            "weightingNorm": "euclidean"
        }))
        .unwrap();

        assert_eq!(settings.bin_width, 5.0);
        assert_eq!(settings.minimum_roi_size, Some(10));
        assert!(settings.force_2d);
        assert!(!settings.symmetrical_glcm);
        assert_eq!(settings.weighting_norm, Some(WeightingNorm::Euclidean));
        assert_eq!(settings.label, 1);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let parsed: std::result::Result<Settings, _> = serde_json::from_value(json!({"binwidth": 5}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_overrides_leave_base_untouched() {
        let base = Settings::default();
        let mut overrides = FilterParams::new();
        overrides.insert("binWidth".into(), json!(2.0));
        overrides.insert("sigma".into(), json!([1.0, 2.0]));

        let merged = base.with_overrides(&overrides).unwrap();
        assert_eq!(merged.bin_width, 2.0);
        assert_eq!(merged.sigma, vec![1.0, 2.0]);
        assert_eq!(base.bin_width, 25.0);
    }

    #[test]
    fn test_invalid_override_is_a_setting_error() {
        let mut overrides = FilterParams::new();
        overrides.insert("sigma".into(), json!([-1.0]));
        let err = Settings::default().with_overrides(&overrides).unwrap_err();
        assert!(matches!(err, RadiomicsError::InvalidSetting { .. }));
    }
}
