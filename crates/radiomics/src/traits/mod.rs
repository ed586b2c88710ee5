use crate::{
    discretization::{DiscretizedImage, Histogram},
    error::{FeatureError, Result},
    settings::Settings,
    types::{Region, VolumetricImage},
};

/// A derived image together with the name used as its result-key prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedImage {
    pub name: String,
    pub image: VolumetricImage,
}

impl DerivedImage {
    pub fn new(name: impl Into<String>, image: VolumetricImage) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }
}

/// Trait for image filters producing one or more derived images
pub trait ImageFilter: Send + Sync {
    /// Registry name, matched case-insensitively (e.g. `LoG`)
    fn name(&self) -> &'static str;

    /// Reject settings this filter cannot run with. Called when a
    /// configuration is built, before any image is touched.
    fn check_settings(&self, _settings: &Settings) -> Result<()> {
        Ok(())
    }

    /// Apply the filter. Must be deterministic and leave `image` untouched.
    fn apply(&self, image: &VolumetricImage, settings: &Settings) -> Result<Vec<DerivedImage>>;
}

/// What a feature class needs from the discretizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discretization {
    /// Raw intensities only
    None,
    /// Histogram of ROI intensities; a constant ROI is one bin
    Histogram,
    /// Gray-level image; a constant ROI is an error
    Texture,
}

/// Discretization result handed to a feature class, matching its declared
/// [`Discretization`].
#[derive(Debug, Clone, PartialEq)]
pub enum Discretized {
    None,
    Histogram(Histogram),
    Texture(DiscretizedImage),
}

/// Everything a feature class reads for one derived image.
#[derive(Debug, Clone, Copy)]
pub struct FeatureInput<'a> {
    pub image: &'a VolumetricImage,
    pub region: &'a Region,
    pub settings: &'a Settings,
    pub discretized: &'a Discretized,
}

/// Name and status of one feature in a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureInfo {
    pub name: &'static str,
    /// Deprecation note; deprecated features run only when requested by name
    pub deprecated: Option<&'static str>,
}

/// Trait for a named group of features sharing one preparation step
pub trait FeatureClass: Send + Sync {
    /// Registry name, also the middle part of result keys (e.g. `glcm`)
    fn name(&self) -> &'static str;

    fn discretization(&self) -> Discretization;

    /// Features in declaration order.
    fn features(&self) -> Vec<FeatureInfo>;

    /// Compute `selected` features, one outcome per requested name, in the
    /// same order.
    fn compute(&self, input: &FeatureInput<'_>, selected: &[&'static str])
    -> Vec<std::result::Result<f64, FeatureError>>;
}
