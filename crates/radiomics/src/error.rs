use thiserror::Error;

/// Fatal errors: a run that hits one of these returns no result at all.
#[derive(Error, Debug)]
pub enum RadiomicsError {
    #[error("Region validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("Unknown feature class: {0}")]
    UnknownFeatureClass(String),

    #[error("Unknown feature {feature} in class {class}")]
    UnknownFeature { class: String, feature: String },

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: String, reason: String },

    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    #[error("Failed to load image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl RadiomicsError {
    pub(crate) fn invalid_setting(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Reasons the mask does not define a usable region.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("label {label} is not present in the mask")]
    EmptyRegion { label: i64 },

    #[error("region has {voxels} voxels, at least {minimum} required")]
    RegionTooSmall { voxels: usize, minimum: usize },

    #[error("region spans {found} dimension(s), at least {minimum} required")]
    TooFewDimensions { found: usize, minimum: usize },

    #[error("image/mask geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscretizationError {
    #[error("region contains a single intensity value ({value})")]
    SingleValuedRegion { value: f64 },

    #[error("region contains no voxels")]
    EmptyRegion,

    #[error("intensity range produced {bins} bins")]
    TooManyBins { bins: usize },
}

/// Errors local to one feature key. These never abort a run; they end up as
/// error markers in the result record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("discretization failed: {0}")]
    Discretization(#[from] DiscretizationError),

    #[error("feature computation failed: {0}")]
    Computation(String),
}

pub type Result<T> = std::result::Result<T, RadiomicsError>;
