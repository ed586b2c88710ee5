pub mod convolution;
pub mod log;
pub mod original;
pub mod pointwise;
pub mod wavelet;

use std::{collections::BTreeMap, sync::Arc};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr, VariantNames};

pub use log::LogFilter;
pub use original::OriginalFilter;
pub use pointwise::PointwiseFilter;
pub use wavelet::WaveletFilter;

use crate::{
    error::{RadiomicsError, Result},
    traits::ImageFilter,
};

/// Built-in filters, by the names parameter files use.
#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq, Hash, PartialOrd, Ord
)]
#[strum(ascii_case_insensitive)]
pub enum FilterKind {
    /// Unfiltered image
    Original,
    /// Laplacian of Gaussian, one image per sigma
    #[strum(serialize = "LoG")]
    #[serde(rename = "LoG")]
    LoG,
    /// Undecimated Haar wavelet bands
    Wavelet,
    Square,
    SquareRoot,
    Logarithm,
    Exponential,
}

impl FilterKind {
    pub fn filter_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Original => "Identity; features are computed on the input image",
            Self::LoG => "Laplacian of Gaussian edge/blob enhancement for each sigma (mm)",
            Self::Wavelet => "Undecimated Haar decomposition into L/H bands per axis",
            Self::Square => "Squared intensities, rescaled to the input range",
            Self::SquareRoot => "Signed square root of intensities, rescaled",
            Self::Logarithm => "Signed logarithm of intensities, rescaled",
            Self::Exponential => "Exponential of intensities, rescaled",
        }
    }

    fn build(self) -> Arc<dyn ImageFilter> {
        match self {
            Self::Original => Arc::new(OriginalFilter),
            Self::LoG => Arc::new(LogFilter),
            Self::Wavelet => Arc::new(WaveletFilter),
            Self::Square => Arc::new(PointwiseFilter::Square),
            Self::SquareRoot => Arc::new(PointwiseFilter::SquareRoot),
            Self::Logarithm => Arc::new(PointwiseFilter::Logarithm),
            Self::Exponential => Arc::new(PointwiseFilter::Exponential),
        }
    }
}

/// Name-to-filter table. Lookup ignores ASCII case; the canonical name is the
/// one the filter reports.
#[derive(Clone)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Arc<dyn ImageFilter>>,
}

impl FilterRegistry {
    pub fn empty() -> Self {
        Self {
            filters: BTreeMap::new(),
        }
    }

    /// Registry holding every [`FilterKind`].
    pub fn builtin() -> Self {
        FilterKind::iter().fold(Self::empty(), |registry, kind| registry.register(kind.build()))
    }

    /// Add (or replace) a filter under its own name.
    pub fn register(mut self, filter: Arc<dyn ImageFilter>) -> Self {
        self.filters.insert(filter.name().to_ascii_lowercase(), filter);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn ImageFilter>> {
        self.filters
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| RadiomicsError::UnknownFilter(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.values().map(|f| f.name()).collect()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.names())
            .finish()
    }
}
