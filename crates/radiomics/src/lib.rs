//! # Radiomics Feature Extraction Library
//!
//! Configurable extraction of quantitative features from a volumetric image
//! and a region-of-interest mask. Every enabled filter turns the image into
//! one or more derived images; every enabled feature class is computed on
//! each of them, and the results land in one flat, ordered record.
//!
//! ## Core Features
//!
//! - **Filter Registry**: `Original`, `LoG`, `Wavelet` and pointwise
//!   intensity transforms, looked up by name
//! - **Feature Classes**: first-order statistics and gray-level co-occurrence
//!   (`glcm`) features, each declaring the discretization it needs
//! - **Region Validation**: fail-fast checks on geometry, label presence and
//!   region size
//! - **Diagnostics**: hashes, geometry and region statistics at the head of
//!   every result
//! - **Parallel Grid**: (derived image x feature class) work runs on a rayon
//!   pool with deterministic output order
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use radiomics::{ExtractionContext, Extractor, settings::FilterParams};
//!
//! let context = ExtractionContext::new()?;
//! let config = Extractor::builder()
//!     .enable_filter("Original", FilterParams::new())
//!     .enable_feature_class("firstorder")
//!     .enable_feature_class("glcm")
//!     .build(&context)?;
//! let extractor = Extractor::new(context, config);
//!
//! let record = extractor.execute_paths("image.json", "mask.json", None)?;
//! for (key, value) in &record {
//!     println!("{key}: {value}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod settings;
pub mod traits;
pub mod validation;
pub mod discretization;
pub mod filters;
pub mod features;
pub mod preprocessing;
pub mod diagnostics;
pub mod result;
pub mod context;
pub mod pipeline;
pub mod io;

// Re-exports for convenience
pub use context::ExtractionContext;
pub use error::{DiscretizationError, FeatureError, RadiomicsError, Result, ValidationError};
pub use features::FeatureRegistry;
pub use filters::{FilterKind, FilterRegistry};
pub use pipeline::{ExtractionConfig, Extractor, ExtractorBuilder};
pub use result::{FeatureValue, ResultRecord};
pub use settings::Settings;
pub use traits::*;
pub use types::{BoundingBox, Geometry, LabelMap, Region, VolumetricImage};
