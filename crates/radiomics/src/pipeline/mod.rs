pub mod builder;

use std::{path::Path, sync::Arc};

use rayon::prelude::*;
use tracing::{debug, info, warn};

pub use builder::{EnabledClass, EnabledFilter, ExtractionConfig, ExtractorBuilder};

use crate::{
    context::ExtractionContext,
    diagnostics,
    discretization::{BinningMode, Discretizer},
    error::{FeatureError, RadiomicsError, Result},
    io,
    preprocessing::{self, Prepared},
    result::{FeatureValue, ResultRecord},
    settings::Settings,
    traits::{DerivedImage, Discretization, Discretized, FeatureInput},
    types::{LabelMap, Region, VolumetricImage},
    validation::{self, RegionConstraints},
};

/// Runs a fixed [`ExtractionConfig`] over image/mask pairs.
///
/// Each call validates the region, prepares the image, emits diagnostics and
/// then computes every (derived image, feature class) pair on the context's
/// worker pool. The output order depends only on the configuration.
#[derive(Debug, Clone)]
pub struct Extractor {
    context: ExtractionContext,
    config: Arc<ExtractionConfig>,
}

/// One derived image with the settings of the filter that produced it.
struct Derived<'a> {
    image: DerivedImage,
    settings: &'a Settings,
}

impl Extractor {
    pub fn builder() -> ExtractorBuilder {
        ExtractorBuilder::new()
    }

    pub fn new(context: ExtractionContext, config: ExtractionConfig) -> Self {
        Self {
            context,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn context(&self) -> &ExtractionContext {
        &self.context
    }

    pub fn execute(&self, image: &VolumetricImage, mask: &LabelMap) -> Result<ResultRecord> {
        self.run(image, mask, self.config.settings().clone())
    }

    /// Like [`Extractor::execute`], selecting `label` instead of the
    /// configured one.
    pub fn execute_with_label(&self, image: &VolumetricImage, mask: &LabelMap, label: i64) -> Result<ResultRecord> {
        let settings = Settings {
            label,
            ..self.config.settings().clone()
        };
        self.run(image, mask, settings)
    }

    /// Load image and mask from disk, then extract.
    pub fn execute_paths(
        &self,
        image_path: impl AsRef<Path>,
        mask_path: impl AsRef<Path>,
        label: Option<i64>,
    ) -> Result<ResultRecord> {
        let image = io::load_image(image_path)?;
        let mask = io::load_label_map(mask_path)?;
        match label {
            Some(label) => self.execute_with_label(&image, &mask, label),
            None => self.execute(&image, &mask),
        }
    }

    fn run(&self, image: &VolumetricImage, mask: &LabelMap, settings: Settings) -> Result<ResultRecord> {
        let region = validation::validate(image, mask, &RegionConstraints::from(&settings))?;
        let prepared = preprocessing::prepare(image, mask, &region, &settings)?;

        let mut record = diagnostics::configuration(&settings, &self.config.enabled_image_types())?;
        record.extend(diagnostics::original(image, mask, &region));
        if prepared.interpolated {
            record.extend(diagnostics::interpolated(&prepared.image, &prepared.region));
        }

        for class in self.config.classes() {
            for (feature, note) in &class.deprecated {
                warn!(class = class.name, feature, note, "deprecated feature enabled");
            }
        }

        let derived = self.derive(&prepared)?;
        info!(
            derived_images = derived.len(),
            features_per_image = self.config.features_per_image(),
            voxels = prepared.region.voxel_count(),
            "extracting features"
        );

        let classes = self.config.classes();
        let tasks: Vec<(&Derived<'_>, &EnabledClass)> = derived
            .iter()
            .flat_map(|d| classes.iter().map(move |c| (d, c)))
            .collect();
        let partials: Vec<ResultRecord> = self.context.pool().install(|| {
            tasks
                .par_iter()
                .map(|(d, class)| self.compute_class(d, class, &prepared.region))
                .collect::<Result<Vec<_>>>()
        })?;

        for partial in partials {
            for (key, value) in partial.iter() {
                if let FeatureValue::Error(e) = value {
                    warn!(key, error = %e, "feature could not be computed");
                }
            }
            record.extend(partial);
        }
        Ok(record)
    }

    /// Apply every enabled filter to the prepared image, in declaration order.
    fn derive<'a>(&'a self, prepared: &Prepared) -> Result<Vec<Derived<'a>>> {
        let filters = self.context.filters();
        let outputs: Vec<Vec<Derived<'a>>> = self.context.pool().install(|| {
            self.config
                .filters()
                .par_iter()
                .map(|enabled| {
                    let images = filters.get(enabled.name)?.apply(&prepared.image, &enabled.settings)?;
                    debug!(filter = enabled.name, images = images.len(), "filter applied");
                    images
                        .into_iter()
                        .map(|image| {
                            if image.image.size() != prepared.image.size() {
                                return Err(RadiomicsError::InvalidVolume(format!(
                                    "{} changed the grid from {:?} to {:?}",
                                    image.name,
                                    prepared.image.size(),
                                    image.image.size()
                                )));
                            }
                            Ok(Derived {
                                image,
                                settings: &enabled.settings,
                            })
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(outputs.into_iter().flatten().collect())
    }

    /// All selected features of one class on one derived image. The image is
    /// discretized once for the whole class.
    fn compute_class(&self, derived: &Derived<'_>, class: &EnabledClass, region: &Region) -> Result<ResultRecord> {
        let feature_class = self.context.features().get(class.name)?;
        let image = &derived.image.image;
        let settings = derived.settings;
        let key = |feature: &str| format!("{}_{}_{}", derived.image.name, class.name, feature);

        let discretizer = Discretizer::new(BinningMode::from(settings));
        let discretized = match feature_class.discretization() {
            Discretization::None => Ok(Discretized::None),
            Discretization::Histogram => discretizer
                .histogram(&region.values(image))
                .map(Discretized::Histogram),
            Discretization::Texture => discretizer.discretize(image, region).map(Discretized::Texture),
        };

        let mut record = ResultRecord::new();
        let discretized = match discretized {
            Ok(d) => d,
            Err(e) => {
                let error = FeatureError::from(e);
                for &feature in &class.features {
                    record.push(key(feature), FeatureValue::Error(error.clone()));
                }
                return Ok(record);
            }
        };

        let input = FeatureInput {
            image,
            region,
            settings,
            discretized: &discretized,
        };
        let outcomes = feature_class.compute(&input, &class.features);
        for (&feature, outcome) in class.features.iter().zip(outcomes) {
            record.push(key(feature), outcome);
        }
        Ok(record)
    }
}
