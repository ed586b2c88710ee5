use tracing::debug;

use super::convolution::{Boundary, convolve_axis, gaussian_taps};
use crate::{
    error::{RadiomicsError, Result},
    settings::Settings,
    traits::{DerivedImage, ImageFilter},
    types::VolumetricImage,
};

/// Laplacian of Gaussian, one derived image per `sigma` (mm).
///
/// The Gaussian is applied separably with per-axis widths `sigma / spacing`,
/// followed by a second-difference Laplacian in physical units. The response
/// is multiplied by `sigma²` so that scales are comparable. Axes with a single
/// voxel are left alone, which makes a 2-D image yield a 2-D LoG.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFilter;

impl LogFilter {
    pub fn derived_name(sigma: f64, dimensionality: usize) -> String {
        let sigma = format!("{sigma:?}").replace('.', "-");
        let suffix = if dimensionality >= 3 { "3D" } else { "2D" };
        format!("log-sigma-{sigma}-mm-{suffix}")
    }

    fn laplacian_of_gaussian(image: &VolumetricImage, sigma: f64) -> Result<VolumetricImage> {
        let size = image.size();
        let spacing = image.geometry().spacing;
        let axes: Vec<usize> = (0..3).filter(|&a| size[a] > 1).collect();

        let mut smoothed = image.data().to_vec();
        for &axis in &axes {
            let taps = gaussian_taps(sigma / spacing[axis]);
            smoothed = convolve_axis(&smoothed, size, axis, &taps, Boundary::Replicate);
        }

        let mut response = vec![0.0; smoothed.len()];
        for &axis in &axes {
            let h2 = spacing[axis] * spacing[axis];
            let taps = [(-1, 1.0 / h2), (0, -2.0 / h2), (1, 1.0 / h2)];
            let second = convolve_axis(&smoothed, size, axis, &taps, Boundary::Replicate);
            for (r, s) in response.iter_mut().zip(second) {
                *r += s;
            }
        }

        let scale = sigma * sigma;
        for r in &mut response {
            *r *= scale;
        }
        image.with_data(response)
    }
}

impl ImageFilter for LogFilter {
    fn name(&self) -> &'static str {
        "LoG"
    }

    fn check_settings(&self, settings: &Settings) -> Result<()> {
        if settings.sigma.is_empty() {
            return Err(RadiomicsError::invalid_setting(
                "sigma",
                "LoG needs at least one sigma value",
            ));
        }
        Ok(())
    }

    fn apply(&self, image: &VolumetricImage, settings: &Settings) -> Result<Vec<DerivedImage>> {
        self.check_settings(settings)?;
        settings
            .sigma
            .iter()
            .map(|&sigma| {
                debug!(sigma, "computing LoG");
                let filtered = Self::laplacian_of_gaussian(image, sigma)?;
                Ok(DerivedImage::new(
                    Self::derived_name(sigma, image.dimensionality()),
                    filtered,
                ))
            })
            .collect()
    }
}
