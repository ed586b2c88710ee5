//! Linear binning of ROI intensities into 1-based gray levels.
//!
//! Width-based edges are `min + k * width`; count-based edges split
//! `[min, max]` into `binCount` equal intervals. The maximum intensity always
//! lands in the last bin.

use crate::{
    error::DiscretizationError,
    settings::Settings,
    types::{Region, VolumetricImage},
};

/// Upper bound on the number of bins a discretization may produce.
pub const MAX_BINS: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinningMode {
    Width(f64),
    Count(usize),
}

impl From<&Settings> for BinningMode {
    fn from(settings: &Settings) -> Self {
        match settings.bin_count {
            Some(count) => BinningMode::Count(count),
            None => BinningMode::Width(settings.bin_width),
        }
    }
}

/// Gray levels over the ROI of one derived image. Voxels outside the ROI hold
/// level 0.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscretizedImage {
    size: [usize; 3],
    levels: Vec<usize>,
    edges: Vec<f64>,
}

impl DiscretizedImage {
    pub fn size(&self) -> [usize; 3] {
        self.size
    }

    /// Bin edges; `edges().len() - 1` bins.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn bin_count(&self) -> usize {
        self.edges.len() - 1
    }

    /// Level of every voxel in x-fastest order, 0 outside the ROI.
    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    #[inline]
    pub fn level(&self, x: usize, y: usize, z: usize) -> usize {
        self.levels[crate::types::linear_index(self.size, x, y, z)]
    }
}

/// Occupancy of each bin over a set of intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub counts: Vec<usize>,
    pub edges: Vec<f64>,
}

impl Histogram {
    /// Normalized bin probabilities, empty bins included.
    pub fn probabilities(&self) -> Vec<f64> {
        let total: usize = self.counts.iter().sum();
        self.counts
            .iter()
            .map(|&c| c as f64 / total as f64)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discretizer {
    mode: BinningMode,
}

impl Discretizer {
    pub fn new(mode: BinningMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> BinningMode {
        self.mode
    }

    /// Discretize the ROI of `image`. Texture matrices need at least two
    /// distinct intensities, so a constant ROI is an error here.
    pub fn discretize(
        &self,
        image: &VolumetricImage,
        region: &Region,
    ) -> Result<DiscretizedImage, DiscretizationError> {
        let values = region.values(image);
        let (min, max) = value_range(&values).ok_or(DiscretizationError::EmptyRegion)?;
        if min == max {
            return Err(DiscretizationError::SingleValuedRegion { value: min });
        }
        let binning = Binning::new(self.mode, min, max)?;

        let mut levels = vec![0usize; image.len()];
        for (&index, &value) in region.indices().iter().zip(&values) {
            levels[index] = binning.assign(value);
        }
        Ok(DiscretizedImage {
            size: image.size(),
            levels,
            edges: binning.edges(),
        })
    }

    /// Histogram of `values`. Unlike [`Discretizer::discretize`], a constant
    /// input is accepted and lands in a single bin.
    pub fn histogram(&self, values: &[f64]) -> Result<Histogram, DiscretizationError> {
        let (min, max) = value_range(values).ok_or(DiscretizationError::EmptyRegion)?;
        if min == max {
            return Ok(Histogram {
                counts: vec![values.len()],
                edges: vec![min - 0.5, min + 0.5],
            });
        }
        let binning = Binning::new(self.mode, min, max)?;
        let mut counts = vec![0usize; binning.bins];
        for &v in values {
            counts[binning.assign(v) - 1] += 1;
        }
        Ok(Histogram {
            counts,
            edges: binning.edges(),
        })
    }
}

fn value_range(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(values.iter().fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))))
}

/// Edge layout for a non-degenerate intensity range.
struct Binning {
    min: f64,
    width: f64,
    bins: usize,
}

impl Binning {
    fn new(mode: BinningMode, min: f64, max: f64) -> Result<Self, DiscretizationError> {
        let (width, bins) = match mode {
            BinningMode::Width(width) => {
                let span = ((max - min) / width).floor();
                if !span.is_finite() || span >= MAX_BINS as f64 {
                    return Err(DiscretizationError::TooManyBins { bins: MAX_BINS });
                }
                (width, span as usize + 1)
            }
            BinningMode::Count(count) => {
                if count > MAX_BINS {
                    return Err(DiscretizationError::TooManyBins { bins: count });
                }
                ((max - min) / count as f64, count)
            }
        };
        Ok(Self { min, width, bins })
    }

    /// 1-based bin of `value`; values at or past the top edge go to the last
    /// bin.
    #[inline]
    fn assign(&self, value: f64) -> usize {
        let offset = ((value - self.min) / self.width).floor();
        if offset <= 0.0 {
            1
        } else {
            (offset as usize + 1).min(self.bins)
        }
    }

    fn edges(&self) -> Vec<f64> {
        (0..=self.bins)
            .map(|k| self.min + k as f64 * self.width)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Geometry, LabelMap};

    fn ramp() -> (VolumetricImage, Region) {
        let image = VolumetricImage::from_fn([4, 4, 1], Geometry::default(), |[x, y, _]| (x + 4 * y) as f64);
        let region = LabelMap::from_fn([4, 4, 1], Geometry::default(), |_| 1)
            .select(1)
            .unwrap();
        (image, region)
    }

    #[test]
    fn test_width_binning_edges_start_at_minimum() {
        let (image, region) = ramp();
        let d = Discretizer::new(BinningMode::Width(4.0)).discretize(&image, &region).unwrap();

        assert_eq!(d.edges(), &[0.0, 4.0, 8.0, 12.0, 16.0]);
        assert_eq!(d.level(0, 0, 0), 1);
        assert_eq!(d.level(3, 0, 0), 1);
        assert_eq!(d.level(0, 1, 0), 2);
        assert_eq!(d.level(3, 3, 0), 4);
    }

    #[test]
    fn test_maximum_goes_to_last_bin() {
        let (image, region) = ramp();
        let d = Discretizer::new(BinningMode::Count(3)).discretize(&image, &region).unwrap();

        assert_eq!(d.bin_count(), 3);
        assert_eq!(d.level(3, 3, 0), 3);
        assert_eq!(d.level(0, 0, 0), 1);
        assert!(d.levels().iter().all(|&l| (1..=3).contains(&l)));
    }

    #[test]
    fn test_unit_width_gives_one_level_per_integer() {
        let (image, region) = ramp();
        let d = Discretizer::new(BinningMode::Width(1.0)).discretize(&image, &region).unwrap();
        assert_eq!(d.bin_count(), 16);
        assert_eq!(d.level(2, 1, 0), 7);
    }

    #[test]
    fn test_discretization_is_idempotent() {
        let (image, region) = ramp();
        let discretizer = Discretizer::new(BinningMode::Width(3.0));
        let a = discretizer.discretize(&image, &region).unwrap();
        let b = discretizer.discretize(&image, &region).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_region_fails_texture_binning() {
        let image = VolumetricImage::from_fn([2, 2, 1], Geometry::default(), |_| 7.0);
        let region = LabelMap::from_fn([2, 2, 1], Geometry::default(), |_| 1).select(1).unwrap();
        let err = Discretizer::new(BinningMode::Width(1.0))
            .discretize(&image, &region)
            .unwrap_err();
        assert_eq!(err, DiscretizationError::SingleValuedRegion { value: 7.0 });
    }

    #[test]
    fn test_constant_histogram_is_one_bin() {
        let h = Discretizer::new(BinningMode::Width(1.0)).histogram(&[3.0, 3.0, 3.0]).unwrap();
        assert_eq!(h.counts, vec![3]);
        assert_eq!(h.probabilities(), vec![1.0]);
    }

    #[test]
    fn test_outside_roi_is_level_zero() {
        let image = VolumetricImage::from_fn([3, 1, 1], Geometry::default(), |[x, _, _]| x as f64);
        let region = LabelMap::from_fn([3, 1, 1], Geometry::default(), |[x, _, _]| (x > 0) as i64)
            .select(1)
            .unwrap();
        let d = Discretizer::new(BinningMode::Width(1.0)).discretize(&image, &region).unwrap();
        assert_eq!(d.levels(), &[0, 1, 2]);
    }
}
