use std::f64::consts::FRAC_1_SQRT_2;

use super::convolution::{Boundary, convolve_axis};
use crate::{
    error::{RadiomicsError, Result},
    settings::Settings,
    traits::{DerivedImage, ImageFilter},
    types::VolumetricImage,
};

/// Undecimated (à trous) Haar decomposition with periodic boundaries.
///
/// Every axis with more than one voxel is split into a low (L) and high (H)
/// band, so a 3-D image yields eight bands per level and a 2-D image four.
/// Levels `startLevel + 1 ..= startLevel + level` are emitted; each emits its
/// detail bands and the last one also emits the all-L approximation.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveletFilter;

/// Deepest level the dilated taps can reach.
pub const MAX_LEVEL: u32 = 30;

const LOW: [(isize, f64); 2] = [(0, FRAC_1_SQRT_2), (1, FRAC_1_SQRT_2)];
const HIGH: [(isize, f64); 2] = [(0, FRAC_1_SQRT_2), (1, -FRAC_1_SQRT_2)];

impl WaveletFilter {
    /// Last decomposition level, `startLevel + level`.
    fn last_level(settings: &Settings) -> Result<u32> {
        settings
            .start_level
            .checked_add(settings.level)
            .filter(|&last| last <= MAX_LEVEL)
            .ok_or_else(|| {
                RadiomicsError::invalid_setting(
                    "level",
                    format!("startLevel + level must not exceed {MAX_LEVEL}"),
                )
            })
    }

    fn band_name(level: u32, highs: &[bool]) -> String {
        let bands: String = highs.iter().map(|&h| if h { 'H' } else { 'L' }).collect();
        if level == 1 {
            format!("wavelet-{bands}")
        } else {
            format!("wavelet{level}-{bands}")
        }
    }

    fn band(approx: &[f64], size: [usize; 3], axes: &[usize], highs: &[bool], step: isize) -> Vec<f64> {
        let mut data = approx.to_vec();
        for (&axis, &high) in axes.iter().zip(highs) {
            let base = if high { HIGH } else { LOW };
            let taps = base.map(|(offset, w)| (offset * step, w));
            data = convolve_axis(&data, size, axis, &taps, Boundary::Periodic);
        }
        data
    }
}

impl ImageFilter for WaveletFilter {
    fn name(&self) -> &'static str {
        "Wavelet"
    }

    fn check_settings(&self, settings: &Settings) -> Result<()> {
        Self::last_level(settings).map(|_| ())
    }

    fn apply(&self, image: &VolumetricImage, settings: &Settings) -> Result<Vec<DerivedImage>> {
        let size = image.size();
        let axes: Vec<usize> = (0..3).filter(|&a| size[a] > 1).collect();
        let combinations = 1usize << axes.len();
        let last = Self::last_level(settings)?;
        let first = settings.start_level + 1;

        let mut derived = Vec::new();
        let mut approx = image.data().to_vec();
        for level in 1..=last {
            let step = 1isize << (level - 1);
            if level >= first {
                for combination in 1..combinations {
                    let highs: Vec<bool> = (0..axes.len())
                        .map(|i| combination & (1 << (axes.len() - 1 - i)) != 0)
                        .collect();
                    let data = Self::band(&approx, size, &axes, &highs, step);
                    derived.push(DerivedImage::new(
                        Self::band_name(level, &highs),
                        image.with_data(data)?,
                    ));
                }
            }
            let lows = vec![false; axes.len()];
            approx = Self::band(&approx, size, &axes, &lows, step);
        }
        derived.push(DerivedImage::new(
            Self::band_name(last, &vec![false; axes.len()]),
            image.with_data(approx)?,
        ));
        Ok(derived)
    }
}
