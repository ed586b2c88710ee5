//! Image preparation between validation and filtering: intensity
//! normalization, resampling to a target spacing and cropping to the padded
//! ROI bounding box.

use tracing::debug;

use crate::{
    error::{Result, ValidationError},
    settings::{Interpolator, Settings},
    types::{Geometry, LabelMap, Region, VolumetricImage, coordinates},
};

/// Image, mask and region as the filters see them.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub image: VolumetricImage,
    pub mask: LabelMap,
    pub region: Region,
    /// Normalization or resampling changed the voxel values or grid
    pub interpolated: bool,
}

/// Run every enabled preprocessing step on a validated image/mask pair.
pub fn prepare(image: &VolumetricImage, mask: &LabelMap, region: &Region, settings: &Settings) -> Result<Prepared> {
    let mut image = if settings.normalize {
        normalize(image, settings.normalize_scale, settings.remove_outliers)
    } else {
        image.clone()
    };
    let mut mask = mask.clone();
    let mut region = region.clone();

    let target = settings
        .resampled_pixel_spacing
        .map(|spacing| resolve_spacing(spacing, image.geometry().spacing));
    let resampled = match target {
        Some(spacing) if spacing != image.geometry().spacing => {
            let (cropped_image, cropped_mask, _) = crop_to_region(&image, &mask, &region, settings.pad_distance)?;
            let (i, m) = resample(&cropped_image, &cropped_mask, spacing, settings.interpolator);
            region = m
                .select(settings.label)
                .ok_or(ValidationError::EmptyRegion { label: settings.label })?;
            image = i;
            mask = m;
            debug!(spacing = ?spacing, size = ?image.size(), "resampled image and mask");
            true
        }
        _ => false,
    };

    let (image, mask, region) = crop_to_region(&image, &mask, &region, settings.pad_distance)?;
    Ok(Prepared {
        image,
        mask,
        region,
        interpolated: settings.normalize || resampled,
    })
}

/// Zero-mean, unit-variance intensities over the whole image, optionally
/// clipped to `±outliers` standard deviations, then multiplied by `scale`.
pub fn normalize(image: &VolumetricImage, scale: f64, outliers: Option<f64>) -> VolumetricImage {
    let data = image.data();
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let std = (data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let std = if std > 0.0 { std } else { 1.0 };

    image.map(|v| {
        let z = (v - mean) / std;
        let z = match outliers {
            Some(limit) => z.clamp(-limit, limit),
            None => z,
        };
        z * scale
    })
}

/// A zero in `requested` keeps the current spacing of that axis.
fn resolve_spacing(requested: [f64; 3], current: [f64; 3]) -> [f64; 3] {
    [0usize, 1, 2].map(|a| if requested[a] > 0.0 { requested[a] } else { current[a] })
}

/// Crop image, mask and region to the region's bounding box grown by `pad`.
pub fn crop_to_region(
    image: &VolumetricImage,
    mask: &LabelMap,
    region: &Region,
    pad: usize,
) -> Result<(VolumetricImage, LabelMap, Region)> {
    let bbox = region.bounding_box().padded(pad, region.size());
    let cropped = region
        .crop(&bbox)
        .ok_or(ValidationError::EmptyRegion { label: region.label() })?;
    Ok((image.crop(&bbox), mask.crop(&bbox), cropped))
}

/// Resample onto a grid with `spacing` covering the same physical extent.
/// The mask always uses nearest-neighbour lookup.
pub fn resample(
    image: &VolumetricImage,
    mask: &LabelMap,
    spacing: [f64; 3],
    interpolator: Interpolator,
) -> (VolumetricImage, LabelMap) {
    let old = image.geometry();
    let old_size = image.size();
    let ratio = [0usize, 1, 2].map(|a| spacing[a] / old.spacing[a]);
    let size = [0usize, 1, 2].map(|a| ((old_size[a] as f64 / ratio[a]).round() as usize).max(1));
    let geometry = Geometry {
        spacing,
        origin: old.index_to_physical(ratio.map(|r| (r - 1.0) / 2.0)),
        direction: old.direction,
    };

    // centre of new voxel i in old continuous index space
    let source = |index: [usize; 3]| [0usize, 1, 2].map(|a| (index[a] as f64 + 0.5) * ratio[a] - 0.5);

    let image_out = VolumetricImage::from_fn(size, geometry.clone(), |index| {
        let at = source(index);
        match interpolator {
            Interpolator::NearestNeighbor => {
                let [x, y, z] = nearest(at, old_size);
                image.get(x, y, z)
            }
            Interpolator::Linear => sample_linear(image, at),
        }
    });

    let len: usize = size.iter().product();
    let labels = (0..len)
        .map(|i| {
            let [x, y, z] = nearest(source(coordinates(size, i)), old_size);
            mask.labels()[crate::types::linear_index(old_size, x, y, z)]
        })
        .collect();
    (image_out, LabelMap::with_labels(size, geometry, labels))
}

fn nearest(at: [f64; 3], size: [usize; 3]) -> [usize; 3] {
    [0usize, 1, 2].map(|a| (at[a].round().max(0.0) as usize).min(size[a] - 1))
}

/// Trilinear interpolation with edge clamping.
fn sample_linear(image: &VolumetricImage, at: [f64; 3]) -> f64 {
    let size = image.size();
    let mut lo = [0usize; 3];
    let mut hi = [0usize; 3];
    let mut frac = [0.0; 3];
    for a in 0..3 {
        let max = (size[a] - 1) as f64;
        let c = at[a].clamp(0.0, max);
        lo[a] = c.floor() as usize;
        hi[a] = (lo[a] + 1).min(size[a] - 1);
        frac[a] = c - lo[a] as f64;
    }

    let mut value = 0.0;
    for corner in 0..8 {
        let pick = |a: usize| corner >> a & 1 == 1;
        let mut weight = 1.0;
        let mut index = [0usize; 3];
        for a in 0..3 {
            if pick(a) {
                weight *= frac[a];
                index[a] = hi[a];
            } else {
                weight *= 1.0 - frac[a];
                index[a] = lo[a];
            }
        }
        if weight > 0.0 {
            value += weight * image.get(index[0], index[1], index[2]);
        }
    }
    value
}
