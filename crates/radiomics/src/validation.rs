//! Fail-fast region checks run once per extraction, before any filter or
//! feature work.

use tracing::debug;

use crate::{
    error::ValidationError,
    settings::Settings,
    types::{LabelMap, Region, VolumetricImage},
};

/// Thresholds a region must satisfy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionConstraints {
    pub label: i64,
    pub minimum_dimensions: usize,
    pub minimum_size: Option<usize>,
    pub geometry_tolerance: f64,
}

impl From<&Settings> for RegionConstraints {
    fn from(settings: &Settings) -> Self {
        Self {
            label: settings.label,
            minimum_dimensions: settings.minimum_roi_dimensions,
            minimum_size: settings.minimum_roi_size,
            geometry_tolerance: settings.geometry_tolerance,
        }
    }
}

/// Check image/mask agreement and region size. On success the returned
/// [`Region`] carries the bounding box and voxel count every downstream stage
/// reuses.
pub fn validate(
    image: &VolumetricImage,
    mask: &LabelMap,
    constraints: &RegionConstraints,
) -> Result<Region, ValidationError> {
    if image.size() != mask.size() {
        return Err(ValidationError::GeometryMismatch(format!(
            "image size {:?} != mask size {:?}",
            image.size(),
            mask.size()
        )));
    }
    if let Some(detail) = image.geometry().invalid_spacing() {
        return Err(ValidationError::InvalidGeometry(detail));
    }
    if let Some(detail) = image
        .geometry()
        .mismatch(mask.geometry(), constraints.geometry_tolerance)
    {
        return Err(ValidationError::GeometryMismatch(detail));
    }

    let region = mask
        .select(constraints.label)
        .ok_or(ValidationError::EmptyRegion { label: constraints.label })?;

    let dimensions = region.bounding_box().non_degenerate_axes();
    if dimensions < constraints.minimum_dimensions {
        return Err(ValidationError::TooFewDimensions {
            found: dimensions,
            minimum: constraints.minimum_dimensions,
        });
    }

    if let Some(minimum) = constraints.minimum_size {
        if region.voxel_count() < minimum {
            return Err(ValidationError::RegionTooSmall {
                voxels: region.voxel_count(),
                minimum,
            });
        }
    }

    debug!(
        label = constraints.label,
        voxels = region.voxel_count(),
        bbox = ?region.bounding_box(),
        "region validated"
    );
    Ok(region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Geometry;

    fn constraints() -> RegionConstraints {
        RegionConstraints::from(&Settings::default())
    }

    fn image() -> VolumetricImage {
        VolumetricImage::from_fn([4, 4, 1], Geometry::default(), |[x, y, _]| (x + y) as f64)
    }

    fn square_mask(side: usize) -> LabelMap {
        LabelMap::from_fn([4, 4, 1], Geometry::default(), |[x, y, _]| {
            (x < side && y < side) as i64
        })
    }

    #[test]
    fn test_valid_region() {
        let region = validate(&image(), &square_mask(2), &constraints()).unwrap();
        assert_eq!(region.voxel_count(), 4);
    }

    #[test]
    fn test_empty_label() {
        let mut c = constraints();
        c.label = 3;
        let err = validate(&image(), &square_mask(2), &c).unwrap_err();
        assert_eq!(err, ValidationError::EmptyRegion { label: 3 });
    }

    #[test]
    fn test_single_voxel_is_too_few_dimensions() {
        let err = validate(&image(), &square_mask(1), &constraints()).unwrap_err();
        assert_eq!(err, ValidationError::TooFewDimensions { found: 0, minimum: 2 });
    }

    #[test]
    fn test_minimum_size() {
        let mut c = constraints();
        c.minimum_size = Some(5);
        let err = validate(&image(), &square_mask(2), &c).unwrap_err();
        assert_eq!(err, ValidationError::RegionTooSmall { voxels: 4, minimum: 5 });
    }

    #[test]
    fn test_geometry_mismatch() {
        let mask = LabelMap::from_fn([4, 4, 1], Geometry::with_spacing([2.0, 1.0, 1.0]), |_| 1);
        let err = validate(&image(), &mask, &constraints()).unwrap_err();
        assert!(matches!(err, ValidationError::GeometryMismatch(_)));

        let small = LabelMap::from_fn([3, 4, 1], Geometry::default(), |_| 1);
        let err = validate(&image(), &small, &constraints()).unwrap_err();
        assert!(matches!(err, ValidationError::GeometryMismatch(_)));
    }

    #[test]
    fn test_zero_spacing_is_rejected() {
        let geometry = Geometry::with_spacing([0.0, 1.0, 1.0]);
        let image = VolumetricImage::from_fn([4, 4, 1], geometry.clone(), |[x, y, _]| (x + y) as f64);
        let mask = LabelMap::from_fn([4, 4, 1], geometry, |_| 1);
        let err = validate(&image, &mask, &constraints()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidGeometry(_)));
    }
}
