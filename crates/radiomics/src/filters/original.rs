use crate::{
    error::Result,
    settings::Settings,
    traits::{DerivedImage, ImageFilter},
    types::VolumetricImage,
};

/// Identity filter: the input image, unchanged, under the name `original`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginalFilter;

impl ImageFilter for OriginalFilter {
    fn name(&self) -> &'static str {
        "Original"
    }

    fn apply(&self, image: &VolumetricImage, _settings: &Settings) -> Result<Vec<DerivedImage>> {
        Ok(vec![DerivedImage::new("original", image.clone())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Geometry;

    #[test]
    fn test_identity_is_bit_exact() {
        let image = VolumetricImage::from_fn([3, 2, 2], Geometry::default(), |[x, y, z]| {
            (x as f64).sin() + 0.1 * y as f64 - 1e-9 * z as f64
        });
        let out = OriginalFilter.apply(&image, &Settings::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "original");

        let bits: Vec<u64> = image.data().iter().map(|v| v.to_bits()).collect();
        let out_bits: Vec<u64> = out[0].image.data().iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, out_bits);
        assert_eq!(out[0].image.geometry(), image.geometry());
    }
}
