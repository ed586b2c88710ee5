//! The `diagnostics_` block that opens every result record.

use std::collections::VecDeque;

use serde::{Serialize, Serializer, ser::SerializeMap};
use sha2::{Digest, Sha256};

use crate::{
    error::Result,
    result::ResultRecord,
    settings::{FilterParams, Settings},
    types::{LabelMap, Region, VolumetricImage, coordinates, linear_index},
};

pub const PREFIX: &str = "diagnostics_";

/// SHA-256 (hex) of the grid size followed by the voxel data.
pub fn image_hash(image: &VolumetricImage) -> String {
    let mut hasher = Sha256::new();
    for s in image.size() {
        hasher.update((s as u64).to_le_bytes());
    }
    for v in image.data() {
        hasher.update(v.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub fn mask_hash(mask: &LabelMap) -> String {
    let mut hasher = Sha256::new();
    for s in mask.size() {
        hasher.update((s as u64).to_le_bytes());
    }
    for l in mask.labels() {
        hasher.update(l.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityStats {
    pub mean: f64,
    pub minimum: f64,
    pub maximum: f64,
}

impl IntensityStats {
    pub fn of(image: &VolumetricImage) -> Self {
        let data = image.data();
        let (minimum, maximum) = data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Self {
            mean: data.iter().sum::<f64>() / data.len() as f64,
            minimum,
            maximum,
        }
    }
}

/// Number of face-connected (6-neighbourhood) components in `region`.
pub fn connected_components(region: &Region) -> usize {
    let size = region.size();
    let members = region.members();
    let mut seen = vec![false; members.len()];
    let mut queue = VecDeque::new();
    let mut components = 0;

    for &start in region.indices() {
        if seen[start] {
            continue;
        }
        components += 1;
        seen[start] = true;
        queue.push_back(start);
        while let Some(index) = queue.pop_front() {
            let [x, y, z] = coordinates(size, index);
            let neighbours = [
                (x > 0).then(|| [x - 1, y, z]),
                (x + 1 < size[0]).then(|| [x + 1, y, z]),
                (y > 0).then(|| [x, y - 1, z]),
                (y + 1 < size[1]).then(|| [x, y + 1, z]),
                (z > 0).then(|| [x, y, z - 1]),
                (z + 1 < size[2]).then(|| [x, y, z + 1]),
            ];
            for [nx, ny, nz] in neighbours.into_iter().flatten() {
                let n = linear_index(size, nx, ny, nz);
                if members[n] && !seen[n] {
                    seen[n] = true;
                    queue.push_back(n);
                }
            }
        }
    }
    components
}

/// Mean voxel index of the region.
pub fn center_of_mass_index(region: &Region) -> [f64; 3] {
    let mut sum = [0.0; 3];
    for &i in region.indices() {
        let c = coordinates(region.size(), i);
        for axis in 0..3 {
            sum[axis] += c[axis] as f64;
        }
    }
    let n = region.voxel_count() as f64;
    sum.map(|s| s / n)
}

/// `[min_x, min_y, min_z, extent_x, extent_y, extent_z]`
fn bounding_box_tuple(region: &Region) -> Vec<usize> {
    let bbox = region.bounding_box();
    bbox.min.iter().chain(bbox.extent().iter()).copied().collect()
}

/// Enabled filters as a JSON object in declaration order.
struct EnabledImageTypes<'a>(&'a [(String, FilterParams)]);

impl Serialize for EnabledImageTypes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, params) in self.0 {
            map.serialize_entry(name, params)?;
        }
        map.end()
    }
}

/// Version and configuration entries.
pub fn configuration(settings: &Settings, filters: &[(String, FilterParams)]) -> Result<ResultRecord> {
    let mut record = ResultRecord::new();
    record.push(format!("{PREFIX}Versions_Radiomics"), env!("CARGO_PKG_VERSION"));
    record.push(
        format!("{PREFIX}Configuration_Settings"),
        serde_json::to_string(settings)?,
    );
    record.push(
        format!("{PREFIX}Configuration_EnabledImageTypes"),
        serde_json::to_string(&EnabledImageTypes(filters))?,
    );
    Ok(record)
}

/// Entries describing the input image and mask before any preprocessing.
pub fn original(image: &VolumetricImage, mask: &LabelMap, region: &Region) -> ResultRecord {
    let mut record = ResultRecord::new();
    let image_key = |name: &str| format!("{PREFIX}Image-original_{name}");
    let mask_key = |name: &str| format!("{PREFIX}Mask-original_{name}");
    let stats = IntensityStats::of(image);

    record.push(image_key("Hash"), image_hash(image));
    record.push(image_key("Dimensionality"), format!("{}D", image.dimensionality()));
    record.push(image_key("Spacing"), image.geometry().spacing);
    record.push(image_key("Size"), image.size());
    record.push(image_key("Mean"), stats.mean);
    record.push(image_key("Minimum"), stats.minimum);
    record.push(image_key("Maximum"), stats.maximum);

    let com_index = center_of_mass_index(region);
    record.push(mask_key("Hash"), mask_hash(mask));
    record.push(mask_key("Spacing"), mask.geometry().spacing);
    record.push(mask_key("Size"), mask.size());
    record.push(mask_key("BoundingBox"), crate::result::FeatureValue::IntTuple(bounding_box_tuple(region)));
    record.push(mask_key("VoxelNum"), region.voxel_count());
    record.push(mask_key("VolumeNum"), connected_components(region));
    record.push(mask_key("CenterOfMassIndex"), com_index);
    record.push(mask_key("CenterOfMass"), mask.geometry().index_to_physical(com_index));
    record
}

/// Entries describing the image and region after normalization/resampling.
pub fn interpolated(image: &VolumetricImage, region: &Region) -> ResultRecord {
    let mut record = ResultRecord::new();
    let image_key = |name: &str| format!("{PREFIX}Image-interpolated_{name}");
    let mask_key = |name: &str| format!("{PREFIX}Mask-interpolated_{name}");
    let stats = IntensityStats::of(image);

    record.push(image_key("Spacing"), image.geometry().spacing);
    record.push(image_key("Size"), image.size());
    record.push(image_key("Mean"), stats.mean);
    record.push(image_key("Minimum"), stats.minimum);
    record.push(image_key("Maximum"), stats.maximum);

    record.push(mask_key("Spacing"), image.geometry().spacing);
    record.push(mask_key("Size"), region.size());
    record.push(mask_key("BoundingBox"), crate::result::FeatureValue::IntTuple(bounding_box_tuple(region)));
    record.push(mask_key("VoxelNum"), region.voxel_count());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{result::FeatureValue, types::Geometry};

    fn two_blobs() -> (VolumetricImage, LabelMap, Region) {
        // columns 0-1 and 3 of a 5x2x1 grid
        let image = VolumetricImage::from_fn([5, 2, 1], Geometry::default(), |[x, _, _]| x as f64);
        let mask = LabelMap::from_fn([5, 2, 1], Geometry::with_spacing([2.0, 1.0, 1.0]), |[x, _, _]| {
            (x != 2 && x != 4) as i64
        });
        let region = mask.select(1).unwrap();
        (image, mask, region)
    }

    #[test]
    fn test_components_use_face_connectivity() {
        let (_, _, region) = two_blobs();
        assert_eq!(connected_components(&region), 2);

        let diagonal = LabelMap::from_fn([2, 2, 1], Geometry::default(), |[x, y, _]| (x == y) as i64)
            .select(1)
            .unwrap();
        assert_eq!(connected_components(&diagonal), 2);
    }

    #[test]
    fn test_hash_depends_on_data_and_shape() {
        let a = VolumetricImage::from_fn([2, 2, 1], Geometry::default(), |_| 1.0);
        let b = VolumetricImage::from_fn([4, 1, 1], Geometry::default(), |_| 1.0);
        assert_eq!(image_hash(&a), image_hash(&a.clone()));
        assert_ne!(image_hash(&a), image_hash(&b));
        assert_eq!(image_hash(&a).len(), 64);
    }

    #[test]
    fn test_original_block_order_and_values() {
        let (image, mask, region) = two_blobs();
        let record = original(&image, &mask, &region);
        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys.first(), Some(&"diagnostics_Image-original_Hash"));
        assert_eq!(keys.last(), Some(&"diagnostics_Mask-original_CenterOfMass"));
        assert_eq!(keys.len(), 15);

        assert_eq!(record.get("diagnostics_Image-original_Dimensionality"), Some(&FeatureValue::from("2D")));
        assert_eq!(record.get("diagnostics_Mask-original_VoxelNum"), Some(&FeatureValue::Int(6)));
        assert_eq!(
            record.get("diagnostics_Mask-original_BoundingBox"),
            Some(&FeatureValue::IntTuple(vec![0, 0, 0, 4, 2, 1]))
        );
        // mean x index (0 + 1 + 3) / 3, physical x doubled by spacing
        assert_eq!(
            record.get("diagnostics_Mask-original_CenterOfMass"),
            Some(&FeatureValue::Tuple(vec![8.0 / 3.0, 0.5, 0.0]))
        );
    }

    #[test]
    fn test_configuration_keeps_filter_order() {
        let filters = vec![
            ("Wavelet".to_string(), FilterParams::new()),
            ("Original".to_string(), FilterParams::new()),
        ];
        let record = configuration(&Settings::default(), &filters).unwrap();
        assert_eq!(
            record.get("diagnostics_Configuration_EnabledImageTypes"),
            Some(&FeatureValue::from(r#"{"Wavelet":{},"Original":{}}"#))
        );
        assert!(matches!(
            record.get("diagnostics_Configuration_Settings"),
            Some(FeatureValue::Text(json)) if json.contains("\"binWidth\":25.0")
        ));
    }
}
