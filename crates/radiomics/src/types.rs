use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{RadiomicsError, Result};

/// Physical placement of a voxel grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Geometry {
    /// Physical distance between voxel centres along x, y, z
    pub spacing: [f64; 3],
    /// Physical coordinate of voxel (0, 0, 0)
    pub origin: [f64; 3],
    /// Direction cosines, 3x3 row-major
    pub direction: [f64; 9],
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            spacing: [1.0; 3],
            origin: [0.0; 3],
            direction: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl Geometry {
    pub fn with_spacing(spacing: [f64; 3]) -> Self {
        Self {
            spacing,
            ..Self::default()
        }
    }

    /// Map a (continuous) voxel index to physical space.
    pub fn index_to_physical(&self, index: [f64; 3]) -> [f64; 3] {
        let scaled = [
            index[0] * self.spacing[0],
            index[1] * self.spacing[1],
            index[2] * self.spacing[2],
        ];
        let d = &self.direction;
        [
            self.origin[0] + d[0] * scaled[0] + d[1] * scaled[1] + d[2] * scaled[2],
            self.origin[1] + d[3] * scaled[0] + d[4] * scaled[1] + d[5] * scaled[2],
            self.origin[2] + d[6] * scaled[0] + d[7] * scaled[1] + d[8] * scaled[2],
        ]
    }

    /// Describe the first spacing entry that is not a finite positive
    /// number, if any.
    pub fn invalid_spacing(&self) -> Option<String> {
        self.spacing
            .iter()
            .position(|s| !(s.is_finite() && *s > 0.0))
            .map(|axis| format!("spacing {:?} has a non-positive entry on axis {axis}", self.spacing))
    }

    pub fn voxel_volume(&self) -> f64 {
        self.spacing.iter().product()
    }

    /// Compare two geometries component-wise. Returns a description of the
    /// first component that differs by more than `tolerance`.
    pub fn mismatch(&self, other: &Geometry, tolerance: f64) -> Option<String> {
        let close = |a: &[f64], b: &[f64]| a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tolerance);
        if !close(&self.spacing, &other.spacing) {
            return Some(format!("spacing {:?} != {:?}", self.spacing, other.spacing));
        }
        if !close(&self.origin, &other.origin) {
            return Some(format!("origin {:?} != {:?}", self.origin, other.origin));
        }
        if !close(&self.direction, &other.direction) {
            return Some(format!("direction {:?} != {:?}", self.direction, other.direction));
        }
        None
    }
}

/// Inclusive index bounds of a region, per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [usize; 3],
    pub max: [usize; 3],
}

impl BoundingBox {
    pub fn extent(&self) -> [usize; 3] {
        [
            self.max[0] - self.min[0] + 1,
            self.max[1] - self.min[1] + 1,
            self.max[2] - self.min[2] + 1,
        ]
    }

    /// Number of axes along which the box covers more than one voxel.
    pub fn non_degenerate_axes(&self) -> usize {
        self.extent().iter().filter(|&&e| e > 1).count()
    }

    /// Grow the box by `pad` voxels on every side, clamped to `size`.
    pub fn padded(&self, pad: usize, size: [usize; 3]) -> BoundingBox {
        let mut out = *self;
        for axis in 0..3 {
            out.min[axis] = self.min[axis].saturating_sub(pad);
            out.max[axis] = (self.max[axis] + pad).min(size[axis] - 1);
        }
        out
    }
}

/// Linear index of (x, y, z) in an x-fastest grid.
#[inline]
pub(crate) fn linear_index(size: [usize; 3], x: usize, y: usize, z: usize) -> usize {
    (z * size[1] + y) * size[0] + x
}

#[inline]
pub(crate) fn coordinates(size: [usize; 3], index: usize) -> [usize; 3] {
    let plane = size[0] * size[1];
    [index % size[0], (index % plane) / size[0], index / plane]
}

fn check_grid(size: [usize; 3], geometry: &Geometry, len: usize) -> Result<()> {
    if let Some(detail) = geometry.invalid_spacing() {
        return Err(RadiomicsError::InvalidVolume(detail));
    }
    if size.iter().any(|&s| s == 0) {
        return Err(RadiomicsError::InvalidVolume(format!("zero-sized axis in {size:?}")));
    }
    let expected: usize = size.iter().product();
    if expected != len {
        return Err(RadiomicsError::InvalidVolume(format!(
            "size {size:?} needs {expected} voxels, got {len}"
        )));
    }
    Ok(())
}

/// Immutable 3-D intensity volume. 2-D images are stored with `z = 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumetricImage {
    size: [usize; 3],
    geometry: Geometry,
    data: Vec<f64>,
}

impl VolumetricImage {
    pub fn new(size: [usize; 3], geometry: Geometry, data: Vec<f64>) -> Result<Self> {
        check_grid(size, &geometry, data.len())?;
        Ok(Self { size, geometry, data })
    }

    pub fn from_fn<F>(size: [usize; 3], geometry: Geometry, f: F) -> Self
    where
        F: Fn([usize; 3]) -> f64,
    {
        let len = size.iter().product();
        let data = (0..len).map(|i| f(coordinates(size, i))).collect();
        Self { size, geometry, data }
    }

    pub fn size(&self) -> [usize; 3] {
        self.size
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of axes with more than one voxel.
    pub fn dimensionality(&self) -> usize {
        self.size.iter().filter(|&&s| s > 1).count()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f64 {
        self.data[linear_index(self.size, x, y, z)]
    }

    /// New image on the same grid with every voxel mapped through `f`.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            size: self.size,
            geometry: self.geometry.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// New image on the same grid with replacement voxel data.
    pub fn with_data(&self, data: Vec<f64>) -> Result<Self> {
        Self::new(self.size, self.geometry.clone(), data)
    }

    /// Sub-volume covered by `bbox`; the origin moves to the box corner.
    pub fn crop(&self, bbox: &BoundingBox) -> Self {
        let (size, geometry) = cropped_grid(&self.geometry, bbox);
        let data = crop_data(&self.data, self.size, bbox);
        Self { size, geometry, data }
    }
}

/// Integer label volume the ROI is selected from.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    size: [usize; 3],
    geometry: Geometry,
    labels: Vec<i64>,
}

impl LabelMap {
    pub fn new(size: [usize; 3], geometry: Geometry, labels: Vec<i64>) -> Result<Self> {
        check_grid(size, &geometry, labels.len())?;
        Ok(Self { size, geometry, labels })
    }

    pub fn from_fn<F>(size: [usize; 3], geometry: Geometry, f: F) -> Self
    where
        F: Fn([usize; 3]) -> i64,
    {
        let len = size.iter().product();
        let labels = (0..len).map(|i| f(coordinates(size, i))).collect();
        Self { size, geometry, labels }
    }

    pub fn size(&self) -> [usize; 3] {
        self.size
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Membership of `label`, or `None` when the label does not occur.
    pub fn select(&self, label: i64) -> Option<Region> {
        let members = self.labels.iter().map(|&l| l == label).collect();
        Region::from_members(self.size, members, label)
    }

    pub fn crop(&self, bbox: &BoundingBox) -> Self {
        let (size, geometry) = cropped_grid(&self.geometry, bbox);
        let labels = crop_data(&self.labels, self.size, bbox);
        Self { size, geometry, labels }
    }

    pub(crate) fn with_labels(size: [usize; 3], geometry: Geometry, labels: Vec<i64>) -> Self {
        Self { size, geometry, labels }
    }
}

/// Voxels selected by one label, with bounding box and voxel count computed
/// once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    label: i64,
    size: [usize; 3],
    members: Vec<bool>,
    indices: Vec<usize>,
    bounding_box: BoundingBox,
}

impl Region {
    pub fn from_members(size: [usize; 3], members: Vec<bool>, label: i64) -> Option<Self> {
        let indices: Vec<usize> = members
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
            .collect();
        let first = *indices.first()?;
        let start = coordinates(size, first);
        let mut bbox = BoundingBox { min: start, max: start };
        for &i in &indices[1..] {
            let c = coordinates(size, i);
            for axis in 0..3 {
                bbox.min[axis] = bbox.min[axis].min(c[axis]);
                bbox.max[axis] = bbox.max[axis].max(c[axis]);
            }
        }
        Some(Self {
            label,
            size,
            members,
            indices,
            bounding_box: bbox,
        })
    }

    pub fn label(&self) -> i64 {
        self.label
    }

    pub fn size(&self) -> [usize; 3] {
        self.size
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub fn voxel_count(&self) -> usize {
        self.indices.len()
    }

    /// Linear indices of member voxels in ascending order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        self.members[linear_index(self.size, x, y, z)]
    }

    /// Intensities of `image` at the member voxels, in index order.
    pub fn values(&self, image: &VolumetricImage) -> Vec<f64> {
        let data = image.data();
        self.indices.iter().map(|&i| data[i]).collect()
    }

    pub fn crop(&self, bbox: &BoundingBox) -> Option<Region> {
        let members = crop_data(&self.members, self.size, bbox);
        Region::from_members(bbox.extent(), members, self.label)
    }

    pub(crate) fn members(&self) -> &[bool] {
        &self.members
    }
}

fn cropped_grid(geometry: &Geometry, bbox: &BoundingBox) -> ([usize; 3], Geometry) {
    let origin = geometry.index_to_physical([
        bbox.min[0] as f64,
        bbox.min[1] as f64,
        bbox.min[2] as f64,
    ]);
    (
        bbox.extent(),
        Geometry {
            origin,
            ..geometry.clone()
        },
    )
}

fn crop_data<T: Copy>(data: &[T], size: [usize; 3], bbox: &BoundingBox) -> Vec<T> {
    let extent = bbox.extent();
    let mut out = Vec::with_capacity(extent.iter().product());
    for z in bbox.min[2]..=bbox.max[2] {
        for y in bbox.min[1]..=bbox.max[1] {
            let start = linear_index(size, bbox.min[0], y, z);
            out.extend_from_slice(&data[start..start + extent[0]]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centered_mask() -> LabelMap {
        LabelMap::from_fn([4, 4, 1], Geometry::default(), |[x, y, _]| {
            ((1..=2).contains(&x) && (1..=2).contains(&y)) as i64
        })
    }

    #[test]
    fn test_region_bounding_box_and_count() {
        let region = centered_mask().select(1).expect("label present");
        assert_eq!(region.voxel_count(), 4);
        assert_eq!(region.bounding_box().min, [1, 1, 0]);
        assert_eq!(region.bounding_box().max, [2, 2, 0]);
        assert_eq!(region.bounding_box().non_degenerate_axes(), 2);
    }

    #[test]
    fn test_missing_label_yields_none() {
        assert!(centered_mask().select(7).is_none());
    }

    #[test]
    fn test_crop_moves_origin() {
        let geometry = Geometry {
            spacing: [2.0, 3.0, 1.0],
            origin: [10.0, 20.0, 0.0],
            ..Geometry::default()
        };
        let image = VolumetricImage::from_fn([4, 4, 1], geometry, |[x, y, _]| (x + 4 * y) as f64);
        let bbox = BoundingBox { min: [1, 1, 0], max: [2, 2, 0] };
        let cropped = image.crop(&bbox);

        assert_eq!(cropped.size(), [2, 2, 1]);
        assert_eq!(cropped.data(), &[5.0, 6.0, 9.0, 10.0]);
        assert_eq!(cropped.geometry().origin, [12.0, 23.0, 0.0]);
    }

    #[test]
    fn test_padding_is_clamped() {
        let bbox = BoundingBox { min: [1, 1, 0], max: [2, 2, 0] };
        let padded = bbox.padded(5, [4, 4, 1]);
        assert_eq!(padded.min, [0, 0, 0]);
        assert_eq!(padded.max, [3, 3, 0]);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let err = VolumetricImage::new([2, 2, 1], Geometry::default(), vec![0.0; 3]);
        assert!(matches!(err, Err(RadiomicsError::InvalidVolume(_))));
    }

    #[test]
    fn test_degenerate_spacing_is_rejected() {
        for spacing in [[0.0, 1.0, 1.0], [1.0, -2.0, 1.0], [1.0, 1.0, f64::NAN], [f64::INFINITY, 1.0, 1.0]] {
            let geometry = Geometry::with_spacing(spacing);
            assert!(geometry.invalid_spacing().is_some());
            let image = VolumetricImage::new([2, 2, 1], geometry.clone(), vec![0.0; 4]);
            assert!(matches!(image, Err(RadiomicsError::InvalidVolume(_))));
            let mask = LabelMap::new([2, 2, 1], geometry, vec![1; 4]);
            assert!(matches!(mask, Err(RadiomicsError::InvalidVolume(_))));
        }
        assert!(Geometry::with_spacing([0.5, 0.5, 3.0]).invalid_spacing().is_none());
    }
}
