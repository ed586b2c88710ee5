//! Loading images and masks from disk.
//!
//! Three layouts are understood:
//! - a JSON volume document (`{size, spacing, origin, direction, data}`),
//! - a single grayscale raster (PNG/TIFF), loaded as a 2-D volume with z = 1,
//! - a directory of raster slices of equal size, stacked along z in file-name
//!   order.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::DynamicImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{RadiomicsError, Result},
    types::{Geometry, LabelMap, VolumetricImage},
};

const RASTER_EXTENSIONS: [&str; 4] = ["png", "tif", "tiff", "bmp"];

/// Serialized voxel grid. Missing geometry fields default to unit spacing,
/// zero origin and identity direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VolumeDocument<T> {
    pub size: [usize; 3],
    #[serde(default)]
    pub spacing: Option<[f64; 3]>,
    #[serde(default)]
    pub origin: Option<[f64; 3]>,
    #[serde(default)]
    pub direction: Option<[f64; 9]>,
    /// Voxel values, x fastest
    pub data: Vec<T>,
}

impl<T> VolumeDocument<T> {
    fn geometry(&self) -> Geometry {
        let default = Geometry::default();
        Geometry {
            spacing: self.spacing.unwrap_or(default.spacing),
            origin: self.origin.unwrap_or(default.origin),
            direction: self.direction.unwrap_or(default.direction),
        }
    }

    fn with_geometry(size: [usize; 3], geometry: &Geometry, data: Vec<T>) -> Self {
        Self {
            size,
            spacing: Some(geometry.spacing),
            origin: Some(geometry.origin),
            direction: Some(geometry.direction),
            data,
        }
    }
}

impl From<&VolumetricImage> for VolumeDocument<f64> {
    fn from(image: &VolumetricImage) -> Self {
        Self::with_geometry(image.size(), image.geometry(), image.data().to_vec())
    }
}

impl From<&LabelMap> for VolumeDocument<i64> {
    fn from(mask: &LabelMap) -> Self {
        Self::with_geometry(mask.size(), mask.geometry(), mask.labels().to_vec())
    }
}

enum Layout {
    Document,
    Raster,
    Slices,
}

fn layout(path: &Path) -> Result<Layout> {
    if path.is_dir() {
        return Ok(Layout::Slices);
    }
    match extension(path).as_deref() {
        Some("json") => Ok(Layout::Document),
        Some(ext) if RASTER_EXTENSIONS.contains(&ext) => Ok(Layout::Raster),
        _ => Err(RadiomicsError::InvalidVolume(format!(
            "unsupported volume format: {}",
            path.display()
        ))),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Load an intensity volume.
pub fn load_image(path: impl AsRef<Path>) -> Result<VolumetricImage> {
    let path = path.as_ref();
    let image = match layout(path)? {
        Layout::Document => {
            let doc: VolumeDocument<f64> = serde_json::from_str(&fs::read_to_string(path)?)?;
            VolumetricImage::new(doc.size, doc.geometry(), doc.data)?
        }
        Layout::Raster => {
            let (size, data) = load_raster(path)?;
            VolumetricImage::new(size, Geometry::default(), data)?
        }
        Layout::Slices => {
            let (size, data) = load_slices(path)?;
            VolumetricImage::new(size, Geometry::default(), data)?
        }
    };
    debug!(path = %path.display(), size = ?image.size(), "loaded image");
    Ok(image)
}

/// Load a label volume. Raster values are taken as labels verbatim.
pub fn load_label_map(path: impl AsRef<Path>) -> Result<LabelMap> {
    let path = path.as_ref();
    let to_labels = |data: Vec<f64>| data.into_iter().map(|v| v as i64).collect::<Vec<_>>();
    let mask = match layout(path)? {
        Layout::Document => {
            let doc: VolumeDocument<i64> = serde_json::from_str(&fs::read_to_string(path)?)?;
            LabelMap::new(doc.size, doc.geometry(), doc.data)?
        }
        Layout::Raster => {
            let (size, data) = load_raster(path)?;
            LabelMap::new(size, Geometry::default(), to_labels(data))?
        }
        Layout::Slices => {
            let (size, data) = load_slices(path)?;
            LabelMap::new(size, Geometry::default(), to_labels(data))?
        }
    };
    debug!(path = %path.display(), size = ?mask.size(), "loaded mask");
    Ok(mask)
}

pub fn save_image(image: &VolumetricImage, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, serde_json::to_string(&VolumeDocument::from(image))?)?;
    Ok(())
}

pub fn save_label_map(mask: &LabelMap, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, serde_json::to_string(&VolumeDocument::from(mask))?)?;
    Ok(())
}

/// Gray values of a raster. Color rasters are converted to 16-bit luma.
fn raster_values(image: DynamicImage) -> ([usize; 3], Vec<f64>) {
    let size = [image.width() as usize, image.height() as usize, 1];
    let data = match image {
        DynamicImage::ImageLuma8(buffer) => buffer.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageLuma16(buffer) => buffer.into_raw().into_iter().map(f64::from).collect(),
        other => other.to_luma16().into_raw().into_iter().map(f64::from).collect(),
    };
    (size, data)
}

fn load_raster(path: &Path) -> Result<([usize; 3], Vec<f64>)> {
    Ok(raster_values(image::open(path)?))
}

fn load_slices(dir: &Path) -> Result<([usize; 3], Vec<f64>)> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| extension(p).is_some_and(|e| RASTER_EXTENSIONS.contains(&e.as_str())))
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(RadiomicsError::InvalidVolume(format!(
            "no raster slices in {}",
            dir.display()
        )));
    }

    let mut plane: Option<[usize; 3]> = None;
    let mut data = Vec::new();
    for file in &files {
        let (size, values) = load_raster(file)?;
        match plane {
            Some(expected) if expected != size => {
                return Err(RadiomicsError::InvalidVolume(format!(
                    "slice {} is {}x{}, expected {}x{}",
                    file.display(),
                    size[0],
                    size[1],
                    expected[0],
                    expected[1]
                )));
            }
            _ => plane = Some(size),
        }
        data.extend(values);
    }
    let [x, y, _] = plane.unwrap_or([0, 0, 1]);
    Ok(([x, y, files.len()], data))
}
