//! Voxel-wise intensity transforms. Each one rescales so that the output keeps
//! a magnitude comparable to the input.

use crate::{
    error::Result,
    settings::Settings,
    traits::{DerivedImage, ImageFilter},
    types::VolumetricImage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointwiseFilter {
    Square,
    SquareRoot,
    Logarithm,
    Exponential,
}

fn max_abs(data: &[f64]) -> f64 {
    data.iter().fold(0.0, |m, v| m.max(v.abs()))
}

fn max_value(data: &[f64]) -> f64 {
    data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

impl PointwiseFilter {
    fn derived_name(&self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::SquareRoot => "squareroot",
            Self::Logarithm => "logarithm",
            Self::Exponential => "exponential",
        }
    }

    fn transform(&self, image: &VolumetricImage) -> Result<VolumetricImage> {
        let data = image.data();
        let peak = max_abs(data);
        let out = match self {
            Self::Square => {
                let coeff = if peak > 0.0 { 1.0 / peak.sqrt() } else { 1.0 };
                image.map(|v| (coeff * v).powi(2))
            }
            Self::SquareRoot => image.map(|v| v.signum() * (v.abs() * peak).sqrt()),
            Self::Logarithm => {
                let top = max_value(data);
                let logged = image.map(|v| v.signum() * (v.abs() + 1.0).ln());
                let logged_top = max_value(logged.data());
                if logged_top > 0.0 && top > 0.0 {
                    let scale = top / logged_top;
                    logged.map(|v| v * scale)
                } else {
                    logged
                }
            }
            Self::Exponential => {
                let coeff = if peak > 0.0 { peak.ln() / peak } else { 0.0 };
                image.map(|v| (coeff * v).exp())
            }
        };
        Ok(out)
    }
}

impl ImageFilter for PointwiseFilter {
    fn name(&self) -> &'static str {
        match self {
            Self::Square => "Square",
            Self::SquareRoot => "SquareRoot",
            Self::Logarithm => "Logarithm",
            Self::Exponential => "Exponential",
        }
    }

    fn apply(&self, image: &VolumetricImage, _settings: &Settings) -> Result<Vec<DerivedImage>> {
        Ok(vec![DerivedImage::new(self.derived_name(), self.transform(image)?)])
    }
}
