//! First-order statistics over ROI intensities.
//!
//! Moment features read raw intensities; `Entropy` and `Uniformity` read the
//! binned histogram. Energy-type features add `voxelArrayShift` first so that
//! negative intensities do not cancel out.

use super::{FeatureDef, FeatureTable};
use crate::{
    error::FeatureError,
    traits::{Discretization, Discretized, FeatureInput},
};

#[derive(Debug, Clone, PartialEq)]
pub struct FirstOrderStats {
    /// ROI intensities, ascending
    sorted: Vec<f64>,
    mean: f64,
    /// Population variance
    variance: f64,
    /// Bin probabilities of the intensity histogram
    probabilities: Vec<f64>,
    shift: f64,
    voxel_volume: f64,
}

impl FirstOrderStats {
    pub fn new(mut values: Vec<f64>, probabilities: Vec<f64>, shift: f64, voxel_volume: f64) -> Self {
        values.sort_by(f64::total_cmp);
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            sorted: values,
            mean,
            variance,
            probabilities,
            shift,
            voxel_volume,
        }
    }

    fn n(&self) -> f64 {
        self.sorted.len() as f64
    }

    /// Percentile with linear interpolation between order statistics.
    pub fn percentile(&self, q: f64) -> f64 {
        let last = self.sorted.len() - 1;
        let rank = q / 100.0 * last as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        self.sorted[lo] + (self.sorted[hi] - self.sorted[lo]) * (rank - lo as f64)
    }

    fn central_moment(&self, order: i32) -> f64 {
        self.sorted.iter().map(|v| (v - self.mean).powi(order)).sum::<f64>() / self.n()
    }
}

fn prepare(input: &FeatureInput<'_>) -> Result<Vec<FirstOrderStats>, FeatureError> {
    let Discretized::Histogram(histogram) = input.discretized else {
        return Err(FeatureError::Computation(
            "firstorder needs an intensity histogram".to_string(),
        ));
    };
    let values = input.region.values(input.image);
    Ok(vec![FirstOrderStats::new(
        values,
        histogram.probabilities(),
        input.settings.voxel_array_shift,
        input.image.geometry().voxel_volume(),
    )])
}

fn energy(s: &FirstOrderStats) -> f64 {
    s.sorted.iter().map(|v| (v + s.shift).powi(2)).sum()
}

fn total_energy(s: &FirstOrderStats) -> f64 {
    s.voxel_volume * energy(s)
}

fn entropy(s: &FirstOrderStats) -> f64 {
    -s.probabilities
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|p| p * p.log2())
        .sum::<f64>()
}

fn minimum(s: &FirstOrderStats) -> f64 {
    s.sorted[0]
}

fn maximum(s: &FirstOrderStats) -> f64 {
    s.sorted[s.sorted.len() - 1]
}

fn percentile_10(s: &FirstOrderStats) -> f64 {
    s.percentile(10.0)
}

fn percentile_90(s: &FirstOrderStats) -> f64 {
    s.percentile(90.0)
}

fn mean(s: &FirstOrderStats) -> f64 {
    s.mean
}

fn median(s: &FirstOrderStats) -> f64 {
    s.percentile(50.0)
}

fn interquartile_range(s: &FirstOrderStats) -> f64 {
    s.percentile(75.0) - s.percentile(25.0)
}

fn range(s: &FirstOrderStats) -> f64 {
    maximum(s) - minimum(s)
}

fn mean_absolute_deviation(s: &FirstOrderStats) -> f64 {
    s.sorted.iter().map(|v| (v - s.mean).abs()).sum::<f64>() / s.n()
}

fn robust_mean_absolute_deviation(s: &FirstOrderStats) -> f64 {
    let (lo, hi) = (s.percentile(10.0), s.percentile(90.0));
    let kept: Vec<f64> = s.sorted.iter().copied().filter(|v| (lo..=hi).contains(v)).collect();
    let kept_mean = kept.iter().sum::<f64>() / kept.len() as f64;
    kept.iter().map(|v| (v - kept_mean).abs()).sum::<f64>() / kept.len() as f64
}

fn root_mean_squared(s: &FirstOrderStats) -> f64 {
    (energy(s) / s.n()).sqrt()
}

fn standard_deviation(s: &FirstOrderStats) -> f64 {
    s.variance.sqrt()
}

fn skewness(s: &FirstOrderStats) -> f64 {
    if s.variance == 0.0 {
        return 0.0;
    }
    s.central_moment(3) / s.variance.powf(1.5)
}

fn kurtosis(s: &FirstOrderStats) -> f64 {
    if s.variance == 0.0 {
        return 0.0;
    }
    s.central_moment(4) / s.variance.powi(2)
}

fn variance(s: &FirstOrderStats) -> f64 {
    s.variance
}

fn uniformity(s: &FirstOrderStats) -> f64 {
    s.probabilities.iter().map(|p| p * p).sum()
}

static FEATURES: [FeatureDef<FirstOrderStats>; 19] = [
    FeatureDef::new("Energy", energy),
    FeatureDef::new("TotalEnergy", total_energy),
    FeatureDef::new("Entropy", entropy),
    FeatureDef::new("Minimum", minimum),
    FeatureDef::new("10Percentile", percentile_10),
    FeatureDef::new("90Percentile", percentile_90),
    FeatureDef::new("Maximum", maximum),
    FeatureDef::new("Mean", mean),
    FeatureDef::new("Median", median),
    FeatureDef::new("InterquartileRange", interquartile_range),
    FeatureDef::new("Range", range),
    FeatureDef::new("MeanAbsoluteDeviation", mean_absolute_deviation),
    FeatureDef::new("RobustMeanAbsoluteDeviation", robust_mean_absolute_deviation),
    FeatureDef::new("RootMeanSquared", root_mean_squared),
    FeatureDef::deprecated(
        "StandardDeviation",
        standard_deviation,
        "correlated with Variance; use Variance instead",
    ),
    FeatureDef::new("Skewness", skewness),
    FeatureDef::new("Kurtosis", kurtosis),
    FeatureDef::new("Variance", variance),
    FeatureDef::new("Uniformity", uniformity),
];

pub const FIRST_ORDER: FeatureTable<FirstOrderStats> =
    FeatureTable::new("firstorder", Discretization::Histogram, prepare, &FEATURES);
