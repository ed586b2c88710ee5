//! Gray-level co-occurrence matrix features.
//!
//! For every configured distance and each of the 13 unique 3-D directions
//! (4 in-plane ones with `force2D`), voxel pairs with both ends inside the
//! ROI are counted by gray level. Directions without any pair are dropped.
//! Gray levels absent from the ROI are removed from the matrix; the `i`, `j`
//! in the formulas are the actual level values.

use super::{FeatureDef, FeatureTable};
use crate::{
    discretization::DiscretizedImage,
    error::FeatureError,
    settings::{GlcmAggregation, Settings, WeightingNorm},
    traits::{Discretization, Discretized, FeatureInput},
    types::Region,
};

/// Canonical half of the 26-neighbourhood, optionally restricted to the plane
/// orthogonal to `force_2d_dimension` (0 = z, 1 = y, 2 = x).
pub fn directions(force_2d: bool, force_2d_dimension: usize) -> Vec<[isize; 3]> {
    let fixed_axis = 2 - force_2d_dimension.min(2);
    let mut out = Vec::with_capacity(13);
    for dz in -1isize..=1 {
        for dy in -1isize..=1 {
            for dx in -1isize..=1 {
                let canonical = dz > 0 || (dz == 0 && (dy > 0 || (dy == 0 && dx > 0)));
                let offset = [dx, dy, dz];
                if canonical && !(force_2d && offset[fixed_axis] != 0) {
                    out.push(offset);
                }
            }
        }
    }
    out
}

/// Raw pair counts for one offset; `levels.len()²` entries, row = level of
/// the reference voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct CooccurrenceMatrix {
    pub offset: [isize; 3],
    pub counts: Vec<f64>,
}

impl CooccurrenceMatrix {
    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }
}

/// Count co-occurrences for every (distance, direction) pair. Returns the
/// gray levels present in the ROI (ascending) and one matrix per offset,
/// empty ones included.
pub fn cooccurrence(
    discretized: &DiscretizedImage,
    region: &Region,
    settings: &Settings,
) -> (Vec<usize>, Vec<CooccurrenceMatrix>) {
    let size = discretized.size();
    let all_levels = discretized.levels();

    let max_level = region.indices().iter().map(|&i| all_levels[i]).max().unwrap_or(0);
    let mut lookup = vec![usize::MAX; max_level + 1];
    for &i in region.indices() {
        lookup[all_levels[i]] = 0;
    }
    let levels: Vec<usize> = (1..=max_level).filter(|&l| lookup[l] == 0).collect();
    for (index, &level) in levels.iter().enumerate() {
        lookup[level] = index;
    }
    let ng = levels.len();

    let mut matrices = Vec::new();
    for &distance in &settings.distances {
        for direction in directions(settings.force_2d, settings.force_2d_dimension) {
            let offset = direction.map(|c| c * distance as isize);
            let mut counts = vec![0.0; ng * ng];
            for &index in region.indices() {
                let p = crate::types::coordinates(size, index);
                let q = [
                    p[0] as isize + offset[0],
                    p[1] as isize + offset[1],
                    p[2] as isize + offset[2],
                ];
                let inside = (0..3).all(|a| q[a] >= 0 && (q[a] as usize) < size[a]);
                if !inside {
                    continue;
                }
                let (qx, qy, qz) = (q[0] as usize, q[1] as usize, q[2] as usize);
                if !region.contains(qx, qy, qz) {
                    continue;
                }
                let i = lookup[all_levels[index]];
                let j = lookup[discretized.level(qx, qy, qz)];
                counts[i * ng + j] += 1.0;
            }
            if settings.symmetrical_glcm {
                let raw = counts.clone();
                for i in 0..ng {
                    for j in 0..ng {
                        counts[i * ng + j] += raw[j * ng + i];
                    }
                }
            }
            matrices.push(CooccurrenceMatrix { offset, counts });
        }
    }
    (levels, matrices)
}

fn direction_weight(offset: [isize; 3], spacing: [f64; 3], norm: WeightingNorm) -> f64 {
    let v = [
        offset[0].unsigned_abs() as f64 * spacing[0],
        offset[1].unsigned_abs() as f64 * spacing[1],
        offset[2].unsigned_abs() as f64 * spacing[2],
    ];
    match norm {
        WeightingNorm::Manhattan => (-(v.iter().sum::<f64>()).powi(2)).exp(),
        WeightingNorm::Euclidean => (-v.iter().map(|x| x * x).sum::<f64>()).exp(),
        WeightingNorm::Infinity => (-v.iter().copied().fold(0.0, f64::max).powi(2)).exp(),
        WeightingNorm::NoWeighting => 1.0,
    }
}

fn entropy(probabilities: &[f64]) -> f64 {
    -probabilities
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|p| p * p.log2())
        .sum::<f64>()
}

/// A normalized co-occurrence matrix and the marginals every feature reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Glcm {
    p: Vec<f64>,
    ng: usize,
    levels: Vec<f64>,
    /// Highest gray level present
    max_level: f64,
    px: Vec<f64>,
    py: Vec<f64>,
    ux: f64,
    uy: f64,
    sigx: f64,
    sigy: f64,
    /// Indexed by `i + j`
    p_sum: Vec<f64>,
    /// Indexed by `|i - j|`
    p_diff: Vec<f64>,
    hx: f64,
    hy: f64,
    hxy: f64,
    hxy1: f64,
    hxy2: f64,
}

impl Glcm {
    /// Normalize `counts` over `levels`. `None` when the matrix is empty.
    pub fn new(counts: &[f64], levels: &[usize]) -> Option<Self> {
        let total: f64 = counts.iter().sum();
        if total <= 0.0 {
            return None;
        }
        let ng = levels.len();
        let p: Vec<f64> = counts.iter().map(|c| c / total).collect();
        let max = *levels.last()?;
        let values: Vec<f64> = levels.iter().map(|&l| l as f64).collect();

        let mut px = vec![0.0; ng];
        let mut py = vec![0.0; ng];
        let mut p_sum = vec![0.0; 2 * max + 1];
        let mut p_diff = vec![0.0; max + 1];
        for i in 0..ng {
            for j in 0..ng {
                let v = p[i * ng + j];
                px[i] += v;
                py[j] += v;
                p_sum[levels[i] + levels[j]] += v;
                p_diff[levels[i].abs_diff(levels[j])] += v;
            }
        }
        let ux: f64 = values.iter().zip(&px).map(|(i, p)| i * p).sum();
        let uy: f64 = values.iter().zip(&py).map(|(j, p)| j * p).sum();
        let sigx = values.iter().zip(&px).map(|(i, p)| (i - ux).powi(2) * p).sum::<f64>().sqrt();
        let sigy = values.iter().zip(&py).map(|(j, p)| (j - uy).powi(2) * p).sum::<f64>().sqrt();

        let mut hxy1 = 0.0;
        let mut hxy2 = 0.0;
        for i in 0..ng {
            for j in 0..ng {
                let marginal = px[i] * py[j];
                if marginal > 0.0 {
                    hxy1 -= p[i * ng + j] * marginal.log2();
                    hxy2 -= marginal * marginal.log2();
                }
            }
        }

        Some(Self {
            hx: entropy(&px),
            hy: entropy(&py),
            hxy: entropy(&p),
            hxy1,
            hxy2,
            p,
            ng,
            levels: values,
            max_level: max as f64,
            px,
            py,
            ux,
            uy,
            sigx,
            sigy,
            p_sum,
            p_diff,
        })
    }

    /// Element-wise mean of several normalized matrices over the same levels.
    fn average(matrices: &[Glcm], levels: &[usize]) -> Option<Self> {
        let first = matrices.first()?;
        let mut sum = vec![0.0; first.p.len()];
        for m in matrices {
            for (s, v) in sum.iter_mut().zip(&m.p) {
                *s += v;
            }
        }
        Self::new(&sum, levels)
    }

    /// `f(i, j, p(i, j))` summed over the matrix.
    fn sum_cells<F>(&self, f: F) -> f64
    where
        F: Fn(f64, f64, f64) -> f64,
    {
        let mut acc = 0.0;
        for (a, &i) in self.levels.iter().enumerate() {
            for (b, &j) in self.levels.iter().enumerate() {
                let p = self.p[a * self.ng + b];
                if p > 0.0 {
                    acc += f(i, j, p);
                }
            }
        }
        acc
    }

    fn difference_average(&self) -> f64 {
        self.p_diff.iter().enumerate().map(|(k, p)| k as f64 * p).sum()
    }
}

fn prepare(input: &FeatureInput<'_>) -> Result<Vec<Glcm>, FeatureError> {
    let Discretized::Texture(discretized) = input.discretized else {
        return Err(FeatureError::Computation("glcm needs a discretized image".to_string()));
    };
    let settings = input.settings;
    let (levels, matrices) = cooccurrence(discretized, input.region, settings);
    let matrices: Vec<CooccurrenceMatrix> = matrices.into_iter().filter(|m| m.total() > 0.0).collect();
    if matrices.is_empty() {
        return Err(FeatureError::Computation(
            "no voxel pairs inside the region for any direction".to_string(),
        ));
    }

    let empty = || FeatureError::Computation("co-occurrence matrix is empty".to_string());
    if let Some(norm) = settings.weighting_norm {
        let spacing = input.image.geometry().spacing;
        let mut merged = vec![0.0; levels.len() * levels.len()];
        for m in &matrices {
            let w = direction_weight(m.offset, spacing, norm);
            for (acc, c) in merged.iter_mut().zip(&m.counts) {
                *acc += w * c;
            }
        }
        return Glcm::new(&merged, &levels).map(|g| vec![g]).ok_or_else(empty);
    }

    let per_direction: Vec<Glcm> = matrices
        .iter()
        .filter_map(|m| Glcm::new(&m.counts, &levels))
        .collect();
    match settings.glcm_aggregation {
        GlcmAggregation::AverageFeatures => Ok(per_direction),
        GlcmAggregation::AverageMatrices => Glcm::average(&per_direction, &levels)
            .map(|g| vec![g])
            .ok_or_else(empty),
    }
}

fn autocorrelation(g: &Glcm) -> f64 {
    g.sum_cells(|i, j, p| i * j * p)
}

fn joint_average(g: &Glcm) -> f64 {
    g.ux
}

fn cluster_moment(g: &Glcm, order: i32) -> f64 {
    g.sum_cells(|i, j, p| (i + j - g.ux - g.uy).powi(order) * p)
}

fn cluster_prominence(g: &Glcm) -> f64 {
    cluster_moment(g, 4)
}

fn cluster_shade(g: &Glcm) -> f64 {
    cluster_moment(g, 3)
}

fn cluster_tendency(g: &Glcm) -> f64 {
    cluster_moment(g, 2)
}

fn contrast(g: &Glcm) -> f64 {
    g.sum_cells(|i, j, p| (i - j).powi(2) * p)
}

fn correlation(g: &Glcm) -> f64 {
    let denominator = g.sigx * g.sigy;
    if denominator == 0.0 {
        // flat region: perfectly correlated by convention
        return 1.0;
    }
    (autocorrelation(g) - g.ux * g.uy) / denominator
}

fn difference_average(g: &Glcm) -> f64 {
    g.difference_average()
}

fn difference_entropy(g: &Glcm) -> f64 {
    entropy(&g.p_diff)
}

fn difference_variance(g: &Glcm) -> f64 {
    let da = g.difference_average();
    g.p_diff
        .iter()
        .enumerate()
        .map(|(k, p)| (k as f64 - da).powi(2) * p)
        .sum()
}

fn joint_energy(g: &Glcm) -> f64 {
    g.p.iter().map(|p| p * p).sum()
}

fn joint_entropy(g: &Glcm) -> f64 {
    g.hxy
}

fn imc1(g: &Glcm) -> f64 {
    let denominator = g.hx.max(g.hy);
    if denominator == 0.0 {
        return 0.0;
    }
    (g.hxy - g.hxy1) / denominator
}

fn imc2(g: &Glcm) -> f64 {
    if g.hxy > g.hxy2 {
        return 0.0;
    }
    (1.0 - (-2.0 * (g.hxy2 - g.hxy)).exp()).sqrt()
}

fn idm(g: &Glcm) -> f64 {
    g.sum_cells(|i, j, p| p / (1.0 + (i - j).powi(2)))
}

fn idmn(g: &Glcm) -> f64 {
    let ng2 = g.max_level * g.max_level;
    g.sum_cells(|i, j, p| p / (1.0 + (i - j).powi(2) / ng2))
}

fn id(g: &Glcm) -> f64 {
    g.sum_cells(|i, j, p| p / (1.0 + (i - j).abs()))
}

fn idn(g: &Glcm) -> f64 {
    g.sum_cells(|i, j, p| p / (1.0 + (i - j).abs() / g.max_level))
}

fn inverse_variance(g: &Glcm) -> f64 {
    g.p_diff
        .iter()
        .enumerate()
        .skip(1)
        .map(|(k, p)| p / (k * k) as f64)
        .sum()
}

fn maximum_probability(g: &Glcm) -> f64 {
    g.p.iter().copied().fold(0.0, f64::max)
}

fn sum_average(g: &Glcm) -> f64 {
    g.p_sum.iter().enumerate().map(|(k, p)| k as f64 * p).sum()
}

fn sum_entropy(g: &Glcm) -> f64 {
    entropy(&g.p_sum)
}

fn sum_squares(g: &Glcm) -> f64 {
    g.sum_cells(|i, _, p| (i - g.ux).powi(2) * p)
}

static FEATURES: [FeatureDef<Glcm>; 26] = [
    FeatureDef::new("Autocorrelation", autocorrelation),
    FeatureDef::new("JointAverage", joint_average),
    FeatureDef::new("ClusterProminence", cluster_prominence),
    FeatureDef::new("ClusterShade", cluster_shade),
    FeatureDef::new("ClusterTendency", cluster_tendency),
    FeatureDef::new("Contrast", contrast),
    FeatureDef::new("Correlation", correlation),
    FeatureDef::new("DifferenceAverage", difference_average),
    FeatureDef::new("DifferenceEntropy", difference_entropy),
    FeatureDef::new("DifferenceVariance", difference_variance),
    FeatureDef::new("JointEnergy", joint_energy),
    FeatureDef::new("JointEntropy", joint_entropy),
    FeatureDef::new("Imc1", imc1),
    FeatureDef::new("Imc2", imc2),
    FeatureDef::new("Idm", idm),
    FeatureDef::new("Idmn", idmn),
    FeatureDef::new("Id", id),
    FeatureDef::new("Idn", idn),
    FeatureDef::new("InverseVariance", inverse_variance),
    FeatureDef::new("MaximumProbability", maximum_probability),
    FeatureDef::new("SumAverage", sum_average),
    FeatureDef::new("SumEntropy", sum_entropy),
    FeatureDef::new("SumSquares", sum_squares),
    FeatureDef::deprecated("Homogeneity1", id, "identical to Id"),
    FeatureDef::deprecated("Homogeneity2", idm, "identical to Idm"),
    FeatureDef::deprecated("SumVariance", cluster_tendency, "identical to ClusterTendency"),
];

pub const GLCM: FeatureTable<Glcm> = FeatureTable::new("glcm", Discretization::Texture, prepare, &FEATURES);
