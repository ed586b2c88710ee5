//! 1-D convolution along one axis of an x-fastest volume.

use crate::types::linear_index;

/// How indices falling outside the volume are mapped back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Repeat the edge voxel
    Replicate,
    /// Wrap around
    Periodic,
}

impl Boundary {
    #[inline]
    fn resolve(self, index: isize, len: usize) -> usize {
        let len = len as isize;
        match self {
            Boundary::Replicate => index.clamp(0, len - 1) as usize,
            Boundary::Periodic => index.rem_euclid(len) as usize,
        }
    }
}

/// Sparse kernel: `(offset, weight)` pairs.
pub type Taps = [(isize, f64)];

/// Convolve `data` along `axis` (0 = x, 1 = y, 2 = z) with `taps`.
pub fn convolve_axis(
    data: &[f64],
    size: [usize; 3],
    axis: usize,
    taps: &Taps,
    boundary: Boundary,
) -> Vec<f64> {
    let mut out = vec![0.0; data.len()];
    let len = size[axis];
    for z in 0..size[2] {
        for y in 0..size[1] {
            for x in 0..size[0] {
                let pos = [x, y, z];
                let mut acc = 0.0;
                for &(offset, weight) in taps {
                    let mut p = pos;
                    p[axis] = boundary.resolve(pos[axis] as isize + offset, len);
                    acc += weight * data[linear_index(size, p[0], p[1], p[2])];
                }
                out[linear_index(size, x, y, z)] = acc;
            }
        }
    }
    out
}

/// Widest Gaussian support, in voxels on either side.
pub const MAX_GAUSSIAN_RADIUS: isize = 4096;

/// Sampled, normalized Gaussian with radius `ceil(4 * sigma)` voxels, at most
/// [`MAX_GAUSSIAN_RADIUS`].
pub fn gaussian_taps(sigma: f64) -> Vec<(isize, f64)> {
    let radius = ((4.0 * sigma).ceil().max(1.0) as isize).min(MAX_GAUSSIAN_RADIUS);
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut taps: Vec<(isize, f64)> = (-radius..=radius)
        .map(|i| (i, (-((i * i) as f64) / two_sigma_sq).exp()))
        .collect();
    let sum: f64 = taps.iter().map(|(_, w)| w).sum();
    for (_, w) in &mut taps {
        *w /= sum;
    }
    taps
}
