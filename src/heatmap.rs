use serde::{Deserialize, Serialize};

use crate::config::{HeatmapConfig, PitchConfig};
use crate::model::Point;

/// Smoothed 2-D histogram; `values[row][col]` with rows along the pitch width and
/// columns along its length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityGrid {
    pub bins_x: usize,
    pub bins_y: usize,
    pub sigma: f64,
    pub cell_length: f64,
    pub cell_width: f64,
    pub event_count: usize,
    pub values: Vec<Vec<f64>>,
}

impl DensityGrid {
    pub fn total_mass(&self) -> f64 {
        self.values.iter().flatten().sum()
    }

    pub fn max_value(&self) -> f64 {
        self.values.iter().flatten().copied().fold(0.0, f64::max)
    }
}

pub fn density_grid<I>(points: I, pitch: &PitchConfig, cfg: &HeatmapConfig) -> DensityGrid
where
    I: IntoIterator<Item = Point>,
{
    let bins_x = cfg.bins_x.max(1);
    let bins_y = cfg.bins_y.max(1);
    let (counts, event_count) = bin_counts(points, pitch, bins_x, bins_y);
    DensityGrid {
        bins_x,
        bins_y,
        sigma: cfg.sigma,
        cell_length: pitch.length / bins_x as f64,
        cell_width: pitch.width / bins_y as f64,
        event_count,
        values: smooth(&counts, cfg.sigma, cfg.truncate),
    }
}

pub fn bin_counts<I>(points: I, pitch: &PitchConfig, bins_x: usize, bins_y: usize) -> (Vec<Vec<f64>>, usize)
where
    I: IntoIterator<Item = Point>,
{
    let mut grid = vec![vec![0.0; bins_x]; bins_y];
    let mut n = 0usize;
    for p in points {
        if !p.x.is_finite() || !p.y.is_finite() {
            continue;
        }
        // Points on the far touchline or goal line belong to the last bin.
        let col = ((p.x / pitch.length) * bins_x as f64).floor().max(0.0) as usize;
        let row = ((p.y / pitch.width) * bins_y as f64).floor().max(0.0) as usize;
        grid[row.min(bins_y - 1)][col.min(bins_x - 1)] += 1.0;
        n += 1;
    }
    (grid, n)
}

/// Normalized 1-D kernel of `2 * radius + 1` taps. The radius never exceeds
/// `max_radius`; past one mirror period the extra taps only fold back onto the grid.
pub fn gaussian_kernel(sigma: f64, truncate: f64, max_radius: usize) -> Vec<f64> {
    if !(sigma > 0.0) || !sigma.is_finite() {
        return vec![1.0];
    }
    let truncate = if truncate.is_finite() { truncate.max(0.0) } else { 0.0 };
    let radius = (truncate * sigma + 0.5).min(max_radius as f64) as usize;
    let sigma2 = sigma * sigma;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / (2.0 * sigma2)).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// Separable Gaussian smoothing with mirrored edges. Each cell scatters its mass
/// through the kernel, so the grid total is unchanged.
pub fn smooth(grid: &[Vec<f64>], sigma: f64, truncate: f64) -> Vec<Vec<f64>> {
    let rows = grid.len();
    let cols = grid.first().map_or(0, Vec::len);
    let kernel = gaussian_kernel(sigma, truncate, 2 * rows.max(cols));
    if kernel.len() == 1 {
        return grid.to_vec();
    }
    let radius = (kernel.len() / 2) as isize;

    let mut horizontal = vec![vec![0.0; cols]; rows];
    for (r, row) in grid.iter().enumerate() {
        for (c, &mass) in row.iter().enumerate() {
            if mass == 0.0 {
                continue;
            }
            for (k, &w) in kernel.iter().enumerate() {
                let target = mirror(c as isize + k as isize - radius, cols);
                horizontal[r][target] += w * mass;
            }
        }
    }

    let mut out = vec![vec![0.0; cols]; rows];
    for (r, row) in horizontal.iter().enumerate() {
        for (c, &mass) in row.iter().enumerate() {
            if mass == 0.0 {
                continue;
            }
            for (k, &w) in kernel.iter().enumerate() {
                let target = mirror(r as isize + k as isize - radius, rows);
                out[target][c] += w * mass;
            }
        }
    }
    out
}

// d c b a | a b c d | d c b a
fn mirror(idx: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = idx.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}
