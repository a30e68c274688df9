//! Value normalization and colorbar levels.
//!
//! A [`Norm`] maps data values onto colormap positions. Continuous norms scale
//! linearly between `vmin` and `vmax`; discrete norms assign each value to a bin
//! between level boundaries. Both extend at the ends: values outside the range
//! take the first or last color instead of being dropped.

use crate::colormap::{Colormap, Rgba};

/// `count` equally spaced boundaries starting at `vmin` with step `(vmax - vmin) / count`.
///
/// This is the half-open `arange(vmin, vmax, step)`: `vmax` itself is not a
/// boundary, and the last one is `vmin + (count - 1) * step`.
pub fn step_levels(vmin: f64, vmax: f64, count: usize) -> Vec<f64> {
    let step = (vmax - vmin) / count as f64;
    (0..count).map(|i| vmin + i as f64 * step).collect()
}

/// Maps values to colors
#[derive(Debug, Clone, PartialEq)]
pub enum Norm {
    Continuous { vmin: f64, vmax: f64 },
    Discrete { boundaries: Vec<f64> },
}

impl Norm {
    /// Colormap position of `value` in `[0, 1]`, or `None` for NaN.
    pub fn position(&self, value: f64) -> Option<f64> {
        if value.is_nan() {
            return None;
        }
        match self {
            Norm::Continuous { vmin, vmax } => Some(((value - vmin) / (vmax - vmin)).clamp(0.0, 1.0)),
            Norm::Discrete { boundaries } => {
                let n = boundaries.len();
                if n < 2 {
                    return Some(if n == 1 && value >= boundaries[0] { 1.0 } else { 0.0 });
                }
                Some(self.bin(value) as f64 / n as f64)
            }
        }
    }

    /// Bin index for discrete norms: 0 below the first boundary, `n` at or above
    /// the last, and `k` inside `[b[k-1], b[k])`.
    pub fn bin(&self, value: f64) -> usize {
        match self {
            Norm::Continuous { .. } => 0,
            Norm::Discrete { boundaries } => boundaries.partition_point(|&b| b <= value),
        }
    }

    pub fn color(&self, cmap: &Colormap, value: f64) -> Option<Rgba> {
        self.position(value).map(|t| cmap.sample(t))
    }

    pub fn range(&self) -> (f64, f64) {
        match self {
            Norm::Continuous { vmin, vmax } => (*vmin, *vmax),
            Norm::Discrete { boundaries } => (
                boundaries.first().copied().unwrap_or(0.0),
                boundaries.last().copied().unwrap_or(0.0),
            ),
        }
    }

    /// Values at which the colorbar carries tick labels
    pub fn ticks(&self) -> Vec<f64> {
        match self {
            Norm::Continuous { vmin, vmax } => (0..5).map(|i| vmin + (vmax - vmin) * i as f64 / 4.0).collect(),
            Norm::Discrete { boundaries } => boundaries.clone(),
        }
    }
}

/// Formats a tick value compactly.
pub fn format_tick(value: f64) -> String {
    let abs = value.abs();
    if abs != 0.0 && !(1e-3..1e5).contains(&abs) {
        return format!("{:.2e}", value);
    }
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}
