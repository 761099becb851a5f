//! Player statistics, their sharpened normal form, and the colour schemes the
//! policy produces.

use burn::prelude::Backend;
use burn::tensor::{Int, Tensor, TensorData};

use crate::error::{PpoError, Result};

pub const N_STATS: usize = 6;
pub const N_COLOURS: usize = 3;
pub const ACTION_DIM: usize = N_COLOURS * 3;

/// Raw player attributes: aggression, survivability, defense, skill usage,
/// minion usage and one more.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatVector([f32; N_STATS]);

impl StatVector {
    pub fn new(values: &[f32]) -> Result<Self> {
        let values: [f32; N_STATS] = values.try_into().map_err(|_| PpoError::InvalidShape {
            what: "stat vector",
            expected: N_STATS,
            actual: values.len(),
        })?;
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(PpoError::DegenerateInput(format!(
                "stat components must be finite and non-negative, got {bad}"
            )));
        }
        Ok(Self(values))
    }

    pub fn values(&self) -> &[f32; N_STATS] {
        &self.0
    }

    /// Raises every component to `exponent` and divides by the sum.
    pub fn normalize(&self, exponent: f64) -> Result<NormalizedState> {
        let powered = self.0.map(|v| (v as f64).powf(exponent));
        let sum: f64 = powered.iter().sum();
        if !sum.is_finite() || sum <= 0.0 {
            return Err(PpoError::DegenerateInput(format!(
                "normalization denominator is {sum} for {:?}",
                self.0
            )));
        }
        Ok(NormalizedState(powered.map(|v| (v / sum) as f32)))
    }
}

/// Validates `values` as a stat vector and sharpens it with `exponent`.
pub fn normalize(values: &[f32], exponent: f64) -> Result<NormalizedState> {
    StatVector::new(values)?.normalize(exponent)
}

/// A point on the probability simplex obtained from [`StatVector::normalize`].
///
/// This is the only state type the policy accepts, so callers cannot feed it
/// unsharpened statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedState([f32; N_STATS]);

impl NormalizedState {
    /// Accepts an already normalized vector, e.g. one restored from storage.
    pub fn from_normalized(values: &[f32]) -> Result<Self> {
        let values: [f32; N_STATS] = values.try_into().map_err(|_| PpoError::InvalidShape {
            what: "normalized state",
            expected: N_STATS,
            actual: values.len(),
        })?;
        let sum: f32 = values.iter().sum();
        if values.iter().any(|v| !(0.0..=1.0).contains(v)) || (sum - 1.0).abs() > 1e-3 {
            return Err(PpoError::DegenerateInput(format!(
                "{values:?} is not a point on the simplex"
            )));
        }
        Ok(Self(values))
    }

    pub fn values(&self) -> &[f32; N_STATS] {
        &self.0
    }

    pub fn discretize(&self, grid_size: usize) -> DiscretizedState {
        DiscretizedState::new(self, grid_size)
    }
}

/// Embedding-table indices: each component scaled by the grid size, rounded,
/// and clamped into `[0, grid_size - 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscretizedState([i64; N_STATS]);

impl DiscretizedState {
    pub fn new(state: &NormalizedState, grid_size: usize) -> Self {
        let max_index = grid_size.saturating_sub(1) as i64;
        Self(
            state
                .0
                .map(|v| ((v * grid_size as f32).round() as i64).clamp(0, max_index)),
        )
    }

    pub fn indices(&self) -> &[i64; N_STATS] {
        &self.0
    }
}

/// Stacks a batch of states into a `(batch, 6)` index tensor.
pub fn discretize_batch<B: Backend>(
    states: &[NormalizedState],
    grid_size: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let rows = states
        .iter()
        .flat_map(|s| s.discretize(grid_size).0)
        .collect::<Vec<i64>>();
    Tensor::<B, 2, Int>::from_data(TensorData::new(rows, [states.len(), N_STATS]), device)
}

pub type Colour = [f32; 3];

/// Three RGB colours with every channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColourScheme([Colour; N_COLOURS]);

impl ColourScheme {
    /// Builds a scheme from 9 row-major values, clamping each into `[0, 1]`.
    pub fn from_flat(values: &[f32]) -> Result<Self> {
        if values.len() != ACTION_DIM {
            return Err(PpoError::InvalidShape {
                what: "colour scheme",
                expected: ACTION_DIM,
                actual: values.len(),
            });
        }
        let mut colours = [[0.0; 3]; N_COLOURS];
        for (i, v) in values.iter().copied().enumerate() {
            colours[i / 3][i % 3] = v.clamp(0.0, 1.0);
        }
        Ok(Self(colours))
    }

    pub fn colours(&self) -> &[Colour; N_COLOURS] {
        &self.0
    }

    pub fn flatten(&self) -> [f32; ACTION_DIM] {
        let mut flat = [0.0; ACTION_DIM];
        for (i, v) in self.0.iter().flatten().enumerate() {
            flat[i] = *v;
        }
        flat
    }

    /// Scales every channel to an 8-bit RGB value.
    pub fn to_rgb8(&self) -> [[u8; 3]; N_COLOURS] {
        self.0.map(|colour| colour.map(|c| (c * 255.0).round() as u8))
    }
}
