//! Feature matrices and the classifier's fixed-shape input.
//!
//! All matrices are stored channel-major: `data[row * cols + frame]`, which is
//! the `[channels, length]` layout the conv kernels consume directly.

use crate::constants::{MODEL_CHANNELS, MODEL_FRAMES};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("matrix data length {len} does not match shape {rows}x{cols}")]
    DataLength { rows: usize, cols: usize, len: usize },
    #[error("model input needs {expected} coefficient rows, got {got}")]
    Channels { expected: usize, got: usize },
}

/// A dense `[rows, cols]` matrix of `f32` (rows = coefficients/bands, cols = frames).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, ShapeError> {
        if data.len() != rows * cols {
            return Err(ShapeError::DataLength {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    #[must_use]
    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.data[r * self.cols + c]
    }

    pub(crate) fn set(&mut self, r: usize, c: usize, v: f32) {
        self.data[r * self.cols + c] = v;
    }
}

/// Right-zero-pad or truncate `m` along the frame axis to exactly `target` frames.
///
/// Frames `[0, min(cols, target))` are copied unchanged; anything past the
/// source length is `0.0`.
#[must_use]
pub fn shape_frames(m: &FeatureMatrix, target: usize) -> FeatureMatrix {
    if m.cols == target {
        return m.clone();
    }
    let keep = m.cols.min(target);
    let mut out = FeatureMatrix::zeros(m.rows, target);
    for r in 0..m.rows {
        let src = &m.row(r)[..keep];
        out.data[r * target..r * target + keep].copy_from_slice(src);
    }
    out
}

/// The classifier's sole input: a `[MODEL_CHANNELS, MODEL_FRAMES]` tensor.
///
/// Only constructible with the exact shape, so the conv stack never sees a
/// mis-shaped buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    data: Vec<f32>,
}

impl ModelInput {
    /// Shape an MFCC matrix (any frame count) into model input.
    pub fn from_mfcc(mfcc: &FeatureMatrix) -> Result<Self, ShapeError> {
        if mfcc.rows() != MODEL_CHANNELS {
            return Err(ShapeError::Channels {
                expected: MODEL_CHANNELS,
                got: mfcc.rows(),
            });
        }
        let shaped = shape_frames(mfcc, MODEL_FRAMES);
        Ok(Self { data: shaped.data })
    }

    /// Wrap a flat channel-major buffer of exactly `MODEL_CHANNELS * MODEL_FRAMES` values.
    pub fn from_flat(data: Vec<f32>) -> Result<Self, ShapeError> {
        if data.len() != MODEL_CHANNELS * MODEL_FRAMES {
            return Err(ShapeError::DataLength {
                rows: MODEL_CHANNELS,
                cols: MODEL_FRAMES,
                len: data.len(),
            });
        }
        Ok(Self { data })
    }

    #[must_use]
    pub fn zeros() -> Self {
        Self {
            data: vec![0.0; MODEL_CHANNELS * MODEL_FRAMES],
        }
    }

    #[must_use]
    pub const fn shape() -> (usize, usize) {
        (MODEL_CHANNELS, MODEL_FRAMES)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, cols: usize) -> FeatureMatrix {
        let data = (0..rows * cols).map(|i| i as f32 + 1.0).collect();
        FeatureMatrix::new(rows, cols, data).expect("matrix")
    }

    #[test]
    fn pads_short_input_on_the_right() {
        let m = ramp(2, 3);
        let s = shape_frames(&m, 5);
        assert_eq!(s.shape(), (2, 5));
        assert_eq!(s.row(0), &[1.0, 2.0, 3.0, 0.0, 0.0]);
        assert_eq!(s.row(1), &[4.0, 5.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn truncates_long_input_keeping_first_frames() {
        let m = ramp(2, 6);
        let s = shape_frames(&m, 4);
        assert_eq!(s.row(0), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s.row(1), &[7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn model_input_rejects_wrong_coefficient_count() {
        let m = FeatureMatrix::zeros(13, 50);
        let err = ModelInput::from_mfcc(&m).expect_err("13 rows must be rejected");
        assert_eq!(
            err,
            ShapeError::Channels {
                expected: MODEL_CHANNELS,
                got: 13
            }
        );
    }

    #[test]
    fn model_input_from_44_frames() {
        let m = ramp(MODEL_CHANNELS, 44);
        let input = ModelInput::from_mfcc(&m).expect("input");
        assert_eq!(input.as_slice().len(), MODEL_CHANNELS * MODEL_FRAMES);
        assert_eq!(input.as_slice()[43], 44.0);
        assert_eq!(input.as_slice()[44], 0.0);
        assert_eq!(input.as_slice()[MODEL_FRAMES], 45.0);
    }

    #[test]
    fn matrix_rejects_bad_length() {
        assert!(FeatureMatrix::new(2, 2, vec![0.0; 3]).is_err());
        assert!(ModelInput::from_flat(vec![0.0; 10]).is_err());
    }
}
