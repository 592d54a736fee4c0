//! CNN classifier parameters and the inference forward pass.
//!
//! Topology (inference mode):
//! - three conv blocks `40 -> 64 -> 128 -> 256`, each conv(k3,p1) + bn + relu + maxpool(2)
//! - global average pool over time
//! - `fc1(256 -> 128) -> relu -> fc2(128 -> 64) -> relu -> fc3(64 -> 2)`
//!
//! Dropout layers from training are identity here and carry no parameters.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::{MODEL_CHANNELS, MODEL_FRAMES, NUM_CLASSES};
use crate::conv::{
    BatchNormParams, batch_norm_inplace, conv1d_same_colmajor, global_avg_pool,
    max_pool1d_colmajor,
};
use crate::math::relu_inplace;
use crate::ops::linear;
use crate::tensor::ModelInput;
use crate::weights::{TensorF32, TrainingMetadata, WeightError, WeightStore, save_f32_tensors};

pub const CONV_KERNEL: usize = 3;
pub const CONV_CHANNELS: [usize; 4] = [MODEL_CHANNELS, 64, 128, 256];
pub const FC_DIMS: [usize; 4] = [256, 128, 64, NUM_CLASSES];

/// Seed for the default (untrained) parameter set.
pub const DEFAULT_INIT_SEED: u64 = 0x5eed_0f_a1;

#[derive(Debug, Clone)]
pub struct ConvBlock {
    pub weight: Vec<f32>, // [c_out, c_in, k]
    pub bias: Vec<f32>,   // [c_out]
    pub bn_gamma: Vec<f32>,
    pub bn_beta: Vec<f32>,
    pub bn_running_mean: Vec<f32>,
    pub bn_running_var: Vec<f32>,
    pub c_in: usize,
    pub c_out: usize,
}

#[derive(Debug, Clone)]
pub struct Dense {
    pub weight: Vec<f32>, // [out, in]
    pub bias: Vec<f32>,   // [out]
    pub in_dim: usize,
    pub out_dim: usize,
}

#[derive(Debug, Clone)]
pub struct CnnWeights {
    pub blocks: [ConvBlock; 3],
    pub fc: [Dense; 3],
}

fn uniform(rng: &mut StdRng, n: usize, bound: f32) -> Vec<f32> {
    (0..n).map(|_| rng.gen_range(-bound..bound)).collect()
}

impl ConvBlock {
    fn seeded(rng: &mut StdRng, c_in: usize, c_out: usize) -> Self {
        let bound = 1.0 / ((c_in * CONV_KERNEL) as f32).sqrt();
        Self {
            weight: uniform(rng, c_out * c_in * CONV_KERNEL, bound),
            bias: uniform(rng, c_out, bound),
            bn_gamma: vec![1.0; c_out],
            bn_beta: vec![0.0; c_out],
            bn_running_mean: vec![0.0; c_out],
            bn_running_var: vec![1.0; c_out],
            c_in,
            c_out,
        }
    }

    /// `[c_in, len] -> ([c_out, len / 2], len / 2)`
    fn forward(&self, x: &[f32], len: usize) -> (Vec<f32>, usize) {
        let mut y = conv1d_same_colmajor(
            x,
            &self.weight,
            Some(&self.bias),
            self.c_in,
            self.c_out,
            len,
            CONV_KERNEL,
        );
        batch_norm_inplace(
            &mut y,
            self.c_out,
            len,
            BatchNormParams {
                gamma: &self.bn_gamma,
                beta: &self.bn_beta,
                running_mean: &self.bn_running_mean,
                running_var: &self.bn_running_var,
            },
        );
        relu_inplace(&mut y);
        max_pool1d_colmajor(&y, self.c_out, len)
    }
}

impl Dense {
    fn seeded(rng: &mut StdRng, in_dim: usize, out_dim: usize) -> Self {
        let bound = 1.0 / (in_dim as f32).sqrt();
        Self {
            weight: uniform(rng, out_dim * in_dim, bound),
            bias: uniform(rng, out_dim, bound),
            in_dim,
            out_dim,
        }
    }

    fn forward(&self, x: &[f32]) -> Vec<f32> {
        linear(x, 1, self.in_dim, &self.weight, self.out_dim, Some(&self.bias))
    }
}

impl CnnWeights {
    /// Deterministic PyTorch-style default initialization.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let c = CONV_CHANNELS;
        let blocks = [
            ConvBlock::seeded(&mut rng, c[0], c[1]),
            ConvBlock::seeded(&mut rng, c[1], c[2]),
            ConvBlock::seeded(&mut rng, c[2], c[3]),
        ];
        let d = FC_DIMS;
        let fc = [
            Dense::seeded(&mut rng, d[0], d[1]),
            Dense::seeded(&mut rng, d[1], d[2]),
            Dense::seeded(&mut rng, d[2], d[3]),
        ];
        Self { blocks, fc }
    }

    /// Load every parameter tensor, requiring exact shapes.
    pub fn from_store(store: &WeightStore) -> Result<Self, WeightError> {
        let c = CONV_CHANNELS;
        let load_block = |i: usize| -> Result<ConvBlock, WeightError> {
            let (c_in, c_out) = (c[i], c[i + 1]);
            let n = i + 1;
            Ok(ConvBlock {
                weight: store
                    .tensor_f32_shaped(&format!("conv{n}.weight"), &[c_out, c_in, CONV_KERNEL])?,
                bias: store.tensor_f32_shaped(&format!("conv{n}.bias"), &[c_out])?,
                bn_gamma: store.tensor_f32_shaped(&format!("bn{n}.weight"), &[c_out])?,
                bn_beta: store.tensor_f32_shaped(&format!("bn{n}.bias"), &[c_out])?,
                bn_running_mean: store
                    .tensor_f32_shaped(&format!("bn{n}.running_mean"), &[c_out])?,
                bn_running_var: store.tensor_f32_shaped(&format!("bn{n}.running_var"), &[c_out])?,
                c_in,
                c_out,
            })
        };

        let d = FC_DIMS;
        let load_dense = |i: usize| -> Result<Dense, WeightError> {
            let (in_dim, out_dim) = (d[i], d[i + 1]);
            let n = i + 1;
            Ok(Dense {
                weight: store.tensor_f32_shaped(&format!("fc{n}.weight"), &[out_dim, in_dim])?,
                bias: store.tensor_f32_shaped(&format!("fc{n}.bias"), &[out_dim])?,
                in_dim,
                out_dim,
            })
        };

        Ok(Self {
            blocks: [load_block(0)?, load_block(1)?, load_block(2)?],
            fc: [load_dense(0)?, load_dense(1)?, load_dense(2)?],
        })
    }

    /// Named tensors in state-dict layout, sorted by name.
    #[must_use]
    pub fn to_tensors(&self) -> Vec<(String, TensorF32)> {
        let mut out = Vec::with_capacity(30);
        for (i, b) in self.blocks.iter().enumerate() {
            let n = i + 1;
            let vec1 = |v: &Vec<f32>| TensorF32 {
                shape: vec![b.c_out],
                data: v.clone(),
            };
            out.push((
                format!("conv{n}.weight"),
                TensorF32 {
                    shape: vec![b.c_out, b.c_in, CONV_KERNEL],
                    data: b.weight.clone(),
                },
            ));
            out.push((format!("conv{n}.bias"), vec1(&b.bias)));
            out.push((format!("bn{n}.weight"), vec1(&b.bn_gamma)));
            out.push((format!("bn{n}.bias"), vec1(&b.bn_beta)));
            out.push((format!("bn{n}.running_mean"), vec1(&b.bn_running_mean)));
            out.push((format!("bn{n}.running_var"), vec1(&b.bn_running_var)));
        }
        for (i, fc) in self.fc.iter().enumerate() {
            let n = i + 1;
            out.push((
                format!("fc{n}.weight"),
                TensorF32 {
                    shape: vec![fc.out_dim, fc.in_dim],
                    data: fc.weight.clone(),
                },
            ));
            out.push((
                format!("fc{n}.bias"),
                TensorF32 {
                    shape: vec![fc.out_dim],
                    data: fc.bias.clone(),
                },
            ));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn save(&self, path: impl AsRef<Path>, meta: TrainingMetadata) -> Result<(), WeightError> {
        save_f32_tensors(path, &self.to_tensors(), meta)
    }

    /// Raw class logits for one `(40, 128)` input.
    #[must_use]
    pub fn forward(&self, input: &ModelInput) -> [f32; NUM_CLASSES] {
        let mut x = input.as_slice().to_vec();
        let mut len = MODEL_FRAMES;
        for block in &self.blocks {
            let (y, pooled) = block.forward(&x, len);
            x = y;
            len = pooled;
        }

        let mut h = global_avg_pool(&x, CONV_CHANNELS[3], len);
        for (i, fc) in self.fc.iter().enumerate() {
            h = fc.forward(&h);
            if i + 1 < self.fc.len() {
                relu_inplace(&mut h);
            }
        }

        let mut logits = [0.0f32; NUM_CLASSES];
        logits.copy_from_slice(&h);
        logits
    }
}
