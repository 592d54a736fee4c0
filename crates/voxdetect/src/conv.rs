//! 1D convolution block kernels for the CNN classifier.
//!
//! Each block is `conv(k=3, pad=1) -> batch norm (eval) -> ReLU -> max pool(2)`.
//! All buffers are **column-major** `[channels, length]` stored as `x[c * length + t]`.

/// Epsilon added to the running variance in batch normalization.
pub const BN_EPS: f32 = 1e-5;

/// "Same" 1D convolution with stride 1 and symmetric zero padding of `kernel / 2`.
///
/// - `input`: `[channels_in, length]`
/// - `weight`: `[channels_out, channels_in, kernel]` contiguous
/// - returns `[channels_out, length]`
pub fn conv1d_same_colmajor(
    input: &[f32],
    weight: &[f32],
    bias: Option<&[f32]>,
    channels_in: usize,
    channels_out: usize,
    length: usize,
    kernel: usize,
) -> Vec<f32> {
    debug_assert_eq!(input.len(), channels_in * length);
    debug_assert_eq!(weight.len(), channels_out * channels_in * kernel);
    debug_assert!(kernel % 2 == 1, "same padding needs an odd kernel");
    if let Some(b) = bias {
        debug_assert_eq!(b.len(), channels_out);
    }

    let pad = (kernel / 2) as isize;
    let mut output = vec![0.0f32; channels_out * length];

    for oc in 0..channels_out {
        let b = bias.map_or(0.0, |bb| bb[oc]);
        let out_row = &mut output[oc * length..(oc + 1) * length];
        out_row.fill(b);

        for ic in 0..channels_in {
            let in_row = &input[ic * length..(ic + 1) * length];
            let w = &weight[(oc * channels_in + ic) * kernel..(oc * channels_in + ic + 1) * kernel];
            for (t, out_elem) in out_row.iter_mut().enumerate() {
                let base = t as isize - pad;
                let mut sum = 0.0f32;
                for (k, &wk) in w.iter().enumerate() {
                    let il = base + k as isize;
                    if il >= 0 && (il as usize) < length {
                        sum += in_row[il as usize] * wk;
                    }
                }
                *out_elem += sum;
            }
        }
    }
    output
}

/// Per-channel running-statistics parameters of an eval-mode batch norm.
#[derive(Debug, Clone, Copy)]
pub struct BatchNormParams<'a> {
    pub gamma: &'a [f32],
    pub beta: &'a [f32],
    pub running_mean: &'a [f32],
    pub running_var: &'a [f32],
}

/// Eval-mode batch norm over `[channels, length]`, in place.
pub fn batch_norm_inplace(x: &mut [f32], channels: usize, length: usize, bn: BatchNormParams<'_>) {
    debug_assert_eq!(x.len(), channels * length);
    debug_assert_eq!(bn.gamma.len(), channels);

    for c in 0..channels {
        let scale = bn.gamma[c] / (bn.running_var[c] + BN_EPS).sqrt();
        let shift = bn.beta[c] - bn.running_mean[c] * scale;
        for v in &mut x[c * length..(c + 1) * length] {
            *v = *v * scale + shift;
        }
    }
}

/// Non-overlapping max pool of width 2; an odd trailing element is dropped.
#[must_use]
pub fn max_pool1d_colmajor(x: &[f32], channels: usize, length: usize) -> (Vec<f32>, usize) {
    debug_assert_eq!(x.len(), channels * length);
    let out_len = length / 2;
    let mut out = vec![0.0f32; channels * out_len];
    for c in 0..channels {
        let row = &x[c * length..(c + 1) * length];
        for (t, o) in out[c * out_len..(c + 1) * out_len].iter_mut().enumerate() {
            *o = row[2 * t].max(row[2 * t + 1]);
        }
    }
    (out, out_len)
}

/// Mean over time of each channel: `[channels, length] -> [channels]`.
#[must_use]
pub fn global_avg_pool(x: &[f32], channels: usize, length: usize) -> Vec<f32> {
    debug_assert_eq!(x.len(), channels * length);
    if length == 0 {
        return vec![0.0; channels];
    }
    x.chunks_exact(length)
        .map(|row| row.iter().sum::<f32>() / length as f32)
        .collect()
}
