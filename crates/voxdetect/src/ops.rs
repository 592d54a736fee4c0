//! Dense layer op for the classifier head.

/// Linear layer: `y = x * W^T + b`.
///
/// Shapes:
/// - `input`: `[n_rows, in_dim]`
/// - `weight`: `[out_dim, in_dim]`
/// - output: `[n_rows, out_dim]`
pub fn linear(
    input: &[f32],
    n_rows: usize,
    in_dim: usize,
    weight: &[f32],
    out_dim: usize,
    bias: Option<&[f32]>,
) -> Vec<f32> {
    debug_assert_eq!(input.len(), n_rows * in_dim);
    debug_assert_eq!(weight.len(), out_dim * in_dim);
    if let Some(b) = bias {
        debug_assert_eq!(b.len(), out_dim);
    }

    let mut out = vec![0.0f32; n_rows * out_dim];
    for (x, y) in input.chunks_exact(in_dim).zip(out.chunks_exact_mut(out_dim)) {
        for (o, (yo, w)) in y.iter_mut().zip(weight.chunks_exact(in_dim)).enumerate() {
            let dot: f32 = x.iter().zip(w).map(|(a, b)| a * b).sum();
            *yo = dot + bias.map_or(0.0, |b| b[o]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::linear;

    #[test]
    fn linear_smoke() {
        // x: [2,3], W: [2,3]
        let x = [1.0f32, 2.0, 3.0, -1.0, 0.0, 1.0];
        let w = [1.0f32, 0.0, -1.0, 2.0, 1.0, 0.0];
        let b = [0.5f32, -1.0];
        let y = linear(&x, 2, 3, &w, 2, Some(&b));
        // row0: [1-3+0.5, 2+2-1] = [-1.5, 3.0]
        // row1: [-1-1+0.5, -2+0-1] = [-1.5, -3.0]
        assert!((y[0] + 1.5).abs() < 1e-6);
        assert!((y[1] - 3.0).abs() < 1e-6);
        assert!((y[2] + 1.5).abs() < 1e-6);
        assert!((y[3] + 3.0).abs() < 1e-6);
    }

    #[test]
    fn linear_without_bias_is_a_plain_matvec() {
        let y = linear(&[2.0, -1.0], 1, 2, &[1.0, 1.0, 0.0, 3.0, 1.0, 0.0], 3, None);
        assert_eq!(y, vec![1.0, -3.0, 2.0]);
    }
}
