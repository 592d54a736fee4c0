//! Core math kernels for inference and feature statistics.

#[inline]
pub fn relu_inplace(x: &mut [f32]) {
    for v in x {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
}

pub fn softmax_inplace(x: &mut [f32]) {
    if x.is_empty() {
        return;
    }
    let mut max_v = x[0];
    for &v in &x[1..] {
        if v > max_v {
            max_v = v;
        }
    }

    let mut sum = 0.0f32;
    for v in x.iter_mut() {
        *v = (*v - max_v).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in x {
            *v /= sum;
        }
    }
}

/// Index of the first maximum; `0` for an empty slice.
#[must_use]
pub fn argmax(x: &[f32]) -> usize {
    let mut best = 0usize;
    for (i, &v) in x.iter().enumerate().skip(1) {
        if v > x[best] {
            best = i;
        }
    }
    best
}

/// Arithmetic mean accumulated in `f64`; `0.0` for an empty slice.
#[must_use]
pub fn mean_f64(x: &[f32]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().map(|&v| f64::from(v)).sum::<f64>() / x.len() as f64
}

/// Population variance accumulated in `f64`; `0.0` for an empty slice.
#[must_use]
pub fn variance_f64(x: &[f32]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(x);
    x.iter()
        .map(|&v| {
            let d = f64::from(v) - mean;
            d * d
        })
        .sum::<f64>()
        / x.len() as f64
}

#[cfg(test)]
mod tests {
    use super::{argmax, mean_f64, relu_inplace, softmax_inplace, variance_f64};

    #[test]
    fn relu_and_softmax_smoke() {
        let mut v = [0.0f32, 1.0, -1.0];
        relu_inplace(&mut v);
        assert_eq!(v, [0.0, 1.0, 0.0]);

        let mut s = [1.0f32, 2.0, 3.0];
        softmax_inplace(&mut s);
        let sum: f32 = s.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(s[2] > s[1] && s[1] > s[0]);
    }

    #[test]
    fn softmax_is_stable_for_large_logits() {
        let mut s = [1000.0f32, 1000.0];
        softmax_inplace(&mut s);
        assert!((s[0] - 0.5).abs() < 1e-6);
        assert!((s[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.2, 0.8]), 1);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn population_statistics() {
        let x = [2.0f32, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean_f64(&x) - 5.0).abs() < 1e-12);
        assert!((variance_f64(&x) - 4.0).abs() < 1e-12);
        assert_eq!(variance_f64(&[]), 0.0);
    }
}
