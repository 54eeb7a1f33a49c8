//! Loss and normalization functions with their gradients
use ndarray::{Array2, ArrayView1, Axis};

/// Row-wise log-softmax of a `(batch, classes)` matrix.
pub fn log_softmax(logits: &Array2<f64>) -> Array2<f64> {
    let mut out = logits.clone();
    for mut row in out.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
        let log_sum_exp = row.mapv(|x| (x - max).exp()).sum().ln() + max;
        row -= log_sum_exp;
    }
    out
}

/// Row-wise softmax of a `(batch, classes)` matrix.
pub fn softmax(logits: &Array2<f64>) -> Array2<f64> {
    log_softmax(logits).mapv_into(f64::exp)
}

/// Entropy of a categorical distribution given by its log probabilities.
pub fn entropy(log_probs: ArrayView1<f64>) -> f64 {
    -log_probs.iter().map(|lp| lp.exp() * lp).sum::<f64>()
}

/// Mean entropy of the rows of a log-probability matrix.
pub fn mean_entropy(log_probs: &Array2<f64>) -> f64 {
    log_probs
        .axis_iter(Axis(0))
        .map(entropy)
        .sum::<f64>()
        / log_probs.nrows().max(1) as f64
}

/// Huber loss of a residual.
pub fn huber(residual: f64, delta: f64) -> f64 {
    let abs = residual.abs();
    if abs <= delta {
        0.5 * residual * residual
    } else {
        delta * (abs - 0.5 * delta)
    }
}

/// Derivative of [`huber`] with respect to the residual.
pub fn huber_grad(residual: f64, delta: f64) -> f64 {
    residual.clamp(-delta, delta)
}
