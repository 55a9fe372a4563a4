//! Gradient-descent step for learned parameters.
//!
//! Parameterized layers keep one gradient row per batch sample instead of reducing
//! over the batch in `backward`. [`UpdatePolicy`] decides how `update` turns those
//! rows into a parameter step.

use crate::{Float, Tensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    /// Subtract `lr * grad` once per batch row, in batch order.
    ///
    /// The total step scales with the batch size.
    #[default]
    Sequential,
    /// Subtract `lr * mean(grad)` once.
    Averaged,
}

impl UpdatePolicy {
    /// Apply per-row gradients `grads` (shape `(batch, params.len())`) to `params`.
    pub(crate) fn apply(self, params: &mut [Float], grads: &Tensor, lr: Float) {
        assert_eq!(
            grads.features(),
            params.len(),
            "gradient rows have len {}, parameters have len {}",
            grads.features(),
            params.len()
        );

        match self {
            UpdatePolicy::Sequential => {
                for row in grads.rows() {
                    for (p, &g) in params.iter_mut().zip(row) {
                        *p -= lr * g;
                    }
                }
            }
            UpdatePolicy::Averaged => {
                let batch = grads.batch_size();
                if batch == 0 {
                    return;
                }
                let scale = lr / batch as Float;
                for (j, p) in params.iter_mut().enumerate() {
                    let sum: Float = grads.rows().map(|row| row[j]).sum();
                    *p -= scale * sum;
                }
            }
        }
    }
}

#[track_caller]
pub(crate) fn assert_learning_rate(lr: Float) {
    assert!(
        lr.is_finite() && lr > 0.0,
        "learning rate must be finite and > 0, got {lr}"
    );
}
