//! Activation layers.
//!
//! Activations are applied element-wise and row by row; rows run in parallel.
//! None of them has learned parameters, so `update` is a no-op.
//!
//! What each layer caches for backward differs:
//!
//! - `Sigmoid` caches its *output* (`y * (1 - y)` is the derivative).
//! - `ReLU` and `BinaryAct` cache their *input*.
//! - `Linear` and `SoftMax` cache nothing; their backward passes the gradient through.

use rayon::prelude::*;

use crate::numeric::{hard_tanh_grad, sign};
use crate::tensor::assert_shape;
use crate::{Float, Layer, Tensor};

/// Identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Linear;

impl Linear {
    pub fn new() -> Self {
        Self
    }
}

impl Layer for Linear {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        input.clone()
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        grad_output.clone()
    }

    fn update(&mut self, _lr: Float) {}
}

/// Logistic sigmoid, `1 / (1 + e^-x)`.
#[derive(Debug, Clone, Default)]
pub struct Sigmoid {
    last_output: Option<Tensor>,
}

impl Sigmoid {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for Sigmoid {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        let out = map_rows(input, sigmoid);
        self.last_output = Some(out.clone());
        out
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let y = cached(&self.last_output, "sigmoid");
        zip_rows(grad_output, y, |dy, y| dy * y * (1.0 - y))
    }

    fn update(&mut self, _lr: Float) {}
}

/// Row-wise softmax.
///
/// Backward is the identity: callers must feed the gradient of a loss that already
/// folds in the softmax Jacobian (softmax + cross-entropy gives `p - target`).
/// Composing it with any other downstream gradient is incorrect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftMax;

impl SoftMax {
    pub fn new() -> Self {
        Self
    }
}

impl Layer for SoftMax {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        let mut out = Tensor::zeros(input.batch_size(), input.features());
        out.par_rows_mut()
            .zip(input.par_rows())
            .for_each(|(y, x)| softmax_row(x, y));
        out
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        grad_output.clone()
    }

    fn update(&mut self, _lr: Float) {}
}

/// Rectified linear unit, `max(0, x)`.
#[derive(Debug, Clone, Default)]
pub struct ReLU {
    last_input: Option<Tensor>,
}

impl ReLU {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for ReLU {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.last_input = Some(input.clone());
        map_rows(input, |x| x.max(0.0))
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let x = cached(&self.last_input, "relu");
        zip_rows(grad_output, x, |dy, x| if x > 0.0 { dy } else { 0.0 })
    }

    fn update(&mut self, _lr: Float) {}
}

/// Sign activation trained with the straight-through estimator.
///
/// Forward is [`sign`] (so `0` maps to `0`). Backward passes the gradient where
/// `|x| <= 1` and zeroes it elsewhere.
#[derive(Debug, Clone, Default)]
pub struct BinaryAct {
    last_input: Option<Tensor>,
}

impl BinaryAct {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for BinaryAct {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.last_input = Some(input.clone());
        map_rows(input, sign)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let x = cached(&self.last_input, "binary_act");
        zip_rows(grad_output, x, |dy, x| hard_tanh_grad(x) * dy)
    }

    fn update(&mut self, _lr: Float) {}
}

#[inline]
fn sigmoid(x: Float) -> Float {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

fn softmax_row(x: &[Float], y: &mut [Float]) {
    let max = x.iter().copied().fold(Float::NEG_INFINITY, Float::max);
    let mut sum = 0.0;
    for (y, &x) in y.iter_mut().zip(x) {
        *y = (x - max).exp();
        sum += *y;
    }
    for y in y.iter_mut() {
        *y /= sum;
    }
}

#[track_caller]
pub(crate) fn cached<'a>(slot: &'a Option<Tensor>, layer: &str) -> &'a Tensor {
    match slot {
        Some(t) => t,
        None => panic!("{layer}: backward called before forward"),
    }
}

fn map_rows<F>(input: &Tensor, f: F) -> Tensor
where
    F: Fn(Float) -> Float + Sync,
{
    let mut out = Tensor::zeros(input.batch_size(), input.features());
    out.par_rows_mut().zip(input.par_rows()).for_each(|(y, x)| {
        for (y, &x) in y.iter_mut().zip(x) {
            *y = f(x);
        }
    });
    out
}

/// `out[b][i] = f(grad[b][i], cached[b][i])`, after checking the shapes agree.
#[track_caller]
fn zip_rows<F>(grad: &Tensor, cached: &Tensor, f: F) -> Tensor
where
    F: Fn(Float, Float) -> Float + Sync,
{
    assert_shape("gradient", grad, cached.shape());

    let mut out = Tensor::zeros(grad.batch_size(), grad.features());
    out.par_rows_mut()
        .zip(grad.par_rows().zip(cached.par_rows()))
        .for_each(|(dx, (dy, c))| {
            for ((dx, &dy), &c) in dx.iter_mut().zip(dy).zip(c) {
                *dx = f(dy, c);
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[Float]) -> Tensor {
        Tensor::from_rows(&[values]).unwrap()
    }

    #[test]
    fn linear_passes_through() {
        let x = Tensor::from_rows(&[[1.0_f32, -2.0], [3.0, 0.5]]).unwrap();
        let mut layer = Linear::new();
        assert_eq!(layer.forward(&x), x);
        assert_eq!(layer.backward(&x), x);
    }

    #[test]
    fn sigmoid_basic_values() {
        let mut layer = Sigmoid::new();
        let y = layer.forward(&row(&[0.0]));
        assert!((y.row(0)[0] - 0.5).abs() < 1e-6);

        let dx = layer.backward(&row(&[2.0]));
        assert!((dx.row(0)[0] - 0.5).abs() < 1e-6);

        let y = layer.forward(&row(&[-10.0, -1.0, 1.0, 10.0]));
        assert!(y.as_slice().iter().all(|&v| v > 0.0 && v < 1.0));
        assert!(y.row(0)[3] > 0.999);
        assert!(y.row(0)[0] < 0.001);
    }

    #[test]
    fn sigmoid_backward_matches_numeric_gradient() {
        let xs = [-2.0, -0.3, 0.0, 0.7, 3.0];
        let mut layer = Sigmoid::new();
        layer.forward(&row(&xs));
        let dx = layer.backward(&row(&[1.0; 5]));

        let eps = 1e-3;
        for (i, &x) in xs.iter().enumerate() {
            let numeric = (sigmoid(x + eps) - sigmoid(x - eps)) / (2.0 * eps);
            assert!((dx.row(0)[i] - numeric).abs() < 1e-3);
        }
    }

    #[test]
    fn relu_forward_and_backward() {
        let mut layer = ReLU::new();
        let y = layer.forward(&row(&[-2.0, 0.0, 3.0]));
        assert_eq!(y.row(0), &[0.0, 0.0, 3.0]);

        let dx = layer.backward(&row(&[1.0, 1.0, 1.0]));
        assert_eq!(dx.row(0), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let x = Tensor::from_rows(&[[1.0_f32, 2.0, 3.0], [-50.0, 0.0, 50.0], [0.0, 0.0, 0.0]])
            .unwrap();
        let y = SoftMax::new().forward(&x);
        for r in y.rows() {
            let sum: Float = r.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
        assert!((y.row(2)[0] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn softmax_is_shift_invariant_and_handles_large_logits() {
        let mut layer = SoftMax::new();
        let a = layer.forward(&row(&[1.0, 2.0, 3.0]));
        let b = layer.forward(&row(&[1001.0, 1002.0, 1003.0]));
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert!(y.is_finite());
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn softmax_backward_is_identity() {
        let mut layer = SoftMax::new();
        let x = row(&[0.2, 0.3, 0.5]);
        layer.forward(&x);
        let g = row(&[0.1, -0.4, 0.3]);
        assert_eq!(layer.backward(&g), g);
    }

    #[test]
    fn binary_act_uses_zero_sign_and_clipped_gradient() {
        let mut layer = BinaryAct::new();
        let y = layer.forward(&row(&[-0.5, 0.0, 2.0]));
        assert_eq!(y.row(0), &[-1.0, 0.0, 1.0]);

        let dx = layer.backward(&row(&[3.0, 3.0, 3.0]));
        assert_eq!(dx.row(0), &[3.0, 3.0, 0.0]);
    }

    #[test]
    fn rows_are_processed_independently() {
        let x = Tensor::from_rows(&[[-1.0_f32, 4.0], [2.0, -3.0], [0.5, 0.0]]).unwrap();
        let mut layer = ReLU::new();
        let y = layer.forward(&x);
        assert_eq!(y.to_rows(), vec![vec![0.0, 4.0], vec![2.0, 0.0], vec![0.5, 0.0]]);
    }

    #[test]
    #[should_panic(expected = "backward called before forward")]
    fn backward_before_forward_panics() {
        ReLU::new().backward(&row(&[1.0]));
    }

    #[test]
    #[should_panic]
    fn backward_panics_on_shape_mismatch() {
        let mut layer = Sigmoid::new();
        layer.forward(&row(&[1.0, 2.0]));
        layer.backward(&row(&[1.0, 2.0, 3.0]));
    }
}
