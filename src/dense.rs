//! Fully connected (dense / affine) layer.
//!
//! Weights are row-major with shape `(out_dim, in_dim)`:
//!
//! - forward: `y[b][i] = sum_j W[i][j] * x[b][j] (+ bias[i])`
//! - backward: `dx[b][j] = sum_i W[i][j] * dy[b][i]`
//!
//! Parameter gradients are kept per batch row (`dW[b] = dy[b] ⊗ x[b]`,
//! `dbias[b] = dy[b]`) and only reduced by [`Layer::update`], according to the
//! layer's [`UpdatePolicy`].

use rand::Rng;
use rayon::prelude::*;

use crate::activation::cached;
use crate::init::{NormalInit, entropy_rng, seeded_rng};
use crate::optim::assert_learning_rate;
use crate::tensor::assert_shape;
use crate::{Activation, Error, Float, Init, Layer, Result, Tensor, UpdatePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct FullyConnected {
    in_dim: usize,
    out_dim: usize,
    bias: Bias,
    /// Row-major matrix with shape (out_dim, in_dim).
    weights: Vec<Float>,
    /// Length `out_dim`; all zeros and never touched when bias is disabled.
    biases: Vec<Float>,
    policy: UpdatePolicy,

    last_input: Option<Tensor>,
    /// Shape (batch, out_dim * in_dim).
    d_weights: Option<Tensor>,
    /// Shape (batch, out_dim). Only recorded when bias is enabled.
    d_biases: Option<Tensor>,
}

impl FullyConnected {
    /// Randomly initialized layer seeded from OS entropy.
    ///
    /// `activation` is the activation that will follow this layer; it only selects
    /// the initialization standard deviation (see [`Init::for_activation`]).
    pub fn new(in_dim: usize, out_dim: usize, activation: Activation, bias: Bias) -> Result<Self> {
        Self::new_with_rng(in_dim, out_dim, activation, bias, &mut entropy_rng())
    }

    /// Build using a deterministic seed.
    pub fn new_with_seed(
        in_dim: usize,
        out_dim: usize,
        activation: Activation,
        bias: Bias,
        seed: u64,
    ) -> Result<Self> {
        Self::new_with_rng(in_dim, out_dim, activation, bias, &mut seeded_rng(seed))
    }

    /// Build using the provided RNG.
    pub fn new_with_rng<R: Rng + ?Sized>(
        in_dim: usize,
        out_dim: usize,
        activation: Activation,
        bias: Bias,
        rng: &mut R,
    ) -> Result<Self> {
        Self::with_init(in_dim, out_dim, Init::for_activation(activation), bias, rng)
    }

    /// Build with an explicit initializer instead of an activation hint.
    pub fn with_init<R: Rng + ?Sized>(
        in_dim: usize,
        out_dim: usize,
        init: Init,
        bias: Bias,
        rng: &mut R,
    ) -> Result<Self> {
        validate_dims(in_dim, out_dim)?;

        let std = init.std_dev(in_dim)?;
        let normal = NormalInit::new(std)?;

        let mut weights = vec![0.0; in_dim * out_dim];
        let mut biases = vec![0.0; out_dim];
        // Bias then its weight row, one output at a time.
        for (b, row) in biases.iter_mut().zip(weights.chunks_mut(in_dim)) {
            if bias == Bias::Enabled {
                *b = normal.sample(rng);
            }
            normal.perturb(row, rng);
        }

        log::debug!(
            "fully_connected {in_dim}->{out_dim} init={init:?} std={std} bias={bias:?}"
        );
        Ok(Self::from_parts(in_dim, out_dim, bias, weights, biases))
    }

    /// Build from explicit parameters.
    ///
    /// `weights` is row-major `(out_dim, in_dim)`. Passing `Some(biases)` enables the
    /// bias; `None` disables it.
    pub fn from_parameters(
        in_dim: usize,
        out_dim: usize,
        weights: Vec<Float>,
        biases: Option<Vec<Float>>,
    ) -> Result<Self> {
        validate_dims(in_dim, out_dim)?;
        if weights.len() != in_dim * out_dim {
            return Err(Error::InvalidShape(format!(
                "weights len {} does not match out_dim * in_dim ({})",
                weights.len(),
                in_dim * out_dim
            )));
        }

        let (bias, biases) = match biases {
            Some(b) if b.len() != out_dim => {
                return Err(Error::InvalidShape(format!(
                    "biases len {} does not match out_dim {out_dim}",
                    b.len()
                )));
            }
            Some(b) => (Bias::Enabled, b),
            None => (Bias::Disabled, vec![0.0; out_dim]),
        };

        Ok(Self::from_parts(in_dim, out_dim, bias, weights, biases))
    }

    fn from_parts(
        in_dim: usize,
        out_dim: usize,
        bias: Bias,
        weights: Vec<Float>,
        biases: Vec<Float>,
    ) -> Self {
        Self {
            in_dim,
            out_dim,
            bias,
            weights,
            biases,
            policy: UpdatePolicy::default(),
            last_input: None,
            d_weights: None,
            d_biases: None,
        }
    }

    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    #[inline]
    pub fn bias(&self) -> Bias {
        self.bias
    }

    #[inline]
    pub fn update_policy(&self) -> UpdatePolicy {
        self.policy
    }

    #[inline]
    pub fn weights(&self) -> &[Float] {
        &self.weights
    }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut [Float] {
        &mut self.weights
    }

    /// `None` when the bias is disabled.
    #[inline]
    pub fn biases(&self) -> Option<&[Float]> {
        match self.bias {
            Bias::Enabled => Some(&self.biases),
            Bias::Disabled => None,
        }
    }

    #[inline]
    pub fn biases_mut(&mut self) -> Option<&mut [Float]> {
        match self.bias {
            Bias::Enabled => Some(&mut self.biases),
            Bias::Disabled => None,
        }
    }

    /// Per-row weight gradients from the last `backward`, shape
    /// `(batch, out_dim * in_dim)`. `None` once consumed by `update`.
    #[inline]
    pub fn weight_grads(&self) -> Option<&Tensor> {
        self.d_weights.as_ref()
    }

    /// Per-row bias gradients from the last `backward`, shape `(batch, out_dim)`.
    #[inline]
    pub fn bias_grads(&self) -> Option<&Tensor> {
        self.d_biases.as_ref()
    }
}

impl Layer for FullyConnected {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        assert_eq!(
            input.features(),
            self.in_dim,
            "input len {} does not match layer in_dim {}",
            input.features(),
            self.in_dim
        );

        let in_dim = self.in_dim;
        let weights = &self.weights;
        let biases = (self.bias == Bias::Enabled).then_some(self.biases.as_slice());

        let mut out = Tensor::zeros(input.batch_size(), self.out_dim);
        out.par_rows_mut().zip(input.par_rows()).for_each(|(y, x)| {
            for (o, y) in y.iter_mut().enumerate() {
                let mut sum = biases.map_or(0.0, |b| b[o]);
                let row = &weights[o * in_dim..(o + 1) * in_dim];
                for (&w, &x) in row.iter().zip(x) {
                    sum = w.mul_add(x, sum);
                }
                *y = sum;
            }
        });

        self.last_input = Some(input.clone());
        out
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let x = cached(&self.last_input, "fully_connected");
        let batch = x.batch_size();
        assert_shape("gradient", grad_output, (batch, self.out_dim));

        let (in_dim, out_dim) = (self.in_dim, self.out_dim);
        let weights = &self.weights;

        let mut d_input = Tensor::zeros(batch, in_dim);
        let mut d_weights = Tensor::zeros(batch, out_dim * in_dim);
        d_input
            .par_rows_mut()
            .zip(d_weights.par_rows_mut())
            .zip(grad_output.par_rows().zip(x.par_rows()))
            .for_each(|((dx, dw), (dy, x))| {
                for (o, &g) in dy.iter().enumerate() {
                    let w_row = &weights[o * in_dim..(o + 1) * in_dim];
                    let dw_row = &mut dw[o * in_dim..(o + 1) * in_dim];
                    for j in 0..in_dim {
                        dx[j] = w_row[j].mul_add(g, dx[j]);
                        dw_row[j] = g * x[j];
                    }
                }
            });

        self.d_biases = (self.bias == Bias::Enabled).then(|| grad_output.clone());
        self.d_weights = Some(d_weights);
        d_input
    }

    fn update(&mut self, lr: Float) {
        assert_learning_rate(lr);

        let Some(d_weights) = self.d_weights.take() else {
            return;
        };
        log::trace!(
            "fully_connected {}->{}: applying {} gradient rows ({:?})",
            self.in_dim,
            self.out_dim,
            d_weights.batch_size(),
            self.policy
        );

        self.policy.apply(&mut self.weights, &d_weights, lr);
        if let Some(d_biases) = self.d_biases.take() {
            self.policy.apply(&mut self.biases, &d_biases, lr);
        }
    }
}

fn validate_dims(in_dim: usize, out_dim: usize) -> Result<()> {
    if in_dim == 0 {
        return Err(Error::InvalidConfig("in_dim must be > 0".to_owned()));
    }
    if out_dim == 0 {
        return Err(Error::InvalidConfig("out_dim must be > 0".to_owned()));
    }
    Ok(())
}
