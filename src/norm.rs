//! Normalization layers.
//!
//! All three normalize each batch row on its own (statistics are taken across the
//! features of a row, never across the batch).
//!
//! ## BatchNormalization
//!
//! ```text
//! mean   = sum(x) / N
//! var    = sum((x - mean)^2) / N
//! normx  = (x - mean) / sqrt(var + eps)
//! y      = normx * gamma + beta
//! ```
//!
//! Backward walks the same graph in reverse, one stage at a time:
//!
//! ```text
//! dbeta   = dy
//! dgamma  = dy * normx
//! dnormx  = dy * gamma
//! divar   = sum(dnormx * xmu)
//! dxmu1   = dnormx * ivar
//! dstd    = -divar / std^2
//! dvar    = 0.5 * dstd / sqrt(var + eps)
//! dxmu2   = 2 * xmu * dvar / N
//! dmu     = -sum(dxmu1 + dxmu2)
//! dx      = dxmu1 + dxmu2 + dmu / N
//! ```
//!
//! `MeanNormalization` and `CenterNormalization` have no parameters and pass the
//! gradient straight through.

use rand::Rng;
use rayon::prelude::*;

use crate::init::{NormalInit, entropy_rng, seeded_rng};
use crate::optim::assert_learning_rate;
use crate::select::select_nth_in_place;
use crate::tensor::assert_shape;
use crate::{Error, Float, Layer, Result, Tensor, UpdatePolicy};

/// Default variance epsilon for [`BatchNormalization`].
pub const DEFAULT_EPSILON: Float = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct RowStats {
    #[allow(dead_code)]
    mean: Float,
    var: Float,
    std: Float,
    inv_std: Float,
}

/// Forward state consumed by [`BatchNormalization`]'s backward pass.
#[derive(Debug, Clone)]
struct BatchNormCache {
    stats: Vec<RowStats>,
    normx: Tensor,
    xmu: Tensor,
}

#[derive(Debug, Clone)]
pub struct BatchNormalization {
    len: usize,
    eps: Float,
    gamma: Vec<Float>,
    beta: Vec<Float>,
    policy: UpdatePolicy,

    cache: Option<BatchNormCache>,
    /// Shape (batch, len).
    d_gamma: Option<Tensor>,
    d_beta: Option<Tensor>,
}

impl BatchNormalization {
    /// Randomly initialized layer seeded from OS entropy.
    pub fn new(len: usize) -> Result<Self> {
        Self::new_with_rng(len, &mut entropy_rng())
    }

    pub fn new_with_seed(len: usize, seed: u64) -> Result<Self> {
        Self::new_with_rng(len, &mut seeded_rng(seed))
    }

    /// `gamma = 1 + N(0, sqrt(2/len))`, `beta = N(0, sqrt(2/len))`, drawn per feature.
    pub fn new_with_rng<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Result<Self> {
        validate_len(len)?;

        let std = (2.0 / len as Float).sqrt();
        let normal = NormalInit::new(std)?;

        let mut gamma = vec![1.0; len];
        let mut beta = vec![0.0; len];
        for (g, b) in gamma.iter_mut().zip(beta.iter_mut()) {
            *g += normal.sample(rng);
            *b += normal.sample(rng);
        }

        log::debug!("batch_normalization len={len} init std={std}");
        Self::from_parameters(gamma, beta)
    }

    /// Build from explicit scale and shift vectors.
    pub fn from_parameters(gamma: Vec<Float>, beta: Vec<Float>) -> Result<Self> {
        validate_len(gamma.len())?;
        if beta.len() != gamma.len() {
            return Err(Error::InvalidShape(format!(
                "beta len {} does not match gamma len {}",
                beta.len(),
                gamma.len()
            )));
        }

        Ok(Self {
            len: gamma.len(),
            eps: DEFAULT_EPSILON,
            gamma,
            beta,
            policy: UpdatePolicy::default(),
            cache: None,
            d_gamma: None,
            d_beta: None,
        })
    }

    pub fn with_epsilon(mut self, eps: Float) -> Result<Self> {
        if !(eps.is_finite() && eps > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "epsilon must be finite and > 0, got {eps}"
            )));
        }
        self.eps = eps;
        Ok(self)
    }

    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Number of normalized features.
    #[inline]
    pub fn features(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn epsilon(&self) -> Float {
        self.eps
    }

    #[inline]
    pub fn gamma(&self) -> &[Float] {
        &self.gamma
    }

    #[inline]
    pub fn gamma_mut(&mut self) -> &mut [Float] {
        &mut self.gamma
    }

    #[inline]
    pub fn beta(&self) -> &[Float] {
        &self.beta
    }

    #[inline]
    pub fn beta_mut(&mut self) -> &mut [Float] {
        &mut self.beta
    }

    /// Per-row gamma gradients from the last `backward`. `None` once consumed.
    #[inline]
    pub fn gamma_grads(&self) -> Option<&Tensor> {
        self.d_gamma.as_ref()
    }

    #[inline]
    pub fn beta_grads(&self) -> Option<&Tensor> {
        self.d_beta.as_ref()
    }
}

impl Layer for BatchNormalization {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        assert_eq!(
            input.features(),
            self.len,
            "input len {} does not match batch normalization len {}",
            input.features(),
            self.len
        );

        let (n, eps) = (self.len as Float, self.eps);
        let (gamma, beta) = (&self.gamma, &self.beta);
        let batch = input.batch_size();

        let mut out = Tensor::zeros(batch, self.len);
        let mut normx = Tensor::zeros(batch, self.len);
        let mut xmu = Tensor::zeros(batch, self.len);

        let stats: Vec<RowStats> = out
            .par_rows_mut()
            .zip(normx.par_rows_mut())
            .zip(xmu.par_rows_mut())
            .zip(input.par_rows())
            .map(|(((y, nx), xm), x)| {
                let mean = x.iter().sum::<Float>() / n;
                let var = x.iter().map(|&v| (v - mean) * (v - mean)).sum::<Float>() / n;
                let std = (var + eps).sqrt();
                let inv_std = 1.0 / std;

                for i in 0..x.len() {
                    xm[i] = x[i] - mean;
                    nx[i] = xm[i] * inv_std;
                    y[i] = nx[i] * gamma[i] + beta[i];
                }
                RowStats {
                    mean,
                    var,
                    std,
                    inv_std,
                }
            })
            .collect();

        self.cache = Some(BatchNormCache { stats, normx, xmu });
        out
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let Some(cache) = self.cache.as_ref() else {
            panic!("batch_normalization: backward called before forward");
        };
        let batch = cache.normx.batch_size();
        assert_shape("gradient", grad_output, (batch, self.len));

        let (n, eps) = (self.len as Float, self.eps);
        let gamma = &self.gamma;

        let mut d_input = Tensor::zeros(batch, self.len);
        let mut d_gamma = Tensor::zeros(batch, self.len);
        d_input
            .par_rows_mut()
            .zip(d_gamma.par_rows_mut())
            .zip(grad_output.par_rows())
            .zip(
                cache
                    .normx
                    .par_rows()
                    .zip(cache.xmu.par_rows())
                    .zip(cache.stats.par_iter()),
            )
            .for_each(|(((dx, dg), dy), ((nx, xm), s))| {
                let mut divar = 0.0;
                for i in 0..dy.len() {
                    dg[i] = dy[i] * nx[i];
                    let dnormx = dy[i] * gamma[i];
                    divar += dnormx * xm[i];
                    dx[i] = dnormx * s.inv_std;
                }

                let dstd = -divar / (s.std * s.std);
                let dvar = 0.5 * dstd / (s.var + eps).sqrt();

                let mut dmu = 0.0;
                for i in 0..dx.len() {
                    dx[i] += 2.0 * xm[i] * dvar / n;
                    dmu -= dx[i];
                }
                for v in dx.iter_mut() {
                    *v += dmu / n;
                }
            });

        self.d_beta = Some(grad_output.clone());
        self.d_gamma = Some(d_gamma);
        d_input
    }

    fn update(&mut self, lr: Float) {
        assert_learning_rate(lr);

        let (Some(d_gamma), Some(d_beta)) = (self.d_gamma.take(), self.d_beta.take()) else {
            return;
        };
        log::trace!(
            "batch_normalization len={}: applying {} gradient rows ({:?})",
            self.len,
            d_gamma.batch_size(),
            self.policy
        );

        self.policy.apply(&mut self.gamma, &d_gamma, lr);
        self.policy.apply(&mut self.beta, &d_beta, lr);
    }
}

/// Subtracts the row mean of the first `len` features from those features.
///
/// Rows may be longer than `len`; the remaining features are left untouched.
#[derive(Debug, Clone, Copy)]
pub struct MeanNormalization {
    len: usize,
}

impl MeanNormalization {
    pub fn new(len: usize) -> Result<Self> {
        validate_len(len)?;
        Ok(Self { len })
    }

    /// Number of normalized features.
    #[inline]
    pub fn features(&self) -> usize {
        self.len
    }
}

impl Layer for MeanNormalization {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        assert_min_features(input, self.len, "mean normalization");

        let len = self.len;
        let mut out = input.clone();
        out.par_rows_mut().for_each(|row| {
            let head = &mut row[..len];
            let mean = head.iter().sum::<Float>() / len as Float;
            for v in head {
                *v -= mean;
            }
        });
        out
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        grad_output.clone()
    }

    fn update(&mut self, _lr: Float) {}
}

/// Subtracts the row's lower median from the first `len` features.
///
/// The median is taken over the whole row: the value at rank `row.len() / 2` of the
/// sorted row, found by quickselect on a copy.
#[derive(Debug, Clone, Copy)]
pub struct CenterNormalization {
    len: usize,
}

impl CenterNormalization {
    pub fn new(len: usize) -> Result<Self> {
        validate_len(len)?;
        Ok(Self { len })
    }

    /// Number of normalized features.
    #[inline]
    pub fn features(&self) -> usize {
        self.len
    }
}

impl Layer for CenterNormalization {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        assert_min_features(input, self.len, "center normalization");

        let len = self.len;
        let mut out = input.clone();
        out.par_rows_mut().for_each_init(Vec::new, |scratch, row| {
            scratch.clear();
            scratch.extend_from_slice(row);
            let center = select_nth_in_place(scratch, row.len() / 2);
            for v in &mut row[..len] {
                *v -= center;
            }
        });
        out
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        grad_output.clone()
    }

    fn update(&mut self, _lr: Float) {}
}

fn validate_len(len: usize) -> Result<()> {
    if len == 0 {
        return Err(Error::InvalidConfig("len must be > 0".to_owned()));
    }
    Ok(())
}

#[track_caller]
fn assert_min_features(input: &Tensor, len: usize, layer: &str) {
    assert!(
        input.features() >= len,
        "input len {} is shorter than {layer} len {len}",
        input.features()
    );
}
