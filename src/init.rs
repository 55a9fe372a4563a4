//! Parameter initialization.
//!
//! Learned parameters are drawn once at construction from a zero-mean normal
//! distribution. The standard deviation depends on the activation that follows the
//! layer:
//!
//! - `relu`: He/Kaiming, `sqrt(2 / in_dim)`
//! - `sigmoid` / `softmax`: Xavier/Glorot, `sqrt(1 / in_dim)`
//! - anything else: a fixed `0.05`
//!
//! Every randomly initialized layer takes its randomness from a caller-provided RNG
//! (`new_with_rng`), a seed (`new_with_seed`) or OS entropy (`new`).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::{Error, Float, Result};

/// Standard deviation used when the following activation has no dedicated rule.
pub const FALLBACK_STD: Float = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Activation expected after a layer; only used to pick an initializer.
pub enum Activation {
    Identity,
    Sigmoid,
    SoftMax,
    ReLU,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Standard deviation rule for zero-mean normal initialization.
pub enum Init {
    /// `sqrt(2 / fan_in)`.
    He,
    /// `sqrt(1 / fan_in)`.
    Xavier,
    /// Fixed standard deviation.
    Normal { std: Float },
}

impl Init {
    /// Initializer matching the activation that consumes the layer's output.
    #[inline]
    pub fn for_activation(act: Activation) -> Self {
        match act {
            Activation::ReLU => Init::He,
            Activation::Sigmoid | Activation::SoftMax => Init::Xavier,
            Activation::Identity | Activation::Binary => Init::Normal { std: FALLBACK_STD },
        }
    }

    /// Resolve the standard deviation for a layer with `fan_in` inputs.
    pub fn std_dev(self, fan_in: usize) -> Result<Float> {
        if fan_in == 0 {
            return Err(Error::InvalidConfig("fan_in must be > 0".to_owned()));
        }
        let std = match self {
            Init::He => (2.0 / fan_in as Float).sqrt(),
            Init::Xavier => (1.0 / fan_in as Float).sqrt(),
            Init::Normal { std } => std,
        };
        if !(std.is_finite() && std >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "init std must be finite and >= 0, got {std}"
            )));
        }
        Ok(std)
    }
}

/// Zero-mean normal sampler with a validated standard deviation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NormalInit {
    dist: Normal<Float>,
}

impl NormalInit {
    pub(crate) fn new(std: Float) -> Result<Self> {
        let dist = Normal::new(0.0, std)
            .map_err(|e| Error::InvalidConfig(format!("normal init with std {std}: {e}")))?;
        Ok(Self { dist })
    }

    #[inline]
    pub(crate) fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Float {
        self.dist.sample(rng)
    }

    /// Adds one independent draw to every element of `values`.
    pub(crate) fn perturb<R: Rng + ?Sized>(&self, values: &mut [Float], rng: &mut R) {
        for v in values {
            *v += self.sample(rng);
        }
    }
}

#[inline]
pub(crate) fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

#[inline]
pub(crate) fn entropy_rng() -> StdRng {
    StdRng::from_os_rng()
}
