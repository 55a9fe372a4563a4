//! Composable feed-forward layers.
//!
//! `mlp-layers` is a small layer engine for training multilayer perceptrons with
//! mini-batch gradient descent. Every layer implements the same three-call
//! [`Layer`] contract:
//!
//! - `forward(&input) -> output`, caching whatever backward needs
//! - `backward(&grad_output) -> grad_input`, recording parameter gradients
//! - `update(lr)`, a gradient-descent step on learned parameters
//!
//! Available layers: [`Linear`], [`Sigmoid`], [`SoftMax`], [`ReLU`], [`BinaryAct`],
//! [`FullyConnected`], [`BatchNormalization`], [`MeanNormalization`] and
//! [`CenterNormalization`]. [`AnyLayer`] wraps them in one enum so a network can be
//! stored as `Vec<AnyLayer>`.
//!
//! Assembling layers into a network, losses and data loading are left to the caller.
//!
//! # Panics vs `Result`
//!
//! - Constructors and tensor builders validate their arguments and return [`Result`].
//! - `forward` / `backward` / `update` treat shape mismatches (and `backward` before
//!   `forward`) as programmer error and panic via `assert!`.
//!
//! # Data layout
//!
//! - Scalars are [`Float`] (`f32`).
//! - A [`Tensor`] is `(batch_size, features)`, contiguous and row-major.
//! - Dense weights are row-major with shape `(out_dim, in_dim)`.
//! - Batch rows are independent and processed in parallel with rayon.
//!
//! # Parameter gradients
//!
//! `FullyConnected` and `BatchNormalization` keep one gradient row per batch sample.
//! With the default [`UpdatePolicy::Sequential`], `update` subtracts `lr * grad` once
//! per row, so the step grows with the batch size. [`UpdatePolicy::Averaged`] takes a
//! single step along the batch-mean gradient instead.
//!
//! # Quick start
//!
//! ```rust
//! use mlp_layers::{Activation, AnyLayer, Bias, FullyConnected, Layer, ReLU, Tensor};
//!
//! # fn main() -> mlp_layers::Result<()> {
//! let mut net: Vec<AnyLayer> = vec![
//!     FullyConnected::new_with_seed(2, 4, Activation::ReLU, Bias::Enabled, 0)?.into(),
//!     ReLU::new().into(),
//!     FullyConnected::new_with_seed(4, 1, Activation::Identity, Bias::Enabled, 1)?.into(),
//! ];
//!
//! let x = Tensor::from_rows(&[[0.0_f32, 1.0], [1.0, 0.0]])?;
//! let target = [1.0_f32, 1.0];
//!
//! let mut y = x.clone();
//! for layer in &mut net {
//!     y = layer.forward(&y);
//! }
//!
//! // Mean squared error gradient.
//! let n = target.len() as f32;
//! let grad: Vec<f32> = y.as_slice().iter().zip(target).map(|(p, t)| 2.0 * (p - t) / n).collect();
//! let mut grad = Tensor::from_flat(grad, 1)?;
//! for layer in net.iter_mut().rev() {
//!     grad = layer.backward(&grad);
//! }
//! for layer in &mut net {
//!     layer.update(0.01);
//! }
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod dense;
pub mod error;
pub mod init;
pub mod layer;
pub mod norm;
pub mod numeric;
pub mod optim;
pub mod select;
pub mod tensor;

pub use activation::{BinaryAct, Linear, ReLU, Sigmoid, SoftMax};
pub use dense::{Bias, FullyConnected};
pub use error::{Error, Result};
pub use init::{Activation, Init};
pub use layer::{AnyLayer, Layer};
pub use norm::{BatchNormalization, CenterNormalization, MeanNormalization};
pub use numeric::Float;
pub use optim::UpdatePolicy;
pub use select::kth_smallest;
pub use tensor::Tensor;
