//! The layer contract.
//!
//! A training step drives every layer through the same three calls:
//!
//! 1. `forward(input)` on each layer in order; a layer may cache what its
//!    backward pass needs.
//! 2. `backward(grad_output)` on each layer in reverse order, with a gradient shaped
//!    exactly like the matching forward output (same batch order).
//! 3. `update(lr)` on each layer, applying the parameter gradients recorded by the
//!    last `backward`.
//!
//! Shape mismatches and `backward` before `forward` are programmer errors and panic.
//! A layer is not reentrant: its cache is plain instance state, hence `&mut self`.

use crate::{
    BatchNormalization, BinaryAct, CenterNormalization, Float, FullyConnected, Linear,
    MeanNormalization, ReLU, Sigmoid, SoftMax, Tensor,
};

pub trait Layer {
    /// Compute the layer output for a batch, caching backward state.
    fn forward(&mut self, input: &Tensor) -> Tensor;

    /// Gradient with respect to the last forward input.
    ///
    /// Records parameter gradients for the next [`Layer::update`].
    fn backward(&mut self, grad_output: &Tensor) -> Tensor;

    /// Gradient-descent step on learned parameters. No-op for parameter-free layers.
    fn update(&mut self, lr: Float);
}

/// Closed set of layers, dispatched by `match`.
#[derive(Debug, Clone)]
pub enum AnyLayer {
    Linear(Linear),
    Sigmoid(Sigmoid),
    SoftMax(SoftMax),
    ReLU(ReLU),
    BinaryAct(BinaryAct),
    FullyConnected(FullyConnected),
    BatchNormalization(BatchNormalization),
    MeanNormalization(MeanNormalization),
    CenterNormalization(CenterNormalization),
}

impl AnyLayer {
    pub fn name(&self) -> &'static str {
        match self {
            AnyLayer::Linear(_) => "linear",
            AnyLayer::Sigmoid(_) => "sigmoid",
            AnyLayer::SoftMax(_) => "softmax",
            AnyLayer::ReLU(_) => "relu",
            AnyLayer::BinaryAct(_) => "binary_act",
            AnyLayer::FullyConnected(_) => "fully_connected",
            AnyLayer::BatchNormalization(_) => "batch_normalization",
            AnyLayer::MeanNormalization(_) => "mean_normalization",
            AnyLayer::CenterNormalization(_) => "center_normalization",
        }
    }

    /// Returns true if `update` can change this layer.
    pub fn has_parameters(&self) -> bool {
        matches!(
            self,
            AnyLayer::FullyConnected(_) | AnyLayer::BatchNormalization(_)
        )
    }
}

impl Layer for AnyLayer {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        match self {
            AnyLayer::Linear(l) => l.forward(input),
            AnyLayer::Sigmoid(l) => l.forward(input),
            AnyLayer::SoftMax(l) => l.forward(input),
            AnyLayer::ReLU(l) => l.forward(input),
            AnyLayer::BinaryAct(l) => l.forward(input),
            AnyLayer::FullyConnected(l) => l.forward(input),
            AnyLayer::BatchNormalization(l) => l.forward(input),
            AnyLayer::MeanNormalization(l) => l.forward(input),
            AnyLayer::CenterNormalization(l) => l.forward(input),
        }
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        match self {
            AnyLayer::Linear(l) => l.backward(grad_output),
            AnyLayer::Sigmoid(l) => l.backward(grad_output),
            AnyLayer::SoftMax(l) => l.backward(grad_output),
            AnyLayer::ReLU(l) => l.backward(grad_output),
            AnyLayer::BinaryAct(l) => l.backward(grad_output),
            AnyLayer::FullyConnected(l) => l.backward(grad_output),
            AnyLayer::BatchNormalization(l) => l.backward(grad_output),
            AnyLayer::MeanNormalization(l) => l.backward(grad_output),
            AnyLayer::CenterNormalization(l) => l.backward(grad_output),
        }
    }

    fn update(&mut self, lr: Float) {
        match self {
            AnyLayer::Linear(l) => l.update(lr),
            AnyLayer::Sigmoid(l) => l.update(lr),
            AnyLayer::SoftMax(l) => l.update(lr),
            AnyLayer::ReLU(l) => l.update(lr),
            AnyLayer::BinaryAct(l) => l.update(lr),
            AnyLayer::FullyConnected(l) => l.update(lr),
            AnyLayer::BatchNormalization(l) => l.update(lr),
            AnyLayer::MeanNormalization(l) => l.update(lr),
            AnyLayer::CenterNormalization(l) => l.update(lr),
        }
    }
}

macro_rules! impl_from_layer {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for AnyLayer {
                #[inline]
                fn from(layer: $variant) -> Self {
                    AnyLayer::$variant(layer)
                }
            }
        )*
    };
}

impl_from_layer!(
    Linear,
    Sigmoid,
    SoftMax,
    ReLU,
    BinaryAct,
    FullyConnected,
    BatchNormalization,
    MeanNormalization,
    CenterNormalization,
);
