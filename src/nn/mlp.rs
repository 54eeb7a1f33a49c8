//! Multi-layer perceptron
use super::{Activation, Initializer};
use crate::Prng;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::iter;

/// Configuration for the [`Mlp`] module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    /// Sizes of the hidden layers
    pub hidden_sizes: Vec<usize>,
    /// Activation function between hidden layers.
    pub activation: Activation,
    /// Activation function on the output.
    pub output_activation: Activation,
    /// Weight initializer; biases start at zero.
    pub initializer: Initializer,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![64, 64],
            activation: Activation::Relu,
            output_activation: Activation::Identity,
            initializer: Initializer::default(),
        }
    }
}

impl MlpConfig {
    pub fn build(&self, in_dim: usize, out_dim: usize, rng: &mut Prng) -> Mlp {
        Mlp::new(in_dim, out_dim, self, rng)
    }
}

/// Fully-connected linear layer `y = x W^T + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    /// `(out_dim, in_dim)` weight matrix.
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

impl Linear {
    pub fn zeros(in_dim: usize, out_dim: usize) -> Self {
        Self {
            weight: Array2::zeros((out_dim, in_dim)),
            bias: Array1::zeros(out_dim),
        }
    }

    fn forward(&self, input: ArrayView2<f64>) -> Array2<f64> {
        input.dot(&self.weight.t()) + &self.bias
    }
}

/// Multi-layer perceptron
#[derive(Debug, Clone, PartialEq)]
pub struct Mlp {
    layers: Vec<Linear>,
    activation: Activation,
    output_activation: Activation,
}

/// Intermediate values of a forward pass, needed for [`Mlp::backward`].
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardTrace {
    /// Input to each layer; `layer_inputs[0]` is the network input.
    layer_inputs: Vec<Array2<f64>>,
    output: Array2<f64>,
}

impl ForwardTrace {
    /// The `(batch, out_dim)` network output.
    pub const fn output(&self) -> &Array2<f64> {
        &self.output
    }
}

/// Parameter gradients of an [`Mlp`], one entry per layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub layers: Vec<Linear>,
}

impl Gradients {
    /// Squared L2 norm of all gradients.
    pub fn norm_squared(&self) -> f64 {
        self.layers
            .iter()
            .map(|g| g.weight.mapv(|x| x * x).sum() + g.bias.mapv(|x| x * x).sum())
            .sum()
    }
}

impl Mlp {
    pub fn new(in_dim: usize, out_dim: usize, config: &MlpConfig, rng: &mut Prng) -> Self {
        let in_dims = iter::once(&in_dim).chain(&config.hidden_sizes);
        let out_dims = config.hidden_sizes.iter().chain(iter::once(&out_dim));
        let layers = in_dims
            .zip(out_dims)
            .map(|(&in_, &out_)| Linear {
                weight: config.initializer.weights(in_, out_, rng),
                bias: Array1::zeros(out_),
            })
            .collect();
        Self {
            layers,
            activation: config.activation,
            output_activation: config.output_activation,
        }
    }

    pub fn in_dim(&self) -> usize {
        self.layers.first().map_or(0, |l| l.weight.ncols())
    }

    pub fn out_dim(&self) -> usize {
        self.layers.last().map_or(0, |l| l.weight.nrows())
    }

    pub fn layers(&self) -> &[Linear] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Linear] {
        &mut self.layers
    }

    /// Batched forward pass: `(batch, in_dim)` to `(batch, out_dim)`.
    pub fn forward(&self, input: ArrayView2<f64>) -> Array2<f64> {
        let mut hidden = input.to_owned();
        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            hidden = layer.forward(hidden.view());
            hidden = if i == last {
                self.output_activation.apply(hidden)
            } else {
                self.activation.apply(hidden)
            };
        }
        hidden
    }

    /// Forward pass on a single input vector.
    pub fn forward_one(&self, input: ArrayView1<f64>) -> Array1<f64> {
        self.forward(input.insert_axis(Axis(0)))
            .index_axis_move(Axis(0), 0)
    }

    /// Batched forward pass recording what [`Mlp::backward`] needs.
    pub fn forward_trace(&self, input: Array2<f64>) -> ForwardTrace {
        let mut layer_inputs = Vec::with_capacity(self.layers.len());
        let mut hidden = input;
        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            let pre_activation = layer.forward(hidden.view());
            layer_inputs.push(hidden);
            hidden = if i == last {
                self.output_activation.apply(pre_activation)
            } else {
                self.activation.apply(pre_activation)
            };
        }
        ForwardTrace {
            layer_inputs,
            output: hidden,
        }
    }

    /// Back-propagate the gradient of a loss with respect to the network output.
    ///
    /// # Args
    /// * `trace` - Trace of the forward pass that produced the output.
    /// * `output_grad` - `(batch, out_dim)` gradient of the loss with respect to the output.
    pub fn backward(&self, trace: &ForwardTrace, output_grad: Array2<f64>) -> Gradients {
        let mut grad = self.output_activation.backward(&trace.output, output_grad);
        let mut layer_grads = Vec::with_capacity(self.layers.len());
        for (i, (layer, input)) in self.layers.iter().zip(&trace.layer_inputs).enumerate().rev() {
            layer_grads.push(Linear {
                weight: grad.t().dot(input),
                bias: grad.sum_axis(Axis(0)),
            });
            if i > 0 {
                // Inputs of every layer after the first are hidden activations
                grad = self.activation.backward(input, grad.dot(&layer.weight));
            }
        }
        layer_grads.reverse();
        Gradients {
            layers: layer_grads,
        }
    }
}
