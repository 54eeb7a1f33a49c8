//! Dense neural networks on `ndarray` with manual back-propagation
mod activation;
pub mod functional;
mod initializers;
mod mlp;
mod optimizers;

pub use activation::Activation;
pub use initializers::{Initializer, VarianceScale};
pub use mlp::{ForwardTrace, Gradients, Linear, Mlp, MlpConfig};
pub use optimizers::{Adam, AdamConfig};
