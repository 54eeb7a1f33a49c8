//! Value functions used by agents
use crate::nn::{functional, Adam, AdamConfig, Mlp, MlpConfig};
use crate::Prng;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Configuration for [`NullValueFunction`]. Has no parameters.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NullValueFunctionConfig {}

/// Value function that estimates zero for everything.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NullValueFunction;

impl NullValueFunction {
    pub const fn state_value<O>(&self, _observation: &O) -> f64 {
        0.0
    }
}

/// Configuration for [`DeepQNetwork`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepQNetworkConfig {
    /// Action-value network; maps observation features to one value per action.
    pub network: MlpConfig,
    pub optimizer: AdamConfig,
    /// Residuals larger than this are penalized linearly instead of quadratically.
    pub huber_delta: f64,
}

impl Default for DeepQNetworkConfig {
    fn default() -> Self {
        Self {
            network: MlpConfig::default(),
            optimizer: AdamConfig::default(),
            huber_delta: 1.0,
        }
    }
}

impl DeepQNetworkConfig {
    pub fn build(&self, num_features: usize, num_actions: usize, rng: &mut Prng) -> DeepQNetwork {
        let network = self.network.build(num_features, num_actions, rng);
        let optimizer = self.optimizer.build(&network);
        DeepQNetwork {
            target_network: network.clone(),
            network,
            optimizer,
            huber_delta: self.huber_delta,
        }
    }
}

/// Action-value network with a periodically synchronized target copy.
#[derive(Debug, Clone, PartialEq)]
pub struct DeepQNetwork {
    network: Mlp,
    target_network: Mlp,
    optimizer: Adam,
    huber_delta: f64,
}

impl DeepQNetwork {
    /// Estimated value of each action given observation features.
    pub fn action_values(&self, features: ArrayView1<f64>) -> Array1<f64> {
        self.network.forward_one(features)
    }

    /// Maximum action value of each row of `features` according to the target network.
    pub fn target_max_values(&self, features: ArrayView2<f64>) -> Array1<f64> {
        self.target_network
            .forward(features)
            .map_axis(Axis(1), |row| row.fold(f64::NEG_INFINITY, |m, &x| m.max(x)))
    }

    /// One optimization step towards `targets` for the taken `actions`.
    ///
    /// Returns the mean Huber loss before the step.
    #[allow(clippy::cast_precision_loss)]
    pub fn train(&mut self, features: Array2<f64>, actions: &[usize], targets: ArrayView1<f64>) -> f64 {
        let batch_size = actions.len().max(1) as f64;
        let trace = self.network.forward_trace(features);
        let mut output_grad = Array2::zeros(trace.output().raw_dim());
        let mut loss = 0.0;
        for (i, (&action, &target)) in actions.iter().zip(targets).enumerate() {
            let residual = trace.output()[[i, action]] - target;
            loss += functional::huber(residual, self.huber_delta);
            output_grad[[i, action]] = functional::huber_grad(residual, self.huber_delta) / batch_size;
        }
        let gradients = self.network.backward(&trace, output_grad);
        self.optimizer.step(&mut self.network, &gradients);
        loss / batch_size
    }

    /// Copy the current network parameters into the target network.
    pub fn sync_target(&mut self) {
        self.target_network.clone_from(&self.network);
    }
}
