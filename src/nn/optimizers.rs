//! Optimizers
use super::{Gradients, Linear, Mlp};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Configuration for the Adam optimizer.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Coefficient for the running average of the gradient
    pub beta1: f64,
    /// Coefficient for the running average of the square of the gradient
    pub beta2: f64,
    /// Weight decay (L2 penalty)
    pub weight_decay: f64,
    /// Term added to the denominator for numerical stability
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            weight_decay: 0.0,
            epsilon: 1e-8,
        }
    }
}

impl AdamConfig {
    pub const fn with_learning_rate(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            weight_decay: 0.0,
            epsilon: 1e-8,
        }
    }

    /// Build an optimizer for the parameters of a network.
    pub fn build(&self, model: &Mlp) -> Adam {
        let zeros = || -> Vec<Linear> {
            model
                .layers()
                .iter()
                .map(|l| Linear::zeros(l.weight.ncols(), l.weight.nrows()))
                .collect()
        };
        Adam {
            config: *self,
            num_steps: 0,
            first_moment: zeros(),
            second_moment: zeros(),
        }
    }
}

/// Adam optimizer (Kingma & Ba 2015)
#[derive(Debug, Clone, PartialEq)]
pub struct Adam {
    config: AdamConfig,
    num_steps: i32,
    first_moment: Vec<Linear>,
    second_moment: Vec<Linear>,
}

impl Adam {
    pub const fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Perform a single optimization step (parameter update) from loss gradients.
    ///
    /// # Panics
    /// If the gradients do not have the shape of the model parameters.
    pub fn step(&mut self, model: &mut Mlp, gradients: &Gradients) {
        self.num_steps = self.num_steps.saturating_add(1);
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            weight_decay,
            epsilon,
        } = self.config;
        let bias_correction1 = 1.0 - beta1.powi(self.num_steps);
        let bias_correction2 = 1.0 - beta2.powi(self.num_steps);

        let update = |param: &mut f64, m: &mut f64, v: &mut f64, &grad: &f64| {
            let grad = grad + weight_decay * *param;
            *m = beta1 * *m + (1.0 - beta1) * grad;
            *v = beta2 * *v + (1.0 - beta2) * grad * grad;
            let m_hat = *m / bias_correction1;
            let v_hat = *v / bias_correction2;
            *param -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
        };

        for (((layer, m), v), g) in model
            .layers_mut()
            .iter_mut()
            .zip(&mut self.first_moment)
            .zip(&mut self.second_moment)
            .zip(&gradients.layers)
        {
            Zip::from(&mut layer.weight)
                .and(&mut m.weight)
                .and(&mut v.weight)
                .and(&g.weight)
                .for_each(update);
            Zip::from(&mut layer.bias)
                .and(&mut m.bias)
                .and(&mut v.bias)
                .and(&g.bias)
                .for_each(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Activation, MlpConfig};
    use super::*;
    use crate::Prng;
    use ndarray::{array, Array2};
    use rand::SeedableRng;

    fn mse(model: &Mlp, input: &Array2<f64>, target: &Array2<f64>) -> f64 {
        (model.forward(input.view()) - target).mapv(|x| x * x).mean().unwrap_or(0.0)
    }

    #[test]
    fn fits_linear_function() {
        let config = MlpConfig {
            hidden_sizes: vec![16],
            activation: Activation::Tanh,
            ..MlpConfig::default()
        };
        let mut model = config.build(2, 1, &mut Prng::seed_from_u64(0));
        let mut optimizer = AdamConfig::with_learning_rate(1e-2).build(&model);
        let input = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.5, -0.5]];
        let target = array![[0.0], [1.0], [-1.0], [0.0], [1.0]];

        let initial_loss = mse(&model, &input, &target);
        for _ in 0..500 {
            let trace = model.forward_trace(input.clone());
            let grad = (trace.output() - &target) * (2.0 / 5.0);
            let grads = model.backward(&trace, grad);
            optimizer.step(&mut model, &grads);
        }
        let final_loss = mse(&model, &input, &target);
        assert!(final_loss < 0.1 * initial_loss, "{} -> {}", initial_loss, final_loss);
    }

    #[test]
    fn first_step_moves_by_learning_rate() {
        let config = MlpConfig {
            hidden_sizes: vec![],
            ..MlpConfig::default()
        };
        let mut model = config.build(1, 1, &mut Prng::seed_from_u64(0));
        let before = model.layers()[0].bias[0];
        let mut optimizer = AdamConfig::with_learning_rate(0.1).build(&model);
        let grads = Gradients {
            layers: vec![Linear {
                weight: array![[0.0]],
                bias: array![3.0],
            }],
        };
        optimizer.step(&mut model, &grads);
        let after = model.layers()[0].bias[0];
        assert!((before - after - 0.1).abs() < 1e-6);
    }
}
