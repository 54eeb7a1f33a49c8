use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Activation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// No transformation
    Identity,
    /// Rectified linear
    Relu,
    /// Sigmoid function
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Relu
    }
}

impl Activation {
    /// Apply this activation function elementwise.
    pub fn apply(self, mut input: Array2<f64>) -> Array2<f64> {
        match self {
            Self::Identity => {}
            Self::Relu => input.mapv_inplace(|x| x.max(0.0)),
            Self::Sigmoid => input.mapv_inplace(|x| 1.0 / (1.0 + (-x).exp())),
            Self::Tanh => input.mapv_inplace(f64::tanh),
        }
        input
    }

    /// Gradient with respect to the activation input.
    ///
    /// # Args
    /// * `output` - The activation output (all derivatives are functions of it).
    /// * `grad` - Gradient with respect to the activation output.
    pub fn backward(self, output: &Array2<f64>, mut grad: Array2<f64>) -> Array2<f64> {
        match self {
            Self::Identity => {}
            Self::Relu => Zip::from(&mut grad).and(output).for_each(|g, &y| {
                if y <= 0.0 {
                    *g = 0.0
                }
            }),
            Self::Sigmoid => Zip::from(&mut grad)
                .and(output)
                .for_each(|g, &y| *g *= y * (1.0 - y)),
            Self::Tanh => Zip::from(&mut grad)
                .and(output)
                .for_each(|g, &y| *g *= 1.0 - y * y),
        }
        grad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rstest::rstest;

    #[rstest]
    #[case::identity(Activation::Identity)]
    #[case::relu(Activation::Relu)]
    #[case::sigmoid(Activation::Sigmoid)]
    #[case::tanh(Activation::Tanh)]
    fn backward_matches_finite_difference(#[case] activation: Activation) {
        let x = array![[-1.5, -0.3, 0.4, 2.0]];
        let eps = 1e-6;
        let output = activation.apply(x.clone());
        let grad = activation.backward(&output, Array2::ones(x.raw_dim()));
        let numeric = (activation.apply(&x + eps) - activation.apply(&x - eps)) / (2.0 * eps);
        for (a, n) in grad.iter().zip(&numeric) {
            assert!((a - n).abs() < 1e-5, "{} != {}", a, n);
        }
    }

    #[test]
    fn relu_clips_negative() {
        assert_eq!(
            Activation::Relu.apply(array![[-1.0, 0.5]]),
            array![[0.0, 0.5]]
        );
    }
}
