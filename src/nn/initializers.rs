//! Parameter initializers
use crate::Prng;
use ndarray::Array2;
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Weight matrix initializers.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initializer {
    /// Initialize to all zeros
    Zeros,
    /// Uniform distribution with variance scaled by the matrix dimensions.
    Uniform(VarianceScale),
}

/// Defaults to `Uniform(FanAvg)` a.k.a. Glorot or Xavier initialization.
///
/// This samples from `Unif(±√(6 / (fan_in + fan_out)))`.
impl Default for Initializer {
    fn default() -> Self {
        Self::Uniform(VarianceScale::FanAvg)
    }
}

/// Variance scaling mode.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceScale {
    /// The sampling variance is set to the given constant.
    Constant(f64),
    /// The sampling variance is set to `1 / fan_in`.
    ///
    /// Also known as Kaiming or He initialization.
    FanIn,
    /// The sampling variance is set to `1 / fan_out`.
    FanOut,
    /// The sampling variance is set to `2 / (fan_in + fan_out)`.
    ///
    /// Also known as Xavier or Glorot initialization.
    FanAvg,
}

impl VarianceScale {
    fn variance(self, fan_in: usize, fan_out: usize) -> f64 {
        match self {
            Self::Constant(v) => v,
            Self::FanIn => 1.0 / fan_in.max(1) as f64,
            Self::FanOut => 1.0 / fan_out.max(1) as f64,
            Self::FanAvg => 2.0 / (fan_in + fan_out).max(1) as f64,
        }
    }
}

impl Initializer {
    /// Initialize a `(fan_out, fan_in)` weight matrix.
    pub fn weights(self, fan_in: usize, fan_out: usize, rng: &mut Prng) -> Array2<f64> {
        match self {
            Self::Zeros => Array2::zeros((fan_out, fan_in)),
            Self::Uniform(scale) => {
                // Uniform(-b, b) has variance b^2 / 3
                let bound = (3.0 * scale.variance(fan_in, fan_out)).sqrt();
                if bound > 0.0 {
                    let dist = Uniform::new_inclusive(-bound, bound);
                    Array2::from_shape_simple_fn((fan_out, fan_in), || dist.sample(rng))
                } else {
                    Array2::zeros((fan_out, fan_in))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn glorot_bounds() {
        let mut rng = Prng::seed_from_u64(0);
        let w = Initializer::default().weights(4, 2, &mut rng);
        assert_eq!(w.dim(), (2, 4));
        let bound = 1.0;
        assert!(w.iter().all(|x| x.abs() <= bound));
        assert!(w.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn zeros() {
        let mut rng = Prng::seed_from_u64(0);
        let w = Initializer::Zeros.weights(3, 3, &mut rng);
        assert!(w.iter().all(|&x| x == 0.0));
    }
}
