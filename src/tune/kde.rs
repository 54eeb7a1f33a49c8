//! Multivariate kernel density estimation over mixed continuous and categorical data
use crate::utils::stats::OnlineMeanVariance;
use std::f64::consts::PI;

/// Variable type of one dimension.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VarType {
    /// Real value; Gaussian kernel.
    Continuous,
    /// Category index in `0 .. num_choices`; Aitchison-Aitken kernel.
    Unordered { num_choices: usize },
}

/// Product-kernel density estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateKde {
    data: Vec<Vec<f64>>,
    var_types: Vec<VarType>,
    bandwidths: Vec<f64>,
}

impl MultivariateKde {
    /// Fit to data with normal-reference (Scott's rule) bandwidths.
    ///
    /// Bandwidths are at least `min_bandwidth`.
    /// Categorical bandwidths are at most `(c - 1) / c` for `c` categories.
    ///
    /// Returns `None` if there is no data.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(data: Vec<Vec<f64>>, var_types: Vec<VarType>, min_bandwidth: f64) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        let num_dims = var_types.len();
        let scale = 1.06 * (data.len() as f64).powf(-1.0 / (4.0 + num_dims as f64));
        let bandwidths = var_types
            .iter()
            .enumerate()
            .map(|(d, var_type)| {
                let stddev = data
                    .iter()
                    .map(|x| x[d])
                    .collect::<OnlineMeanVariance<f64>>()
                    .stddev()
                    .unwrap_or(0.0);
                let bandwidth = (scale * stddev).max(min_bandwidth);
                match *var_type {
                    VarType::Continuous => bandwidth,
                    VarType::Unordered { num_choices } => {
                        let max = (num_choices.saturating_sub(1)) as f64 / num_choices.max(1) as f64;
                        bandwidth.min(max.max(min_bandwidth))
                    }
                }
            })
            .collect();
        Some(Self {
            data,
            var_types,
            bandwidths,
        })
    }

    pub fn data(&self) -> &[Vec<f64>] {
        &self.data
    }

    pub fn bandwidths(&self) -> &[f64] {
        &self.bandwidths
    }

    pub fn var_types(&self) -> &[VarType] {
        &self.var_types
    }

    /// Density at a point.
    #[allow(clippy::cast_precision_loss)]
    pub fn pdf(&self, x: &[f64]) -> f64 {
        let total: f64 = self
            .data
            .iter()
            .map(|datum| {
                self.var_types
                    .iter()
                    .zip(&self.bandwidths)
                    .zip(x.iter().zip(datum))
                    .map(|((var_type, &bw), (&xd, &md))| kernel(*var_type, bw, xd, md))
                    .product::<f64>()
            })
            .sum();
        total / self.data.len() as f64
    }
}

#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
fn kernel(var_type: VarType, bandwidth: f64, x: f64, center: f64) -> f64 {
    match var_type {
        VarType::Continuous => {
            let z = (x - center) / bandwidth;
            (-0.5 * z * z).exp() / ((2.0 * PI).sqrt() * bandwidth)
        }
        VarType::Unordered { num_choices } => {
            if num_choices <= 1 {
                1.0
            } else if x.round() == center.round() {
                1.0 - bandwidth
            } else {
                bandwidth / (num_choices - 1) as f64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_data() {
        assert_eq!(MultivariateKde::new(vec![], vec![VarType::Continuous], 1e-3), None);
    }

    #[test]
    fn scott_bandwidth() {
        // Population stddev 0.5, n = 2, d = 1
        let kde = MultivariateKde::new(vec![vec![0.0], vec![1.0]], vec![VarType::Continuous], 1e-3)
            .unwrap();
        let expected = 1.06 * 0.5 * 2.0_f64.powf(-0.2);
        assert!((kde.bandwidths()[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn min_bandwidth() {
        let kde = MultivariateKde::new(
            vec![vec![0.3, 1.0]; 5],
            vec![VarType::Continuous, VarType::Unordered { num_choices: 3 }],
            1e-3,
        )
        .unwrap();
        assert_eq!(kde.bandwidths(), &[1e-3, 1e-3]);
    }

    #[test]
    fn gaussian_integrates_to_one() {
        let kde = MultivariateKde::new(
            vec![vec![0.2], vec![0.5], vec![0.6]],
            vec![VarType::Continuous],
            1e-3,
        )
        .unwrap();
        let step = 1e-3;
        let total: f64 = (-3000..4000).map(|i| kde.pdf(&[f64::from(i) * step]) * step).sum();
        assert!((total - 1.0).abs() < 1e-3, "{}", total);
    }

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(5)]
    fn categorical_sums_to_one(#[case] num_choices: usize) {
        let kde = MultivariateKde::new(
            vec![vec![0.0], vec![1.0], vec![1.0]],
            vec![VarType::Unordered { num_choices }],
            1e-3,
        )
        .unwrap();
        let total: f64 = (0..num_choices).map(|i| kde.pdf(&[i as f64])).sum();
        assert!((total - 1.0).abs() < 1e-12, "{}", total);
        assert!(kde.pdf(&[1.0]) > kde.pdf(&[0.0]));
    }

    #[test]
    fn density_peaks_near_data() {
        let kde = MultivariateKde::new(
            vec![vec![0.1, 0.0], vec![0.15, 0.0], vec![0.9, 1.0]],
            vec![VarType::Continuous, VarType::Unordered { num_choices: 2 }],
            1e-3,
        )
        .unwrap();
        assert!(kde.pdf(&[0.12, 0.0]) > kde.pdf(&[0.5, 0.0]));
        assert!(kde.pdf(&[0.12, 0.0]) > kde.pdf(&[0.12, 1.0]));
    }
}
