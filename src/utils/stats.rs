//! Summary statistics
use num_traits::real::Real;
use std::iter::{Extend, FromIterator};

/// Online mean and variance calculation using Welford's Algorithm
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct OnlineMeanVariance<T> {
    mean: T,
    squared_residual_sum: T,
    count: u64,
}

impl<T: Real> Default for OnlineMeanVariance<T> {
    fn default() -> Self {
        Self {
            mean: T::zero(),
            squared_residual_sum: T::zero(),
            count: 0,
        }
    }
}

impl<T: Real> OnlineMeanVariance<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accumulated values.
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// The mean of all accumulated values; `None` if there are none.
    pub fn mean(&self) -> Option<T> {
        if self.count == 0 {
            None
        } else {
            Some(self.mean)
        }
    }

    /// The (population) variance of all accumulated values; `None` if there are none.
    pub fn variance(&self) -> Option<T> {
        if self.count == 0 {
            None
        } else {
            Some(self.squared_residual_sum / Self::as_real(self.count))
        }
    }

    /// The (population) standard deviation; `None` if there are no values.
    pub fn stddev(&self) -> Option<T> {
        self.variance().map(Real::sqrt)
    }

    /// Add a new value to the calculation.
    pub fn push(&mut self, value: T) {
        let residual_pre = value - self.mean;
        self.count += 1;
        self.mean = self.mean + residual_pre / Self::as_real(self.count);
        let residual_post = value - self.mean;
        self.squared_residual_sum = self.squared_residual_sum + residual_pre * residual_post;
    }

    fn as_real(count: u64) -> T {
        T::from(count).unwrap_or_else(T::max_value)
    }
}

impl<T: Real> Extend<T> for OnlineMeanVariance<T> {
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in iter {
            self.push(value)
        }
    }
}

impl<T: Real> FromIterator<T> for OnlineMeanVariance<T> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut s = Self::default();
        s.extend(iter);
        s
    }
}

/// Arithmetic mean of a slice; `None` if empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    values.iter().copied().collect::<OnlineMeanVariance<_>>().mean()
}

/// Means of every length-`window` run of consecutive values, in order.
pub fn window_means(values: &[f64], window: usize) -> impl Iterator<Item = f64> + '_ {
    // `windows` panics on a zero size
    values
        .windows(window.max(1))
        .map(|w| w.iter().sum::<f64>() / w.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn collect_f64() {
        let stats: OnlineMeanVariance<f64> = [1.0, 2.0, 3.0, 4.0].into_iter().collect();
        assert!((stats.mean().unwrap() - 2.5).abs() < 1e-8);
        assert!((stats.variance().unwrap() - 1.25).abs() < 1e-8);
        assert_eq!(stats.count(), 4);
    }

    #[test]
    fn empty() {
        let stats = OnlineMeanVariance::<f32>::new();
        assert_eq!(stats.mean(), None);
        assert_eq!(stats.variance(), None);
    }

    #[rstest]
    #[case(&[], None)]
    #[case(&[3.0], Some(3.0))]
    #[case(&[1.0, 2.0, 6.0], Some(3.0))]
    fn mean_of(#[case] values: &[f64], #[case] expected: Option<f64>) {
        assert_eq!(mean(values), expected);
    }

    #[test]
    fn window_means_sliding() {
        let means: Vec<_> = window_means(&[1.0, 3.0, 5.0, 7.0], 2).collect();
        assert_eq!(means, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn window_longer_than_values() {
        assert_eq!(window_means(&[1.0, 2.0], 3).count(), 0);
    }
}
