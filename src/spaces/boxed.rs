use super::{FeatureSpace, Space};
use ndarray::Array1;
use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A box of fixed-length real vectors; the product of `N` closed intervals.
///
/// Interval bounds may be infinite.
/// Feature vectors are the raw element values.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace<const N: usize> {
    #[serde(with = "array_vec")]
    pub low: [f64; N],
    #[serde(with = "array_vec")]
    pub high: [f64; N],
}

impl<const N: usize> BoxSpace<N> {
    pub fn new(low: [f64; N], high: [f64; N]) -> Self {
        assert!(
            low.iter().zip(&high).all(|(l, h)| l <= h),
            "lower bounds must not exceed upper bounds"
        );
        Self { low, high }
    }

    /// Box with no bounds in any dimension.
    pub const fn unbounded() -> Self {
        Self {
            low: [f64::NEG_INFINITY; N],
            high: [f64::INFINITY; N],
        }
    }
}

impl<const N: usize> fmt::Display for BoxSpace<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BoxSpace({:?}, {:?})", self.low, self.high)
    }
}

impl<const N: usize> Space for BoxSpace<N> {
    type Element = [f64; N];

    fn contains(&self, value: &Self::Element) -> bool {
        value
            .iter()
            .zip(self.low.iter().zip(&self.high))
            .all(|(x, (l, h))| l <= x && x <= h)
    }
}

impl<const N: usize> FeatureSpace for BoxSpace<N> {
    fn num_features(&self) -> usize {
        N
    }

    fn features(&self, element: &Self::Element) -> Array1<f64> {
        Array1::from(element.to_vec())
    }
}

/// Samples uniformly within the bounds.
/// A dimension with an unbounded side samples within distance 1 of its finite side,
/// or from `[-1, 1)` if both sides are unbounded.
impl<const N: usize> Distribution<[f64; N]> for BoxSpace<N> {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; N] {
        let mut out = [0.0; N];
        for (x, (&l, &h)) in out.iter_mut().zip(self.low.iter().zip(&self.high)) {
            *x = match (l.is_finite(), h.is_finite()) {
                (true, true) if l < h => rng.gen_range(l..=h),
                (true, true) => l,
                (true, false) => l + rng.gen::<f64>(),
                (false, true) => h - rng.gen::<f64>(),
                (false, false) => rng.gen_range(-1.0..1.0),
            };
        }
        out
    }
}

mod array_vec {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        value: &[f64; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[f64; N], D::Error> {
        let values = Vec::<f64>::deserialize(deserializer)?;
        let len = values.len();
        values
            .try_into()
            .map_err(|_| de::Error::invalid_length(len, &"array of box bounds"))
    }
}
