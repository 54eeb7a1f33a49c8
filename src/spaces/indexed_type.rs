use super::{one_hot, FeatureSpace, FiniteSpace, Space};
use crate::logging::Loggable;
use ndarray::Array1;
use rand::distributions::Distribution;
use rand::Rng;
use std::any;
use std::fmt;
use std::marker::PhantomData;

/// An indexed set of finitely many possiblities.
pub trait Indexed {
    /// The number of possible values this type can represent.
    const SIZE: usize;

    /// Convert into an index.
    fn as_index(&self) -> usize;

    /// Create from an index.
    fn from_index(index: usize) -> Option<Self>
    where
        Self: Sized;
}

/// A space defined over an indexed type.
pub struct IndexedTypeSpace<T: Indexed> {
    element_type: PhantomData<fn() -> T>,
}

impl<T: Indexed> IndexedTypeSpace<T> {
    pub const fn new() -> Self {
        Self {
            element_type: PhantomData,
        }
    }
}

impl<T: Indexed> Default for IndexedTypeSpace<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Indexed> Clone for IndexedTypeSpace<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: Indexed> Copy for IndexedTypeSpace<T> {}

impl<T: Indexed> PartialEq for IndexedTypeSpace<T> {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl<T: Indexed> fmt::Debug for IndexedTypeSpace<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IndexedTypeSpace<{}>", any::type_name::<T>())
    }
}

impl<T: Indexed> Space for IndexedTypeSpace<T> {
    type Element = T;

    fn contains(&self, _element: &Self::Element) -> bool {
        true
    }

    fn as_loggable(&self, element: &Self::Element) -> Loggable {
        Loggable::IndexSample {
            value: T::as_index(element),
            size: T::SIZE,
        }
    }
}

impl<T: Indexed> Distribution<T> for IndexedTypeSpace<T> {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        T::from_index(rng.gen_range(0..T::SIZE))
            .expect("indices below SIZE are valid by the Indexed contract")
    }
}

impl<T: Indexed> FiniteSpace for IndexedTypeSpace<T> {
    fn size(&self) -> usize {
        T::SIZE
    }

    fn to_index(&self, element: &Self::Element) -> usize {
        T::as_index(element)
    }

    fn from_index(&self, index: usize) -> Option<Self::Element> {
        T::from_index(index)
    }
}

impl<T: Indexed> FeatureSpace for IndexedTypeSpace<T> {
    fn num_features(&self) -> usize {
        T::SIZE
    }

    fn features(&self, element: &Self::Element) -> Array1<f64> {
        one_hot(self, element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum Trit {
        Zero,
        One,
        Two,
    }

    impl Indexed for Trit {
        const SIZE: usize = 3;

        fn as_index(&self) -> usize {
            match self {
                Self::Zero => 0,
                Self::One => 1,
                Self::Two => 2,
            }
        }

        fn from_index(index: usize) -> Option<Self> {
            match index {
                0 => Some(Self::Zero),
                1 => Some(Self::One),
                2 => Some(Self::Two),
                _ => None,
            }
        }
    }

    #[test]
    fn index_round_trip() {
        let space: IndexedTypeSpace<Trit> = IndexedTypeSpace::new();
        assert_eq!(space.size(), 3);
        for i in 0..3 {
            let element = space.from_index(i).unwrap();
            assert_eq!(space.to_index(&element), i);
        }
        assert_eq!(space.from_index(3), None);
    }

    #[test]
    fn features() {
        let space: IndexedTypeSpace<Trit> = IndexedTypeSpace::new();
        assert_eq!(space.features(&Trit::Two), ndarray::arr1(&[0.0, 0.0, 1.0]));
    }
}
