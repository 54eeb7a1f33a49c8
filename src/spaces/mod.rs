//! Observation and action spaces
mod boxed;
mod index;
mod indexed_type;

pub use boxed::BoxSpace;
pub use index::IndexSpace;
pub use indexed_type::{Indexed, IndexedTypeSpace};

use crate::logging::Loggable;
use ndarray::Array1;
use rand::distributions::Distribution;
use std::fmt::Debug;

/// A mathematical space
pub trait Space: Debug {
    type Element;

    /// Check if the space contains a particular value
    fn contains(&self, value: &Self::Element) -> bool;

    /// Create a loggable value from an element of the space.
    fn as_loggable(&self, _value: &Self::Element) -> Loggable {
        Loggable::Nothing
    }
}

/// A space from which elements can be sampled uniformly at random.
pub trait SampleSpace: Space + Distribution<<Self as Space>::Element> {}

impl<S: Space + Distribution<<S as Space>::Element>> SampleSpace for S {}

/// A space containing finitely many elements.
pub trait FiniteSpace: Space {
    /// The number of elements in the space.
    fn size(&self) -> usize;

    /// Get the index of an element.
    fn to_index(&self, element: &Self::Element) -> usize;

    /// Try to convert an index to an element.
    ///
    /// If None is returned then the index was invalid.
    fn from_index(&self, index: usize) -> Option<Self::Element>;
}

/// A space whose elements can be represented as real-valued feature vectors.
pub trait FeatureSpace: Space {
    /// Length of the feature vectors.
    fn num_features(&self) -> usize;

    /// Feature vector for an element.
    fn features(&self, element: &Self::Element) -> Array1<f64>;
}

/// One-hot encoding of an element of a finite space.
pub fn one_hot<S: FiniteSpace + ?Sized>(space: &S, element: &S::Element) -> Array1<f64> {
    let mut features = Array1::zeros(space.size());
    features[space.to_index(element)] = 1.0;
    features
}
