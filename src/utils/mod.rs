//! General-purpose utilities
pub mod stats;
