//! Utility functions

pub mod align;
pub mod hash;

pub use align::align_up;
pub use hash::name_hash;
