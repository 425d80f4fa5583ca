//! File format handlers

pub mod geom;

// Re-export main document types
pub use geom::{GeomDocument, ParameterDictionary};
