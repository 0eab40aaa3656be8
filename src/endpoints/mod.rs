//! Sample endpoints.
//!
//! Each handler opens its own span and runs its steps as instrumented
//! operations, so a request produces `request → end* → step` span trees.

pub mod numeric;
pub mod text;

pub use numeric::{end1, NumericResponse};
pub use text::{end2, TextQuery, TextResponse};
