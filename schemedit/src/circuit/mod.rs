//! Circuit model
//!
//! Types, per-type capabilities and the store that keeps them consistent.

pub mod circuit;
pub mod kinds;
pub mod schema;

pub use circuit::{Circuit, CircuitMetadata};
pub use kinds::{Body, TypeInfo};
pub use schema::*;
