//! Core types for stepfile pipeline parsing.
//!
//! This crate contains:
//! - The ordered variable store used for interpolation
//! - The order-preserving document model pipelines decode into

pub mod env;
pub mod error;
pub mod node;

pub use env::Environment;
pub use error::{Error, Result};
pub use node::{Mapping, Node, Number, Scalar};
