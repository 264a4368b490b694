//! Common types, errors, and utilities for MonBench services.

pub mod error;
pub mod types;

pub use error::{BenchError, BenchResult};
pub use types::*;
