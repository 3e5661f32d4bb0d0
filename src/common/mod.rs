//! Common module - shared path and formatting helpers

pub mod utils;

pub use utils::*;
