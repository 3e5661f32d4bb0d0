//! Command line interface module
//!
//! Argument parsing, interactive prompts and the runner that maps each
//! subcommand onto the client engine.

pub mod args;
pub mod prompt;
pub mod runner;

pub use args::{Args, Command, PackageSpec};
pub use runner::Runner;
