//! Dexpack Core Library
//!
//! Shared types and pipeline logic for packaging Android test-fixture APKs
//! via the SDK command-line toolchain.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod project;
pub mod signing;

pub use error::{DexpackError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
