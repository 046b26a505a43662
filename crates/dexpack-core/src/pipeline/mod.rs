//! Packaging pipeline infrastructure.
//!
//! This module provides the fixed stage sequence, external-tool execution,
//! inter-stage artifact discovery, and the runner that ties them together.

pub mod discovery;
pub mod executor;
pub mod runner;
pub mod stage;

pub use discovery::*;
pub use executor::*;
pub use runner::*;
pub use stage::*;
