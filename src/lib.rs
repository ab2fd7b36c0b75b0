//! imagebot library.
//!
//! Building blocks for orchestrating container-image rebuilds across a
//! dependency graph: the definition store, the affected-set traversal,
//! tag template resolution, Dockerfile pinning, and hook execution.

pub mod build;
pub mod config;
pub mod error;
pub mod graph;
pub mod hook;
pub mod orchestrator;
pub mod process;
pub mod resolve;

pub use build::Builder;
pub use config::{ConfigStore, Dependency, Hook, ImageDefinition, ImageSet};
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
