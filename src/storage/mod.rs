//! Storage for exported files.
//!
//! Both exports write through staging areas so a failed or cancelled run
//! never leaves a half-written site behind.

pub mod local;

// Re-export for convenience
pub use local::{StagedAssets, StagedDir};
