//! Video sources.
//!
//! This module provides concrete `VideoSource` implementations:
//! - Synthetic `stub://` camera (tests, demo)
//! - Still image files (single-frame "camera")
//!
//! Real camera acquisition and device switching live outside this crate; they
//! only need to implement `VideoSource`.

pub mod file;
pub mod synthetic;

pub use file::{FileConfig, FileSource};
pub use synthetic::{SyntheticConfig, SyntheticSource};
