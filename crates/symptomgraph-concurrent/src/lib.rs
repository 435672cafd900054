//! Concurrent primitives for the SymptomGraph traversal
//!
//! - `unique`: bounded channel that forwards each key at most once

pub mod unique;

pub use unique::{unique_channel, UniqueChannel, UniqueReceiver};
