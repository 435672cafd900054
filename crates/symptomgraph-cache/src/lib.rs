pub mod cache;
pub mod memory;

pub use cache::*;
pub use memory::*;

// Re-export common types for convenience
pub use symptomgraph_core::{Result, SymptomGraphError};
