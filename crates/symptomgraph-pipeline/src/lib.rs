//! Symptom resolution over the UMLS ontology graph.
//!
//! A traversal starts from a disease name, follows the root concept's
//! relations through atom clusters and atoms down to concepts, and keeps the
//! concepts whose primary semantic type marks them as symptoms. Each hop runs
//! as its own task connected by deduplicating channels.

pub mod failure;
pub mod filter;
pub mod pipeline;
pub mod resolver;
mod stages;

pub use failure::{Stage, StageFailure};
pub use filter::SymptomFilter;
pub use pipeline::{SymptomPipeline, TraversalReport, TraversalState};
pub use resolver::EntityResolver;

pub use tokio_util::sync::CancellationToken;
