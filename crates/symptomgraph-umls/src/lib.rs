pub mod client;
pub mod source;

pub use client::UmlsClient;
pub use source::OntologySource;
