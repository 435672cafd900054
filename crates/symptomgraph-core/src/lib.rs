pub mod config;
pub mod error;
pub mod types;

pub use config::{
    CacheSettings, LoggingSettings, PipelineSettings, ServerSettings, Settings, UmlsSettings,
};
pub use error::*;
pub use types::*;
