use thiserror::Error;

#[derive(Error, Debug)]
pub enum SymptomGraphError {
    #[error("Root concept not found: {0}")]
    RootNotFound(String),

    #[error("Remote ontology error: {0}")]
    Remote(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Cache miss: {0}")]
    CacheMiss(String),

    #[error("Cache write error: {0}")]
    CacheWrite(String),

    #[error("Traversal canceled")]
    Canceled,

    #[error("Pipeline stage failed: {0}")]
    Stage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SymptomGraphError {
    /// Only these abort a whole traversal; everything else is isolated to one item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RootNotFound(_) | Self::Canceled)
    }
}

impl From<serde_json::Error> for SymptomGraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SymptomGraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_root_and_cancel_are_fatal() {
        assert!(SymptomGraphError::RootNotFound("x".into()).is_fatal());
        assert!(SymptomGraphError::Canceled.is_fatal());
        assert!(!SymptomGraphError::Remote("503".into()).is_fatal());
        assert!(!SymptomGraphError::Decode("eof".into()).is_fatal());
        assert!(!SymptomGraphError::CacheMiss("k".into()).is_fatal());
        assert!(!SymptomGraphError::CacheWrite("k".into()).is_fatal());
    }

    #[test]
    fn json_errors_become_decode_errors() {
        let err: SymptomGraphError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, SymptomGraphError::Decode(_)));
    }
}
