use symptomgraph_core::{Result, Settings};
use symptomgraph_pipeline::SymptomPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: SymptomPipeline,
}

impl AppState {
    pub fn new(pipeline: SymptomPipeline) -> Self {
        Self { pipeline }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(SymptomPipeline::from_settings(settings)?))
    }
}
