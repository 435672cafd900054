use std::fmt;
use symptomgraph_core::SymptomGraphError;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

/// Pipeline stage a per-item failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Relations,
    Classify,
    ClusterExpansion,
    ConceptResolution,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Relations => "relations",
            Stage::Classify => "classify",
            Stage::ClusterExpansion => "cluster-expansion",
            Stage::ConceptResolution => "concept-resolution",
        };
        write!(f, "{}", s)
    }
}

/// An error isolated to one item; the item is skipped and the stage keeps going.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: SymptomGraphError,
}

/// Logs failures until every stage has dropped its sender. Returns how many were seen.
pub(crate) async fn drain_failures(mut failures: UnboundedReceiver<StageFailure>) -> usize {
    let mut count = 0;
    while let Some(failure) = failures.recv().await {
        count += 1;
        warn!(stage = %failure.stage, "skipping item: {}", failure.error);
    }
    count
}
