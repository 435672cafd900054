use std::sync::Arc;
use symptomgraph_cache::EntityCache;
use symptomgraph_concurrent::unique_channel;
use symptomgraph_core::{Concept, Result, RootConcept, Settings, SymptomGraphError};
use symptomgraph_umls::{OntologySource, UmlsClient};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::failure::drain_failures;
use crate::filter::SymptomFilter;
use crate::resolver::EntityResolver;
use crate::stages::{
    classify_stage, cluster_stage, collect_symptoms, concept_stage, relation_stage, transition,
    StageContext,
};

const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Lifecycle of a single traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
    Idle,
    RootResolving,
    Streaming,
    Completed,
    Canceled,
    RootNotFound,
}

impl TraversalState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TraversalState::Completed | TraversalState::Canceled | TraversalState::RootNotFound
        )
    }
}

/// Outcome of a traversal that ran to completion.
#[derive(Debug, Clone)]
pub struct TraversalReport {
    pub traversal_id: Uuid,
    pub root: RootConcept,
    pub symptoms: Vec<Concept>,
    /// Items skipped because of per-item errors.
    pub failures: usize,
    pub state: TraversalState,
}

/// Resolves the symptom concepts reachable from a disease name.
///
/// Every call to [`SymptomPipeline::traverse`] builds its own channels and
/// stage tasks; the pipeline itself only holds the shared resolver, so one
/// instance can serve concurrent traversals.
#[derive(Clone)]
pub struct SymptomPipeline {
    resolver: EntityResolver,
    filter: SymptomFilter,
    channel_capacity: usize,
}

impl SymptomPipeline {
    pub fn new(source: Arc<dyn OntologySource>, cache: EntityCache) -> Self {
        Self {
            resolver: EntityResolver::new(source, cache),
            filter: SymptomFilter::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = UmlsClient::new(&settings.umls)?;
        Ok(Self::new(Arc::new(client), EntityCache::from_settings(&settings.cache))
            .with_filter(SymptomFilter::new(
                settings.pipeline.symptom_semantic_type.clone(),
            ))
            .with_channel_capacity(settings.pipeline.channel_capacity))
    }

    pub fn with_filter(mut self, filter: SymptomFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn cache(&self) -> &EntityCache {
        self.resolver.cache()
    }

    /// Symptom concepts of the disease called `name`.
    ///
    /// Fails with `RootNotFound` when the name does not resolve and with
    /// `Canceled` when `cancel` fires first. Per-item errors only shrink the result.
    pub async fn traverse(&self, name: &str, cancel: &CancellationToken) -> Result<Vec<Concept>> {
        self.traverse_with_report(name, cancel)
            .await
            .map(|report| report.symptoms)
    }

    pub async fn traverse_with_report(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<TraversalReport> {
        let traversal_id = Uuid::new_v4();
        let span = info_span!("traverse", root = %name, id = %traversal_id);
        self.run(name.to_string(), cancel.child_token(), traversal_id)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        name: String,
        token: CancellationToken,
        traversal_id: Uuid,
    ) -> Result<TraversalReport> {
        // dropping this future cancels every stage
        let _guard = token.clone().drop_guard();

        let (state_tx, _state_rx) = watch::channel(TraversalState::Idle);
        let state = Arc::new(state_tx);
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        let ctx = StageContext::new(self.resolver.clone(), token.clone(), failure_tx);

        let (relation_tx, relation_rx) = unique_channel(self.channel_capacity);
        let (cluster_tx, cluster_rx) = unique_channel(self.channel_capacity);
        let (atom_tx, atom_rx) = unique_channel(self.channel_capacity);
        let (concept_tx, concept_rx) = unique_channel(self.channel_capacity);

        // atom and concept channels each get one producer handle per feeding stage;
        // they close only once both handles are gone
        let drain = tokio::spawn(drain_failures(failure_rx).in_current_span());
        let relations = tokio::spawn(
            relation_stage(ctx.clone(), name, state.clone(), relation_tx).in_current_span(),
        );
        let classify = tokio::spawn(
            classify_stage(
                ctx.clone(),
                relation_rx,
                cluster_tx,
                atom_tx.clone(),
                concept_tx.clone(),
            )
            .in_current_span(),
        );
        let expand = tokio::spawn(cluster_stage(ctx.clone(), cluster_rx, atom_tx).in_current_span());
        let resolve =
            tokio::spawn(concept_stage(ctx.clone(), atom_rx, concept_tx).in_current_span());
        let mut collector = tokio::spawn(
            collect_symptoms(token.clone(), concept_rx, self.filter.clone()).in_current_span(),
        );
        drop(ctx);

        let collected = tokio::select! {
            joined = &mut collector => Some(joined),
            _ = token.cancelled() => None,
        };

        let Some(collected) = collected else {
            let _ = tokio::join!(relations, classify, expand, resolve, collector, drain);
            transition(&state, TraversalState::Canceled);
            info!("traversal canceled");
            return Err(SymptomGraphError::Canceled);
        };

        let symptoms = collected.map_err(stage_error)?;
        let root = relations.await.map_err(stage_error)?;
        classify.await.map_err(stage_error)?;
        expand.await.map_err(stage_error)?;
        resolve.await.map_err(stage_error)?;
        let failures = drain.await.map_err(stage_error)?;

        let root = match root {
            Ok(root) => root,
            Err(SymptomGraphError::RootNotFound(msg)) => {
                transition(&state, TraversalState::RootNotFound);
                warn!("root concept not found: {}", msg);
                return Err(SymptomGraphError::RootNotFound(msg));
            }
            Err(e) => {
                transition(&state, TraversalState::Canceled);
                return Err(e);
            }
        };

        if token.is_cancelled() {
            transition(&state, TraversalState::Canceled);
            info!("traversal canceled");
            return Err(SymptomGraphError::Canceled);
        }

        transition(&state, TraversalState::Completed);
        info!(
            "resolved {} symptoms for {} ({} items skipped)",
            symptoms.len(),
            root.id,
            failures
        );
        let final_state = *state.borrow();
        Ok(TraversalReport {
            traversal_id,
            root,
            symptoms,
            failures,
            state: final_state,
        })
    }
}

fn stage_error(e: JoinError) -> SymptomGraphError {
    SymptomGraphError::Stage(e.to_string())
}
