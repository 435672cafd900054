use std::future::Future;
use std::sync::Arc;
use symptomgraph_concurrent::{UniqueChannel, UniqueReceiver};
use symptomgraph_core::{
    Atom, AtomCluster, Concept, Entity, OntologyEntity, Provenance, Relation, Result,
    RootConcept, SymptomGraphError,
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::failure::{Stage, StageFailure};
use crate::filter::SymptomFilter;
use crate::pipeline::TraversalState;
use crate::resolver::EntityResolver;

/// Runs `fut` unless the token fires first. Cancellation is checked before every poll.
pub(crate) async fn until_canceled<F: Future>(
    token: &CancellationToken,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}

pub(crate) fn transition(state: &watch::Sender<TraversalState>, next: TraversalState) {
    let previous = state.send_replace(next);
    debug!("traversal state {:?} -> {:?}", previous, next);
}

/// Handles shared by every stage of one traversal.
#[derive(Clone)]
pub(crate) struct StageContext {
    pub resolver: EntityResolver,
    pub token: CancellationToken,
    failures: mpsc::UnboundedSender<StageFailure>,
}

impl StageContext {
    pub fn new(
        resolver: EntityResolver,
        token: CancellationToken,
        failures: mpsc::UnboundedSender<StageFailure>,
    ) -> Self {
        Self {
            resolver,
            token,
            failures,
        }
    }

    fn report(&self, stage: Stage, error: SymptomGraphError) {
        // drain task only goes away after every stage has finished
        let _ = self.failures.send(StageFailure { stage, error });
    }

    async fn publish<T>(&self, channel: &UniqueChannel<T>, item: T, key: String) -> bool {
        until_canceled(&self.token, channel.publish(item, key))
            .await
            .is_some()
    }
}

/// Resolves the root and streams its relations. Only root resolution is fatal.
pub(crate) async fn relation_stage(
    ctx: StageContext,
    name: String,
    state: Arc<watch::Sender<TraversalState>>,
    relations: UniqueChannel<Relation>,
) -> Result<RootConcept> {
    transition(&state, TraversalState::RootResolving);
    let root = match until_canceled(&ctx.token, ctx.resolver.source().search_root_concept(&name))
        .await
    {
        None => return Err(SymptomGraphError::Canceled),
        Some(Ok(root)) => root,
        Some(Err(SymptomGraphError::RootNotFound(msg))) => {
            return Err(SymptomGraphError::RootNotFound(msg))
        }
        Some(Err(e)) => return Err(SymptomGraphError::RootNotFound(format!("{}: {}", name, e))),
    };
    info!("root concept {} ({})", root.id, root.name);
    transition(&state, TraversalState::Streaming);

    let listing = match until_canceled(&ctx.token, ctx.resolver.source().list_relations(&root.id))
        .await
    {
        None => return Err(SymptomGraphError::Canceled),
        Some(Ok(listing)) => listing,
        Some(Err(e)) => {
            ctx.report(Stage::Relations, e);
            return Ok(root);
        }
    };
    debug!("{} lists {} relations", root.id, listing.len());

    for relation in listing {
        let key = if relation.id.is_empty() {
            relation.related_id.clone()
        } else {
            relation.id.clone()
        };
        if !ctx.publish(&relations, relation, key).await {
            break;
        }
    }
    relations.close();
    Ok(root)
}

/// Fetches each relation's target and routes it to the channel for its kind.
pub(crate) async fn classify_stage(
    ctx: StageContext,
    mut relations: UniqueReceiver<Relation>,
    clusters: UniqueChannel<AtomCluster>,
    atoms: UniqueChannel<Atom>,
    concepts: UniqueChannel<Concept>,
) {
    while let Some(Some(relation)) = until_canceled(&ctx.token, relations.receive()).await {
        let Some(kind) = relation.kind.target() else {
            debug!("dropping {} relation {}", relation.kind, relation.id);
            continue;
        };

        let mut entity =
            match until_canceled(&ctx.token, ctx.resolver.resolve(&relation.related_id, kind))
                .await
            {
                None => break,
                Some(Ok(entity)) => entity,
                Some(Err(e)) => {
                    ctx.report(Stage::Classify, e);
                    continue;
                }
            };
        entity.attach_provenance(Provenance::Relation(relation.id.clone()));

        let key = entity.id().to_string();
        let delivered = match entity {
            Entity::AtomCluster(cluster) => ctx.publish(&clusters, cluster, key).await,
            Entity::Atom(atom) => ctx.publish(&atoms, atom, key).await,
            Entity::Concept(concept) => ctx.publish(&concepts, concept, key).await,
        };
        if !delivered {
            break;
        }
    }
    clusters.close();
    atoms.close();
    concepts.close();
}

/// Expands each atom cluster into its default preferred atom.
pub(crate) async fn cluster_stage(
    ctx: StageContext,
    mut clusters: UniqueReceiver<AtomCluster>,
    atoms: UniqueChannel<Atom>,
) {
    while let Some(Some(cluster)) = until_canceled(&ctx.token, clusters.receive()).await {
        let mut atom = match until_canceled(
            &ctx.token,
            ctx.resolver.resolve_atom(&cluster.default_preferred_atom),
        )
        .await
        {
            None => break,
            Some(Ok(atom)) => atom,
            Some(Err(e)) => {
                ctx.report(Stage::ClusterExpansion, e);
                continue;
            }
        };
        atom.attach_provenance(Provenance::AtomCluster(cluster.id.clone()));

        let key = atom.id().to_string();
        if !ctx.publish(&atoms, atom, key).await {
            break;
        }
    }
    atoms.close();
}

/// Resolves the concept each atom belongs to.
pub(crate) async fn concept_stage(
    ctx: StageContext,
    mut atoms: UniqueReceiver<Atom>,
    concepts: UniqueChannel<Concept>,
) {
    while let Some(Some(atom)) = until_canceled(&ctx.token, atoms.receive()).await {
        let mut concept =
            match until_canceled(&ctx.token, ctx.resolver.resolve_concept(&atom.concept)).await {
                None => break,
                Some(Ok(concept)) => concept,
                Some(Err(e)) => {
                    ctx.report(Stage::ConceptResolution, e);
                    continue;
                }
            };
        concept.attach_provenance(Provenance::Atom(atom.id.clone()));

        let key = concept.id().to_string();
        if !ctx.publish(&concepts, concept, key).await {
            break;
        }
    }
    concepts.close();
}

/// Keeps the concepts the filter accepts until the concept channel is exhausted.
pub(crate) async fn collect_symptoms(
    token: CancellationToken,
    mut concepts: UniqueReceiver<Concept>,
    filter: SymptomFilter,
) -> Vec<Concept> {
    let mut symptoms = Vec::new();
    while let Some(Some(concept)) = until_canceled(&token, concepts.receive()).await {
        if filter.accepts(&concept) {
            debug!("symptom {} ({})", concept.id, concept.name);
            symptoms.push(concept);
        }
    }
    symptoms
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use symptomgraph_concurrent::unique_channel;
    use symptomgraph_core::SemanticType;

    fn concept(id: &str, semantic_type: &str) -> Concept {
        Concept {
            id: id.into(),
            semantic_types: vec![SemanticType {
                name: semantic_type.into(),
                uri: String::new(),
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn until_canceled_prefers_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(until_canceled(&token, async { 1 }).await, None);

        let live = CancellationToken::new();
        assert_eq!(until_canceled(&live, async { 1 }).await, Some(1));
    }

    #[tokio::test]
    async fn collector_filters_until_exhausted() {
        let (tx, rx) = unique_channel(4);
        tx.publish(concept("C1", "Sign or Symptom"), "C1").await;
        tx.publish(concept("C2", "Disease or Syndrome"), "C2").await;
        tx.close();

        let symptoms =
            collect_symptoms(CancellationToken::new(), rx, SymptomFilter::default()).await;
        assert_eq!(symptoms.len(), 1);
        assert_eq!(symptoms[0].id, "C1");
    }

    #[tokio::test]
    async fn collector_stops_on_cancel_with_open_channel() {
        let (tx, rx) = unique_channel::<Concept>(4);
        let token = CancellationToken::new();
        let collector = tokio::spawn(collect_symptoms(token.clone(), rx, SymptomFilter::default()));

        token.cancel();
        let symptoms = tokio::time::timeout(Duration::from_secs(1), collector)
            .await
            .expect("collector should observe cancellation")
            .unwrap();
        assert!(symptoms.is_empty());
        drop(tx);
    }
}
