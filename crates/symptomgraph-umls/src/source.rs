use async_trait::async_trait;
use symptomgraph_core::{Entity, EntityKind, Relation, Result, RootConcept};

/// Read access to the remote ontology, as consumed by the traversal.
#[async_trait]
pub trait OntologySource: Send + Sync {
    /// First search hit for `name`; `SymptomGraphError::RootNotFound` when nothing matches.
    async fn search_root_concept(&self, name: &str) -> Result<RootConcept>;

    /// Relations of the concept with the given CUI.
    ///
    /// Only the first page is requested. A listing longer than one page is
    /// returned truncated and treated by callers as complete.
    async fn list_relations(&self, concept_id: &str) -> Result<Vec<Relation>>;

    /// Fetches the entity behind `locator`, decoded as `kind`.
    async fn fetch_entity(&self, locator: &str, kind: EntityKind) -> Result<Entity>;
}
