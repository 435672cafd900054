use std::sync::Arc;
use symptomgraph_cache::EntityCache;
use symptomgraph_core::{Atom, Concept, Entity, EntityKind, Result, SymptomGraphError};
use symptomgraph_umls::OntologySource;
use tracing::{debug, warn};

/// Placeholder the ontology service uses for an absent locator.
const NO_LOCATOR: &str = "NONE";

/// Cache-first entity lookup with write-through on remote fetch.
#[derive(Clone)]
pub struct EntityResolver {
    source: Arc<dyn OntologySource>,
    cache: EntityCache,
}

impl EntityResolver {
    pub fn new(source: Arc<dyn OntologySource>, cache: EntityCache) -> Self {
        Self { source, cache }
    }

    pub fn source(&self) -> &Arc<dyn OntologySource> {
        &self.source
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    /// Resolves `locator` as an entity of `kind`.
    ///
    /// A cached copy short-circuits the network. A fresh fetch is written back
    /// under the same locator; a failed write is logged and otherwise ignored.
    /// The returned entity never carries provenance; the caller attaches it.
    pub async fn resolve(&self, locator: &str, kind: EntityKind) -> Result<Entity> {
        if locator.is_empty() || locator == NO_LOCATOR {
            return Err(SymptomGraphError::Decode(format!("{} has no locator", kind)));
        }

        match self.cache.get_entity(locator, kind).await {
            Ok(entity) => {
                debug!("cache hit for {} {}", kind, locator);
                return Ok(entity);
            }
            Err(SymptomGraphError::CacheMiss(_)) => {}
            Err(e) => warn!("cache lookup for {} failed: {}", locator, e),
        }

        let entity = self.source.fetch_entity(locator, kind).await?;
        if entity.kind() != kind {
            return Err(SymptomGraphError::Decode(format!(
                "{} resolved to {} instead of {}",
                locator,
                entity.kind(),
                kind
            )));
        }

        if let Err(e) = self.cache.set_entity(locator, &entity).await {
            warn!("failed to cache {}: {}", locator, e);
        }
        Ok(entity)
    }

    pub async fn resolve_atom(&self, locator: &str) -> Result<Atom> {
        match self.resolve(locator, EntityKind::Atom).await? {
            Entity::Atom(atom) => Ok(atom),
            other => Err(mismatch(locator, EntityKind::Atom, &other)),
        }
    }

    pub async fn resolve_concept(&self, locator: &str) -> Result<Concept> {
        match self.resolve(locator, EntityKind::Concept).await? {
            Entity::Concept(concept) => Ok(concept),
            other => Err(mismatch(locator, EntityKind::Concept, &other)),
        }
    }
}

fn mismatch(locator: &str, expected: EntityKind, got: &Entity) -> SymptomGraphError {
    SymptomGraphError::Decode(format!(
        "{} resolved to {} instead of {}",
        locator,
        got.kind(),
        expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use symptomgraph_cache::EntityStore;
    use symptomgraph_core::{CacheSettings, Relation, RootConcept};

    #[derive(Default)]
    struct OneConcept {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl OntologySource for OneConcept {
        async fn search_root_concept(&self, name: &str) -> Result<RootConcept> {
            Err(SymptomGraphError::RootNotFound(name.to_string()))
        }

        async fn list_relations(&self, _concept_id: &str) -> Result<Vec<Relation>> {
            Ok(Vec::new())
        }

        async fn fetch_entity(&self, locator: &str, kind: EntityKind) -> Result<Entity> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match (locator, kind) {
                ("https://x/CUI/C001", EntityKind::Concept) => Ok(Entity::Concept(Concept {
                    id: "C001".into(),
                    ..Default::default()
                })),
                _ => Err(SymptomGraphError::Remote(format!("{} returned 404", locator))),
            }
        }
    }

    struct FailingWrites;

    #[async_trait]
    impl EntityStore for FailingWrites {
        async fn get(&self, key: &str) -> Result<Vec<u8>> {
            Err(SymptomGraphError::CacheMiss(key.to_string()))
        }

        async fn set(&self, key: &str, _value: Vec<u8>) -> Result<()> {
            Err(SymptomGraphError::CacheWrite(key.to_string()))
        }
    }

    #[tokio::test]
    async fn second_resolve_is_served_from_cache() {
        let source = Arc::new(OneConcept::default());
        let resolver = EntityResolver::new(
            source.clone(),
            EntityCache::from_settings(&CacheSettings::default()),
        );

        let first = resolver.resolve_concept("https://x/CUI/C001").await.unwrap();
        let second = resolver.resolve_concept("https://x/CUI/C001").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_write_failure_is_not_an_error() {
        let source = Arc::new(OneConcept::default());
        let resolver = EntityResolver::new(source, EntityCache::new(Arc::new(FailingWrites)));
        assert!(resolver.resolve_concept("https://x/CUI/C001").await.is_ok());
    }

    #[tokio::test]
    async fn missing_locator_never_reaches_the_source() {
        let source = Arc::new(OneConcept::default());
        let resolver = EntityResolver::new(source.clone(), EntityCache::disabled());

        for locator in ["", "NONE"] {
            let err = resolver.resolve_atom(locator).await.unwrap_err();
            assert!(matches!(err, SymptomGraphError::Decode(_)));
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn remote_failure_is_propagated() {
        let resolver = EntityResolver::new(Arc::new(OneConcept::default()), EntityCache::disabled());
        let err = resolver.resolve_atom("https://x/AUI/A404").await.unwrap_err();
        assert!(matches!(err, SymptomGraphError::Remote(_)));
    }
}
