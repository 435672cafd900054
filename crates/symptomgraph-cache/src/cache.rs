use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use symptomgraph_core::{CacheSettings, Entity, EntityKind, Result, SymptomGraphError};
use tracing::debug;

use crate::memory::InMemoryEntityStore;

/// Opaque key/value store holding serialized entity copies.
///
/// Implementations must be safe for concurrent `get`/`set` from every stage.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Serialized value for `key`; `SymptomGraphError::CacheMiss` when absent or expired.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Stores a serialized value; failures surface as `SymptomGraphError::CacheWrite`.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Cache performance statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub expirations: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

/// Store used when caching is switched off: every lookup misses, every write succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStore;

#[async_trait]
impl EntityStore for DisabledStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        Err(SymptomGraphError::CacheMiss(key.to_string()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>) -> Result<()> {
        Ok(())
    }
}

/// Typed facade over an [`EntityStore`], keyed by entity locator.
#[derive(Clone)]
pub struct EntityCache {
    store: Arc<dyn EntityStore>,
}

impl EntityCache {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledStore))
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        if settings.enabled {
            Self::new(Arc::new(InMemoryEntityStore::new(
                settings.ttl(),
                settings.max_entries,
            )))
        } else {
            Self::disabled()
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Materializes a cached copy. An undecodable copy is reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let bytes = self.store.get(key).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            debug!("discarding undecodable cache entry {}: {}", key, e);
            SymptomGraphError::CacheMiss(key.to_string())
        })
    }

    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| SymptomGraphError::CacheWrite(format!("{}: {}", key, e)))?;
        self.store.set(key, bytes).await
    }

    pub async fn get_entity(&self, key: &str, kind: EntityKind) -> Result<Entity> {
        let value: serde_json::Value = self.get(key).await?;
        Entity::from_value(kind, value).map_err(|e| {
            debug!("cached {} under {} has wrong shape: {}", kind, key, e);
            SymptomGraphError::CacheMiss(key.to_string())
        })
    }

    /// Stores the entity in the same shape the ontology service returns it.
    pub async fn set_entity(&self, key: &str, entity: &Entity) -> Result<()> {
        match entity {
            Entity::AtomCluster(e) => self.set(key, e).await,
            Entity::Atom(e) => self.set(key, e).await,
            Entity::Concept(e) => self.set(key, e).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symptomgraph_core::{Atom, Concept, OntologyEntity, Provenance, SemanticType};

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = EntityCache::disabled();
        let concept = Entity::Concept(Concept {
            id: "C001".into(),
            ..Default::default()
        });
        cache.set_entity("loc", &concept).await.unwrap();
        let err = cache.get_entity("loc", EntityKind::Concept).await.unwrap_err();
        assert!(matches!(err, SymptomGraphError::CacheMiss(_)));
    }

    #[tokio::test]
    async fn entity_round_trips_by_kind() {
        let cache = EntityCache::from_settings(&CacheSettings::default());
        let concept = Concept {
            id: "C001".into(),
            name: "Polyuria".into(),
            semantic_types: vec![SemanticType {
                name: "Sign or Symptom".into(),
                uri: String::new(),
            }],
            ..Default::default()
        };
        cache
            .set_entity("https://x/CUI/C001", &Entity::Concept(concept.clone()))
            .await
            .unwrap();

        let hit = cache
            .get_entity("https://x/CUI/C001", EntityKind::Concept)
            .await
            .unwrap();
        assert_eq!(hit, Entity::Concept(concept));
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn cached_atom_accepts_fresh_provenance() {
        let cache = EntityCache::from_settings(&CacheSettings::default());
        let atom = Atom {
            id: "A1".into(),
            concept: "https://x/CUI/C001".into(),
            ..Default::default()
        };
        cache.set_entity("loc", &Entity::Atom(atom)).await.unwrap();

        match cache.get_entity("loc", EntityKind::Atom).await.unwrap() {
            Entity::Atom(mut a) => {
                assert!(a.provenance().is_none());
                assert!(a.attach_provenance(Provenance::Relation("R9".into())));
            }
            other => panic!("unexpected entity {:?}", other),
        }
    }

    #[test]
    fn hit_rate_handles_empty_stats() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
