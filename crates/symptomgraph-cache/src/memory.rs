use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use symptomgraph_core::{Result, SymptomGraphError};
use tracing::debug;

use crate::cache::{CacheStats, EntityStore};

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// Process-local store with per-entry TTL and insertion-order eviction.
pub struct InMemoryEntityStore {
    entries: DashMap<String, CacheEntry>,
    insertion_order: Mutex<VecDeque<String>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
}

impl InMemoryEntityStore {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            insertion_order: Mutex::new(VecDeque::new()),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut order = self.insertion_order.lock();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
            order.retain(|k| self.entries.contains_key(k));
        }
        removed
    }

    /// Evicts oldest keys until one more entry fits. Caller holds the order lock.
    fn ensure_capacity(&self, order: &mut VecDeque<String>) {
        while self.entries.len() >= self.max_entries {
            let Some(oldest) = order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> Vec<String> {
        self.insertion_order.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // entry guard is released above; removing while holding it would deadlock
            let mut order = self.insertion_order.lock();
            if self
                .entries
                .remove_if(key, |_, entry| entry.is_expired())
                .is_some()
            {
                order.retain(|k| k != key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                debug!("cache entry expired: {}", key);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Err(SymptomGraphError::CacheMiss(key.to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let entry = CacheEntry::new(value, self.ttl);
        // new keys are only added under the order lock, so each key is queued once
        let mut order = self.insertion_order.lock();
        if let Some(mut existing) = self.entries.get_mut(key) {
            *existing = entry;
        } else {
            self.ensure_capacity(&mut order);
            order.push_back(key.to_string());
            self.entries.insert(key.to_string(), entry);
        }
        drop(order);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
