//! Compilation cache - bounded LRU/TTL map and a cache-owning compiler.
//!
//! The cache is a performance layer only. A miss always recompiles.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

use crate::compiler::{cache_key, compile};
use crate::types::{CacheConfig, CompileOptions, CompiledSchema};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    /// Last insert or access.
    touched: Instant,
    hits: u64,
}

/// Bounded map that expires idle entries and evicts the least used one.
///
/// An entry expires once `ttl` has passed since it was last inserted or read.
/// When full, inserting a new key drops the first expired entry found, or
/// failing that the entry with the fewest accesses (oldest access breaks ties).
/// Not synchronized; wrap it in a lock to share across threads.
#[derive(Debug)]
pub struct LruTtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    capacity: usize,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V> LruTtlCache<K, V> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_limits(config.capacity, config.ttl())
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
            ttl,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.get_at(key, Instant::now())
    }

    /// `get` with an explicit clock reading.
    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<&V> {
        let expired = self.entries.get(key).map(|e| self.is_expired(e, now))?;
        if expired {
            self.entries.remove(key);
            return None;
        }
        let entry = self.entries.get_mut(key)?;
        entry.hits += 1;
        entry.touched = now;
        Some(&entry.value)
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    /// `insert` with an explicit clock reading.
    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        if self.capacity == 0 {
            return;
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict(now);
        }
        self.entries.insert(
            key,
            Entry {
                value,
                touched: now,
                hits: 1,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn is_expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.touched) > self.ttl
    }

    fn evict(&mut self, now: Instant) {
        let mut victim: Option<(&K, u64, Instant)> = None;
        for (key, entry) in &self.entries {
            if self.is_expired(entry, now) {
                victim = Some((key, 0, entry.touched));
                break;
            }
            let better = match victim {
                None => true,
                Some((_, hits, touched)) => {
                    entry.hits < hits || (entry.hits == hits && entry.touched < touched)
                }
            };
            if better {
                victim = Some((key, entry.hits, entry.touched));
            }
        }
        if let Some((key, hits, _)) = victim {
            let key = key.clone();
            debug!(hits, "evicting cached entry");
            self.entries.remove(&key);
        }
    }
}

/// Compiler that owns its options and a cache of compiled schemas.
///
/// Documents with the same structural key share one compiled result.
#[derive(Debug)]
pub struct SchemaCompiler {
    options: CompileOptions,
    cache: LruTtlCache<String, Arc<CompiledSchema>>,
}

impl Default for SchemaCompiler {
    fn default() -> Self {
        Self::new(CompileOptions::default(), CacheConfig::default())
    }
}

impl SchemaCompiler {
    pub fn new(options: CompileOptions, cache: CacheConfig) -> Self {
        Self {
            options,
            cache: LruTtlCache::new(cache),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile a document, reusing a cached result for the same structure.
    pub fn compile(&mut self, document: &Value) -> Arc<CompiledSchema> {
        let key = cache_key(document, &self.options);
        if let Some(hit) = self.cache.get(&key) {
            debug!(key = %key, "schema cache hit");
            return Arc::clone(hit);
        }
        debug!(key = %key, "schema cache miss");
        let compiled = Arc::new(compile(document, &self.options));
        self.cache.insert(key, Arc::clone(&compiled));
        compiled
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
