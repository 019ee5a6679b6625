//! Memoised resolution results.
//!
//! Any entity mutation can change what its descendants resolve to, so the
//! cache is dropped wholesale on every change rather than tracked per
//! entity. A generation counter stops a resolution that raced with an
//! invalidation from re-inserting a stale answer.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sitegate_types::EntityRef;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Entry {
    permissions: Arc<Vec<String>>,
    /// Earliest expiry of a timed permission folded into this result.
    valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    generation: u64,
    entries: HashMap<(EntityRef, String), Entry>,
}

#[derive(Debug, Default)]
pub struct ResolutionCache {
    inner: RwLock<Inner>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation; pass it back to [`insert`](Self::insert).
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    pub fn get(&self, entity: &EntityRef, site: &str, now: DateTime<Utc>) -> Option<Arc<Vec<String>>> {
        let inner = self.inner.read();
        let entry = inner.entries.get(&(entity.clone(), site.to_string()))?;
        match entry.valid_until {
            Some(until) if until <= now => None,
            _ => Some(entry.permissions.clone()),
        }
    }

    /// Stores a result computed at `generation`; dropped if the cache was
    /// invalidated in the meantime.
    pub fn insert(
        &self,
        generation: u64,
        entity: &EntityRef,
        site: &str,
        permissions: Arc<Vec<String>>,
        valid_until: Option<DateTime<Utc>>,
    ) {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return;
        }
        inner.entries.insert(
            (entity.clone(), site.to_string()),
            Entry {
                permissions,
                valid_until,
            },
        );
    }

    pub fn invalidate(&self) {
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
