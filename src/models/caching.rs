use super::network::{CacheId, ItemId, Network};
use super::score::{Fitness, ScoreError, score};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::instrument;

/// The item set held by one cache server.
pub type CacheSlot = BTreeSet<ItemId>;

/// A cache whose contents exceed the shared capacity.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
#[error("cache {cache} holds {used} units, capacity is {capacity}")]
pub struct CapacityViolation {
    pub cache: CacheId,
    pub used: u64,
    pub capacity: u64,
}

#[derive(Debug, thiserror::Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum ValidationError {
    #[error("CapacityViolation: {0}")]
    Capacity(#[from] CapacityViolation),
    #[error("cache {cache} holds unknown item {item}")]
    UnknownItem { cache: CacheId, item: ItemId },
    #[error("assignment has {found} caches, network has {expected}")]
    CacheCount { expected: usize, found: usize },
}

/// A candidate solution: one item set per cache server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Caching {
    pub(crate) caches: Vec<CacheSlot>,
}

impl Caching {
    /// An assignment with `num_caches` empty caches.
    pub fn new(num_caches: usize) -> Self {
        Self {
            caches: vec![CacheSlot::new(); num_caches],
        }
    }

    pub fn from_caches(caches: Vec<CacheSlot>) -> Self {
        Self { caches }
    }

    pub fn num_caches(&self) -> usize {
        self.caches.len()
    }

    pub fn caches(&self) -> &[CacheSlot] {
        &self.caches
    }

    pub fn cache(&self, cache: CacheId) -> &CacheSlot {
        &self.caches[cache]
    }

    pub fn contains(&self, cache: CacheId, item: ItemId) -> bool {
        self.caches[cache].contains(&item)
    }

    /// Adds `item` to `cache`; returns false if it was already there.
    /// Capacity is not checked here, callers track free space themselves.
    pub fn insert(&mut self, cache: CacheId, item: ItemId) -> bool {
        self.caches[cache].insert(item)
    }

    /// Replaces the whole content of one cache slot.
    pub fn replace_slot(&mut self, cache: CacheId, slot: CacheSlot) {
        self.caches[cache] = slot;
    }

    pub fn is_empty(&self) -> bool {
        self.caches.iter().all(BTreeSet::is_empty)
    }

    /// Total size of the items held by `cache`.
    pub fn used(&self, cache: CacheId, network: &Network) -> u64 {
        self.caches[cache]
            .iter()
            .map(|&item| network.item_size(item))
            .sum()
    }

    pub fn free(&self, cache: CacheId, network: &Network) -> u64 {
        network.capacity().saturating_sub(self.used(cache, network))
    }

    /// Checks that the assignment fits the network: cache count, item ids and capacity.
    #[instrument(level = "debug", skip(self, network), fields(num_caches = self.caches.len()))]
    pub fn validate(&self, network: &Network) -> Result<(), ValidationError> {
        if self.caches.len() != network.num_caches() {
            return Err(ValidationError::CacheCount {
                expected: network.num_caches(),
                found: self.caches.len(),
            });
        }

        for (cache, slot) in self.caches.iter().enumerate() {
            if let Some(&item) = slot.iter().find(|&&item| item >= network.num_items()) {
                return Err(ValidationError::UnknownItem { cache, item });
            }

            let used = self.used(cache, network);
            if used > network.capacity() {
                return Err(CapacityViolation {
                    cache,
                    used,
                    capacity: network.capacity(),
                }
                .into());
            }
        }

        Ok(())
    }

    pub fn is_valid(&self, network: &Network) -> bool {
        self.validate(network).is_ok()
    }

    pub fn score(&self, network: &Network) -> Result<Fitness, ScoreError> {
        score(self, network)
    }
}
