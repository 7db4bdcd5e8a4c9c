use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Identifier of an item (dense, `0..num_items`).
pub type ItemId = usize;
/// Identifier of a cache server (dense, `0..num_caches`).
pub type CacheId = usize;
/// Identifier of an endpoint (dense, `0..num_endpoints`).
pub type EndpointId = usize;

/// A demand source with its origin latency and the cheaper caches it can reach.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub(crate) base_latency: u32,
    /// Sorted by cache id, every latency strictly below `base_latency`.
    pub(crate) cache_latencies: Vec<(CacheId, u32)>,
}

impl Endpoint {
    /// Creates an endpoint, discarding overrides that are not cheaper than the origin.
    ///
    /// When a cache is listed more than once, the last listed latency wins.
    pub fn new(base_latency: u32, mut cache_latencies: Vec<(CacheId, u32)>) -> Self {
        // Stable sort over the reversed list puts the last listing of a cache first
        cache_latencies.reverse();
        cache_latencies.sort_by_key(|&(cache, _)| cache);
        cache_latencies.dedup_by_key(|&mut (cache, _)| cache);
        cache_latencies.retain(|&(_, latency)| latency < base_latency);

        Self {
            base_latency,
            cache_latencies,
        }
    }

    pub fn base_latency(&self) -> u32 {
        self.base_latency
    }

    /// Caches reachable from this endpoint together with their latency.
    pub fn cache_latencies(&self) -> &[(CacheId, u32)] {
        &self.cache_latencies
    }

    pub fn latency_to(&self, cache: CacheId) -> Option<u32> {
        self.cache_latencies
            .binary_search_by_key(&cache, |&(c, _)| c)
            .ok()
            .map(|i| self.cache_latencies[i].1)
    }

    pub fn reaches(&self, cache: CacheId) -> bool {
        self.latency_to(cache).is_some()
    }
}

/// How many times `item` is fetched from `endpoint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub item: ItemId,
    pub endpoint: EndpointId,
    pub count: u64,
}

impl Request {
    pub fn new(item: ItemId, endpoint: EndpointId, count: u64) -> Self {
        Self {
            item,
            endpoint,
            count,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum NetworkError {
    #[error("network must contain at least one item")]
    NoItems,
    #[error("item {item} has size zero")]
    ZeroSizedItem { item: ItemId },
    #[error("cache capacity must be positive")]
    ZeroCapacity,
    #[error("endpoint {endpoint} references cache {cache}, but only {num_caches} caches exist")]
    CacheOutOfRange {
        endpoint: EndpointId,
        cache: CacheId,
        num_caches: usize,
    },
    #[error("request {index} references item {item}, but only {num_items} items exist")]
    ItemOutOfRange {
        index: usize,
        item: ItemId,
        num_items: usize,
    },
    #[error("request {index} references endpoint {endpoint}, but only {num_endpoints} endpoints exist")]
    EndpointOutOfRange {
        index: usize,
        endpoint: EndpointId,
        num_endpoints: usize,
    },
}

/// An item that can never be placed because it is larger than a whole cache.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
#[error("item {item} of size {size} exceeds cache capacity {capacity}")]
pub struct InfeasibleItem {
    pub item: ItemId,
    pub size: u64,
    pub capacity: u64,
}

/// Immutable problem instance: items, endpoints, caches and demand.
///
/// Only [`Network::new`] builds one, so every instance has been validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Network {
    pub(crate) items: Vec<u64>,
    pub(crate) endpoints: Vec<Endpoint>,
    pub(crate) num_caches: usize,
    pub(crate) capacity: u64,
    pub(crate) requests: Vec<Request>,
    pub(crate) min_item_size: u64,
}

impl Network {
    #[instrument(level = "debug", skip(items, endpoints, requests), fields(num_items = items.len(), num_endpoints = endpoints.len(), num_requests = requests.len(), num_caches = num_caches, capacity = capacity))]
    pub fn new(
        items: Vec<u64>,
        endpoints: Vec<Endpoint>,
        num_caches: usize,
        capacity: u64,
        requests: Vec<Request>,
    ) -> Result<Self, NetworkError> {
        if capacity == 0 {
            return Err(NetworkError::ZeroCapacity);
        }

        if let Some(item) = items.iter().position(|&size| size == 0) {
            return Err(NetworkError::ZeroSizedItem { item });
        }

        let min_item_size = items.iter().copied().min().ok_or(NetworkError::NoItems)?;

        for (endpoint, e) in endpoints.iter().enumerate() {
            if let Some(&(cache, _)) = e.cache_latencies.iter().find(|(c, _)| *c >= num_caches) {
                return Err(NetworkError::CacheOutOfRange {
                    endpoint,
                    cache,
                    num_caches,
                });
            }
        }

        for (index, request) in requests.iter().enumerate() {
            if request.item >= items.len() {
                return Err(NetworkError::ItemOutOfRange {
                    index,
                    item: request.item,
                    num_items: items.len(),
                });
            }
            if request.endpoint >= endpoints.len() {
                return Err(NetworkError::EndpointOutOfRange {
                    index,
                    endpoint: request.endpoint,
                    num_endpoints: endpoints.len(),
                });
            }
        }

        let network = Self {
            items,
            endpoints,
            num_caches,
            capacity,
            requests,
            min_item_size,
        };

        for infeasible in network.infeasible_items() {
            tracing::warn!(
                item = infeasible.item,
                size = infeasible.size,
                capacity = infeasible.capacity,
                "Item can never be cached, skipping it"
            );
        }

        Ok(network)
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn num_endpoints(&self) -> usize {
        self.endpoints.len()
    }

    pub fn num_caches(&self) -> usize {
        self.num_caches
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn items(&self) -> &[u64] {
        &self.items
    }

    pub fn item_size(&self, item: ItemId) -> u64 {
        self.items[item]
    }

    /// Smallest item size; a cache with less free space than this is full.
    pub fn min_item_size(&self) -> u64 {
        self.min_item_size
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn endpoint(&self, endpoint: EndpointId) -> &Endpoint {
        &self.endpoints[endpoint]
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Sum of all request counts. Widened so that any number of `u64`
    /// counts adds up without overflow.
    pub fn total_demand(&self) -> u128 {
        self.requests.iter().map(|r| r.count as u128).sum()
    }

    pub fn check_feasible(&self, item: ItemId) -> Result<(), InfeasibleItem> {
        let size = self.items[item];
        if size > self.capacity {
            return Err(InfeasibleItem {
                item,
                size,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn infeasible_items(&self) -> impl Iterator<Item = InfeasibleItem> + '_ {
        (0..self.items.len()).filter_map(|item| self.check_feasible(item).err())
    }

    /// Requests sorted by `count / item_size` descending; ties keep input order.
    pub fn requests_by_density(&self) -> Vec<Request> {
        let mut sorted = self.requests.clone();
        sorted.sort_by(|a, b| {
            // a.count / a.size vs b.count / b.size, compared without division
            let lhs = b.count as u128 * self.items[a.item] as u128;
            let rhs = a.count as u128 * self.items[b.item] as u128;
            lhs.cmp(&rhs)
        });
        sorted
    }
}
