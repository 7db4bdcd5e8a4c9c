//! Construction heuristics.
//!
//! Every [`Strategy`] turns a [`Network`] into a capacity-respecting
//! [`Caching`]. They range from purely random packing to demand-aware greedy
//! packing and, for tiny instances only, exhaustive enumeration.
//!
//! Items larger than the cache capacity are never placed by any strategy.

use super::caching::{CacheSlot, Caching};
use super::network::{CacheId, ItemId, Network};
use super::score::{Fitness, ScoreError};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Packs items into one empty cache in the given order, skipping those that
/// do not fit. Stops as soon as not even the smallest item of the network
/// could fit any more.
fn pack_in_order(network: &Network, order: &[ItemId]) -> CacheSlot {
    let mut available = network.capacity();
    let mut slot = CacheSlot::new();

    for &item in order {
        let size = network.item_size(item);
        if size <= available {
            slot.insert(item);
            available -= size;
        }
        if network.min_item_size() > available {
            break;
        }
    }

    slot
}

/// Fills a single cache slot with uniformly shuffled items.
pub(crate) fn random_slot(network: &Network, rng: &mut impl Rng) -> CacheSlot {
    let mut order: Vec<ItemId> = (0..network.num_items()).collect();
    order.shuffle(rng);
    pack_in_order(network, &order)
}

#[instrument(level = "debug", skip(network, rng), fields(num_caches = network.num_caches()))]
fn random_fill(network: &Network, rng: &mut impl Rng) -> Caching {
    let caches = (0..network.num_caches())
        .map(|_| random_slot(network, rng))
        .collect();
    Caching::from_caches(caches)
}

/// Random fill with every cache packed as its own task on the current rayon
/// pool. Slot seeds are drawn up front so the result does not depend on
/// scheduling.
#[instrument(level = "debug", skip(network, rng), fields(num_caches = network.num_caches()))]
fn parallel_random_fill(network: &Network, rng: &mut impl Rng) -> Caching {
    let seeds: Vec<u64> = (0..network.num_caches()).map(|_| rng.random()).collect();
    let caches = seeds
        .into_par_iter()
        .map(|seed| random_slot(network, &mut StdRng::seed_from_u64(seed)))
        .collect();
    Caching::from_caches(caches)
}

#[instrument(level = "debug", skip(network, rng), fields(num_caches = network.num_caches()))]
fn shared_random_fill(network: &Network, rng: &mut impl Rng) -> Caching {
    let mut order: Vec<ItemId> = (0..network.num_items()).collect();
    order.shuffle(rng);

    let slot = pack_in_order(network, &order);
    Caching::from_caches(vec![slot; network.num_caches()])
}

/// True if the request's item already sits on a cache its endpoint reaches.
fn is_served(caching: &Caching, network: &Network, item: ItemId, endpoint: usize) -> bool {
    network
        .endpoint(endpoint)
        .cache_latencies()
        .iter()
        .any(|&(cache, _)| caching.contains(cache, item))
}

#[instrument(level = "debug", skip(network), fields(num_requests = network.requests().len()))]
fn greedy_by_request(network: &Network) -> Caching {
    let mut caching = Caching::new(network.num_caches());
    let mut free = vec![network.capacity(); network.num_caches()];

    for request in network.requests_by_density() {
        if network.check_feasible(request.item).is_err()
            || is_served(&caching, network, request.item, request.endpoint)
        {
            continue;
        }

        let size = network.item_size(request.item);
        let mut candidates: Vec<(CacheId, u32)> =
            network.endpoint(request.endpoint).cache_latencies().to_vec();

        // latency / (free + 1) ascending, compared without division
        candidates.sort_by(|&(a, latency_a), &(b, latency_b)| {
            let lhs = latency_a as u128 * (free[b] as u128 + 1);
            let rhs = latency_b as u128 * (free[a] as u128 + 1);
            lhs.cmp(&rhs)
                .then(latency_a.cmp(&latency_b))
                .then(a.cmp(&b))
        });

        if let Some(&(cache, _)) = candidates.iter().find(|&&(cache, _)| size <= free[cache]) {
            caching.insert(cache, request.item);
            free[cache] -= size;
        }
    }

    caching
}

#[instrument(level = "debug", skip(network), fields(num_requests = network.requests().len()))]
fn greedy_by_cache(network: &Network) -> Caching {
    let requests = network.requests_by_density();
    let mut caching = Caching::new(network.num_caches());
    let mut satisfied = vec![false; requests.len()];

    for cache in 0..network.num_caches() {
        let mut free = network.capacity();

        for (index, request) in requests.iter().enumerate() {
            if free < network.min_item_size() {
                break;
            }
            if satisfied[index] {
                continue;
            }
            if is_served(&caching, network, request.item, request.endpoint) {
                satisfied[index] = true;
                continue;
            }
            if !network.endpoint(request.endpoint).reaches(cache) {
                continue;
            }

            let size = network.item_size(request.item);
            if size <= free {
                caching.insert(cache, request.item);
                free -= size;
                satisfied[index] = true;
            }
        }
    }

    caching
}

/// Limits that keep exhaustive enumeration tractable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExhaustiveLimits {
    /// Largest item count for which subsets are enumerated at all.
    pub max_items: usize,
    /// Largest number of whole assignments that will be scored.
    pub max_assignments: u64,
}

impl Default for ExhaustiveLimits {
    fn default() -> Self {
        Self {
            max_items: 20,
            max_assignments: 1_000_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum FillError {
    #[error("exhaustive search supports at most {max} items, network has {num_items}")]
    TooManyItems { num_items: usize, max: usize },
    #[error(
        "exhaustive search over {packings} packings and {num_caches} caches exceeds {max} assignments"
    )]
    TooManyAssignments {
        packings: usize,
        num_caches: usize,
        max: u64,
    },
    #[error("ScoreError: {0}")]
    Score(#[from] ScoreError),
}

/// Number of smallest feasible items whose total still fits one cache.
fn max_affordable_count(network: &Network) -> usize {
    let mut sizes: Vec<u64> = network
        .items()
        .iter()
        .copied()
        .filter(|&size| size <= network.capacity())
        .collect();
    sizes.sort_unstable();

    sizes
        .iter()
        .scan(0u64, |total, &size| {
            *total += size;
            Some(*total)
        })
        .take_while(|&total| total <= network.capacity())
        .count()
}

/// Every subset of feasible items that fits a single cache, the empty one included.
fn single_cache_packings(network: &Network) -> Vec<CacheSlot> {
    fn walk(
        network: &Network,
        items: &[ItemId],
        max_count: usize,
        free: u64,
        current: &mut Vec<ItemId>,
        out: &mut Vec<CacheSlot>,
    ) {
        out.push(current.iter().copied().collect());
        if current.len() == max_count {
            return;
        }

        for (i, &item) in items.iter().enumerate() {
            let size = network.item_size(item);
            if size <= free {
                current.push(item);
                walk(network, &items[i + 1..], max_count, free - size, current, out);
                current.pop();
            }
        }
    }

    let items: Vec<ItemId> = (0..network.num_items())
        .filter(|&item| network.check_feasible(item).is_ok())
        .collect();
    let mut packings = Vec::new();
    walk(
        network,
        &items,
        max_affordable_count(network),
        network.capacity(),
        &mut Vec::new(),
        &mut packings,
    );
    packings
}

#[instrument(level = "info", skip(network), fields(num_items = network.num_items(), num_caches = network.num_caches()))]
fn exhaustive(network: &Network, limits: &ExhaustiveLimits) -> Result<Caching, FillError> {
    if network.num_items() > limits.max_items {
        return Err(FillError::TooManyItems {
            num_items: network.num_items(),
            max: limits.max_items,
        });
    }

    let packings = single_cache_packings(network);
    let num_caches = network.num_caches();
    let too_many = FillError::TooManyAssignments {
        packings: packings.len(),
        num_caches,
        max: limits.max_assignments,
    };
    let total = u32::try_from(num_caches)
        .ok()
        .and_then(|exp| (packings.len() as u64).checked_pow(exp));
    match total {
        Some(total) if total <= limits.max_assignments => {
            tracing::debug!(packings = packings.len(), total, "Enumerating assignments");
        }
        _ => return Err(too_many),
    }

    // Odometer over one packing index per cache
    let mut indices = vec![0usize; num_caches];
    let mut best: Option<(Fitness, Caching)> = None;
    loop {
        let caching = Caching::from_caches(indices.iter().map(|&i| packings[i].clone()).collect());
        let fitness = caching.score(network)?;
        if best.as_ref().is_none_or(|(best_fitness, _)| fitness > *best_fitness) {
            best = Some((fitness, caching));
        }

        let mut position = 0;
        loop {
            if position == num_caches {
                return Ok(best.map(|(_, caching)| caching).unwrap_or_default());
            }
            indices[position] += 1;
            if indices[position] < packings.len() {
                break;
            }
            indices[position] = 0;
            position += 1;
        }
    }
}

/// Construction heuristic used to produce an assignment from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Each cache is packed from its own uniformly shuffled item order.
    RandomFill,
    /// Like `RandomFill`, with each cache packed in parallel from its own seed.
    ParallelRandomFill,
    /// One shuffled item order is packed into every cache.
    SharedRandomFill,
    /// Requests by descending `count / size`; each unserved request places its
    /// item on the reachable cache with the lowest latency per free space.
    GreedyByRequest,
    /// Caches one after the other, each packed from the demand-sorted requests.
    GreedyByCache,
    /// Scores every combination of single-cache packings. Tiny instances only.
    Exhaustive(ExhaustiveLimits),
}

impl Strategy {
    pub fn exhaustive() -> Self {
        Self::Exhaustive(ExhaustiveLimits::default())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::RandomFill => "random_fill",
            Strategy::ParallelRandomFill => "parallel_random_fill",
            Strategy::SharedRandomFill => "shared_random_fill",
            Strategy::GreedyByRequest => "greedy_by_request",
            Strategy::GreedyByCache => "greedy_by_cache",
            Strategy::Exhaustive(_) => "exhaustive",
        }
    }

    /// Produces a capacity-respecting assignment for `network`.
    #[instrument(level = "debug", skip(self, network, rng), fields(strategy = self.name()))]
    pub fn fill(&self, network: &Network, rng: &mut impl Rng) -> Result<Caching, FillError> {
        match self {
            Strategy::RandomFill => Ok(random_fill(network, rng)),
            Strategy::ParallelRandomFill => Ok(parallel_random_fill(network, rng)),
            Strategy::SharedRandomFill => Ok(shared_random_fill(network, rng)),
            Strategy::GreedyByRequest => Ok(greedy_by_request(network)),
            Strategy::GreedyByCache => Ok(greedy_by_cache(network)),
            Strategy::Exhaustive(limits) => exhaustive(network, limits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Endpoint, Request, fixtures};
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::BTreeSet;

    fn all_strategies() -> Vec<Strategy> {
        vec![
            Strategy::RandomFill,
            Strategy::ParallelRandomFill,
            Strategy::SharedRandomFill,
            Strategy::GreedyByRequest,
            Strategy::GreedyByCache,
            Strategy::exhaustive(),
        ]
    }

    #[test]
    fn it_never_places_infeasible_items() {
        let network = fixtures::example();
        let mut rng = StdRng::seed_from_u64(7);

        for strategy in all_strategies() {
            for _ in 0..20 {
                let caching = strategy.fill(&network, &mut rng).unwrap();
                assert!(caching.is_valid(&network), "{} broke capacity", strategy.name());
                assert!(
                    caching.caches().iter().all(|slot| !slot.contains(&4)),
                    "{} placed the oversized item",
                    strategy.name()
                );
            }
        }
    }

    #[test]
    fn it_packs_random_slots_until_nothing_fits() {
        let network = fixtures::grid(30, 4);
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..50 {
            let slot = random_slot(&network, &mut rng);
            let used: u64 = slot.iter().map(|&i| network.item_size(i)).sum();
            assert!(used <= network.capacity());
            assert!(!slot.is_empty());
        }
    }

    #[test]
    fn it_stops_on_the_global_minimum_size() {
        // After packing 6, 4 units remain, less than the smallest item
        let network = Network::new(vec![6, 5], vec![], 1, 10, vec![]).unwrap();
        assert_eq!(pack_in_order(&network, &[0, 1]), BTreeSet::from([0]));
        assert_eq!(pack_in_order(&network, &[1, 0]), BTreeSet::from([1]));
    }

    #[test]
    fn it_shares_one_order_across_caches() {
        let network = fixtures::grid(30, 5);
        let mut rng = StdRng::seed_from_u64(3);
        let caching = Strategy::SharedRandomFill.fill(&network, &mut rng).unwrap();

        assert!(caching.caches().windows(2).all(|w| w[0] == w[1]));
        assert!(caching.is_valid(&network));
    }

    #[test]
    fn it_is_reproducible_for_a_seed() {
        let network = fixtures::grid(30, 5);
        for strategy in [Strategy::RandomFill, Strategy::ParallelRandomFill] {
            let a = strategy
                .fill(&network, &mut StdRng::seed_from_u64(11))
                .unwrap();
            let b = strategy
                .fill(&network, &mut StdRng::seed_from_u64(11))
                .unwrap();
            assert_eq!(a, b, "{} is not reproducible", strategy.name());
        }
    }

    #[test]
    fn it_places_dense_requests_first_by_request() {
        let network = fixtures::example();
        let mut rng = StdRng::seed_from_u64(0);
        let caching = Strategy::GreedyByRequest.fill(&network, &mut rng).unwrap();

        // Item 3 is the densest request; all caches are empty so the lowest
        // latency cache wins.
        assert!(caching.contains(0, 3));
        // Item 1 follows it: 100 / 71 still beats 200 / 101 on cache 2
        assert!(caching.contains(0, 1));
        assert!(caching.cache(2).is_empty());
        // Endpoint 1 reaches nothing, so item 0 is never placed
        assert!(caching.caches().iter().all(|slot| !slot.contains(&0)));
        assert_eq!(caching.score(&network), Ok(562_500));
    }

    #[test]
    fn it_does_not_duplicate_served_items_by_request() {
        let network = Network::new(
            vec![10],
            vec![
                Endpoint::new(100, vec![(0, 10), (1, 20)]),
                Endpoint::new(100, vec![(0, 30)]),
            ],
            2,
            10,
            vec![Request::new(0, 0, 3), Request::new(0, 1, 2)],
        )
        .unwrap();
        let caching = Strategy::GreedyByRequest
            .fill(&network, &mut StdRng::seed_from_u64(0))
            .unwrap();

        assert_eq!(caching.cache(0), &BTreeSet::from([0]));
        assert!(caching.cache(1).is_empty());
    }

    #[test]
    fn it_serves_duplicate_requests_with_one_placement() {
        let network = Network::new(
            vec![10],
            vec![Endpoint::new(100, vec![(0, 20), (1, 30)])],
            2,
            10,
            vec![Request::new(0, 0, 5), Request::new(0, 0, 5)],
        )
        .unwrap();

        for strategy in [Strategy::GreedyByRequest, Strategy::GreedyByCache] {
            let caching = strategy
                .fill(&network, &mut StdRng::seed_from_u64(0))
                .unwrap();

            assert_eq!(caching.cache(0), &BTreeSet::from([0]), "{}", strategy.name());
            assert!(caching.cache(1).is_empty(), "{} placed the item twice", strategy.name());
            assert_eq!(caching.score(&network), Ok(80_000));
        }
    }

    #[test]
    fn it_packs_reachable_requests_by_cache() {
        let network = fixtures::example();
        let caching = Strategy::GreedyByCache
            .fill(&network, &mut StdRng::seed_from_u64(0))
            .unwrap();

        // Cache 0 takes item 3 then item 1, the remaining 20 units fit nothing
        assert_eq!(caching.cache(0), &BTreeSet::from([1, 3]));
        assert!(caching.cache(1).is_empty());
        assert!(caching.is_valid(&network));
    }

    #[test]
    fn it_finds_the_optimum_exhaustively() {
        let network = fixtures::example();
        let caching = Strategy::exhaustive()
            .fill(&network, &mut StdRng::seed_from_u64(0))
            .unwrap();

        // Items 1 and 3 on the fastest cache serve all reachable demand
        assert_eq!(caching.score(&network), Ok(562_500));
        assert!(caching.is_valid(&network));
    }

    #[test]
    fn it_refuses_large_exhaustive_searches() {
        let network = fixtures::grid(40, 3);
        let err = Strategy::exhaustive()
            .fill(&network, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert_eq!(err, FillError::TooManyItems { num_items: 40, max: 20 });

        let network = fixtures::grid(12, 6);
        let err = Strategy::exhaustive()
            .fill(&network, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, FillError::TooManyAssignments { num_caches: 6, .. }));
    }

    #[test]
    fn it_enumerates_single_cache_packings() {
        let network = Network::new(vec![4, 5, 6, 20], vec![], 1, 10, vec![]).unwrap();
        let packings = single_cache_packings(&network);

        assert_eq!(max_affordable_count(&network), 2);
        assert_eq!(
            packings,
            vec![
                BTreeSet::new(),
                BTreeSet::from([0]),
                BTreeSet::from([0, 1]),
                BTreeSet::from([0, 2]),
                BTreeSet::from([1]),
                BTreeSet::from([2]),
            ]
        );
    }
}
