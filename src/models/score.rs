use super::caching::Caching;
use super::network::Network;
use tracing::instrument;

/// Normalized latency reduction: saved latency per request, times 1000.
pub type Fitness = u64;

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum ScoreError {
    #[error("EmptyDemand: total request weight is zero")]
    EmptyDemand,
}

/// Best latency at which `endpoint` can be served `item` under `caching`.
fn achieved_latency(caching: &Caching, network: &Network, item: usize, endpoint: usize) -> u32 {
    let endpoint = network.endpoint(endpoint);
    endpoint
        .cache_latencies()
        .iter()
        .filter(|&&(cache, _)| caching.contains(cache, item))
        .map(|&(_, latency)| latency)
        .fold(endpoint.base_latency(), u32::min)
}

/// Demand-weighted latency reduction, before normalization.
pub(crate) fn weighted_reduction(caching: &Caching, network: &Network) -> u128 {
    network
        .requests()
        .iter()
        .map(|request| {
            let base = network.endpoint(request.endpoint).base_latency();
            let achieved = achieved_latency(caching, network, request.item, request.endpoint);
            (base - achieved) as u128 * request.count as u128
        })
        .sum()
}

/// Scores an assignment against a network.
///
/// For every request the latency saved relative to the origin is weighted by
/// the request count; the total is divided by the total request count,
/// multiplied by 1000 and truncated. The result is independent of request
/// order and of the overall request volume.
#[instrument(level = "debug", skip(caching, network), fields(num_requests = network.requests().len()))]
pub fn score(caching: &Caching, network: &Network) -> Result<Fitness, ScoreError> {
    let demand = network.total_demand();
    if demand == 0 {
        return Err(ScoreError::EmptyDemand);
    }

    let normalized = weighted_reduction(caching, network) * 1000 / demand;
    Ok(normalized as Fitness)
}
