//! Small networks shared by unit tests.

use super::{Endpoint, Network, Request};

/// Five items, two endpoints, three caches of capacity 100.
pub(crate) fn example() -> Network {
    Network::new(
        vec![50, 50, 80, 30, 110],
        vec![
            Endpoint::new(1000, vec![(0, 100), (2, 200), (1, 300)]),
            Endpoint::new(500, vec![]),
        ],
        3,
        100,
        vec![
            Request::new(3, 0, 1500),
            Request::new(0, 1, 1000),
            Request::new(4, 0, 500),
            Request::new(1, 0, 1000),
        ],
    )
    .expect("example network is valid")
}

/// One item of size 10 reachable through a single cache at latency 20.
pub(crate) fn single() -> Network {
    Network::new(
        vec![10],
        vec![Endpoint::new(100, vec![(0, 20)])],
        1,
        10,
        vec![Request::new(0, 0, 5)],
    )
    .expect("single network is valid")
}

/// A wider network where every endpoint reaches every cache.
pub(crate) fn grid(num_items: usize, num_caches: usize) -> Network {
    let items = (0..num_items).map(|i| 10 + (i as u64 * 7) % 40).collect();
    let endpoints = (0..4)
        .map(|e| {
            Endpoint::new(
                1000,
                (0..num_caches)
                    .map(|c| (c, 100 + ((c * 37 + e * 53) % 400) as u32))
                    .collect(),
            )
        })
        .collect();
    let requests = (0..num_items * 2)
        .map(|r| Request::new(r % num_items, r % 4, 1 + (r as u64 * 13) % 97))
        .collect();

    Network::new(items, endpoints, num_caches, 100, requests).expect("grid network is valid")
}
