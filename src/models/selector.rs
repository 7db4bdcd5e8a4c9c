//! Truncation selection and elitism.
//!
//! Each generation the population is sorted by fitness descending. The top
//! `selection * population_size` members form the breeding pool and the top
//! `elitism * population_size + 1` members survive unchanged. Parents for a
//! child are two distinct members of the pool, drawn uniformly.
//!
//! ```rust
//! use cache_placement_ga::models::Selector;
//!
//! let selector = Selector::new(0.5, 0.005)?;
//! assert_eq!(selector.pool_size(400)?, 200);
//! assert_eq!(selector.elite_count(400), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use rand::seq::index;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Configuration of parent selection and elitism.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    /// Share of the sorted population eligible for breeding.
    selection: f64,
    /// Share of the sorted population copied unchanged (plus one).
    elitism: f64,
}

/// Errors that can occur during parent selection.
#[derive(Debug, thiserror::Error)]
#[cfg_attr(test, derive(PartialEq))]
pub enum SelectionError {
    #[error("selection fraction must be between 0.0 and 1.0, got {0}")]
    SelectionOutOfRange(f64),

    #[error("elitism fraction must be between 0.0 and 1.0, got {0}")]
    ElitismOutOfRange(f64),

    /// Breeding needs two distinct parents.
    #[error("breeding pool must hold at least 2 members, got {provided} from population {population_size}")]
    PoolTooSmall {
        population_size: usize,
        provided: usize,
    },
}

impl Selector {
    pub fn new(selection: f64, elitism: f64) -> Result<Self, SelectionError> {
        if !(0.0..=1.0).contains(&selection) {
            return Err(SelectionError::SelectionOutOfRange(selection));
        }
        if !(0.0..=1.0).contains(&elitism) {
            return Err(SelectionError::ElitismOutOfRange(elitism));
        }

        Ok(Self { selection, elitism })
    }

    pub fn selection(&self) -> f64 {
        self.selection
    }

    pub fn elitism(&self) -> f64 {
        self.elitism
    }

    /// Number of top members eligible as parents.
    pub fn pool_size(&self, population_size: usize) -> Result<usize, SelectionError> {
        let provided = ((self.selection * population_size as f64).floor() as usize).min(population_size);
        if provided < 2 {
            return Err(SelectionError::PoolTooSmall {
                population_size,
                provided,
            });
        }
        Ok(provided)
    }

    /// Number of top members carried over unchanged.
    pub fn elite_count(&self, population_size: usize) -> usize {
        ((self.elitism * population_size as f64).floor() as usize + 1).min(population_size)
    }

    /// Draws `num_pairs` pairs of distinct pool indices, lower (fitter) index first.
    #[instrument(level = "debug", skip(self, rng), fields(num_pairs = num_pairs, pool_size = pool_size))]
    pub(crate) fn select_parents(
        &self,
        num_pairs: usize,
        pool_size: usize,
        rng: &mut impl rand::Rng,
    ) -> Result<Vec<(usize, usize)>, SelectionError> {
        if pool_size < 2 {
            return Err(SelectionError::PoolTooSmall {
                population_size: pool_size,
                provided: pool_size,
            });
        }

        Ok((0..num_pairs)
            .map(|_| {
                let picked = index::sample(rng, pool_size, 2);
                let (a, b) = (picked.index(0), picked.index(1));
                (a.min(b), a.max(b))
            })
            .collect())
    }
}
