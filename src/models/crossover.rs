use crate::models::Caching;
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Slot-wise crossover between two parent assignments.
///
/// The unit of inheritance is a whole cache slot: the child starts as a copy
/// of the fitter parent and a random subset of its slots is replaced
/// wholesale by the same slots of the other parent. Items are never mixed
/// within a slot, so a child inherits only packings that already respect the
/// capacity.
///
/// `rate` is the share of slots kept from the fitter parent. The number of
/// slots taken from the other parent is `floor((1 - rate) * num_caches)`.
///
/// # Examples
///
/// ```rust
/// use cache_placement_ga::models::Crossover;
///
/// // Keep 60% of the slots of the fitter parent
/// let crossover = Crossover::new(0.6)?;
///
/// assert!(Crossover::new(1.5).is_err());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Crossover {
    rate: f64,
}

/// Error returned when a crossover rate lies outside `[0.0, 1.0]`.
#[derive(Debug, thiserror::Error)]
#[error("crossover rate must be between 0.0 and 1.0, got {0}")]
pub struct ProbabilityOutOfRangeError(pub(crate) f64);

impl Crossover {
    pub fn new(rate: f64) -> Result<Self, ProbabilityOutOfRangeError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ProbabilityOutOfRangeError(rate));
        }

        Ok(Self { rate })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Number of slots inherited from the less fit parent.
    pub fn num_exchanged(&self, num_caches: usize) -> usize {
        ((1.0 - self.rate) * num_caches as f64).floor() as usize
    }

    /// Builds a child from `fitter`, taking a random subset of slots from `other`.
    #[instrument(level = "debug", skip(self, rng, fitter, other), fields(num_caches = fitter.num_caches(), rate = self.rate))]
    pub(crate) fn apply<R: Rng>(&self, rng: &mut R, fitter: &Caching, other: &Caching) -> Caching {
        let mut child = fitter.clone();
        let num_caches = child.num_caches().min(other.num_caches());
        let amount = self.num_exchanged(num_caches).min(num_caches);

        for slot in index::sample(rng, num_caches, amount).iter() {
            child.replace_slot(slot, other.cache(slot).clone());
        }

        child
    }
}
