use crate::models::strategy::random_slot;
use crate::models::{Caching, Network};
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use tracing::instrument;

// ============================================================
// MutationTrigger
// ============================================================

/// How a uniform draw is compared with the mutation rate.
///
/// `AtOrAboveRate` mutates when the draw is `>= mutation_rate`, so with a
/// small rate nearly every child is mutated. `BelowRate` is the conventional
/// reading where the rate is the probability of mutating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationTrigger {
    #[default]
    AtOrAboveRate,
    BelowRate,
}

impl MutationTrigger {
    fn fires(&self, draw: f64, mutation_rate: f64) -> bool {
        match self {
            MutationTrigger::AtOrAboveRate => draw >= mutation_rate,
            MutationTrigger::BelowRate => draw < mutation_rate,
        }
    }
}

// ============================================================
// MutationRate
// ============================================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationRate {
    value: f64,
    trigger: MutationTrigger,
}

#[derive(Debug, thiserror::Error)]
#[error("mutation_rate must be between 0.0 and 1.0, got: {0}")]
pub struct MutationRateOutOfRange(f64);

impl MutationRate {
    pub fn new(value: f64, trigger: MutationTrigger) -> Result<Self, MutationRateOutOfRange> {
        if !(0.0..=1.0).contains(&value) {
            return Err(MutationRateOutOfRange(value));
        }

        Ok(Self { value, trigger })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn trigger(&self) -> MutationTrigger {
        self.trigger
    }

    fn fires<R: Rng>(&self, rng: &mut R) -> bool {
        let draw: f64 = rng.random();
        self.trigger.fires(draw, self.value)
    }
}

// ============================================================
// Mutagen
// ============================================================

/// Re-randomizes a share of the cache slots of a child.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mutagen {
    mutation_rate: MutationRate,
    /// Share of slots rebuilt when a mutation fires.
    fraction: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum MutagenError {
    #[error("Mutation rate error: {0}")]
    MutationRate(#[from] MutationRateOutOfRange),
    #[error("mutation fraction must be between 0.0 and 1.0, got: {0}")]
    FractionOutOfRange(f64),
}

impl Mutagen {
    pub fn new(mutation_rate: MutationRate, fraction: f64) -> Result<Self, MutagenError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(MutagenError::FractionOutOfRange(fraction));
        }

        Ok(Self {
            mutation_rate,
            fraction,
        })
    }

    pub fn constant(
        mutation_rate: f64,
        fraction: f64,
        trigger: MutationTrigger,
    ) -> Result<Self, MutagenError> {
        Self::new(MutationRate::new(mutation_rate, trigger)?, fraction)
    }

    pub fn mutation_rate(&self) -> MutationRate {
        self.mutation_rate
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Number of slots rebuilt by one mutation.
    pub fn num_mutated(&self, num_caches: usize) -> usize {
        ((self.fraction * num_caches as f64).floor() as usize).min(num_caches)
    }

    /// Rebuilds a random subset of slots with random fill. Returns whether
    /// the mutation fired.
    #[instrument(level = "debug", skip(self, rng, caching, network), fields(num_caches = caching.num_caches()))]
    pub(crate) fn mutate<R: Rng>(
        &self,
        rng: &mut R,
        caching: &mut Caching,
        network: &Network,
    ) -> bool {
        if !self.mutation_rate.fires(rng) {
            return false;
        }

        let num_caches = caching.num_caches();
        for slot in index::sample(rng, num_caches, self.num_mutated(num_caches)).iter() {
            caching.replace_slot(slot, random_slot(network, rng));
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_mutation_rate_validation_errors() {
        assert!(MutationRate::new(-0.1, MutationTrigger::BelowRate).is_err());
        assert!(MutationRate::new(1.5, MutationTrigger::AtOrAboveRate).is_err());
    }

    #[test]
    fn test_mutagen_validation_errors() {
        assert!(Mutagen::constant(0.5, -0.1, MutationTrigger::BelowRate).is_err());
        assert!(Mutagen::constant(0.5, 1.1, MutationTrigger::BelowRate).is_err());
        assert!(Mutagen::constant(-0.5, 0.1, MutationTrigger::BelowRate).is_err());
        assert!(Mutagen::constant(0.05, 0.1, MutationTrigger::default()).is_ok());
    }

    #[test]
    fn test_trigger_conventions() {
        assert!(MutationTrigger::AtOrAboveRate.fires(0.5, 0.05));
        assert!(!MutationTrigger::AtOrAboveRate.fires(0.01, 0.05));
        assert!(MutationTrigger::BelowRate.fires(0.01, 0.05));
        assert!(!MutationTrigger::BelowRate.fires(0.5, 0.05));
    }

    #[test]
    fn it_mutates_the_configured_share_of_slots() {
        let network = fixtures::grid(40, 10);
        let mut rng = StdRng::seed_from_u64(42);
        // Always fires
        let mutagen = Mutagen::constant(0.0, 0.3, MutationTrigger::AtOrAboveRate).unwrap();
        assert_eq!(mutagen.num_mutated(10), 3);

        let mut caching = Caching::new(10);
        assert!(mutagen.mutate(&mut rng, &mut caching, &network));

        let rebuilt = caching.caches().iter().filter(|slot| !slot.is_empty()).count();
        assert_eq!(rebuilt, 3);
        assert!(caching.is_valid(&network));
    }

    #[test]
    fn it_respects_a_rate_that_never_fires() {
        let network = fixtures::grid(40, 10);
        let mut rng = StdRng::seed_from_u64(42);
        let mutagen = Mutagen::constant(0.0, 1.0, MutationTrigger::BelowRate).unwrap();

        let mut caching = Caching::new(10);
        for _ in 0..100 {
            assert!(!mutagen.mutate(&mut rng, &mut caching, &network));
        }
        assert!(caching.is_empty());
    }

    #[test]
    fn it_fires_mostly_with_the_default_trigger() {
        let network = fixtures::grid(20, 4);
        let mut rng = StdRng::seed_from_u64(9);
        let mutagen = Mutagen::constant(0.05, 0.5, MutationTrigger::default()).unwrap();

        let fired = (0..1000)
            .filter(|_| mutagen.mutate(&mut rng, &mut Caching::new(4), &network))
            .count();
        assert!(fired > 900, "fired {fired} times");
    }
}
