mod caching;
mod crossover;
mod goal;
mod mutagen;
mod network;
mod optimization;
mod population;
mod schedule;
mod score;
mod selector;
pub(crate) mod strategy;

#[cfg(test)]
pub(crate) mod fixtures;

pub use caching::{CacheSlot, Caching, CapacityViolation, ValidationError};
pub use crossover::{Crossover, ProbabilityOutOfRangeError};
pub use goal::FitnessGoal;
pub use mutagen::{Mutagen, MutagenError, MutationRate, MutationRateOutOfRange, MutationTrigger};
pub use network::{
    CacheId, Endpoint, EndpointId, InfeasibleItem, ItemId, Network, NetworkError, Request,
};
pub use optimization::{Evolution, Optimization, OptimizationError};
pub use population::{Member, Population};
pub use schedule::{Schedule, ScheduleError};
pub use score::{Fitness, ScoreError, score};
pub use selector::{SelectionError, Selector};
pub use strategy::{ExhaustiveLimits, FillError, Strategy};

pub(crate) use schedule::ScheduleDecision;
