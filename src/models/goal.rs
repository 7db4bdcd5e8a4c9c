use super::Fitness;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Optional early stop for evolution.
///
/// Fitness is always maximized. Without a target, evolution runs until the
/// generation budget is exhausted or it is interrupted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessGoal {
    #[default]
    Unbounded,
    /// Stop once the best fitness reaches or exceeds the threshold.
    Maximize { threshold: Fitness },
}

impl FitnessGoal {
    pub fn maximize(threshold: Fitness) -> Self {
        Self::Maximize { threshold }
    }

    /// Builds a goal from an optional target score.
    pub fn from_target(target: Option<Fitness>) -> Self {
        target.map_or(Self::Unbounded, Self::maximize)
    }

    /// Checks if the given fitness value has reached the goal threshold.
    #[instrument(level = "debug", skip(self), fields(goal = ?self, fitness = fitness))]
    pub(crate) fn is_reached(&self, fitness: Fitness) -> bool {
        match self {
            FitnessGoal::Unbounded => false,
            FitnessGoal::Maximize { threshold } => fitness >= *threshold,
        }
    }

    /// Progress towards the threshold, from 0.0 to 1.0. Unbounded goals
    /// report no progress.
    pub(crate) fn calculate_progress(&self, best_fitness: Option<Fitness>) -> f64 {
        let (Some(best_fitness), FitnessGoal::Maximize { threshold }) = (best_fitness, self) else {
            return 0.0;
        };

        if *threshold == 0 {
            return 1.0;
        }
        (best_fitness as f64 / *threshold as f64).clamp(0.0, 1.0)
    }
}
