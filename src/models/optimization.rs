use super::{
    Crossover, Fitness, FitnessGoal, Mutagen, MutagenError, MutationTrigger,
    ProbabilityOutOfRangeError, Schedule, ScheduleError, SelectionError, Selector,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Optimizer configuration as read from a configuration file or the command line.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use cache_placement_ga::models::Optimization;
///
/// let config: Optimization = serde_json::from_str(r#"{ "population_size": 50 }"#)?;
/// assert_eq!(config.population_size, 50);
/// assert_eq!(config.crossover, 0.6);
///
/// let evolution = config.evolution()?;
/// assert_eq!(evolution.schedule().population_size, 50);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Optimization {
    pub population_size: usize,
    /// Share of the sorted population used as breeding pool.
    pub selection: f64,
    /// Share of cache slots a child keeps from its fitter parent.
    pub crossover: f64,
    pub mutation_rate: f64,
    /// Share of cache slots rebuilt by a mutation.
    pub mutation_fraction: f64,
    pub mutation_trigger: MutationTrigger,
    /// Share of the sorted population carried over unchanged (plus one).
    pub elitism: f64,
    pub max_generations: u32,
    /// Stop early once the best fitness reaches this score.
    pub target: Option<Fitness>,
    /// Seed of the orchestrating random generator. Drawn from entropy if absent.
    pub seed: Option<u64>,
}

impl Default for Optimization {
    fn default() -> Self {
        Self {
            population_size: 400,
            selection: 0.5,
            crossover: 0.6,
            mutation_rate: 0.05,
            mutation_fraction: 0.1,
            mutation_trigger: MutationTrigger::default(),
            elitism: 0.005,
            max_generations: 1000,
            target: None,
            seed: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptimizationError {
    #[error("ScheduleError: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("SelectionError: {0}")]
    Selection(#[from] SelectionError),
    #[error("CrossoverError: {0}")]
    Crossover(#[from] ProbabilityOutOfRangeError),
    #[error("MutagenError: {0}")]
    Mutagen(#[from] MutagenError),
}

impl Optimization {
    /// Validates the configuration and builds the evolution operators.
    #[instrument(level = "debug", skip(self), fields(population_size = self.population_size, max_generations = self.max_generations))]
    pub fn evolution(&self) -> Result<Evolution, OptimizationError> {
        let schedule = Schedule::generational(self.max_generations, self.population_size)?;
        let selector = Selector::new(self.selection, self.elitism)?;
        // Fail early rather than at the first generation
        selector.pool_size(self.population_size)?;

        Ok(Evolution {
            schedule,
            selector,
            crossover: Crossover::new(self.crossover)?,
            mutagen: Mutagen::constant(
                self.mutation_rate,
                self.mutation_fraction,
                self.mutation_trigger,
            )?,
            goal: FitnessGoal::from_target(self.target),
        })
    }
}

/// Validated evolution operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evolution {
    pub(crate) schedule: Schedule,
    pub(crate) selector: Selector,
    pub(crate) crossover: Crossover,
    pub(crate) mutagen: Mutagen,
    pub(crate) goal: FitnessGoal,
}

impl Evolution {
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn crossover(&self) -> &Crossover {
        &self.crossover
    }

    pub fn mutagen(&self) -> &Mutagen {
        &self.mutagen
    }

    pub fn goal(&self) -> &FitnessGoal {
        &self.goal
    }

    /// Checks if the given best fitness completes the optimization.
    pub(crate) fn is_completed(&self, fitness: Fitness) -> bool {
        self.goal.is_reached(fitness)
    }
}
