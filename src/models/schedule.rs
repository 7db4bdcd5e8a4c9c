use super::Population;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Controls how many generations are bred during evolution.
///
/// Evolution is strictly generational: every step replaces the whole
/// population (minus its elites) with offspring. Generation `0` is the
/// initial population; the optimizer terminates once the population reaches
/// `max_generations`, counting any generations restored from a checkpoint.
///
/// # Examples
///
/// ```rust
/// use cache_placement_ga::models::Schedule;
///
/// // 1000 generations of 400 assignments each
/// let schedule = Schedule::generational(1000, 400)?;
/// assert_eq!(schedule.population_size, 400);
///
/// // Breeding needs at least two members
/// assert!(Schedule::generational(10, 1).is_err());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Schedule {
    /// Generation at which evolution stops.
    pub max_generations: u32,
    /// Number of assignments in every generation.
    pub population_size: usize,
}

#[derive(Debug, thiserror::Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum ScheduleError {
    #[error("population size must be at least 2, got {0}")]
    PopulationTooSmall(usize),
}

/// Decision about what to do with the current population.
#[derive(Debug, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// Breed the next generation.
    Breed {
        /// Number of children needed to refill the population after elitism.
        num_offspring: usize,
        next_generation: u32,
    },
    /// Generation budget exhausted.
    Terminate,
}

impl Schedule {
    pub fn generational(max_generations: u32, population_size: usize) -> Result<Self, ScheduleError> {
        if population_size < 2 {
            return Err(ScheduleError::PopulationTooSmall(population_size));
        }

        Ok(Self {
            max_generations,
            population_size,
        })
    }

    /// Decides whether `population` should be bred, given how many members
    /// survive unchanged.
    #[instrument(level = "debug", skip(self, population), fields(generation = population.generation(), max_generations = self.max_generations, num_elites = num_elites))]
    pub(crate) fn should_breed(&self, population: &Population, num_elites: usize) -> ScheduleDecision {
        if population.generation() >= self.max_generations {
            return ScheduleDecision::Terminate;
        }

        ScheduleDecision::Breed {
            num_offspring: self.population_size.saturating_sub(num_elites),
            next_generation: population.generation() + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Caching, Member};

    fn create_test_population(generation: u32, size: usize) -> Population {
        Population::new(
            generation,
            (0..size)
                .map(|i| Member::new(i as u64, Caching::new(1)))
                .collect(),
        )
    }

    #[test]
    fn generational_constructor_sets_correct_parameters() {
        let schedule = Schedule::generational(5, 100).unwrap();

        assert_eq!(schedule.max_generations, 5);
        assert_eq!(schedule.population_size, 100);
    }

    #[test]
    fn generational_constructor_rejects_tiny_populations() {
        assert_eq!(
            Schedule::generational(5, 1).unwrap_err(),
            ScheduleError::PopulationTooSmall(1)
        );
        assert_eq!(
            Schedule::generational(5, 0).unwrap_err(),
            ScheduleError::PopulationTooSmall(0)
        );
    }

    #[test]
    fn should_breed_the_non_elite_share() {
        let schedule = Schedule::generational(5, 100).unwrap();
        let population = create_test_population(1, 100);

        assert_eq!(
            schedule.should_breed(&population, 3),
            ScheduleDecision::Breed {
                num_offspring: 97,
                next_generation: 2,
            }
        );
    }

    #[test]
    fn should_terminate_when_budget_reached() {
        let schedule = Schedule::generational(5, 100).unwrap();

        assert_eq!(
            schedule.should_breed(&create_test_population(5, 100), 3),
            ScheduleDecision::Terminate
        );
        assert_eq!(
            schedule.should_breed(&create_test_population(7, 100), 3),
            ScheduleDecision::Terminate
        );
    }

    #[test]
    fn zero_budget_never_breeds() {
        let schedule = Schedule::generational(0, 10).unwrap();

        assert_eq!(
            schedule.should_breed(&create_test_population(0, 10), 1),
            ScheduleDecision::Terminate
        );
    }

    #[test]
    fn all_elites_breeds_nothing() {
        let schedule = Schedule::generational(5, 10).unwrap();

        assert_eq!(
            schedule.should_breed(&create_test_population(0, 10), 10),
            ScheduleDecision::Breed {
                num_offspring: 0,
                next_generation: 1,
            }
        );
    }
}
