use super::Error;
use crate::builder::{Set, Unset};
use crate::models::{
    Caching, Evolution, Fitness, Member, Network, Optimization, Population, ScheduleDecision,
    Strategy,
};
use crate::repositories::populations;
use crate::services::workers::Pool;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::instrument;

/// Number of random fills handed to the pool at once by Monte-Carlo search,
/// per worker thread.
const MONTE_CARLO_BATCH_PER_THREAD: usize = 16;

/// Cloneable handle asking a running search to stop at the next
/// generation boundary.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Why an evolution run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conclusion {
    /// The target fitness was reached.
    Completed,
    /// The generation budget was exhausted.
    Terminated,
    /// Stopped through an [`Interrupt`]; the last checkpoint is resumable.
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub conclusion: Conclusion,
    pub generation: u32,
    pub best: Member,
}

type NetworkField = (String, Network);

pub struct ServiceBuilder<N, C> {
    network: N,
    checkpoints: C,
    evolution: Option<Evolution>,
    pool: Option<Arc<Pool>>,
    seed: Option<u64>,
    interrupt: Interrupt,
}

impl Default for ServiceBuilder<Unset<NetworkField>, Unset<populations::Repository>> {
    fn default() -> Self {
        Self {
            network: Unset::new(),
            checkpoints: Unset::new(),
            evolution: None,
            pool: None,
            seed: None,
            interrupt: Interrupt::new(),
        }
    }
}

impl<C> ServiceBuilder<Unset<NetworkField>, C> {
    /// The network to optimize, under the name its checkpoints are stored by.
    pub fn network(
        self,
        instance: impl Into<String>,
        network: Network,
    ) -> ServiceBuilder<Set<NetworkField>, C> {
        ServiceBuilder {
            network: Set::new((instance.into(), network)),
            checkpoints: self.checkpoints,
            evolution: self.evolution,
            pool: self.pool,
            seed: self.seed,
            interrupt: self.interrupt,
        }
    }
}

impl<N> ServiceBuilder<N, Unset<populations::Repository>> {
    pub fn checkpoints(
        self,
        populations: populations::Repository,
    ) -> ServiceBuilder<N, Set<populations::Repository>> {
        ServiceBuilder {
            network: self.network,
            checkpoints: Set::new(populations),
            evolution: self.evolution,
            pool: self.pool,
            seed: self.seed,
            interrupt: self.interrupt,
        }
    }
}

impl<N, C> ServiceBuilder<N, C> {
    pub fn with_evolution(mut self, evolution: Evolution) -> Self {
        self.evolution = Some(evolution);
        self
    }

    /// Shares a worker pool, e.g. between the instances of a batch.
    pub fn with_pool(mut self, pool: Arc<Pool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }
}

impl ServiceBuilder<Set<NetworkField>, Set<populations::Repository>> {
    #[instrument(level = "debug", skip(self), fields(instance = %self.network.as_ref_inner().0, seed = ?self.seed))]
    pub fn build(self) -> Result<Service, Error> {
        let (instance, network) = self.network.into_inner();

        let evolution = match self.evolution {
            Some(evolution) => evolution,
            None => Optimization::default().evolution()?,
        };
        let pool = match self.pool {
            Some(pool) => pool,
            None => Arc::new(Pool::new()?),
        };
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        Ok(Service {
            instance,
            network,
            populations: self.checkpoints.into_inner(),
            pool,
            evolution,
            rng,
            interrupt: self.interrupt,
            best_known: None,
        })
    }
}

/// Searches cache placements for one network.
///
/// The service owns the orchestrating random generator. Every unit of
/// parallel work gets its own generator seeded from it, so a run is
/// reproducible for a fixed seed regardless of thread scheduling.
pub struct Service {
    instance: String,
    network: Network,
    populations: populations::Repository,
    pool: Arc<Pool>,
    evolution: Evolution,
    rng: StdRng,
    interrupt: Interrupt,
    /// Fitness of the stored best-known solution, once it has been read.
    best_known: Option<Option<Fitness>>,
}

/// Validates and scores an assignment produced by the optimizer.
fn evaluate(network: &Network, caching: Caching) -> Result<Member, Error> {
    caching.validate(network)?;
    let fitness = caching.score(network)?;
    Ok(Member::new(fitness, caching))
}

fn random_member(network: &Network, seed: u64) -> Result<Member, Error> {
    let mut rng = StdRng::seed_from_u64(seed);
    let caching = Strategy::RandomFill.fill(network, &mut rng)?;
    evaluate(network, caching)
}

impl Service {
    pub fn builder() -> ServiceBuilder<Unset<NetworkField>, Unset<populations::Repository>> {
        ServiceBuilder::default()
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn evolution(&self) -> &Evolution {
        &self.evolution
    }

    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn best_known_path(&self) -> PathBuf {
        self.populations.best_known_path(&self.instance)
    }

    fn seeds(&mut self, count: usize) -> Vec<u64> {
        (0..count).map(|_| self.rng.random()).collect()
    }

    /// Reads, validates and scores the stored best-known solution. A corrupt
    /// or ill-fitting file is reported and ignored.
    #[instrument(level = "debug", skip(self), fields(instance = %self.instance))]
    pub fn load_best_known(&mut self) -> Result<Option<Member>, Error> {
        let stored = match self
            .populations
            .load_best_known(&self.instance, self.network.num_caches())
        {
            Ok(stored) => stored,
            Err(err @ populations::Error::Corrupt { .. }) => {
                tracing::warn!(error = %err, "Ignoring corrupt best-known solution");
                None
            }
            Err(err) => return Err(err.into()),
        };

        let member = match stored {
            Some(caching) => match caching.validate(&self.network) {
                Ok(()) => Some(Member::new(caching.score(&self.network)?, caching)),
                Err(err) => {
                    tracing::warn!(error = %err, "Ignoring best-known solution that does not fit the network");
                    None
                }
            },
            None => None,
        };

        self.best_known = Some(member.as_ref().map(|member| member.fitness));
        Ok(member)
    }

    /// Stores `member` as best-known solution if it beats the stored one.
    #[instrument(level = "debug", skip(self, member), fields(instance = %self.instance, fitness = member.fitness))]
    fn update_best_known(&mut self, member: &Member) -> Result<bool, Error> {
        let stored = match self.best_known {
            Some(stored) => stored,
            None => self.load_best_known()?.map(|member| member.fitness),
        };

        if stored.is_some_and(|stored| member.fitness <= stored) {
            return Ok(false);
        }

        self.populations
            .save_best_known(&self.instance, &member.caching)?;
        self.best_known = Some(Some(member.fitness));

        tracing::info!(
            fitness = member.fitness,
            previous = ?stored,
            path = %self.best_known_path().display(),
            "Saved new best-known solution"
        );

        Ok(true)
    }

    /// Builds one assignment with `strategy`.
    #[instrument(level = "info", skip(self), fields(instance = %self.instance, strategy = strategy.name()))]
    pub fn solve(&mut self, strategy: Strategy) -> Result<Member, Error> {
        let started = Instant::now();
        let seed = self.rng.random();

        let network = &self.network;
        let caching = self
            .pool
            .install(|| strategy.fill(network, &mut StdRng::seed_from_u64(seed)))?;
        let member = evaluate(&self.network, caching)?;

        tracing::info!(
            fitness = member.fitness,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Strategy finished"
        );

        self.update_best_known(&member)?;
        Ok(member)
    }

    /// Repeats random fill `iterations` times, keeping the best assignment.
    /// Starts from the stored best-known solution when there is one.
    #[instrument(level = "info", skip(self), fields(instance = %self.instance))]
    pub fn monte_carlo(&mut self, iterations: usize) -> Result<Member, Error> {
        let started = Instant::now();
        let mut incumbent = self.load_best_known()?;
        let batch_size = self.pool.num_threads() * MONTE_CARLO_BATCH_PER_THREAD;

        let mut done = 0;
        while done < iterations {
            if self.interrupt.is_interrupted() {
                tracing::info!(iterations = done, "Monte-Carlo search interrupted");
                break;
            }

            let seeds = self.seeds(batch_size.min(iterations - done));
            done += seeds.len();

            let network = &self.network;
            let members = self
                .pool
                .run(seeds, |_, seed| random_member(network, seed))?;

            // Earliest of equally fit candidates wins
            let Some(best) = members
                .into_iter()
                .reduce(|best, member| if member.fitness > best.fitness { member } else { best })
            else {
                continue;
            };

            if incumbent
                .as_ref()
                .is_none_or(|incumbent| best.fitness > incumbent.fitness)
            {
                tracing::info!(fitness = best.fitness, iteration = done, "Monte-Carlo search improved");
                self.update_best_known(&best)?;
                incumbent = Some(best);
            }
        }

        let best = incumbent.ok_or(Error::NoSolution)?;
        tracing::info!(
            fitness = best.fitness,
            iterations = done,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Monte-Carlo search finished"
        );
        Ok(best)
    }

    /// Restores the latest checkpoint of the configured population size, or
    /// builds and checkpoints generation `0`.
    ///
    /// A fresh population is seeded with the best-known solution, if any,
    /// and filled up with random assignments. Checkpoint members that cannot
    /// be read or do not fit the network are replaced by random ones.
    #[instrument(level = "info", skip(self), fields(instance = %self.instance, population_size = self.evolution.schedule.population_size))]
    pub fn initialize(&mut self) -> Result<Population, Error> {
        let population_size = self.evolution.schedule.population_size;

        let checkpoint = self.populations.load_latest(
            &self.instance,
            population_size,
            self.network.num_caches(),
        )?;

        if let Some(checkpoint) = checkpoint {
            let generation = checkpoint.manifest.generation;
            let seeds = self.seeds(checkpoint.members.len());
            let tasks: Vec<_> = checkpoint.members.into_iter().zip(seeds).collect();

            let network = &self.network;
            let members = self.pool.run(tasks, |index, (stored, seed)| {
                let caching = match stored {
                    Ok(caching) => caching,
                    Err(err) => {
                        tracing::warn!(index, error = %err, "Replacing unreadable checkpoint member");
                        return random_member(network, seed);
                    }
                };
                if let Err(err) = caching.validate(network) {
                    tracing::warn!(index, error = %err, "Replacing checkpoint member that does not fit the network");
                    return random_member(network, seed);
                }
                Ok(Member::new(caching.score(network)?, caching))
            })?;

            let population = Population::new(generation, members);
            tracing::info!(
                generation,
                best_fitness = ?population.best_fitness(),
                "Resumed from checkpoint"
            );

            if let Some(best) = population.best() {
                self.update_best_known(best)?;
            }
            return Ok(population);
        }

        let seed_member = self.load_best_known()?;
        let seeds = self.seeds(population_size - usize::from(seed_member.is_some()));

        let network = &self.network;
        let mut members = self
            .pool
            .run(seeds, |_, seed| random_member(network, seed))?;
        if let Some(seed_member) = seed_member {
            members.insert(0, seed_member);
        }

        let population = Population::new(0, members);
        self.populations.save_generation(&self.instance, &population)?;

        tracing::info!(
            best_fitness = ?population.best_fitness(),
            "Initialized population"
        );

        if let Some(best) = population.best() {
            self.update_best_known(best)?;
        }
        Ok(population)
    }

    /// Breeds the generation following `population`, regardless of the
    /// generation budget.
    pub fn step(&mut self, population: &Population) -> Result<Population, Error> {
        let population_size = self.evolution.schedule.population_size;
        let num_elites = self.evolution.selector.elite_count(population_size);

        self.breed(
            population,
            population_size.saturating_sub(num_elites),
            population.generation() + 1,
        )
    }

    #[instrument(level = "debug", skip(self, population), fields(instance = %self.instance, generation = population.generation(), num_offspring = num_offspring))]
    fn breed(
        &mut self,
        population: &Population,
        num_offspring: usize,
        next_generation: u32,
    ) -> Result<Population, Error> {
        let evolution = self.evolution;
        let num_elites = evolution
            .selector
            .elite_count(evolution.schedule.population_size);
        let pool_size = evolution.selector.pool_size(population.len())?;

        let pairs = evolution
            .selector
            .select_parents(num_offspring, pool_size, &mut self.rng)?;
        let seeds = self.seeds(pairs.len());
        let tasks: Vec<_> = pairs.into_iter().zip(seeds).collect();

        let members = population.members();
        let network = &self.network;
        let offspring = self.pool.run(tasks, |_, ((fitter, other), seed)| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut child = evolution.crossover.apply(
                &mut rng,
                &members[fitter].caching,
                &members[other].caching,
            );
            evolution.mutagen.mutate(&mut rng, &mut child, network);
            evaluate(network, child)
        })?;

        let mut next: Vec<Member> = members.iter().take(num_elites).cloned().collect();
        next.extend(offspring);

        let next = Population::new(next_generation, next);
        self.populations.save_generation(&self.instance, &next)?;

        if let Some(best) = next.best() {
            self.update_best_known(best)?;
        }
        Ok(next)
    }

    /// Runs evolution from the latest checkpoint until the generation
    /// budget is exhausted, the target fitness is reached or the run is
    /// interrupted.
    #[instrument(level = "info", skip(self), fields(instance = %self.instance, population_size = self.evolution.schedule.population_size, max_generations = self.evolution.schedule.max_generations))]
    pub fn evolve(&mut self) -> Result<Outcome, Error> {
        let started = Instant::now();
        let evolution = self.evolution;
        let num_elites = evolution
            .selector
            .elite_count(evolution.schedule.population_size);

        let mut population = self.initialize()?;

        let conclusion = loop {
            let best_fitness = population.best_fitness().ok_or(Error::NoSolution)?;

            if evolution.is_completed(best_fitness) {
                break Conclusion::Completed;
            }
            if self.interrupt.is_interrupted() {
                break Conclusion::Interrupted;
            }

            match evolution.schedule.should_breed(&population, num_elites) {
                ScheduleDecision::Terminate => break Conclusion::Terminated,
                ScheduleDecision::Breed {
                    num_offspring,
                    next_generation,
                } => {
                    population = self.breed(&population, num_offspring, next_generation)?;

                    tracing::info!(
                        generation = population.generation(),
                        best_fitness = ?population.best_fitness(),
                        worst_fitness = ?population.worst_fitness(),
                        mean_fitness = ?population.mean_fitness(),
                        progress = evolution.goal.calculate_progress(population.best_fitness()),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Generation complete"
                    );
                }
            }
        };

        let best = population.best().cloned().ok_or(Error::NoSolution)?;
        tracing::info!(
            conclusion = ?conclusion,
            generation = population.generation(),
            best_fitness = best.fitness,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Evolution finished"
        );

        Ok(Outcome {
            conclusion,
            generation: population.generation(),
            best,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CapacityViolation, ValidationError, fixtures};
    use crate::repositories::cachings;
    use std::path::Path;

    fn optimization(population_size: usize, max_generations: u32) -> Optimization {
        Optimization {
            population_size,
            max_generations,
            ..Default::default()
        }
    }

    fn service(root: &Path, network: Network, config: &Optimization) -> Service {
        Service::builder()
            .network("grid", network)
            .checkpoints(populations::Repository::new(root))
            .with_evolution(config.evolution().unwrap())
            .with_pool(Arc::new(Pool::with_threads(2).unwrap()))
            .with_seed(Some(42))
            .build()
            .unwrap()
    }

    fn stored_best(root: &Path, num_caches: usize) -> Caching {
        cachings::Repository::new()
            .load(&root.join("grid.out"), num_caches)
            .unwrap()
    }

    #[test]
    fn it_solves_with_a_strategy_and_keeps_the_best() {
        let root = tempfile::tempdir().unwrap();
        let mut service = service(root.path(), fixtures::example(), &optimization(10, 1));

        let greedy = service.solve(Strategy::GreedyByRequest).unwrap();
        assert_eq!(greedy.fitness, 562_500);
        assert_eq!(stored_best(root.path(), 3), greedy.caching);

        // A worse assignment never replaces the stored one
        let random = service.solve(Strategy::RandomFill).unwrap();
        assert!(random.caching.is_valid(service.network()));
        if random.fitness <= greedy.fitness {
            assert_eq!(stored_best(root.path(), 3), greedy.caching);
        }
    }

    #[test]
    fn it_keeps_the_best_fitness_non_decreasing() {
        let root = tempfile::tempdir().unwrap();
        let mut service = service(root.path(), fixtures::grid(30, 5), &optimization(12, 10));

        let mut population = service.initialize().unwrap();
        assert_eq!(population.len(), 12);
        assert_eq!(population.generation(), 0);

        for generation in 1..=5 {
            let next = service.step(&population).unwrap();
            assert_eq!(next.generation(), generation);
            assert_eq!(next.len(), 12);
            assert!(next.best_fitness() >= population.best_fitness());
            assert!(next.members().iter().all(|m| m.caching.is_valid(service.network())));
            population = next;
        }

        let best = population.best().unwrap();
        assert_eq!(
            stored_best(root.path(), 5).score(service.network()).unwrap(),
            best.fitness
        );
    }

    #[test]
    fn it_terminates_on_the_generation_budget() {
        let root = tempfile::tempdir().unwrap();
        let mut service = service(root.path(), fixtures::grid(20, 4), &optimization(8, 4));

        let outcome = service.evolve().unwrap();
        assert_eq!(outcome.conclusion, Conclusion::Terminated);
        assert_eq!(outcome.generation, 4);

        let repository = populations::Repository::new(root.path());
        assert_eq!(repository.list_generations("grid").unwrap(), vec![4]);
    }

    #[test]
    fn it_completes_when_the_target_is_reached() {
        let root = tempfile::tempdir().unwrap();
        let config = Optimization {
            target: Some(0),
            ..optimization(8, 50)
        };
        let mut service = service(root.path(), fixtures::grid(20, 4), &config);

        let outcome = service.evolve().unwrap();
        assert_eq!(outcome.conclusion, Conclusion::Completed);
        assert_eq!(outcome.generation, 0);
    }

    #[test]
    fn it_stops_when_interrupted() {
        let root = tempfile::tempdir().unwrap();
        let mut service = service(root.path(), fixtures::grid(20, 4), &optimization(8, 50));

        service.interrupt().interrupt();
        let outcome = service.evolve().unwrap();
        assert_eq!(outcome.conclusion, Conclusion::Interrupted);
        assert_eq!(outcome.generation, 0);
    }

    #[test]
    fn it_resumes_from_the_latest_checkpoint() {
        let root = tempfile::tempdir().unwrap();

        let first = service(root.path(), fixtures::grid(20, 4), &optimization(8, 3))
            .evolve()
            .unwrap();
        assert_eq!(first.generation, 3);

        let mut resumed = service(root.path(), fixtures::grid(20, 4), &optimization(8, 6));
        let population = resumed.initialize().unwrap();
        assert_eq!(population.generation(), 3);
        assert_eq!(population.best_fitness(), Some(first.best.fitness));

        let second = resumed.evolve().unwrap();
        assert_eq!(second.generation, 6);
        assert!(second.best.fitness >= first.best.fitness);
    }

    #[test]
    fn it_starts_over_for_a_different_population_size() {
        let root = tempfile::tempdir().unwrap();
        service(root.path(), fixtures::grid(20, 4), &optimization(8, 2))
            .evolve()
            .unwrap();

        let mut other = service(root.path(), fixtures::grid(20, 4), &optimization(10, 2));
        let population = other.initialize().unwrap();
        assert_eq!(population.generation(), 0);
        assert_eq!(population.len(), 10);
    }

    #[test]
    fn it_seeds_a_fresh_population_with_the_best_known_solution() {
        let root = tempfile::tempdir().unwrap();
        let network = fixtures::example();

        let mut service = service(root.path(), network, &optimization(4, 1));
        let greedy = service.solve(Strategy::GreedyByRequest).unwrap();

        let population = service.initialize().unwrap();
        assert!(population.members().iter().any(|m| m.caching == greedy.caching));
        assert!(population.best_fitness() >= Some(greedy.fitness));
    }

    #[test]
    fn it_replaces_corrupt_checkpoint_members() {
        let root = tempfile::tempdir().unwrap();
        service(root.path(), fixtures::grid(20, 4), &optimization(6, 2))
            .evolve()
            .unwrap();

        let generation_dir = root.path().join("grid").join("gen-000002");
        let victim = std::fs::read_dir(&generation_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .find(|path| path.extension().is_some_and(|ext| ext == "out"))
            .unwrap();
        std::fs::write(&victim, "not an assignment\n").unwrap();

        let mut resumed = service(root.path(), fixtures::grid(20, 4), &optimization(6, 2));
        let population = resumed.initialize().unwrap();
        assert_eq!(population.generation(), 2);
        assert_eq!(population.len(), 6);
        assert!(population.members().iter().all(|m| m.caching.is_valid(resumed.network())));
    }

    #[test]
    fn it_is_reproducible_for_a_seed() {
        let run = || {
            let root = tempfile::tempdir().unwrap();
            let mut service = service(root.path(), fixtures::grid(25, 5), &optimization(10, 5));
            let outcome = service.evolve().unwrap();
            (outcome.best, outcome.generation)
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn it_runs_monte_carlo_from_the_best_known_solution() {
        let root = tempfile::tempdir().unwrap();
        let mut service = service(root.path(), fixtures::grid(20, 4), &optimization(4, 1));

        let best = service.monte_carlo(100).unwrap();
        assert!(best.caching.is_valid(service.network()));
        assert_eq!(stored_best(root.path(), 4), best.caching);

        // Without iterations the stored solution is returned as is
        let again = service.monte_carlo(0).unwrap();
        assert_eq!(again, best);
    }

    #[test]
    fn it_finds_no_solution_without_iterations_or_history() {
        let root = tempfile::tempdir().unwrap();
        let mut service = service(root.path(), fixtures::grid(20, 4), &optimization(4, 1));

        assert!(matches!(service.monte_carlo(0), Err(Error::NoSolution)));
    }

    #[test]
    fn it_surfaces_capacity_violations() {
        let violation = CapacityViolation {
            cache: 1,
            used: 120,
            capacity: 100,
        };

        assert!(matches!(
            Error::from(ValidationError::Capacity(violation)),
            Error::CapacityViolation(v) if v == violation
        ));
        assert!(matches!(
            Error::from(ValidationError::UnknownItem { cache: 0, item: 9 }),
            Error::InvalidAssignment(_)
        ));
    }
}
