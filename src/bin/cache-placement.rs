//! Command line driver for the cache placement optimizer.

use anyhow::Context;
use cache_placement_ga::bootstrap::{Configuration, bootstrap};
use cache_placement_ga::models::{Fitness, MutationTrigger, Optimization, Strategy};
use cache_placement_ga::repositories::{cachings, networks, populations};
use cache_placement_ga::services::batch::Batch;
use cache_placement_ga::services::workers::{self, Pool};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Places items on cache servers to minimize demand-weighted latency
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding best-known solutions and generation checkpoints
    #[arg(long, global = true, default_value = "out")]
    checkpoints: PathBuf,

    /// Seed of the random generator, drawn from entropy when absent
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Number of worker threads, defaults to the available parallelism
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build one assignment with a construction heuristic
    Solve {
        instance: PathBuf,
        #[arg(long, value_enum, default_value_t = StrategyArg::GreedyByRequest)]
        strategy: StrategyArg,
        /// Also write the assignment to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Evolve assignments, resuming from the latest checkpoint
    Evolve {
        instance: PathBuf,
        #[command(flatten)]
        optimization: OptimizationArgs,
    },
    /// Repeat random fill and keep the best assignment
    MonteCarlo {
        instance: PathBuf,
        #[arg(long, default_value_t = 1000)]
        iterations: usize,
    },
    /// Validate and score an assignment file
    Score { instance: PathBuf, assignment: PathBuf },
    /// Run a heuristic over many instance files
    Batch {
        instances: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = StrategyArg::GreedyByRequest)]
        strategy: StrategyArg,
    },
}

#[derive(Args, Debug)]
struct OptimizationArgs {
    /// JSON file with optimizer settings, overridden by the flags below
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    population_size: Option<usize>,
    #[arg(long)]
    max_generations: Option<u32>,
    #[arg(long)]
    selection: Option<f64>,
    #[arg(long)]
    crossover: Option<f64>,
    #[arg(long)]
    mutation_rate: Option<f64>,
    #[arg(long)]
    mutation_fraction: Option<f64>,
    #[arg(long, value_enum)]
    mutation_trigger: Option<TriggerArg>,
    #[arg(long)]
    elitism: Option<f64>,
    /// Stop once the best assignment reaches this score
    #[arg(long)]
    target: Option<Fitness>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    RandomFill,
    ParallelRandomFill,
    SharedRandomFill,
    GreedyByRequest,
    GreedyByCache,
    Exhaustive,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::RandomFill => Strategy::RandomFill,
            StrategyArg::ParallelRandomFill => Strategy::ParallelRandomFill,
            StrategyArg::SharedRandomFill => Strategy::SharedRandomFill,
            StrategyArg::GreedyByRequest => Strategy::GreedyByRequest,
            StrategyArg::GreedyByCache => Strategy::GreedyByCache,
            StrategyArg::Exhaustive => Strategy::exhaustive(),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TriggerArg {
    AtOrAboveRate,
    BelowRate,
}

impl From<TriggerArg> for MutationTrigger {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::AtOrAboveRate => MutationTrigger::AtOrAboveRate,
            TriggerArg::BelowRate => MutationTrigger::BelowRate,
        }
    }
}

impl OptimizationArgs {
    fn load(&self, seed: Option<u64>) -> anyhow::Result<Optimization> {
        let mut optimization = match &self.config {
            Some(path) => {
                let input = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&input).with_context(|| format!("parsing {}", path.display()))?
            }
            None => Optimization::default(),
        };

        if let Some(value) = self.population_size {
            optimization.population_size = value;
        }
        if let Some(value) = self.max_generations {
            optimization.max_generations = value;
        }
        if let Some(value) = self.selection {
            optimization.selection = value;
        }
        if let Some(value) = self.crossover {
            optimization.crossover = value;
        }
        if let Some(value) = self.mutation_rate {
            optimization.mutation_rate = value;
        }
        if let Some(value) = self.mutation_fraction {
            optimization.mutation_fraction = value;
        }
        if let Some(value) = self.mutation_trigger {
            optimization.mutation_trigger = value.into();
        }
        if let Some(value) = self.elitism {
            optimization.elitism = value;
        }
        if self.target.is_some() {
            optimization.target = self.target;
        }
        if seed.is_some() {
            optimization.seed = seed;
        }

        Ok(optimization)
    }
}

fn init_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn pool(threads: Option<usize>) -> anyhow::Result<Arc<Pool>> {
    Ok(Arc::new(Pool::with_threads(
        threads.unwrap_or_else(workers::available_threads),
    )?))
}

fn configuration(cli: &Cli, instance: &Path, optimization: Optimization) -> Configuration {
    Configuration::new(instance, &cli.checkpoints).with_optimization(optimization)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match &cli.command {
        Command::Solve {
            instance,
            strategy,
            output,
        } => {
            let optimization = Optimization {
                seed: cli.seed,
                ..Default::default()
            };
            let mut service = bootstrap(configuration(&cli, instance, optimization))?
                .with_pool(pool(cli.threads)?)
                .build()?;

            let member = service.solve((*strategy).into())?;
            if let Some(output) = output {
                cachings::Repository::new().save(output, &member.caching)?;
            }
            println!("{}", member.fitness);
        }
        Command::Evolve {
            instance,
            optimization,
        } => {
            let optimization = optimization.load(cli.seed)?;
            let mut service = bootstrap(configuration(&cli, instance, optimization))?
                .with_pool(pool(cli.threads)?)
                .build()?;

            let outcome = service.evolve()?;
            println!(
                "{} after generation {} ({:?})",
                outcome.best.fitness, outcome.generation, outcome.conclusion
            );
        }
        Command::MonteCarlo {
            instance,
            iterations,
        } => {
            let optimization = Optimization {
                seed: cli.seed,
                ..Default::default()
            };
            let mut service = bootstrap(configuration(&cli, instance, optimization))?
                .with_pool(pool(cli.threads)?)
                .build()?;

            let member = service.monte_carlo(*iterations)?;
            println!("{}", member.fitness);
        }
        Command::Score {
            instance,
            assignment,
        } => {
            let network = networks::Repository::new().load(instance)?;
            let caching = cachings::Repository::new().load(assignment, network.num_caches())?;
            caching.validate(&network)?;
            println!("{}", caching.score(&network)?);
        }
        Command::Batch {
            instances,
            strategy,
        } => {
            let batch = Batch::new(
                populations::Repository::new(&cli.checkpoints),
                pool(cli.threads)?,
                cli.seed,
            );
            let report = batch.run(instances, (*strategy).into());

            for instance in &report.instances {
                match &instance.outcome {
                    Ok(fitness) => println!("{}\t{}", instance.instance, fitness),
                    Err(err) => println!("{}\tfailed: {}", instance.instance, err),
                }
            }
            println!("total\t{}", report.total());

            if report.num_failed() > 0 {
                anyhow::bail!("{} of {} instances failed", report.num_failed(), report.instances.len());
            }
        }
    }

    Ok(())
}
