//! Runs one strategy over many instance files.
//!
//! Instances are processed one after the other on a shared worker pool. A
//! failing instance is logged and recorded, the remaining ones still run.

use crate::models::{Fitness, Strategy};
use crate::repositories::{networks, populations};
use crate::services::optimization::{self, Service};
use crate::services::workers::Pool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("NetworksRepositoryError: {0}")]
    NetworksRepositoryError(#[from] networks::Error),
    #[error("OptimizationError: {0}")]
    OptimizationError(#[from] optimization::Error),
}

/// Result for one instance file.
#[derive(Debug)]
pub struct InstanceReport {
    pub instance: String,
    pub path: PathBuf,
    pub outcome: Result<Fitness, Error>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub instances: Vec<InstanceReport>,
}

impl BatchReport {
    /// Sum of the fitness of every instance that succeeded.
    pub fn total(&self) -> u128 {
        self.instances
            .iter()
            .filter_map(|report| report.outcome.as_ref().ok())
            .map(|&fitness| fitness as u128)
            .sum()
    }

    pub fn num_failed(&self) -> usize {
        self.instances
            .iter()
            .filter(|report| report.outcome.is_err())
            .count()
    }
}

/// Name under which checkpoints and best-known solutions of an instance
/// file are stored.
pub fn instance_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "instance".to_string())
}

pub struct Batch {
    networks: networks::Repository,
    populations: populations::Repository,
    pool: Arc<Pool>,
    seed: Option<u64>,
}

impl Batch {
    pub fn new(populations: populations::Repository, pool: Arc<Pool>, seed: Option<u64>) -> Self {
        Self {
            networks: networks::Repository::new(),
            populations,
            pool,
            seed,
        }
    }

    #[instrument(level = "info", skip(self, paths), fields(num_instances = paths.len(), strategy = strategy.name()))]
    pub fn run(&self, paths: &[PathBuf], strategy: Strategy) -> BatchReport {
        let mut report = BatchReport::default();

        for path in paths {
            let instance = instance_name(path);
            let outcome = self.solve_one(&instance, path, strategy);

            match &outcome {
                Ok(fitness) => tracing::info!(instance, fitness, "Instance solved"),
                Err(err) => tracing::warn!(instance, error = %err, "Instance failed"),
            }

            report.instances.push(InstanceReport {
                instance,
                path: path.clone(),
                outcome,
            });
        }

        tracing::info!(
            total = report.total(),
            failed = report.num_failed(),
            "Batch finished"
        );
        report
    }

    fn solve_one(&self, instance: &str, path: &Path, strategy: Strategy) -> Result<Fitness, Error> {
        let network = self.networks.load(path)?;
        let mut service = Service::builder()
            .network(instance, network)
            .checkpoints(self.populations.clone())
            .with_pool(self.pool.clone())
            .with_seed(self.seed)
            .build()?;

        Ok(service.solve(strategy)?.fitness)
    }
}
