use crate::models::{Network, Optimization};
use crate::repositories::{networks, populations};
use crate::services::batch::instance_name;
use crate::services::optimization::{Service, ServiceBuilder};
use crate::builder::Set;
use std::path::PathBuf;
use tracing::instrument;

/// Where an optimization run reads its instance and keeps its checkpoints.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub instance_path: PathBuf,
    pub checkpoint_root: PathBuf,
    pub optimization: Optimization,
}

impl Configuration {
    pub fn new(instance_path: impl Into<PathBuf>, checkpoint_root: impl Into<PathBuf>) -> Self {
        Self {
            instance_path: instance_path.into(),
            checkpoint_root: checkpoint_root.into(),
            optimization: Optimization::default(),
        }
    }

    pub fn with_optimization(mut self, optimization: Optimization) -> Self {
        self.optimization = optimization;
        self
    }
}

/// Loads the instance and wires the repositories into a service builder.
#[instrument(level = "info", skip(config), fields(instance_path = %config.instance_path.display(), checkpoint_root = %config.checkpoint_root.display()))]
pub fn bootstrap(
    config: Configuration,
) -> anyhow::Result<ServiceBuilder<Set<(String, Network)>, Set<populations::Repository>>> {
    let network = networks::Repository::new().load(&config.instance_path)?;
    let evolution = config.optimization.evolution()?;

    Ok(Service::builder()
        .network(instance_name(&config.instance_path), network)
        .checkpoints(populations::Repository::new(config.checkpoint_root))
        .with_evolution(evolution)
        .with_seed(config.optimization.seed))
}
