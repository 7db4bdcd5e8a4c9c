use super::queries::{format_network, parse_network};
use super::Error;
use crate::models::Network;
use crate::repositories::write_atomically;
use std::path::Path;
use tracing::instrument;

/// Reads and writes network instance files.
#[derive(Debug, Clone, Default)]
pub struct Repository {}

impl Repository {
    pub fn new() -> Self {
        Self {}
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    pub fn load(&self, path: &Path) -> Result<Network, Error> {
        let input = std::fs::read_to_string(path)?;
        let network = parse_network(&input)?;

        tracing::debug!(
            num_items = network.num_items(),
            num_endpoints = network.num_endpoints(),
            num_requests = network.requests().len(),
            num_caches = network.num_caches(),
            "Loaded network"
        );

        Ok(network)
    }

    #[instrument(level = "debug", skip(self, network), fields(path = %path.display()))]
    pub fn save(&self, path: &Path, network: &Network) -> Result<(), Error> {
        write_atomically(path, format_network(network).as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;

    #[test]
    fn it_saves_and_loads_networks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.in");
        let repository = Repository::new();

        repository.save(&path, &fixtures::example()).unwrap();
        assert_eq!(repository.load(&path).unwrap(), fixtures::example());
    }

    #[test]
    fn it_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let result = Repository::new().load(&dir.path().join("missing.in"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
