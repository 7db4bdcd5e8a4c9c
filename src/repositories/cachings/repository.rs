use super::queries::{format_caching, parse_caching};
use super::Error;
use crate::models::Caching;
use crate::repositories::write_atomically;
use std::path::Path;
use tracing::instrument;

/// Reads and writes assignment files.
#[derive(Debug, Clone, Default)]
pub struct Repository {}

impl Repository {
    pub fn new() -> Self {
        Self {}
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.display(), num_caches = num_caches))]
    pub fn load(&self, path: &Path, num_caches: usize) -> Result<Caching, Error> {
        let input = std::fs::read_to_string(path)?;
        parse_caching(&input, num_caches)
    }

    /// Like [`Repository::load`], returning `None` when the file does not exist.
    #[instrument(level = "debug", skip(self), fields(path = %path.display(), num_caches = num_caches))]
    pub fn find(&self, path: &Path, num_caches: usize) -> Result<Option<Caching>, Error> {
        match std::fs::read_to_string(path) {
            Ok(input) => Ok(Some(parse_caching(&input, num_caches)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(level = "debug", skip(self, caching), fields(path = %path.display()))]
    pub fn save(&self, path: &Path, caching: &Caching) -> Result<(), Error> {
        write_atomically(path, format_caching(caching).as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn it_saves_and_loads_assignments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("best.out");
        let repository = Repository::new();
        let caching = Caching::from_caches(vec![BTreeSet::new(), BTreeSet::from([4, 1])]);

        repository.save(&path, &caching).unwrap();
        assert_eq!(repository.load(&path, 2).unwrap(), caching);
        assert_eq!(repository.find(&path, 2).unwrap(), Some(caching));

        // No temporary file is left behind
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["best.out"]);
    }

    #[test]
    fn it_finds_nothing_for_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let repository = Repository::new();

        assert_eq!(repository.find(&dir.path().join("none.out"), 2).unwrap(), None);
        assert!(matches!(
            repository.load(&dir.path().join("none.out"), 2),
            Err(Error::Io(_))
        ));
    }
}
