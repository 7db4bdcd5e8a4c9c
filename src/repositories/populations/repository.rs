use super::Error;
use super::queries::{
    GenerationDir, MANIFEST_FILE, Manifest, MemberKey, generation_dir_name, is_member_file_name,
    member_file_name, parse_generation_dir_name, parse_member_file_name, partial_dir_name,
};
use crate::models::{Caching, Population};
use crate::repositories::{cachings, write_atomically};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// A generation restored from disk.
///
/// Members are ordered by their index in the stored population. A member
/// whose file could not be read or parsed is kept as an error so the caller
/// can replace it individually.
#[derive(Debug)]
pub struct Checkpoint {
    pub manifest: Manifest,
    pub members: Vec<Result<Caching, Error>>,
}

/// Generation checkpoints and best-known solutions below a root directory.
///
/// ```text
/// <root>/<instance>.out                       best-known solution
/// <root>/<instance>/gen-000042/               latest complete generation
///     0000000462500_id0000_gen000042.out
///     checkpoint.json
/// <root>/<instance>/gen-000043.partial/       generation being written
/// ```
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
    cachings: cachings::Repository,
}

impl Repository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cachings: cachings::Repository::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn best_known_path(&self, instance: &str) -> PathBuf {
        self.root.join(format!("{instance}.out"))
    }

    pub fn instance_dir(&self, instance: &str) -> PathBuf {
        self.root.join(instance)
    }

    #[instrument(level = "debug", skip(self), fields(instance = instance))]
    pub fn load_best_known(&self, instance: &str, num_caches: usize) -> Result<Option<Caching>, Error> {
        let path = self.best_known_path(instance);
        self.cachings.find(&path, num_caches).map_err(|err| match err {
            cachings::Error::Io(err) => Error::Io(err),
            err => Error::corrupt(&path, err),
        })
    }

    #[instrument(level = "debug", skip(self, caching), fields(instance = instance))]
    pub fn save_best_known(&self, instance: &str, caching: &Caching) -> Result<(), Error> {
        let path = self.best_known_path(instance);
        self.cachings.save(&path, caching).map_err(|err| match err {
            cachings::Error::Io(err) => Error::Io(err),
            err => Error::corrupt(&path, err),
        })
    }

    /// Complete generations stored for `instance`, ascending.
    pub fn list_generations(&self, instance: &str) -> Result<Vec<u32>, Error> {
        let mut generations: Vec<u32> = self
            .generation_dirs(instance)?
            .into_iter()
            .filter_map(|(dir, _)| match dir {
                GenerationDir::Complete(generation) => Some(generation),
                GenerationDir::Partial(_) => None,
            })
            .collect();
        generations.sort_unstable();
        Ok(generations)
    }

    /// Persists every member of `population` as a new generation.
    ///
    /// The generation is written into a `.partial` directory and published
    /// with a single rename, so a crash leaves the previous generation
    /// loadable. Older generations and stale partial writes are removed
    /// only after publishing.
    #[instrument(level = "debug", skip(self, population), fields(instance = instance, generation = population.generation(), population_size = population.len()))]
    pub fn save_generation(&self, instance: &str, population: &Population) -> Result<PathBuf, Error> {
        let generation = population.generation();
        let instance_dir = self.instance_dir(instance);
        fs::create_dir_all(&instance_dir)?;

        let partial = instance_dir.join(partial_dir_name(generation));
        if partial.exists() {
            fs::remove_dir_all(&partial)?;
        }
        fs::create_dir(&partial)?;

        for (index, member) in population.members().iter().enumerate() {
            let name = member_file_name(&MemberKey {
                fitness: member.fitness,
                index,
                generation,
            });
            self.cachings
                .save(&partial.join(name), &member.caching)
                .map_err(|err| match err {
                    cachings::Error::Io(err) => Error::Io(err),
                    err => Error::corrupt(&partial, err),
                })?;
        }

        let manifest = Manifest {
            generation,
            population_size: population.len(),
            best_fitness: population.best_fitness(),
            written_at: Utc::now(),
        };
        write_atomically(
            &partial.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?.as_bytes(),
        )?;

        let published = instance_dir.join(generation_dir_name(generation));
        if published.exists() {
            fs::remove_dir_all(&published)?;
        }
        fs::rename(&partial, &published)?;

        for (dir, path) in self.generation_dirs(instance)? {
            let stale = match dir {
                GenerationDir::Complete(other) => other < generation,
                GenerationDir::Partial(_) => true,
            };
            if stale {
                tracing::debug!(path = %path.display(), "Removing stale generation");
                fs::remove_dir_all(&path)?;
            }
        }

        Ok(published)
    }

    /// Loads the most recent complete generation holding exactly
    /// `population_size` members.
    #[instrument(level = "debug", skip(self), fields(instance = instance, population_size = population_size, num_caches = num_caches))]
    pub fn load_latest(
        &self,
        instance: &str,
        population_size: usize,
        num_caches: usize,
    ) -> Result<Option<Checkpoint>, Error> {
        for generation in self.list_generations(instance)?.into_iter().rev() {
            let dir = self.instance_dir(instance).join(generation_dir_name(generation));

            let manifest = match read_manifest(&dir) {
                Ok(manifest) => manifest,
                Err(err) => {
                    tracing::warn!(path = %dir.display(), error = %err, "Skipping generation without a readable manifest");
                    continue;
                }
            };

            let mut files = member_files(&dir)?;
            if files.len() != population_size {
                tracing::debug!(
                    path = %dir.display(),
                    found = files.len(),
                    expected = population_size,
                    "Skipping generation of a different population size"
                );
                continue;
            }

            files.sort_by_key(|(name, _)| {
                (parse_member_file_name(name).map_or(usize::MAX, |key| key.index), name.clone())
            });

            let members = files
                .into_iter()
                .map(|(_, path)| {
                    let input = fs::read_to_string(&path).map_err(|err| Error::corrupt(&path, err))?;
                    cachings::parse_caching(&input, num_caches).map_err(|err| Error::corrupt(&path, err))
                })
                .collect();

            return Ok(Some(Checkpoint { manifest, members }));
        }

        Ok(None)
    }

    fn generation_dirs(&self, instance: &str) -> Result<Vec<(GenerationDir, PathBuf)>, Error> {
        let instance_dir = self.instance_dir(instance);
        if !instance_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(&instance_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(dir) = entry.file_name().to_str().and_then(parse_generation_dir_name) {
                dirs.push((dir, entry.path()));
            }
        }
        Ok(dirs)
    }
}

fn read_manifest(dir: &Path) -> Result<Manifest, Error> {
    let input = fs::read_to_string(dir.join(MANIFEST_FILE))?;
    Ok(serde_json::from_str(&input)?)
}

fn member_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, Error> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_member_file_name(&name) {
            files.push((name, entry.path()));
        }
    }
    Ok(files)
}
