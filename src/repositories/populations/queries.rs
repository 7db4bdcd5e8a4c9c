use crate::models::Fitness;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub(crate) const MANIFEST_FILE: &str = "checkpoint.json";
const GENERATION_PREFIX: &str = "gen-";
const PARTIAL_SUFFIX: &str = ".partial";
const MEMBER_EXTENSION: &str = ".out";

/// Summary written next to the members of every published generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub generation: u32,
    pub population_size: usize,
    pub best_fitness: Option<Fitness>,
    pub written_at: DateTime<Utc>,
}

/// What a member file name encodes, so a directory listing alone ranks the
/// population. Fitness is padded to 13 digits, enough for any origin latency
/// times 1000.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberKey {
    pub fitness: Fitness,
    pub index: usize,
    pub generation: u32,
}

/// Kind of a directory found below an instance directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GenerationDir {
    Complete(u32),
    Partial(u32),
}

pub(crate) fn generation_dir_name(generation: u32) -> String {
    format!("{GENERATION_PREFIX}{generation:06}")
}

pub(crate) fn partial_dir_name(generation: u32) -> String {
    format!("{}{PARTIAL_SUFFIX}", generation_dir_name(generation))
}

pub(crate) fn parse_generation_dir_name(name: &str) -> Option<GenerationDir> {
    let rest = name.strip_prefix(GENERATION_PREFIX)?;
    let (digits, partial) = match rest.strip_suffix(PARTIAL_SUFFIX) {
        Some(digits) => (digits, true),
        None => (rest, false),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let generation = digits.parse().ok()?;

    Some(if partial {
        GenerationDir::Partial(generation)
    } else {
        GenerationDir::Complete(generation)
    })
}

pub(crate) fn member_file_name(key: &MemberKey) -> String {
    format!(
        "{:013}_id{:04}_gen{:06}{MEMBER_EXTENSION}",
        key.fitness, key.index, key.generation
    )
}

pub(crate) fn is_member_file_name(name: &str) -> bool {
    name.ends_with(MEMBER_EXTENSION)
}

pub(crate) fn parse_member_file_name(name: &str) -> Option<MemberKey> {
    let stem = name.strip_suffix(MEMBER_EXTENSION)?;
    let (fitness, rest) = stem.split_once("_id")?;
    let (index, generation) = rest.split_once("_gen")?;

    Some(MemberKey {
        fitness: fitness.parse().ok()?,
        index: index.parse().ok()?,
        generation: generation.parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_names_generation_directories() {
        assert_eq!(generation_dir_name(12), "gen-000012");
        assert_eq!(partial_dir_name(12), "gen-000012.partial");

        assert_eq!(
            parse_generation_dir_name("gen-000012"),
            Some(GenerationDir::Complete(12))
        );
        assert_eq!(
            parse_generation_dir_name("gen-000012.partial"),
            Some(GenerationDir::Partial(12))
        );
        assert_eq!(parse_generation_dir_name("gen-"), None);
        assert_eq!(parse_generation_dir_name("gen-+12"), None);
        assert_eq!(parse_generation_dir_name("other"), None);
    }

    #[test]
    fn it_names_member_files() {
        let key = MemberKey {
            fitness: 462_500,
            index: 3,
            generation: 17,
        };
        let name = member_file_name(&key);

        assert_eq!(name, "0000000462500_id0003_gen000017.out");
        assert!(is_member_file_name(&name));
        assert_eq!(parse_member_file_name(&name), Some(key));
        assert_eq!(parse_member_file_name("best.out"), None);
        assert_eq!(parse_member_file_name("checkpoint.json"), None);
    }

    #[test]
    fn it_ranks_members_by_name() {
        let low = member_file_name(&MemberKey {
            fitness: 99_999,
            index: 0,
            generation: 1,
        });
        let high = member_file_name(&MemberKey {
            fitness: 100_000,
            index: 1,
            generation: 1,
        });

        assert!(high > low);

        // Largest reachable fitness still sorts after a seven digit one
        let top = member_file_name(&MemberKey {
            fitness: u32::MAX as Fitness * 1000,
            index: 0,
            generation: 1,
        });
        let seven_digits = member_file_name(&MemberKey {
            fitness: 9_999_999,
            index: 1,
            generation: 1,
        });
        assert_eq!(top.split('_').next().map(str::len), Some(13));
        assert!(top > seven_digits);
        assert_eq!(parse_member_file_name(&top).map(|key| key.fitness), Some(4_294_967_295_000));
    }
}
