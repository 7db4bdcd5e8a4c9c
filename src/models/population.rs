use super::{Caching, Fitness};
use serde::{Deserialize, Serialize};

/// A scored assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub fitness: Fitness,
    pub caching: Caching,
}

impl Member {
    pub fn new(fitness: Fitness, caching: Caching) -> Self {
        Self { fitness, caching }
    }
}

/// One generation of scored assignments.
///
/// Members are kept sorted by fitness descending. The sort is stable, so
/// members with equal fitness keep the order they were inserted in, which
/// keeps elitism reproducible for a fixed seed.
#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub struct Population {
    generation: u32,
    members: Vec<Member>,
}

impl Population {
    pub fn new(generation: u32, mut members: Vec<Member>) -> Self {
        members.sort_by(|a, b| b.fitness.cmp(&a.fitness));
        Self {
            generation,
            members,
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn best(&self) -> Option<&Member> {
        self.members.first()
    }

    pub fn best_fitness(&self) -> Option<Fitness> {
        self.best().map(|member| member.fitness)
    }

    pub fn worst_fitness(&self) -> Option<Fitness> {
        self.members.last().map(|member| member.fitness)
    }

    pub fn mean_fitness(&self) -> Option<f64> {
        if self.members.is_empty() {
            return None;
        }
        let total: u128 = self.members.iter().map(|m| m.fitness as u128).sum();
        Some(total as f64 / self.members.len() as f64)
    }

    pub fn into_members(self) -> Vec<Member> {
        self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn tagged(fitness: Fitness, tag: usize) -> Member {
        Member::new(fitness, Caching::from_caches(vec![BTreeSet::from([tag])]))
    }

    #[test]
    fn it_sorts_members_by_fitness_descending() {
        let population = Population::new(3, vec![tagged(10, 0), tagged(30, 1), tagged(20, 2)]);

        let fitness: Vec<_> = population.members().iter().map(|m| m.fitness).collect();
        assert_eq!(fitness, vec![30, 20, 10]);
        assert_eq!(population.generation(), 3);
        assert_eq!(population.best_fitness(), Some(30));
        assert_eq!(population.worst_fitness(), Some(10));
        assert_eq!(population.mean_fitness(), Some(20.0));
    }

    #[test]
    fn it_keeps_insertion_order_for_ties() {
        let population = Population::new(
            0,
            vec![tagged(5, 0), tagged(9, 1), tagged(5, 2), tagged(5, 3)],
        );

        let tags: Vec<_> = population
            .members()
            .iter()
            .map(|m| *m.caching.cache(0).first().unwrap())
            .collect();
        assert_eq!(tags, vec![1, 0, 2, 3]);
    }

    #[test]
    fn it_handles_empty_populations() {
        let population = Population::new(0, vec![]);

        assert!(population.is_empty());
        assert_eq!(population.best_fitness(), None);
        assert_eq!(population.mean_fitness(), None);
    }
}
