//! Fixed-radius neighbor search over particle position arrays.
//!
//! Two interchangeable strategies: a naive all-pairs scan, and a uniform hash
//! grid with cell size equal to the search radius (probe the 27 surrounding
//! cells). The grid is a pure performance optimization; both strategies must
//! return identical neighbor sets for the same inputs, and the tests hold them
//! to that.
//!
//! Neighbor lists are insertion-ordered index lists into the target array.
//! Self-set searches exclude the particle itself; the `_inclusive` variant
//! exists for boundary-boundary volume estimation, where a particle's own
//! contribution matters.

use std::collections::HashMap;

use bincode::{Decode, Encode};
use lin_alg::f64::Vec3;

use crate::error::{Result, SphError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum SearchStrategy {
    /// O(n·m) all-pairs distance test. Reference implementation.
    BruteForce,
    /// Uniform hash grid, cell size = search radius.
    Grid,
}

/// How a self-set query treats the query particle itself.
#[derive(Clone, Copy, PartialEq)]
enum SelfMode {
    Exclude,
    Include,
}

#[derive(Clone, Debug)]
pub struct NeighborSearcher {
    radius: f64,
    strategy: SearchStrategy,
}

impl NeighborSearcher {
    pub fn new(radius: f64, strategy: SearchStrategy) -> Result<Self> {
        if radius <= 0. {
            return Err(SphError::ZeroSupportRadius(radius));
        }
        Ok(Self { radius, strategy })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Self-neighbors of one position set, excluding each particle itself.
    pub fn find_neighbors(&self, positions: &[Vec3]) -> Result<Vec<Vec<usize>>> {
        if positions.is_empty() {
            return Err(SphError::EmptyParticleSet);
        }
        Ok(self.search(positions, positions, Some(SelfMode::Exclude)))
    }

    /// Self-neighbors including the particle itself. Used when estimating
    /// boundary particle volumes, where the self term belongs in the sum.
    pub fn find_neighbors_inclusive(&self, positions: &[Vec3]) -> Result<Vec<Vec<usize>>> {
        if positions.is_empty() {
            return Err(SphError::EmptyParticleSet);
        }
        Ok(self.search(positions, positions, Some(SelfMode::Include)))
    }

    /// One-directional cross-set search: each query particle gets the indices
    /// of target particles within the radius. The reverse direction is never
    /// computed.
    pub fn find_neighbors_cross(&self, query: &[Vec3], target: &[Vec3]) -> Result<Vec<Vec<usize>>> {
        if query.is_empty() || target.is_empty() {
            return Err(SphError::EmptyParticleSet);
        }
        Ok(self.search(query, target, None))
    }

    /// Single-particle convenience form; equivalent to row `index` of
    /// `find_neighbors`, using the same configured strategy.
    pub fn find_neighbors_of(&self, positions: &[Vec3], index: usize) -> Result<Vec<usize>> {
        if positions.is_empty() {
            return Err(SphError::EmptyParticleSet);
        }
        if index >= positions.len() {
            return Err(SphError::IndexOutOfBounds {
                index,
                len: positions.len(),
            });
        }

        // One-row search against the full set; self-exclusion by filtering,
        // since the cross path has no notion of the query's own index.
        let query = [positions[index]];
        let row = self.search(&query, positions, None).pop().unwrap_or_default();

        Ok(row.into_iter().filter(|&j| j != index).collect())
    }

    /// `self_mode` is `Some` iff query and target are the same set.
    fn search(&self, query: &[Vec3], target: &[Vec3], self_mode: Option<SelfMode>) -> Vec<Vec<usize>> {
        match self.strategy {
            SearchStrategy::BruteForce => self.search_naive(query, target, self_mode),
            SearchStrategy::Grid => self.search_grid(query, target, self_mode),
        }
    }

    fn search_naive(
        &self,
        query: &[Vec3],
        target: &[Vec3],
        self_mode: Option<SelfMode>,
    ) -> Vec<Vec<usize>> {
        let r_sq = self.radius.powi(2);

        query
            .iter()
            .enumerate()
            .map(|(i, q)| {
                target
                    .iter()
                    .enumerate()
                    .filter(|(j, t)| {
                        if self_mode == Some(SelfMode::Exclude) && *j == i {
                            return false;
                        }
                        (**t - *q).magnitude_squared() < r_sq
                    })
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect()
    }

    fn search_grid(
        &self,
        query: &[Vec3],
        target: &[Vec3],
        self_mode: Option<SelfMode>,
    ) -> Vec<Vec<usize>> {
        let r_sq = self.radius.powi(2);

        let mut cells: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
        for (j, t) in target.iter().enumerate() {
            cells.entry(self.cell_of(*t)).or_default().push(j);
        }

        query
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let (cx, cy, cz) = self.cell_of(*q);
                let mut result = Vec::new();

                for dx in -1..=1 {
                    for dy in -1..=1 {
                        for dz in -1..=1 {
                            let Some(bucket) = cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                                continue;
                            };

                            for &j in bucket {
                                if self_mode == Some(SelfMode::Exclude) && j == i {
                                    continue;
                                }
                                if (target[j] - *q).magnitude_squared() < r_sq {
                                    result.push(j);
                                }
                            }
                        }
                    }
                }

                result
            })
            .collect()
    }

    fn cell_of(&self, p: Vec3) -> (i64, i64, i64) {
        (
            (p.x / self.radius).floor() as i64,
            (p.y / self.radius).floor() as i64,
            (p.z / self.radius).floor() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    fn random_positions(n: usize, extent: f64) -> Vec<Vec3> {
        let mut rng = rand::rng();
        (0..n)
            .map(|_| {
                Vec3::new(
                    rng.random_range(-extent..extent),
                    rng.random_range(-extent..extent),
                    rng.random_range(-extent..extent),
                )
            })
            .collect()
    }

    fn sorted(mut rows: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
        for row in &mut rows {
            row.sort_unstable();
        }
        rows
    }

    #[test]
    fn naive_and_grid_agree_on_self_search() {
        let positions = random_positions(300, 2.0);
        let radius = 0.5;

        let naive = NeighborSearcher::new(radius, SearchStrategy::BruteForce).unwrap();
        let grid = NeighborSearcher::new(radius, SearchStrategy::Grid).unwrap();

        assert_eq!(
            sorted(naive.find_neighbors(&positions).unwrap()),
            sorted(grid.find_neighbors(&positions).unwrap()),
        );
        assert_eq!(
            sorted(naive.find_neighbors_inclusive(&positions).unwrap()),
            sorted(grid.find_neighbors_inclusive(&positions).unwrap()),
        );
    }

    #[test]
    fn naive_and_grid_agree_on_cross_search() {
        let query = random_positions(150, 2.0);
        let target = random_positions(200, 2.0);
        let radius = 0.4;

        let naive = NeighborSearcher::new(radius, SearchStrategy::BruteForce).unwrap();
        let grid = NeighborSearcher::new(radius, SearchStrategy::Grid).unwrap();

        assert_eq!(
            sorted(naive.find_neighbors_cross(&query, &target).unwrap()),
            sorted(grid.find_neighbors_cross(&query, &target).unwrap()),
        );
    }

    #[test]
    fn exclusive_search_omits_self_inclusive_contains_it() {
        let positions = vec![
            Vec3::new_zero(),
            Vec3::new(0.1, 0., 0.),
            Vec3::new(10., 0., 0.),
        ];
        let searcher = NeighborSearcher::new(1.0, SearchStrategy::Grid).unwrap();

        let exclusive = searcher.find_neighbors(&positions).unwrap();
        assert_eq!(sorted(exclusive), vec![vec![1], vec![0], vec![]]);

        let inclusive = searcher.find_neighbors_inclusive(&positions).unwrap();
        assert_eq!(sorted(inclusive), vec![vec![0, 1], vec![0, 1], vec![2]]);
    }

    #[test]
    fn single_particle_form_matches_full_search() {
        let positions = random_positions(80, 1.5);

        for strategy in [SearchStrategy::BruteForce, SearchStrategy::Grid] {
            let searcher = NeighborSearcher::new(0.6, strategy).unwrap();

            let all = searcher.find_neighbors(&positions).unwrap();
            for i in 0..positions.len() {
                let mut single = searcher.find_neighbors_of(&positions, i).unwrap();
                let mut row = all[i].clone();
                single.sort_unstable();
                row.sort_unstable();
                assert_eq!(single, row, "{strategy:?}: mismatch at particle {i}");
            }
        }
    }

    #[test]
    fn single_particle_form_rejects_bad_index() {
        let positions = random_positions(5, 1.0);
        let searcher = NeighborSearcher::new(0.5, SearchStrategy::Grid).unwrap();

        assert_eq!(
            searcher.find_neighbors_of(&positions, 5).unwrap_err(),
            SphError::IndexOutOfBounds { index: 5, len: 5 }
        );
    }

    #[test]
    fn empty_sets_and_bad_radius_fail_loudly() {
        let searcher = NeighborSearcher::new(1.0, SearchStrategy::Grid).unwrap();
        assert_eq!(
            searcher.find_neighbors(&[]).unwrap_err(),
            SphError::EmptyParticleSet
        );
        assert_eq!(
            searcher
                .find_neighbors_cross(&[Vec3::new_zero()], &[])
                .unwrap_err(),
            SphError::EmptyParticleSet
        );

        assert_eq!(
            NeighborSearcher::new(0., SearchStrategy::BruteForce).unwrap_err(),
            SphError::ZeroSupportRadius(0.)
        );
    }
}
