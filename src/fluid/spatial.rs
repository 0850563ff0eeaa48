//! Spatial hashing for neighbor search.
//!
//! Particles are bucketed with a counting sort over a hashed uniform grid
//! whose cell size equals the search radius, then every particle collects
//! its neighbours from the 3x3 block of cells around it. Neighbour lists are
//! stored flat (one offset table plus one index buffer) and rebuilt once per
//! substep.

use bevy::prelude::*;

/// Large primes for hash mixing.
const P1: u32 = 73856093;
const P2: u32 = 19349663;

fn hash_cell(cell: IVec2, table_size: usize) -> usize {
    let x = cell.x as u32;
    let y = cell.y as u32;
    (x.wrapping_mul(P1) ^ y.wrapping_mul(P2)) as usize & (table_size - 1)
}

/// Neighbour lists of a particle set.
#[derive(Debug, Default)]
pub struct NeighborGrid {
    cell_size: f32,
    /// Hash table size, always a power of two.
    table_size: usize,
    /// Start of each bucket in `sorted`, one extra entry at the end.
    bucket_start: Vec<u32>,
    /// Particle indices sorted by bucket.
    sorted: Vec<u32>,
    bucket_of: Vec<u32>,
    cursor: Vec<u32>,
    /// Start of each particle's list in `neighbors`, one extra entry at the end.
    offsets: Vec<u32>,
    neighbors: Vec<u32>,
}

impl NeighborGrid {
    /// Cell coordinate of a position.
    pub fn position_to_cell(&self, position: Vec2) -> IVec2 {
        (position / self.cell_size).floor().as_ivec2()
    }

    fn cell_to_bucket(&self, cell: IVec2) -> usize {
        hash_cell(cell, self.table_size)
    }

    /// Rebuild the neighbour lists: `j` is a neighbour of `i` when `i != j`
    /// and they are closer than `radius`.
    pub fn build(&mut self, positions: &[Vec2], radius: f32) {
        let n = positions.len();
        self.cell_size = radius;
        self.table_size = (2 * n.max(1)).next_power_of_two();

        // Counting sort into buckets.
        let (cell_size, table_size) = (self.cell_size, self.table_size);
        self.bucket_of.clear();
        self.bucket_of.extend(positions.iter().map(|&p| {
            hash_cell((p / cell_size).floor().as_ivec2(), table_size) as u32
        }));
        self.bucket_start.clear();
        self.bucket_start.resize(self.table_size + 1, 0);
        for &bucket in &self.bucket_of {
            self.bucket_start[bucket as usize + 1] += 1;
        }
        for k in 0..self.table_size {
            self.bucket_start[k + 1] += self.bucket_start[k];
        }
        self.cursor.clear();
        self.cursor.extend_from_slice(&self.bucket_start[..self.table_size]);
        self.sorted.clear();
        self.sorted.resize(n, 0);
        for (i, &bucket) in self.bucket_of.iter().enumerate() {
            let slot = &mut self.cursor[bucket as usize];
            self.sorted[*slot as usize] = i as u32;
            *slot += 1;
        }

        // Gather neighbours from the 3x3 cell block.
        let radius_sq = radius * radius;
        self.offsets.clear();
        self.offsets.reserve(n + 1);
        self.offsets.push(0);
        self.neighbors.clear();

        for (i, &pos) in positions.iter().enumerate() {
            let cell = self.position_to_cell(pos);
            let mut visited = [usize::MAX; 9];
            let mut visited_len = 0;

            for dy in -1..=1 {
                for dx in -1..=1 {
                    let bucket = self.cell_to_bucket(cell + IVec2::new(dx, dy));
                    // Different cells can share a bucket.
                    if visited[..visited_len].contains(&bucket) {
                        continue;
                    }
                    visited[visited_len] = bucket;
                    visited_len += 1;

                    let start = self.bucket_start[bucket] as usize;
                    let end = self.bucket_start[bucket + 1] as usize;
                    for &j in &self.sorted[start..end] {
                        if j as usize == i {
                            continue;
                        }
                        if (positions[j as usize] - pos).length_squared() < radius_sq {
                            self.neighbors.push(j);
                        }
                    }
                }
            }

            self.offsets.push(self.neighbors.len() as u32);
        }
    }

    /// Number of particles the lists were built for.
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Neighbours of particle `i` from the last build.
    pub fn neighbors(&self, i: usize) -> &[u32] {
        let start = self.offsets[i] as usize;
        let end = self.offsets[i + 1] as usize;
        &self.neighbors[start..end]
    }

    /// Total number of neighbour pairs (each pair counted twice).
    pub fn pair_count(&self) -> usize {
        self.neighbors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(positions: &[Vec2], i: usize, radius: f32) -> Vec<u32> {
        let mut out: Vec<u32> = positions
            .iter()
            .enumerate()
            .filter(|&(j, p)| j != i && (*p - positions[i]).length_squared() < radius * radius)
            .map(|(j, _)| j as u32)
            .collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn test_position_to_cell() {
        let mut grid = NeighborGrid::default();
        grid.build(&[], 1.0);

        assert_eq!(grid.position_to_cell(Vec2::new(0.5, 0.5)), IVec2::ZERO);
        assert_eq!(grid.position_to_cell(Vec2::new(1.5, -0.5)), IVec2::new(1, -1));
    }

    #[test]
    fn test_neighbors_match_brute_force() {
        // Irregular cloud crossing the origin so negative cells are hashed too.
        let positions: Vec<Vec2> = (0..400)
            .map(|k| {
                let t = k as f32;
                Vec2::new((t * 0.37).sin() * 1.3, (t * 0.61).cos() * 0.9 + t * 0.001)
            })
            .collect();
        let radius = 0.15;

        let mut grid = NeighborGrid::default();
        grid.build(&positions, radius);

        assert_eq!(grid.len(), positions.len());
        for i in 0..positions.len() {
            let mut found = grid.neighbors(i).to_vec();
            found.sort_unstable();
            assert_eq!(found, brute_force(&positions, i, radius), "particle {i}");
        }
    }

    #[test]
    fn test_far_particles_are_not_neighbors() {
        let positions = vec![Vec2::ZERO, Vec2::new(0.01, 0.0), Vec2::new(5.0, 5.0)];
        let mut grid = NeighborGrid::default();
        grid.build(&positions, 0.5);

        assert_eq!(grid.neighbors(0), &[1]);
        assert_eq!(grid.neighbors(1), &[0]);
        assert!(grid.neighbors(2).is_empty());
        assert_eq!(grid.pair_count(), 2);
    }
}
