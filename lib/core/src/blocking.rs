//! Chunked nearest-neighbor blocking
//!
//! Exhaustive pairwise comparison is quadratic in the number of records.
//! Blocking splits the vector matrix into fixed-size chunks and runs an
//! exact L2 k-NN search for every chunk pair `(i, j)` with `i <= j`, so
//! each search touches at most `chunk_size` rows. Only neighbors found
//! inside a compared chunk pair become candidates.
//!
//! Distances are squared L2, as reported by a flat L2 index, and turned
//! into a bounded similarity with `1 / (1 + d)`.

use ahash::AHashSet;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BinaryHeap;
use std::ops::Range;
use tracing::debug;

use crate::matrix::DenseMatrix;
use crate::pair::Candidate;
use crate::progress::ProgressSink;
use crate::{Error, Result};

/// Blocking settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlockingConfig {
    /// Rows per chunk
    pub chunk_size: usize,
    /// Neighbors retrieved per query row, the row itself included when it
    /// sits in the searched chunk
    pub k: usize,
    /// Also search chunk `i` rows against chunk `j` for `i < j`, catching
    /// neighbors that are only nearest in one direction
    pub symmetric_cross_chunk: bool,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5000,
            k: 6,
            symmetric_cross_chunk: true,
        }
    }
}

impl BlockingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".to_string()));
        }
        if self.k == 0 {
            return Err(Error::InvalidConfig("k must be positive".to_string()));
        }
        Ok(())
    }
}

/// Number of chunk pairs `(i, j)` with `i <= j`
#[inline]
#[must_use]
pub fn total_chunk_pairs(n_chunks: usize) -> usize {
    n_chunks * (n_chunks + 1) / 2
}

/// Neighbor slot returned by [`FlatL2Index::search`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index local to the searched chunk, [`Neighbor::NOT_FOUND`] when the
    /// chunk holds fewer than k rows
    pub local: usize,
    pub distance: f32,
}

impl Neighbor {
    pub const NOT_FOUND: usize = usize::MAX;

    #[inline]
    fn missing() -> Self {
        Self {
            local: Self::NOT_FOUND,
            distance: f32::INFINITY,
        }
    }
}

/// Brute-force L2 index over a contiguous row range of a matrix
pub struct FlatL2Index<'a> {
    matrix: &'a DenseMatrix,
    rows: Range<usize>,
}

impl<'a> FlatL2Index<'a> {
    #[must_use]
    pub fn new(matrix: &'a DenseMatrix, rows: Range<usize>) -> Self {
        Self { matrix, rows }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exactly `k` slots sorted by distance then index, padded with
    /// not-found sentinels
    pub fn search(&self, query: &[f32], k: usize) -> SmallVec<[Neighbor; 8]> {
        // Max-heap on (distance, index): the root is the worst kept neighbor
        let mut heap: BinaryHeap<(OrderedFloat<f32>, usize)> = BinaryHeap::with_capacity(k + 1);
        for (local, global) in self.rows.clone().enumerate() {
            let dist = crate::simd::squared_l2_simd(query, self.matrix.row(global));
            let entry = (OrderedFloat(dist), local);
            if heap.len() < k {
                heap.push(entry);
            } else if let Some(worst) = heap.peek() {
                if entry < *worst {
                    heap.pop();
                    heap.push(entry);
                }
            }
        }

        let mut out: SmallVec<[Neighbor; 8]> = heap
            .into_sorted_vec()
            .into_iter()
            .map(|(d, local)| Neighbor {
                local,
                distance: d.into_inner(),
            })
            .collect();
        while out.len() < k {
            out.push(Neighbor::missing());
        }
        out
    }
}

/// Candidate generator over a vector matrix
#[derive(Debug, Clone, Default)]
pub struct BlockingEngine {
    config: BlockingConfig,
}

impl BlockingEngine {
    #[must_use]
    pub fn new(config: BlockingConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &BlockingConfig {
        &self.config
    }

    /// Generate candidate pairs for every row of `matrix`.
    ///
    /// The returned pairs are canonical (`id_1 < id_2`), unique, and sorted.
    /// `progress` receives the chunk pair total up front and one advance
    /// per finished chunk pair.
    pub fn candidates(&self, matrix: &DenseMatrix, progress: &dyn ProgressSink) -> Result<Vec<Candidate>> {
        self.config.validate()?;

        let chunks = matrix.chunk_ranges(self.config.chunk_size);
        let total = total_chunk_pairs(chunks.len());
        progress.set_total(total);

        let mut seen: AHashSet<(usize, usize)> = AHashSet::new();
        let mut out = Vec::new();

        for i in 0..chunks.len() {
            for j in i..chunks.len() {
                let (chunk_i, chunk_j) = (&chunks[i], &chunks[j]);
                if chunk_i.is_empty() || chunk_j.is_empty() {
                    progress.advance();
                    continue;
                }

                let before = out.len();
                self.search_chunk_pair(matrix, chunk_i, chunk_j, &mut seen, &mut out);
                if self.config.symmetric_cross_chunk && i != j {
                    self.search_chunk_pair(matrix, chunk_j, chunk_i, &mut seen, &mut out);
                }
                debug!(
                    "chunk pair ({}, {}) produced {} candidates",
                    i,
                    j,
                    out.len() - before
                );
                progress.advance();
            }
        }

        out.sort_unstable_by(|a, b| (a.id_1, a.id_2).cmp(&(b.id_1, b.id_2)));
        Ok(out)
    }

    /// Query every row of `queries` against an index over `indexed`
    fn search_chunk_pair(
        &self,
        matrix: &DenseMatrix,
        indexed: &Range<usize>,
        queries: &Range<usize>,
        seen: &mut AHashSet<(usize, usize)>,
        out: &mut Vec<Candidate>,
    ) {
        let index = FlatL2Index::new(matrix, indexed.clone());
        let k = self.config.k;

        let hits: Vec<(usize, SmallVec<[Neighbor; 8]>)> = queries
            .clone()
            .into_par_iter()
            .map(|global_q| (global_q, index.search(matrix.row(global_q), k)))
            .collect();

        for (global_q, neighbors) in hits {
            for neighbor in neighbors {
                if neighbor.local == Neighbor::NOT_FOUND || neighbor.local >= index.len() {
                    continue;
                }
                let global_n = indexed.start + neighbor.local;
                let Some(candidate) = Candidate::canonical(global_n, global_q, neighbor.distance) else {
                    continue;
                };
                if seen.insert((candidate.id_1, candidate.id_2)) {
                    out.push(candidate);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoProgress, ProgressRegistry};

    fn line_matrix(points: &[f32]) -> DenseMatrix {
        DenseMatrix::new(points.len(), 1, points.to_vec()).unwrap()
    }

    #[test]
    fn test_flat_index_pads_with_sentinel() {
        let m = line_matrix(&[0.0, 1.0, 5.0]);
        let index = FlatL2Index::new(&m, 0..3);
        let hits = index.search(&[0.9], 5);
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].local, 1);
        assert_eq!(hits[1].local, 0);
        assert_eq!(hits[2].local, 2);
        assert_eq!(hits[3].local, Neighbor::NOT_FOUND);
        assert!((hits[0].distance - 0.01).abs() < 1e-5);
    }

    #[test]
    fn test_no_self_matches_and_canonical_order() {
        let m = line_matrix(&[0.0, 0.1, 0.2, 5.0, 5.1, 9.0, 9.05]);
        let engine = BlockingEngine::new(BlockingConfig {
            chunk_size: 3,
            k: 3,
            symmetric_cross_chunk: true,
        });
        let pairs = engine.candidates(&m, &NoProgress).unwrap();
        assert!(!pairs.is_empty());
        let mut keys = AHashSet::new();
        for p in &pairs {
            assert!(p.id_1 < p.id_2);
            assert!(keys.insert((p.id_1, p.id_2)), "duplicate pair {:?}", p);
            assert!(p.vector_score > 0.0 && p.vector_score <= 1.0);
        }
    }

    #[test]
    fn test_identical_rows_score_one() {
        let m = line_matrix(&[2.0, 2.0]);
        let pairs = BlockingEngine::default().candidates(&m, &NoProgress).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].id_1, pairs[0].id_2), (0, 1));
        assert!((pairs[0].vector_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cross_chunk_neighbors_found() {
        // Rows 1 and 2 are closest to each other but sit in different chunks
        let m = line_matrix(&[0.0, 10.0, 10.1, 20.0]);
        let engine = BlockingEngine::new(BlockingConfig {
            chunk_size: 2,
            k: 1,
            symmetric_cross_chunk: false,
        });
        let pairs = engine.candidates(&m, &NoProgress).unwrap();
        assert!(pairs.iter().any(|p| (p.id_1, p.id_2) == (1, 2)));
    }

    #[test]
    fn test_symmetric_search_adds_reverse_neighbors() {
        // Reverse direction can only add pairs
        let m = line_matrix(&[0.0, 3.0, 100.0, 3.5]);
        let one_way = BlockingEngine::new(BlockingConfig {
            chunk_size: 2,
            k: 2,
            symmetric_cross_chunk: false,
        })
        .candidates(&m, &NoProgress)
        .unwrap();
        let both_ways = BlockingEngine::new(BlockingConfig {
            chunk_size: 2,
            k: 2,
            symmetric_cross_chunk: true,
        })
        .candidates(&m, &NoProgress)
        .unwrap();
        assert!(both_ways.len() >= one_way.len());
        for p in &one_way {
            assert!(both_ways.contains(p));
        }
    }

    #[test]
    fn test_progress_reaches_total() {
        let m = line_matrix(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let registry = ProgressRegistry::new();
        let handle = registry.start("batch");
        BlockingEngine::new(BlockingConfig {
            chunk_size: 2,
            ..Default::default()
        })
        .candidates(&m, &handle)
        .unwrap();
        let progress = registry.get("batch").unwrap();
        assert_eq!(progress.total, total_chunk_pairs(3));
        assert_eq!(progress.current, progress.total);
    }

    #[test]
    fn test_total_chunk_pairs() {
        assert_eq!(total_chunk_pairs(0), 0);
        assert_eq!(total_chunk_pairs(1), 1);
        assert_eq!(total_chunk_pairs(2), 3);
        assert_eq!(total_chunk_pairs(4), 10);
    }
}
