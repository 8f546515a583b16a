//! Exact (brute-force) nearest-neighbour index.
//!
//! Vectors are stored row-major in one contiguous buffer and addressed by
//! dense zero-based position. The corpus is small enough (thousands of
//! segments) that a linear scan beats any approximate structure on both
//! simplicity and exactness.

use crate::error::IndexError;
use crate::vector::squared_l2;

/// One search hit: a corpus position and its squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Flat squared-L2 index.
///
/// Performs no normalization; callers store and query unit vectors so the
/// distance orders results by cosine similarity. Read-only after build:
/// `search` takes `&self` and needs no locking.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    len: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Result<Self, IndexError> {
        Self::with_capacity(dimension, 0)
    }

    pub fn with_capacity(dimension: usize, capacity: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dimension,
            len: 0,
            data: Vec::with_capacity(dimension * capacity),
        })
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a vector, returning its position.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize, IndexError> {
        self.check_dimension(vector)?;
        self.data.extend_from_slice(vector);
        self.len += 1;
        Ok(self.len - 1)
    }

    /// The stored vector at `position`.
    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.len {
            return None;
        }
        let start = position * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// The `k` nearest stored vectors to `query`.
    ///
    /// Ordered by ascending distance, ties broken by lower position. `k`
    /// larger than the index is clamped; `k == 0` yields nothing.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.check_dimension(query)?;

        let k = k.min(self.len);
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, stored)| Neighbor {
                position,
                distance: squared_l2(query, stored),
            })
            .collect();

        let by_rank = |a: &Neighbor, b: &Neighbor| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.position.cmp(&b.position))
        };

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, by_rank);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(by_rank);

        Ok(neighbors)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            })
        }
    }
}
