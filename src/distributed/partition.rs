use std::ops::Range;

use crate::errors::SimulationError;

/// Contiguous, step-invariant assignment of particle indices to ranks.
///
/// Every rank gets a block of `ceil(n / ranks)` indices; the last non-empty
/// block may be shorter and trailing ranks may own nothing.
///
/// # Examples
///
/// ```
/// use rs_barnes_hut::distributed::StaticPartition;
///
/// let partition = StaticPartition::new(10, 4).unwrap();
/// assert_eq!(partition.block_size(), 3);
/// assert_eq!(partition.range(0), 0..3);
/// assert_eq!(partition.range(3), 9..10);
/// assert_eq!(partition.counts(), vec![3, 3, 3, 1]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPartition {
    particles: usize,
    ranks: usize,
    block: usize,
}

impl StaticPartition {
    pub fn new(particles: usize, ranks: usize) -> Result<Self, SimulationError> {
        if ranks == 0 {
            return Err(SimulationError::InvalidParameter("cannot partition over zero ranks".to_string()));
        }
        Ok(StaticPartition { particles, ranks, block: particles.div_ceil(ranks) })
    }

    pub fn block_size(&self) -> usize {
        self.block
    }

    pub fn ranks(&self) -> usize {
        self.ranks
    }

    /// Total number of particles covered.
    pub fn len(&self) -> usize {
        self.particles
    }

    pub fn is_empty(&self) -> bool {
        self.particles == 0
    }

    /// Indices owned by `rank`. Ranks past the end of the array own an empty range.
    pub fn range(&self, rank: usize) -> Range<usize> {
        let start = (rank * self.block).min(self.particles);
        let end = ((rank + 1) * self.block).min(self.particles);
        start..end
    }

    pub fn counts(&self) -> Vec<usize> {
        (0..self.ranks).map(|rank| self.range(rank).len()).collect()
    }

    /// Rank owning particle `index`.
    pub fn owner(&self, index: usize) -> usize {
        if self.block == 0 {
            0
        } else {
            index / self.block
        }
    }
}
