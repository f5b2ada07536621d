//! Collective operations over a group of cooperating ranks.
//!
//! Every operation here is blocking and group-wide: each rank must issue the
//! same collectives in the same order, or the group cannot make progress.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use log::{debug, warn};

use crate::distributed::StaticPartition;
use crate::errors::SimulationError;
use crate::particles::Particle;

/// Rank that loads the input, renders and hands off the output.
pub const ROOT_RANK: usize = 0;

pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Replaces `particles` on every rank with the array held by `root`
    /// (count and contents together).
    fn broadcast_particles(&self, particles: &mut Vec<Particle>, root: usize) -> Result<(), SimulationError>;

    /// Returns `root`'s `flag` on every rank.
    fn broadcast_flag(&self, flag: bool, root: usize) -> Result<bool, SimulationError>;

    /// Gathers every rank's owned range of `particles` so that all ranks end up
    /// with the same full array.
    fn all_gather_partitions(
        &self,
        particles: &mut [Particle],
        partition: &StaticPartition,
    ) -> Result<(), SimulationError>;
}

#[derive(Debug)]
struct GroupState {
    generation: u64,
    arrived: usize,
    departed: Option<usize>,
}

#[derive(Debug)]
struct Shared {
    size: usize,
    state: Mutex<GroupState>,
    released: Condvar,
    staging: Mutex<Vec<Particle>>,
    flag: AtomicBool,
}

fn poisoned<T>(_: T) -> SimulationError {
    SimulationError::Collective("process group state poisoned by a panicking rank".to_string())
}

fn departed(rank: usize) -> SimulationError {
    SimulationError::Collective(format!("rank {} left the process group", rank))
}

impl Shared {
    /// Generation barrier. Fails instead of blocking once any rank has left.
    fn barrier(&self) -> Result<(), SimulationError> {
        let mut state = self.state.lock().map_err(poisoned)?;
        if let Some(rank) = state.departed {
            return Err(departed(rank));
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
            return Ok(());
        }

        loop {
            state = self.released.wait(state).map_err(poisoned)?;
            if state.generation != generation {
                return Ok(());
            }
            if let Some(rank) = state.departed {
                return Err(departed(rank));
            }
        }
    }

    fn leave(&self, rank: usize) {
        match self.state.lock() {
            Ok(mut state) => {
                state.departed.get_or_insert(rank);
                self.released.notify_all();
            }
            Err(_) => warn!("rank {} left a poisoned process group", rank),
        }
    }

    fn staging(&self) -> Result<MutexGuard<'_, Vec<Particle>>, SimulationError> {
        self.staging.lock().map_err(poisoned)
    }
}

/// An SPMD process group whose ranks are threads of the current process.
///
/// Each rank obtains its handle with [`ThreadGroup::join`] and must run on its
/// own thread. Ranks share nothing but the collective staging area.
#[derive(Debug, Clone)]
pub struct ThreadGroup {
    shared: Arc<Shared>,
}

impl ThreadGroup {
    pub fn new(size: usize) -> Result<Self, SimulationError> {
        if size == 0 {
            return Err(SimulationError::InvalidParameter("a process group needs at least one rank".to_string()));
        }
        Ok(ThreadGroup {
            shared: Arc::new(Shared {
                size,
                state: Mutex::new(GroupState { generation: 0, arrived: 0, departed: None }),
                released: Condvar::new(),
                staging: Mutex::new(Vec::new()),
                flag: AtomicBool::new(false),
            }),
        })
    }

    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Hands out the communicator for `rank`. Dropping it marks the rank as gone.
    pub fn join(&self, rank: usize) -> ThreadComm {
        debug_assert!(rank < self.shared.size, "rank {} out of range", rank);
        ThreadComm { rank, shared: Arc::clone(&self.shared) }
    }
}

/// One rank's view of a [`ThreadGroup`].
#[derive(Debug)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl Drop for ThreadComm {
    fn drop(&mut self) {
        debug!("rank {} leaving the process group", self.rank);
        self.shared.leave(self.rank);
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn broadcast_particles(&self, particles: &mut Vec<Particle>, root: usize) -> Result<(), SimulationError> {
        if self.rank == root {
            let mut staging = self.shared.staging()?;
            staging.clone_from(particles);
        }
        self.shared.barrier()?;
        if self.rank != root {
            let staging = self.shared.staging()?;
            particles.clone_from(&*staging);
        }
        // Keeps the root from reusing the staging area before everyone has copied it.
        self.shared.barrier()
    }

    fn broadcast_flag(&self, flag: bool, root: usize) -> Result<bool, SimulationError> {
        if self.rank == root {
            self.shared.flag.store(flag, Ordering::SeqCst);
        }
        self.shared.barrier()?;
        let value = self.shared.flag.load(Ordering::SeqCst);
        self.shared.barrier()?;
        Ok(value)
    }

    fn all_gather_partitions(
        &self,
        particles: &mut [Particle],
        partition: &StaticPartition,
    ) -> Result<(), SimulationError> {
        if partition.ranks() != self.shared.size || partition.len() != particles.len() {
            return Err(SimulationError::Collective(format!(
                "partition of {} particles over {} ranks does not match {} particles over {} ranks",
                partition.len(),
                partition.ranks(),
                particles.len(),
                self.shared.size
            )));
        }

        let owned = partition.range(self.rank);
        {
            let mut staging = self.shared.staging()?;
            if staging.len() != particles.len() {
                staging.resize(particles.len(), Particle::default());
            }
            staging[owned.clone()].copy_from_slice(&particles[owned]);
        }
        self.shared.barrier()?;
        {
            let staging = self.shared.staging()?;
            particles.copy_from_slice(&staging);
        }
        self.shared.barrier()
    }
}
