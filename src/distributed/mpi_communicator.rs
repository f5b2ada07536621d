//! [`Communicator`] over an MPI process group, one process per rank.
//!
//! Broadcasts go through `MPI_Bcast` from the root process and the per-step
//! exchange is a single `MPI_Allgatherv` over the static partition.
use mpi::datatype::PartitionMut;
use mpi::topology::SimpleCommunicator;
use mpi::traits::{Communicator as MpiCommunicator, CommunicatorCollectives, Equivalence, Root};
use mpi::Count;

use crate::distributed::{Communicator, StaticPartition};
use crate::errors::SimulationError;
use crate::particles::Particle;

/// Wire layout of a [`Particle`]; `usize` has no portable MPI datatype.
#[derive(Equivalence, Debug, Clone, Copy, Default, PartialEq)]
pub struct MpiParticle {
    index: u64,
    x: f64,
    y: f64,
    mass: f64,
    vx: f64,
    vy: f64,
    ax: f64,
    ay: f64,
}

impl From<&Particle> for MpiParticle {
    fn from(p: &Particle) -> Self {
        MpiParticle { index: p.index as u64, x: p.x, y: p.y, mass: p.mass, vx: p.vx, vy: p.vy, ax: p.ax, ay: p.ay }
    }
}

impl From<MpiParticle> for Particle {
    fn from(p: MpiParticle) -> Self {
        Particle { index: p.index as usize, x: p.x, y: p.y, mass: p.mass, vx: p.vx, vy: p.vy, ax: p.ax, ay: p.ay }
    }
}

fn to_count(n: usize) -> Result<Count, SimulationError> {
    Count::try_from(n).map_err(|_| SimulationError::Collective(format!("{} does not fit an MPI count", n)))
}

impl Communicator for SimpleCommunicator {
    fn rank(&self) -> usize {
        MpiCommunicator::rank(self) as usize
    }

    fn size(&self) -> usize {
        MpiCommunicator::size(self) as usize
    }

    fn broadcast_particles(&self, particles: &mut Vec<Particle>, root: usize) -> Result<(), SimulationError> {
        let process = self.process_at_rank(to_count(root)?);

        let mut len = particles.len() as u64;
        process.broadcast_into(&mut len);
        let len = usize::try_from(len)
            .map_err(|_| SimulationError::Collective(format!("broadcast particle count {} is too large", len)))?;

        let mut wire: Vec<MpiParticle> = if Communicator::rank(self) == root {
            particles.iter().map(MpiParticle::from).collect()
        } else {
            vec![MpiParticle::default(); len]
        };
        process.broadcast_into(&mut wire[..]);

        particles.clear();
        particles.extend(wire.into_iter().map(Particle::from));
        Ok(())
    }

    fn broadcast_flag(&self, flag: bool, root: usize) -> Result<bool, SimulationError> {
        let mut value = flag;
        self.process_at_rank(to_count(root)?).broadcast_into(&mut value);
        Ok(value)
    }

    fn all_gather_partitions(
        &self,
        particles: &mut [Particle],
        partition: &StaticPartition,
    ) -> Result<(), SimulationError> {
        let size = Communicator::size(self);
        if partition.ranks() != size || partition.len() != particles.len() {
            return Err(SimulationError::Collective(format!(
                "partition of {} particles over {} ranks does not match {} particles over {} ranks",
                partition.len(),
                partition.ranks(),
                particles.len(),
                size
            )));
        }

        let counts = partition.counts().into_iter().map(to_count).collect::<Result<Vec<_>, _>>()?;
        let displs = (0..size)
            .map(|rank| to_count(partition.range(rank).start))
            .collect::<Result<Vec<_>, _>>()?;
        let owned: Vec<MpiParticle> = particles[partition.range(Communicator::rank(self))]
            .iter()
            .map(MpiParticle::from)
            .collect();

        let mut gathered = vec![MpiParticle::default(); particles.len()];
        {
            let mut receive = PartitionMut::new(&mut gathered[..], counts, displs);
            self.all_gather_varcount_into(&owned[..], &mut receive);
        }

        for (slot, wire) in particles.iter_mut().zip(gathered) {
            *slot = wire.into();
        }
        Ok(())
    }
}
