mod partition;
mod communicator;
mod distributed_simulation;
#[cfg(feature = "mpi")]
mod mpi_communicator;

pub use partition::*;
pub use communicator::*;
pub use distributed_simulation::*;
#[cfg(feature = "mpi")]
pub use mpi_communicator::*;

#[cfg(test)]
mod distributed_simulation_tests;
#[cfg(test)]
#[cfg(feature = "mpi")]
mod mpi_communicator_tests;
