mod particle;
mod particle_io;
mod particle_simulation;
mod particle_interactions_barnes_hut;

pub use particle::*;
pub use particle_io::*;
pub use particle_simulation::*;
pub use particle_interactions_barnes_hut::*;

#[cfg(test)]
mod particle_tests;
#[cfg(test)]
mod particle_simulation_tests;
