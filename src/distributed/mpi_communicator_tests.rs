use crate::distributed::{run_rank, Communicator, DistributedOptions, MpiParticle, ROOT_RANK};
use crate::particles::{generate_uniform, Particle, Simulation};
use crate::utils::{SimulationConstants, OUT_OF_BOUNDS_MASS};
use crate::visualization::NoVisualization;

#[test]
fn test_wire_layout_keeps_every_field() {
    let mut particle = Particle::new(123_456, 1.25, 3.5, OUT_OF_BOUNDS_MASS).with_velocity(-0.5, 0.125);
    particle.ax = 1e-7;
    particle.ay = -2e-7;

    let back = Particle::from(MpiParticle::from(&particle));
    assert_eq!(back, particle);
}

// MPI can only be initialised once per process, so every world-level check lives here.
#[test]
fn test_world_run_matches_sequential() {
    let universe = match mpi::initialize() {
        Some(universe) => universe,
        None => panic!("MPI was already initialised"),
    };
    let world = universe.world();

    let constants = SimulationConstants::default();
    let particles = generate_uniform(50, &constants.bounds, 10.0, 4);
    let mut sim = Simulation::new(particles.clone(), constants, 0.5, 0.05).expect("valid");
    sim.simulate(4, &mut NoVisualization).expect("sequential run");

    let is_root = Communicator::rank(&world) == ROOT_RANK;
    assert!(world.broadcast_flag(is_root, ROOT_RANK).expect("broadcast flag"));

    let initial = if Communicator::rank(&world) == ROOT_RANK { particles } else { Vec::new() };
    let options = DistributedOptions::new(Communicator::size(&world), 4, 0.5);
    let outcome = run_rank(&world, initial, &options, None, false).expect("world run");

    assert_eq!(outcome.steps_completed, 4);
    assert_eq!(outcome.particles, sim.into_particles());
}
