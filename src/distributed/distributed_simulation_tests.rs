use crate::distributed::{run_distributed, DistributedOptions};
use crate::errors::SimulationError;
use crate::particles::{generate_uniform, Particle, QuadTree, Simulation};
use crate::utils::{QuitPolicy, SimulationConstants};
use crate::visualization::{NoVisualization, Visualizer};

/// Quits on the `quit_on`-th frame and counts how many it saw.
struct QuitAfter {
    quit_on: usize,
    frames: usize,
}

impl Visualizer for QuitAfter {
    fn render(&mut self, _particles: &[Particle], _tree: &QuadTree) -> bool {
        self.frames += 1;
        self.frames >= self.quit_on
    }
}

fn sequential_reference(particles: Vec<Particle>, steps: usize, theta: f64) -> Vec<Particle> {
    let mut sim = Simulation::new(particles, SimulationConstants::default(), theta, 0.05).expect("valid");
    sim.simulate(steps, &mut NoVisualization).expect("sequential run");
    sim.into_particles()
}

#[test]
fn test_single_and_four_ranks_match_sequential() {
    let constants = SimulationConstants::default();
    let particles = generate_uniform(101, &constants.bounds, 20.0, 5);
    let expected = sequential_reference(particles.clone(), 8, 0.5);

    for ranks in [1, 4] {
        let options = DistributedOptions::new(ranks, 8, 0.5);
        let outcome = run_distributed(particles.clone(), &options, None).expect("distributed run");
        assert_eq!(outcome.summary.steps_completed, 8);
        assert!(!outcome.summary.quit_early);
        assert_eq!(outcome.rank_timings.len(), ranks);
        assert_eq!(outcome.particles, expected, "{} ranks diverged from the sequential run", ranks);
    }
}

#[test]
fn test_more_ranks_than_particles() {
    let particles = vec![
        Particle::new(0, 1.0, 1.0, 10.0),
        Particle::new(1, 3.0, 3.0, 10.0),
        Particle::new(2, 1.0, 3.0, 10.0),
    ];
    let expected = sequential_reference(particles.clone(), 4, 0.5);

    let options = DistributedOptions::new(5, 4, 0.5);
    let outcome = run_distributed(particles, &options, None).expect("distributed run");
    assert_eq!(outcome.particles, expected);
}

#[test]
fn test_out_of_bounds_particles_survive_distribution() {
    let particles = vec![
        Particle::new(0, 2.0, 2.0, 5.0),
        Particle::new(1, 3.98, 1.0, 1.0).with_velocity(2.0, 0.0),
        Particle::new(2, 1.0, 1.0, 1.0),
        Particle::new(3, 1.0, 3.0, 1.0),
    ];
    let options = DistributedOptions::new(2, 3, 0.5);
    let outcome = run_distributed(particles, &options, None).expect("distributed run");
    assert_eq!(outcome.particles.len(), 4);
    assert_eq!(outcome.summary.out_of_bounds, 1);
    assert!(!outcome.particles[1].is_in_bounds());
}

#[test]
fn test_collective_quit_stops_every_rank() {
    let constants = SimulationConstants::default();
    let particles = generate_uniform(40, &constants.bounds, 5.0, 9);
    let expected = sequential_reference(particles.clone(), 2, 0.5);

    let mut options = DistributedOptions::new(3, 10, 0.5);
    options.quit_policy = QuitPolicy::Collective;
    let mut viewer = QuitAfter { quit_on: 3, frames: 0 };

    let outcome = run_distributed(particles, &options, Some(&mut viewer)).expect("distributed run");
    assert_eq!(viewer.frames, 3);
    assert!(outcome.summary.quit_early);
    assert_eq!(outcome.summary.steps_completed, 2);
    assert_eq!(outcome.particles, expected);
}

#[test]
fn test_coordinator_only_quit_keeps_root_result() {
    let constants = SimulationConstants::default();
    let particles = generate_uniform(40, &constants.bounds, 5.0, 9);
    let expected = sequential_reference(particles.clone(), 1, 0.5);

    let options = DistributedOptions::new(3, 10, 0.5);
    assert_eq!(options.quit_policy, QuitPolicy::CoordinatorOnly);
    let mut viewer = QuitAfter { quit_on: 2, frames: 0 };

    let outcome = run_distributed(particles, &options, Some(&mut viewer)).expect("rank 0 result");
    assert_eq!(viewer.frames, 2);
    assert!(outcome.summary.quit_early);
    assert_eq!(outcome.summary.steps_completed, 1);
    assert_eq!(outcome.particles, expected);
    // Only rank 0 finished; the others were left waiting on the next exchange.
    assert_eq!(outcome.rank_timings.len(), 1);
}

#[test]
fn test_coordinator_only_quit_with_one_rank_is_clean() {
    let particles = vec![Particle::new(0, 1.0, 1.0, 1.0), Particle::new(1, 3.0, 3.0, 1.0)];
    let options = DistributedOptions::new(1, 10, 0.5);
    let mut viewer = QuitAfter { quit_on: 1, frames: 0 };

    let outcome = run_distributed(particles.clone(), &options, Some(&mut viewer)).expect("distributed run");
    assert!(outcome.summary.quit_early);
    assert_eq!(outcome.summary.steps_completed, 0);
    assert_eq!(outcome.particles, particles);
}

#[test]
fn test_build_failure_is_reported_over_collective_errors() {
    let particles = vec![
        Particle::new(0, 1.0, 1.0, 1.0),
        Particle::new(1, 1.0, 1.0, 1.0),
        Particle::new(2, 3.0, 3.0, 1.0),
    ];
    let options = DistributedOptions::new(3, 2, 0.5);
    let result = run_distributed(particles, &options, None);
    assert!(
        matches!(result, Err(SimulationError::UnresolvableParticles { first: 0, second: 1 })),
        "{:?}",
        result
    );
}

#[test]
fn test_invalid_options_rejected() {
    let particles = vec![Particle::new(0, 1.0, 1.0, 1.0)];
    assert!(matches!(
        run_distributed(particles.clone(), &DistributedOptions::new(0, 1, 0.5), None),
        Err(SimulationError::InvalidParameter(_))
    ));
    assert!(matches!(
        run_distributed(particles, &DistributedOptions::new(2, 1, f64::NAN), None),
        Err(SimulationError::InvalidParameter(_))
    ));
}
