use approx::assert_relative_eq;

use crate::errors::SimulationError;
use crate::particles::{generate_uniform, DriverState, Particle, QuadTree, Simulation, StepOutcome};
use crate::utils::{SimulationConstants, OUT_OF_BOUNDS_MASS};
use crate::visualization::{NoVisualization, Visualizer};

/// Records the leaves of every rendered tree and quits after `quit_after` frames.
struct RecordingVisualizer {
    frames: Vec<Vec<usize>>,
    positions: Vec<Vec<(f64, f64)>>,
    quit_after: Option<usize>,
}

impl RecordingVisualizer {
    fn new(quit_after: Option<usize>) -> Self {
        RecordingVisualizer { frames: Vec::new(), positions: Vec::new(), quit_after }
    }
}

impl Visualizer for RecordingVisualizer {
    fn render(&mut self, particles: &[Particle], tree: &QuadTree) -> bool {
        let mut leaves: Vec<usize> = tree.leaves().collect();
        leaves.sort_unstable();
        self.frames.push(leaves);
        self.positions.push(particles.iter().map(|p| (p.x, p.y)).collect());
        self.quit_after.map_or(false, |n| self.frames.len() >= n)
    }
}

fn two_body(mass: f64) -> Vec<Particle> {
    vec![Particle::new(0, 1.5, 2.0, mass), Particle::new(1, 2.5, 2.0, mass)]
}

#[test]
fn test_new_rejects_invalid_parameters() {
    let constants = SimulationConstants::default();
    assert!(matches!(
        Simulation::new(two_body(1.0), constants, -1.0, 0.05),
        Err(SimulationError::InvalidParameter(_))
    ));
    assert!(Simulation::new(two_body(1.0), constants, 0.5, f64::INFINITY).is_err());
    assert!(Simulation::new(two_body(1.0), constants, 0.5, 0.05).is_ok());
}

#[test]
fn test_state_transitions() {
    let mut sim = Simulation::new(two_body(1.0), SimulationConstants::default(), 0.5, 0.05).expect("valid");
    assert_eq!(sim.state(), DriverState::Init);

    assert_eq!(sim.step(&mut NoVisualization), Ok(StepOutcome::Continue));
    assert_eq!(sim.state(), DriverState::Stepping { completed: 1 });

    let summary = sim.simulate(3, &mut NoVisualization).expect("run");
    assert_eq!(summary.steps_completed, 3);
    assert!(!summary.quit_early);
    assert_eq!(sim.state(), DriverState::Done { quit_early: false });

    assert_eq!(sim.step(&mut NoVisualization), Err(SimulationError::AlreadyFinished));
    assert!(matches!(sim.simulate(1, &mut NoVisualization), Err(SimulationError::AlreadyFinished)));
}

#[test]
fn test_zero_steps_leaves_particles_untouched() {
    let particles = two_body(5.0);
    let mut sim = Simulation::new(particles.clone(), SimulationConstants::default(), 0.5, 0.05).expect("valid");
    let summary = sim.simulate(0, &mut NoVisualization).expect("run");
    assert_eq!(summary.steps_completed, 0);
    assert_eq!(sim.particles(), particles.as_slice());
}

#[test]
fn test_two_body_approach_matches_closed_form() {
    let constants = SimulationConstants::default();
    let mass = 100.0;
    let dt = 0.05;
    let steps = 10;
    let mut sim = Simulation::new(two_body(mass), constants, 0.5, dt).expect("valid");

    let mut separation = 1.0;
    for _ in 0..steps {
        sim.step(&mut NoVisualization).expect("step");
        let p = sim.particles();
        let next = p[1].x - p[0].x;
        assert!(next < separation, "bodies did not move closer: {} -> {}", separation, next);
        separation = next;

        // Symmetric about the domain center.
        assert_relative_eq!(p[0].x + p[1].x, 4.0, epsilon = 1e-12);
        assert_eq!(p[0].y, 2.0);
        assert_relative_eq!(p[0].vx, -p[1].vx, epsilon = 1e-15);
    }

    // Each body falls a·t²/2 under a = G·m/d², so the gap closes by a·t².
    let t = dt * steps as f64;
    let a = constants.gravity * mass;
    let expected = 1.0 - a * t * t;
    assert_relative_eq!(separation, expected, epsilon = 1e-5);
}

#[test]
fn test_exited_particle_is_dropped_from_next_tree_but_kept() {
    let constants = SimulationConstants::default();
    let particles = vec![
        Particle::new(0, 1.0, 1.0, 1.0),
        Particle::new(1, 3.0, 3.0, 1.0),
        Particle::new(2, 3.99, 2.0, 1.0).with_velocity(1.0, 0.0),
    ];
    let mut sim = Simulation::new(particles, constants, 0.5, 0.05).expect("valid");
    let mut viewer = RecordingVisualizer::new(None);

    sim.simulate(3, &mut viewer).expect("run");

    assert_eq!(viewer.frames[0], vec![0, 1, 2]);
    assert_eq!(viewer.frames[1], vec![0, 1]);
    assert_eq!(viewer.frames[2], vec![0, 1]);

    let exited = &sim.particles()[2];
    assert_eq!(exited.mass, OUT_OF_BOUNDS_MASS);
    assert_eq!(exited.index, 2);
    // Still integrated after leaving: three steps at vx ≈ 1.
    assert!(exited.x > 4.1, "x = {}", exited.x);
    assert_eq!((exited.ax, exited.ay), (0.0, 0.0));

    let summary_out = sim.into_particles();
    assert_eq!(summary_out.len(), 3);
}

#[test]
fn test_visualizer_quit_stops_before_integration() {
    let constants = SimulationConstants::default();
    let mut sim = Simulation::new(two_body(50.0), constants, 0.5, 0.05).expect("valid");
    let mut viewer = RecordingVisualizer::new(Some(3));

    let summary = sim.simulate(10, &mut viewer).expect("run");

    assert!(summary.quit_early);
    assert_eq!(summary.steps_completed, 2);
    assert_eq!(viewer.frames.len(), 3);
    assert_eq!(sim.state(), DriverState::Done { quit_early: true });
    // The quitting frame saw the state left by step two, and nothing moved afterwards.
    let last_seen = viewer.positions.last().expect("frame");
    let now: Vec<(f64, f64)> = sim.particles().iter().map(|p| (p.x, p.y)).collect();
    assert_eq!(last_seen, &now);
}

#[test]
fn test_visualization_does_not_change_physics() {
    let constants = SimulationConstants::default();
    let particles = generate_uniform(80, &constants.bounds, 5.0, 17);

    let mut plain = Simulation::new(particles.clone(), constants, 0.5, 0.05).expect("valid");
    plain.simulate(5, &mut NoVisualization).expect("run");

    let mut watched = Simulation::new(particles, constants, 0.5, 0.05).expect("valid");
    watched.simulate(5, &mut RecordingVisualizer::new(None)).expect("run");

    assert_eq!(plain.particles(), watched.particles());
}

#[test]
fn test_coincident_particles_abort_the_run() {
    let particles = vec![Particle::new(0, 1.0, 1.0, 1.0), Particle::new(1, 1.0, 1.0, 1.0)];
    let mut sim = Simulation::new(particles, SimulationConstants::default(), 0.5, 0.05).expect("valid");
    let result = sim.simulate(2, &mut NoVisualization);
    assert!(matches!(result, Err(SimulationError::UnresolvableParticles { first: 0, second: 1 })));
    assert!(matches!(sim.state(), DriverState::Done { .. }));
}

#[test]
fn test_summary_counts_out_of_bounds() {
    let constants = SimulationConstants::default();
    let particles = vec![
        Particle::new(0, 2.0, 2.0, 1.0),
        Particle::new(1, 0.05, 2.0, 1.0).with_velocity(-2.0, 0.0),
        Particle::new(2, 2.0, 0.05, 1.0).with_velocity(0.0, -2.0),
    ];
    let mut sim = Simulation::new(particles, constants, 0.5, 0.05).expect("valid");
    let summary = sim.simulate(2, &mut NoVisualization).expect("run");
    assert_eq!(summary.out_of_bounds, 2);
    assert!(summary.timings.total() >= summary.timings.force);
}
