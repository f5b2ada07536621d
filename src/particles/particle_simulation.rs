//! Sequential Barnes–Hut driver.
//!
//! Every step runs the same pipeline:
//!
//! 1. build a fresh quad-tree over the in-bounds particles
//! 2. hand the particles and tree to the visualizer (if any), which may ask to quit
//! 3. compute each in-bounds particle's acceleration from the tree
//! 4. integrate every particle and mark the ones that left the domain
//! 5. clear the tree
//!
//! # Example
//!
//! ```
//! use rs_barnes_hut::particles::{Particle, Simulation};
//! use rs_barnes_hut::utils::SimulationConstants;
//! use rs_barnes_hut::visualization::NoVisualization;
//!
//! let particles = vec![
//!     Particle::new(0, 1.5, 2.0, 10.0),
//!     Particle::new(1, 2.5, 2.0, 10.0),
//! ];
//! let mut sim = Simulation::new(particles, SimulationConstants::default(), 0.5, 0.05)
//!     .expect("valid parameters");
//!
//! let summary = sim.simulate(10, &mut NoVisualization).expect("simulation failed");
//! assert_eq!(summary.steps_completed, 10);
//!
//! // The two bodies fall towards each other.
//! let p = sim.particles();
//! assert!(p[1].x - p[0].x < 1.0);
//! ```
use std::ops::Range;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::errors::SimulationError;
use crate::particles::{NodeId, Particle, QuadTree};
use crate::utils::{validate_step_parameters, SimulationConstants};
use crate::visualization::Visualizer;

/// Lifecycle of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Init,
    Stepping { completed: usize },
    Done { quit_early: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Quit,
}

/// Wall-clock time spent in each phase, summed over all steps.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimings {
    pub build: Duration,
    pub render: Duration,
    pub force: Duration,
    pub integrate: Duration,
    pub teardown: Duration,
    pub sync: Duration,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.build + self.render + self.force + self.integrate + self.teardown + self.sync
    }

    /// Logs the average time per step of every phase.
    pub fn log_per_step(&self, label: &str, steps: usize) {
        if steps == 0 {
            return;
        }
        let per_step = |d: Duration| d.as_secs_f64() * 1000.0 / steps as f64;
        info!(
            "{} per step (ms): build {:.4}, render {:.4}, force {:.4}, integrate {:.4}, teardown {:.4}, sync {:.4}",
            label,
            per_step(self.build),
            per_step(self.render),
            per_step(self.force),
            per_step(self.integrate),
            per_step(self.teardown),
            per_step(self.sync)
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps_completed: usize,
    pub quit_early: bool,
    /// Particles carrying the out-of-bounds sentinel at the end of the run.
    pub out_of_bounds: usize,
    pub timings: PhaseTimings,
}

pub(crate) fn timed<T>(slot: &mut Duration, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    *slot += start.elapsed();
    result
}

/// Per-step machinery shared by the sequential driver and every distributed rank:
/// a reusable tree arena plus traversal scratch space.
#[derive(Debug, Default)]
pub(crate) struct StepWorker {
    tree: QuadTree,
    stack: Vec<NodeId>,
}

impl StepWorker {
    pub(crate) fn build(&mut self, particles: &[Particle], constants: &SimulationConstants) -> Result<(), SimulationError> {
        self.tree.build(particles, constants)
    }

    pub(crate) fn tree(&self) -> &QuadTree {
        &self.tree
    }

    /// Fills in `ax, ay` for every particle in `range`. Out-of-bounds particles get zero.
    pub(crate) fn compute_forces(
        &mut self,
        particles: &mut [Particle],
        range: Range<usize>,
        theta: f64,
        constants: &SimulationConstants,
    ) {
        for i in range {
            let (ax, ay) = if particles[i].is_in_bounds() {
                self.tree.acceleration_with(particles, i, theta, constants, &mut self.stack)
            } else {
                (0.0, 0.0)
            };
            particles[i].ax = ax;
            particles[i].ay = ay;
        }
    }

    /// Integrates every particle in `range` and returns how many left the domain.
    pub(crate) fn integrate(
        &mut self,
        particles: &mut [Particle],
        range: Range<usize>,
        dt: f64,
        constants: &SimulationConstants,
    ) -> usize {
        let mut exited = 0;
        for p in &mut particles[range] {
            if p.integrate(dt, &constants.bounds) {
                debug!("particle {} left the domain at ({}, {})", p.index, p.x, p.y);
                exited += 1;
            }
        }
        exited
    }

    pub(crate) fn teardown(&mut self) {
        self.tree.clear();
    }
}

/// Single-threaded driver owning the particle store for the whole run.
pub struct Simulation {
    particles: Vec<Particle>,
    pub constants: SimulationConstants,
    pub theta: f64,
    pub dt: f64,
    worker: StepWorker,
    state: DriverState,
    timings: PhaseTimings,
}

impl Simulation {
    /// Creates a driver in the `Init` state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `theta` is negative or NaN, or `dt` is not finite.
    pub fn new(
        particles: Vec<Particle>,
        constants: SimulationConstants,
        theta: f64,
        dt: f64,
    ) -> Result<Self, SimulationError> {
        validate_step_parameters(theta, dt)?;
        Ok(Simulation {
            particles,
            constants,
            theta,
            dt,
            worker: StepWorker::default(),
            state: DriverState::Init,
            timings: PhaseTimings::default(),
        })
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn into_particles(self) -> Vec<Particle> {
        self.particles
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    /// Runs one build → render → force → integrate → teardown cycle.
    ///
    /// If the visualizer asks to quit, the step stops right after rendering
    /// (no forces, no integration) and the driver moves to `Done`.
    ///
    /// # Errors
    ///
    /// `AlreadyFinished` once the driver is `Done`; `UnresolvableParticles` if the
    /// tree cannot be built. A failed step leaves the driver `Done`.
    pub fn step(&mut self, visualizer: &mut dyn Visualizer) -> Result<StepOutcome, SimulationError> {
        let completed = match self.state {
            DriverState::Init => 0,
            DriverState::Stepping { completed } => completed,
            DriverState::Done { .. } => return Err(SimulationError::AlreadyFinished),
        };

        match self.run_step(visualizer) {
            Ok(StepOutcome::Continue) => {
                self.state = DriverState::Stepping { completed: completed + 1 };
                Ok(StepOutcome::Continue)
            }
            Ok(StepOutcome::Quit) => {
                self.state = DriverState::Done { quit_early: true };
                Ok(StepOutcome::Quit)
            }
            Err(e) => {
                self.worker.teardown();
                self.state = DriverState::Done { quit_early: true };
                Err(e)
            }
        }
    }

    fn run_step(&mut self, visualizer: &mut dyn Visualizer) -> Result<StepOutcome, SimulationError> {
        let n = self.particles.len();
        let Simulation { particles, constants, theta, dt, worker, timings, .. } = self;

        timed(&mut timings.build, || worker.build(particles, constants))?;

        let quit = timed(&mut timings.render, || visualizer.render(particles, worker.tree()));
        if quit {
            debug!("visualizer requested quit");
            worker.teardown();
            return Ok(StepOutcome::Quit);
        }

        timed(&mut timings.force, || worker.compute_forces(particles, 0..n, *theta, constants));
        timed(&mut timings.integrate, || worker.integrate(particles, 0..n, *dt, constants));
        timed(&mut timings.teardown, || worker.teardown());

        Ok(StepOutcome::Continue)
    }

    /// Runs up to `steps` steps, stopping early if the visualizer quits.
    ///
    /// The driver ends in `Done` either way.
    pub fn simulate(&mut self, steps: usize, visualizer: &mut dyn Visualizer) -> Result<RunSummary, SimulationError> {
        if let DriverState::Done { .. } = self.state {
            return Err(SimulationError::AlreadyFinished);
        }
        info!(
            "sequential run: {} particles, {} steps, theta {}, dt {}",
            self.particles.len(),
            steps,
            self.theta,
            self.dt
        );

        let mut quit_early = false;
        let mut steps_completed = 0;
        for step in 0..steps {
            debug!("step {}", step);
            match self.step(visualizer)? {
                StepOutcome::Continue => steps_completed += 1,
                StepOutcome::Quit => {
                    quit_early = true;
                    break;
                }
            }
        }
        self.state = DriverState::Done { quit_early };

        self.timings.log_per_step("sequential", steps_completed);
        let summary = RunSummary {
            steps_completed,
            quit_early,
            out_of_bounds: self.particles.iter().filter(|p| !p.is_in_bounds()).count(),
            timings: self.timings,
        };
        info!(
            "sequential run finished after {} steps ({} out of bounds)",
            summary.steps_completed, summary.out_of_bounds
        );
        Ok(summary)
    }
}
