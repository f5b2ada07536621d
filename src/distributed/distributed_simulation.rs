//! SPMD Barnes–Hut driver.
//!
//! Every rank holds a full copy of the particle array and builds the same tree
//! from it, but only computes forces for and integrates its own contiguous
//! block. After each step the blocks are all-gathered so every rank starts the
//! next step from identical state. Rank 0 reads the input, renders and returns
//! the final array.
//!
//! # Example
//!
//! ```
//! use rs_barnes_hut::distributed::{run_distributed, DistributedOptions};
//! use rs_barnes_hut::particles::generate_uniform;
//! use rs_barnes_hut::utils::SimulationConstants;
//!
//! let constants = SimulationConstants::default();
//! let particles = generate_uniform(64, &constants.bounds, 5.0, 3);
//! let options = DistributedOptions::new(4, 5, 0.5);
//!
//! let outcome = run_distributed(particles, &options, None).expect("run failed");
//! assert_eq!(outcome.summary.steps_completed, 5);
//! assert_eq!(outcome.particles.len(), 64);
//! ```
use std::sync::Mutex;

use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;

use crate::distributed::{Communicator, StaticPartition, ThreadGroup, ROOT_RANK};
use crate::errors::SimulationError;
use crate::particles::{timed, Particle, PhaseTimings, RunSummary, StepWorker};
use crate::utils::{validate_step_parameters, QuitPolicy, SimulationConstants, DEFAULT_DT};
use crate::visualization::Visualizer;

#[derive(Debug, Clone, PartialEq)]
pub struct DistributedOptions {
    pub ranks: usize,
    pub steps: usize,
    pub theta: f64,
    pub dt: f64,
    pub constants: SimulationConstants,
    pub quit_policy: QuitPolicy,
}

impl DistributedOptions {
    /// Options with the default time step, physical constants and quit policy.
    pub fn new(ranks: usize, steps: usize, theta: f64) -> Self {
        DistributedOptions {
            ranks,
            steps,
            theta,
            dt: DEFAULT_DT,
            constants: SimulationConstants::default(),
            quit_policy: QuitPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.ranks == 0 {
            return Err(SimulationError::InvalidParameter("distributed runs need at least one rank".to_string()));
        }
        validate_step_parameters(self.theta, self.dt)
    }
}

/// What one rank ends a run with.
#[derive(Debug, Clone, PartialEq)]
pub struct RankOutcome {
    pub rank: usize,
    pub particles: Vec<Particle>,
    pub steps_completed: usize,
    pub quit_early: bool,
    pub timings: PhaseTimings,
}

impl RankOutcome {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            steps_completed: self.steps_completed,
            quit_early: self.quit_early,
            out_of_bounds: self.particles.iter().filter(|p| !p.is_in_bounds()).count(),
            timings: self.timings,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributedOutcome {
    /// Rank 0's final array.
    pub particles: Vec<Particle>,
    /// Rank 0's view of the run.
    pub summary: RunSummary,
    /// Phase timings of every rank that finished, in rank order.
    pub rank_timings: Vec<PhaseTimings>,
}

/// Body of one rank. `initial` is only read on the root; the other ranks
/// receive the root's array over `comm`.
///
/// When `collective_quit` is set, the root broadcasts its quit decision every
/// step and every rank stops together. Otherwise a quitting root simply
/// returns, and the other ranks fail their next collective.
pub fn run_rank<C: Communicator>(
    comm: &C,
    initial: Vec<Particle>,
    options: &DistributedOptions,
    mut visualizer: Option<&mut dyn Visualizer>,
    collective_quit: bool,
) -> Result<RankOutcome, SimulationError> {
    let rank = comm.rank();
    let mut timings = PhaseTimings::default();

    let mut particles = initial;
    timed(&mut timings.sync, || comm.broadcast_particles(&mut particles, ROOT_RANK))?;

    let partition = StaticPartition::new(particles.len(), comm.size())?;
    let owned = partition.range(rank);
    debug!("rank {} owns particles {:?}", rank, owned);

    let DistributedOptions { steps, theta, dt, constants, .. } = options;
    let mut worker = StepWorker::default();
    let mut steps_completed = 0;
    let mut quit_early = false;

    for step in 0..*steps {
        debug!("rank {} step {}", rank, step);
        timed(&mut timings.build, || worker.build(&particles, constants))?;

        let mut quit = false;
        if let Some(viewer) = visualizer.as_deref_mut() {
            quit = timed(&mut timings.render, || viewer.render(&particles, worker.tree()));
        }
        if collective_quit {
            quit = timed(&mut timings.sync, || comm.broadcast_flag(quit, ROOT_RANK))?;
        }
        if quit {
            debug!("rank {} stopping on quit request", rank);
            worker.teardown();
            quit_early = true;
            break;
        }

        timed(&mut timings.force, || worker.compute_forces(&mut particles, owned.clone(), *theta, constants));
        timed(&mut timings.integrate, || worker.integrate(&mut particles, owned.clone(), *dt, constants));
        timed(&mut timings.sync, || comm.all_gather_partitions(&mut particles, &partition))?;
        timed(&mut timings.teardown, || worker.teardown());
        steps_completed += 1;
    }

    Ok(RankOutcome { rank, particles, steps_completed, quit_early, timings })
}

/// Runs `options.steps` steps over an in-process group of `options.ranks` ranks,
/// each on its own thread.
///
/// The visualizer, if any, is driven by rank 0 only.
///
/// # Errors
///
/// `InvalidParameter` for a bad configuration, `UnresolvableParticles` if a
/// tree cannot be built, and `Collective` if a rank leaves the group while
/// others still wait on it. After a coordinator-only quit the stranded ranks
/// fail that way, but rank 0's array is still returned.
pub fn run_distributed(
    particles: Vec<Particle>,
    options: &DistributedOptions,
    visualizer: Option<&mut (dyn Visualizer + Send)>,
) -> Result<DistributedOutcome, SimulationError> {
    options.validate()?;

    let renders = visualizer.is_some();
    let collective_quit = renders && options.quit_policy == QuitPolicy::Collective;
    if renders && options.quit_policy == QuitPolicy::CoordinatorOnly && options.ranks > 1 {
        warn!(
            "quit policy is {}: if the visualizer quits, ranks other than {} will fail their next exchange",
            options.quit_policy, ROOT_RANK
        );
    }
    info!(
        "distributed run: {} particles over {} ranks, {} steps, theta {}, dt {}",
        particles.len(),
        options.ranks,
        options.steps,
        options.theta,
        options.dt
    );

    let pool = ThreadPoolBuilder::new()
        .num_threads(options.ranks)
        .thread_name(|i| format!("rank-{}", i))
        .build()
        .map_err(|e| SimulationError::Collective(format!("could not start rank threads: {}", e)))?;
    let group = ThreadGroup::new(options.ranks)?;
    let initial = Mutex::new(Some(particles));
    let viewer = Mutex::new(visualizer);

    let results: Vec<Result<RankOutcome, SimulationError>> = pool.broadcast(|ctx| {
        let comm = group.join(ctx.index());
        if comm.rank() != ROOT_RANK {
            return run_rank(&comm, Vec::new(), options, None, collective_quit);
        }

        let start = initial
            .lock()
            .map_err(|_| SimulationError::Collective("initial particle slot poisoned".to_string()))?
            .take()
            .unwrap_or_default();
        let mut slot = viewer
            .lock()
            .map_err(|_| SimulationError::Collective("visualizer slot poisoned".to_string()))?;
        let local: Option<&mut dyn Visualizer> = match slot.as_mut() {
            Some(v) => Some(&mut **v as &mut dyn Visualizer),
            None => None,
        };
        run_rank(&comm, start, options, local, collective_quit)
    });

    collect(results)
}

/// Picks rank 0's result, or the most telling failure if any rank failed.
///
/// A coordinator-only quit is not a failure: rank 0 stopped on purpose and its
/// array is returned, even though the ranks it stranded report collective errors.
fn collect(results: Vec<Result<RankOutcome, SimulationError>>) -> Result<DistributedOutcome, SimulationError> {
    let mut outcomes = Vec::with_capacity(results.len());
    let mut first_error: Option<SimulationError> = None;
    let mut stranded = Vec::new();
    for (rank, result) in results.into_iter().enumerate() {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                stranded.push(rank);
                // A local failure explains the collective errors it causes on other ranks.
                let replace = match (&first_error, &e) {
                    (None, _) => true,
                    (Some(SimulationError::Collective(_)), SimulationError::Collective(_)) => false,
                    (Some(SimulationError::Collective(_)), _) => true,
                    _ => false,
                };
                if replace {
                    first_error = Some(e);
                } else {
                    debug!("rank {} failed: {}", rank, e);
                }
            }
        }
    }

    let root = outcomes.iter().position(|o| o.rank == ROOT_RANK);
    if let Some(e) = first_error {
        let root_quit = root.map_or(false, |i| outcomes[i].quit_early);
        if !(root_quit && matches!(e, SimulationError::Collective(_))) {
            warn!("distributed run failed: {}", e);
            return Err(e);
        }
        warn!(
            "rank {} quit on its own; ranks {:?} were left waiting on a collective ({})",
            ROOT_RANK, stranded, e
        );
    }

    let root = root.ok_or_else(|| SimulationError::Collective("no result from rank 0".to_string()))?;
    if outcomes.iter().any(|o| o.particles != outcomes[root].particles) {
        warn!("ranks finished with diverging particle arrays; returning rank {}'s", ROOT_RANK);
    }

    let rank_timings: Vec<PhaseTimings> = outcomes.iter().map(|o| o.timings).collect();
    for outcome in &outcomes {
        outcome.timings.log_per_step(&format!("rank {}", outcome.rank), outcome.steps_completed);
    }
    let root = outcomes.swap_remove(root);
    let summary = root.summary();
    info!(
        "distributed run finished after {} steps ({} out of bounds)",
        summary.steps_completed, summary.out_of_bounds
    );
    Ok(DistributedOutcome { particles: root.particles, summary, rank_timings })
}
