//! File-to-file entry point shared by the binary and integration callers.
use log::info;

use crate::errors::SimulationError;
use crate::particles::{read_particle_file, write_particle_file, Particle, RunSummary, Simulation};
use crate::utils::{ExecutionMode, RunConfig};
use crate::visualization::{NoVisualization, Visualizer};

#[cfg(feature = "distributed")]
use crate::distributed::{run_distributed, DistributedOptions};

/// Reads `config.input`, runs the configured mode and writes `config.output`.
///
/// The visualizer is initialised before the first step and terminated after
/// the last one, whether or not the run succeeded. It is only rendered to when
/// `config.visualization` is set. Nothing is written if the run fails.
pub fn run(config: &RunConfig, visualizer: &mut (dyn Visualizer + Send)) -> Result<RunSummary, SimulationError> {
    config.validate()?;
    let particles = read_particle_file(&config.input)?;
    info!("loaded {} particles from {}", particles.len(), config.input.display());

    if config.visualization {
        visualizer.init()?;
    }
    let result = simulate(config, particles, visualizer);
    if config.visualization {
        visualizer.terminate();
    }
    let (particles, summary) = result?;

    write_particle_file(&config.output, &particles)?;
    info!("wrote {} particles to {}", particles.len(), config.output.display());
    Ok(summary)
}

fn simulate(
    config: &RunConfig,
    particles: Vec<Particle>,
    visualizer: &mut (dyn Visualizer + Send),
) -> Result<(Vec<Particle>, RunSummary), SimulationError> {
    match config.mode {
        ExecutionMode::Sequential => {
            let mut sim = Simulation::new(particles, config.constants, config.theta, config.dt)?;
            let summary = if config.visualization {
                sim.simulate(config.steps, visualizer)?
            } else {
                sim.simulate(config.steps, &mut NoVisualization)?
            };
            Ok((sim.into_particles(), summary))
        }
        #[cfg(feature = "distributed")]
        ExecutionMode::Distributed { ranks } => {
            let options = DistributedOptions {
                ranks,
                steps: config.steps,
                theta: config.theta,
                dt: config.dt,
                constants: config.constants,
                quit_policy: config.quit_policy,
            };
            let viewer = if config.visualization { Some(visualizer) } else { None };
            let outcome = run_distributed(particles, &options, viewer)?;
            Ok((outcome.particles, outcome.summary))
        }
        #[cfg(not(feature = "distributed"))]
        ExecutionMode::Distributed { .. } => Err(SimulationError::InvalidParameter(
            "distributed mode requires the `distributed` feature".to_string(),
        )),
    }
}

/// Runs `config` as one process of an MPI job (`mpirun -n <p> nbody --mpi ...`).
///
/// Every process must be started with the same configuration. The process
/// group size comes from the MPI world, not from `config.mode`. Only rank 0
/// reads the input, drives the visualizer and writes the output; it returns
/// the run summary while every other rank returns `None`.
///
/// A failure on rank 0 before the initial broadcast aborts the whole job, since
/// the other ranks would otherwise wait on it forever.
#[cfg(feature = "mpi")]
pub fn run_mpi(config: &RunConfig, visualizer: &mut dyn Visualizer) -> Result<Option<RunSummary>, SimulationError> {
    use log::{error, warn};
    use mpi::traits::Communicator as _;

    use crate::distributed::{run_rank, Communicator, ROOT_RANK};
    use crate::utils::QuitPolicy;

    config.validate()?;
    let universe = mpi::initialize()
        .ok_or_else(|| SimulationError::Collective("MPI has already been initialised".to_string()))?;
    let world = universe.world();
    let rank = Communicator::rank(&world);
    let size = Communicator::size(&world);

    if let ExecutionMode::Distributed { ranks } = config.mode {
        if ranks != size && rank == ROOT_RANK {
            warn!("ignoring {} configured ranks: the MPI world has {} processes", ranks, size);
        }
    }
    let collective_quit = config.visualization && config.quit_policy == QuitPolicy::Collective;
    if config.visualization && !collective_quit && size > 1 && rank == ROOT_RANK {
        warn!(
            "quit policy is {}: if the visualizer quits, ranks other than {} will block on their next exchange",
            config.quit_policy, ROOT_RANK
        );
    }

    let mut initial = Vec::new();
    if rank == ROOT_RANK {
        let prepared = read_particle_file(&config.input).and_then(|particles| {
            if config.visualization {
                visualizer.init()?;
            }
            Ok(particles)
        });
        match prepared {
            Ok(particles) => initial = particles,
            Err(e) => {
                error!("rank {} cannot start: {}", rank, e);
                world.abort(1);
            }
        }
        info!("loaded {} particles from {} over {} processes", initial.len(), config.input.display(), size);
    }

    let options = DistributedOptions {
        ranks: size,
        steps: config.steps,
        theta: config.theta,
        dt: config.dt,
        constants: config.constants,
        quit_policy: config.quit_policy,
    };
    let local: Option<&mut dyn Visualizer> =
        if rank == ROOT_RANK && config.visualization { Some(&mut *visualizer) } else { None };
    let result = run_rank(&world, initial, &options, local, collective_quit);

    if rank != ROOT_RANK {
        return result.map(|_| None);
    }
    if config.visualization {
        visualizer.terminate();
    }
    let outcome = result?;
    outcome.timings.log_per_step(&format!("rank {}", rank), outcome.steps_completed);
    write_particle_file(&config.output, &outcome.particles)?;
    info!("wrote {} particles to {}", outcome.particles.len(), config.output.display());
    Ok(Some(outcome.summary()))
}
