use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use rs_barnes_hut::driver;
use rs_barnes_hut::errors::SimulationError;
use rs_barnes_hut::utils::{ExecutionMode, QuitPolicy, RunConfig, DEFAULT_DT};
use rs_barnes_hut::visualization::{FrameLogger, NoVisualization, Visualizer};

/// Barnes-Hut gravitational n-body simulation over the [0, 4] x [0, 4] domain.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Input particle file
    #[arg(short = 'i', long = "in")]
    input: PathBuf,

    /// Output particle file
    #[arg(short = 'o', long = "out")]
    output: PathBuf,

    /// Number of time steps
    #[arg(short = 's', long)]
    steps: usize,

    /// Opening-angle threshold
    #[arg(short = 't', long)]
    theta: f64,

    /// Time increment per step
    #[arg(short = 'd', long = "delta", default_value_t = DEFAULT_DT)]
    dt: f64,

    /// Run on a single thread of control
    #[arg(short = '1', long)]
    sequential: bool,

    /// Log a summary of every rendered frame
    #[arg(short = 'V', long)]
    visualization: bool,

    /// Number of ranks in distributed mode
    #[arg(short = 'n', long, default_value_t = 4)]
    ranks: usize,

    /// What the other ranks do when the visualizer quits: coordinator-only or collective
    #[arg(long, default_value_t = QuitPolicy::CoordinatorOnly)]
    quit_policy: QuitPolicy,

    /// Log every n-th frame when visualization is on
    #[arg(long, default_value_t = 1)]
    frame_interval: usize,

    /// Run as one process of an MPI job instead of spawning rank threads
    #[cfg(feature = "mpi")]
    #[arg(long, conflicts_with = "sequential")]
    mpi: bool,
}

impl Args {
    fn into_config(self) -> RunConfig {
        let mut config = RunConfig::new(self.input, self.output, self.steps, self.theta);
        config.dt = self.dt;
        config.visualization = self.visualization;
        config.quit_policy = self.quit_policy;
        config.mode = if self.sequential {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Distributed { ranks: self.ranks }
        };
        config
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let mut viewer: Box<dyn Visualizer + Send> = if args.visualization {
        Box::new(FrameLogger::new(args.frame_interval))
    } else {
        Box::new(NoVisualization)
    };

    #[cfg(feature = "mpi")]
    if args.mpi {
        let config = args.into_config();
        return report(driver::run_mpi(&config, viewer.as_mut()).map(|_| ()));
    }

    let config = args.into_config();
    report(driver::run(&config, viewer.as_mut()).map(|_| ()))
}

fn report(result: Result<(), SimulationError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("nbody: {}", e);
            ExitCode::FAILURE
        }
    }
}
