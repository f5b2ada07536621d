use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::SimulationError;
use crate::utils::{SimulationConstants, DEFAULT_DT};

/// How the per-step work is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Single thread of control.
    Sequential,
    /// SPMD group of `ranks` cooperating ranks.
    Distributed { ranks: usize },
}

/// What happens to the rest of a distributed group when the visualizing rank quits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuitPolicy {
    /// Only rank 0 stops. Every other rank fails its next collective.
    #[default]
    CoordinatorOnly,
    /// Rank 0 broadcasts its quit flag after each render and the whole group stops together.
    Collective,
}

impl FromStr for QuitPolicy {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coordinator-only" => Ok(QuitPolicy::CoordinatorOnly),
            "collective" => Ok(QuitPolicy::Collective),
            other => Err(SimulationError::InvalidParameter(format!("unknown quit policy '{}'", other))),
        }
    }
}

impl fmt::Display for QuitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QuitPolicy::CoordinatorOnly => write!(f, "coordinator-only"),
            QuitPolicy::Collective => write!(f, "collective"),
        }
    }
}

/// Everything the driver consumes for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub steps: usize,
    pub theta: f64,
    pub dt: f64,
    pub mode: ExecutionMode,
    pub visualization: bool,
    pub quit_policy: QuitPolicy,
    pub constants: SimulationConstants,
}

impl RunConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, steps: usize, theta: f64) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            steps,
            theta,
            dt: DEFAULT_DT,
            mode: ExecutionMode::Sequential,
            visualization: false,
            quit_policy: QuitPolicy::default(),
            constants: SimulationConstants::default(),
        }
    }

    /// Checks the numeric parameters shared by every execution mode.
    pub fn validate(&self) -> Result<(), SimulationError> {
        validate_step_parameters(self.theta, self.dt)?;
        if let ExecutionMode::Distributed { ranks: 0 } = self.mode {
            return Err(SimulationError::InvalidParameter("a process group needs at least one rank".to_string()));
        }
        Ok(())
    }
}

pub(crate) fn validate_step_parameters(theta: f64, dt: f64) -> Result<(), SimulationError> {
    // +inf is accepted: every internal node is then approximated by its aggregate.
    if theta.is_nan() || theta < 0.0 {
        return Err(SimulationError::InvalidParameter(format!("theta must be non-negative, got {}", theta)));
    }
    if !dt.is_finite() {
        return Err(SimulationError::InvalidParameter(format!("time increment must be finite, got {}", dt)));
    }
    Ok(())
}
