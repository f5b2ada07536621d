use std::fmt;
use std::error::Error;
use std::path::PathBuf;

/// Represents errors that can occur while loading, stepping or writing a simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// A particle file could not be opened, read or written.
    Io { path: PathBuf, message: String },
    /// A line of a particle file could not be parsed.
    MalformedInput { line: usize, message: String },
    /// The particle file ended before the announced number of particles was read.
    ParticleCountMismatch { expected: usize, found: usize },
    /// A run parameter is out of range (e.g. negative theta, zero ranks).
    InvalidParameter(String),
    /// Two particles can no longer be separated by subdividing their quadrant
    /// (identical coordinates, or the quadrant size reached floating-point resolution).
    UnresolvableParticles { first: usize, second: usize },
    /// A collective operation failed or a rank left the process group.
    Collective(String),
    /// The driver already reached its final state.
    AlreadyFinished,
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimulationError::Io { path, message } => write!(f, "I/O error on {}: {}", path.display(), message),
            SimulationError::MalformedInput { line, message } => write!(f, "Malformed input at line {}: {}", line, message),
            SimulationError::ParticleCountMismatch { expected, found } => {
                write!(f, "Expected {} particles but found {}", expected, found)
            }
            SimulationError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            SimulationError::UnresolvableParticles { first, second } => write!(
                f,
                "Particles {} and {} cannot be separated into different quadrants",
                first, second
            ),
            SimulationError::Collective(msg) => write!(f, "Collective operation failed: {}", msg),
            SimulationError::AlreadyFinished => write!(f, "Simulation has already finished"),
        }
    }
}

impl Error for SimulationError {}
