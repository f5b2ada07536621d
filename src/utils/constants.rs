use crate::utils::{AggregateAnchor, Bounds, SimulationConstants};

/// Mass written into a particle once it leaves the simulated domain.
pub const OUT_OF_BOUNDS_MASS: f64 = -1.0;

/// Time increment used when none is configured.
pub const DEFAULT_DT: f64 = 0.05;

pub const DEFAULT_SIMULATION_CONSTANTS: SimulationConstants = SimulationConstants {
    gravity: 0.0001,
    softening: 0.03,
    bounds: Bounds { min_x: 0.0, max_x: 4.0, min_y: 0.0, max_y: 4.0 },
    anchor: AggregateAnchor::MeanPosition,
};
