// src/utils/constants_config.rs
use crate::utils::DEFAULT_SIMULATION_CONSTANTS;
use crate::particles::Quad;

/// Axis-aligned rectangle that bounds the simulated domain.
///
/// Membership is inclusive on every edge: a particle sitting exactly on
/// `max_x` is still inside.
///
/// # Examples
///
/// ```
/// use rs_barnes_hut::utils::Bounds;
///
/// let bounds = Bounds { min_x: 0.0, max_x: 4.0, min_y: 0.0, max_y: 4.0 };
/// assert!(bounds.contains(4.0, 0.0));
/// assert!(!bounds.contains(4.000001, 2.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// The quadrant covering the whole domain; the root of every tree.
    pub fn root_quad(&self) -> Quad {
        Quad {
            cx: (self.min_x + self.max_x) / 2.0,
            cy: (self.min_y + self.max_y) / 2.0,
            half_width: (self.max_x - self.min_x) / 2.0,
            half_height: (self.max_y - self.min_y) / 2.0,
        }
    }
}

/// Point at which an internal node's aggregate mass is placed when the
/// opening-angle test accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateAnchor {
    /// Unweighted mean of the particle positions beneath the node.
    MeanPosition,
    /// Mass-weighted centroid of the particles beneath the node.
    CenterOfMass,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConstants {
    /// Gravitational constant G.
    pub gravity: f64,
    /// Separation below which pairwise distances are clamped.
    pub softening: f64,
    pub bounds: Bounds,
    pub anchor: AggregateAnchor,
}

impl Default for SimulationConstants {
    fn default() -> Self {
        DEFAULT_SIMULATION_CONSTANTS
    }
}

impl SimulationConstants {
    pub fn new(
        gravity: Option<f64>,
        softening: Option<f64>,
        bounds: Option<Bounds>,
        anchor: Option<AggregateAnchor>,
    ) -> Self {
        let default = DEFAULT_SIMULATION_CONSTANTS;
        Self {
            gravity: gravity.unwrap_or(default.gravity),
            softening: softening.unwrap_or(default.softening),
            bounds: bounds.unwrap_or(default.bounds),
            anchor: anchor.unwrap_or(default.anchor),
        }
    }

    /// Acceleration exerted on a body at `(x, y)` by a point mass `mass` at `(px, py)`.
    ///
    /// The separation is clamped below by `softening` so coincident bodies do not
    /// produce a singular force.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_barnes_hut::utils::SimulationConstants;
    ///
    /// let constants = SimulationConstants::default();
    /// let (ax, ay) = constants.point_mass_acceleration(0.0, 0.0, 1.0, 0.0, 2.0);
    /// assert!((ax - constants.gravity * 2.0).abs() < 1e-15);
    /// assert_eq!(ay, 0.0);
    /// ```
    #[inline]
    pub fn point_mass_acceleration(&self, x: f64, y: f64, px: f64, py: f64, mass: f64) -> (f64, f64) {
        let dx = px - x;
        let dy = py - y;
        let dist = (dx * dx + dy * dy).sqrt().max(self.softening);
        let scale = self.gravity * mass / (dist * dist * dist);
        (scale * dx, scale * dy)
    }
}
