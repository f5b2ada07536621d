use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::utils::{Bounds, OUT_OF_BOUNDS_MASS};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Particle {
    /// Stable identity, preserved through every step and written to output.
    pub index: usize,
    pub x: f64,
    pub y: f64,
    /// Particle's mass, or `OUT_OF_BOUNDS_MASS` once it has left the domain.
    pub mass: f64,
    pub vx: f64,
    pub vy: f64,
    /// Acceleration computed for the current step.
    pub ax: f64,
    pub ay: f64,
}

impl Particle {
    /// Creates a particle at rest with no acceleration.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_barnes_hut::particles::Particle;
    ///
    /// let particle = Particle::new(3, 1.0, 2.0, 5.0);
    /// assert_eq!(particle.index, 3);
    /// assert_eq!((particle.vx, particle.vy), (0.0, 0.0));
    /// assert!(particle.is_in_bounds());
    /// ```
    pub fn new(index: usize, x: f64, y: f64, mass: f64) -> Self {
        Particle { index, x, y, mass, ..Default::default() }
    }

    pub fn with_velocity(mut self, vx: f64, vy: f64) -> Self {
        self.vx = vx;
        self.vy = vy;
        self
    }

    /// Returns false once the particle has been marked with the out-of-bounds sentinel.
    #[inline]
    pub fn is_in_bounds(&self) -> bool {
        self.mass != OUT_OF_BOUNDS_MASS
    }

    /// Advances the particle by `dt` using its current acceleration.
    ///
    /// Position moves by `v·dt + ½·a·dt²` and velocity by `a·dt`; the new
    /// velocity is not fed back into the position update. If the new position
    /// lies outside `bounds` the mass is overwritten with `OUT_OF_BOUNDS_MASS`.
    /// Particles already out of bounds keep moving.
    ///
    /// # Returns
    ///
    /// `true` if this call is the one that marked the particle out of bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_barnes_hut::particles::Particle;
    /// use rs_barnes_hut::utils::SimulationConstants;
    ///
    /// let bounds = SimulationConstants::default().bounds;
    /// let mut particle = Particle::new(0, 3.9, 2.0, 1.0).with_velocity(1.0, 0.0);
    ///
    /// let exited = particle.integrate(0.5, &bounds);
    /// assert!(exited);
    /// assert!((particle.x - 4.4).abs() < 1e-12);
    /// assert!(!particle.is_in_bounds());
    /// ```
    pub fn integrate(&mut self, dt: f64, bounds: &Bounds) -> bool {
        self.x += self.vx * dt + 0.5 * self.ax * dt * dt;
        self.y += self.vy * dt + 0.5 * self.ay * dt * dt;

        self.vx += self.ax * dt;
        self.vy += self.ay * dt;

        if self.is_in_bounds() && !bounds.contains(self.x, self.y) {
            self.mass = OUT_OF_BOUNDS_MASS;
            return true;
        }
        false
    }
}

/// Generates `count` particles uniformly inside `bounds`, at rest, with masses in `(0, max_mass]`.
///
/// The same `seed` always yields the same set.
///
/// # Examples
///
/// ```
/// use rs_barnes_hut::particles::generate_uniform;
/// use rs_barnes_hut::utils::SimulationConstants;
///
/// let bounds = SimulationConstants::default().bounds;
/// let a = generate_uniform(16, &bounds, 2.0, 7);
/// let b = generate_uniform(16, &bounds, 2.0, 7);
/// assert_eq!(a, b);
/// assert!(a.iter().all(|p| bounds.contains(p.x, p.y)));
/// ```
pub fn generate_uniform(count: usize, bounds: &Bounds, max_mass: f64, seed: u64) -> Vec<Particle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|index| {
            let x = rng.random_range(bounds.min_x..bounds.max_x);
            let y = rng.random_range(bounds.min_y..bounds.max_y);
            let mass = max_mass * (1.0 - rng.random::<f64>());
            Particle::new(index, x, y, mass)
        })
        .collect()
}
