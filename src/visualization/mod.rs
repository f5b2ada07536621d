//! Render-and-poll boundary between the simulation and an optional viewer.
//!
//! The drivers call [`Visualizer::render`] at most once per step, after the
//! tree is built and before forces are evaluated. A viewer only ever sees
//! read-only data and answers with a quit flag.
use log::info;

use crate::errors::SimulationError;
use crate::particles::{Node, Particle, QuadTree};

pub trait Visualizer {
    /// Called once before the first step.
    fn init(&mut self) -> Result<(), SimulationError> {
        Ok(())
    }

    /// Renders one frame and returns `true` if the user asked to quit.
    fn render(&mut self, particles: &[Particle], tree: &QuadTree) -> bool;

    /// Called once after the last step.
    fn terminate(&mut self) {}
}

/// Visualization disabled. Never quits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVisualization;

impl Visualizer for NoVisualization {
    fn render(&mut self, _particles: &[Particle], _tree: &QuadTree) -> bool {
        false
    }
}

/// Headless viewer: logs a summary of every `every`-th frame.
#[derive(Debug, Clone)]
pub struct FrameLogger {
    every: usize,
    frame: usize,
}

impl FrameLogger {
    pub fn new(every: usize) -> Self {
        FrameLogger { every: every.max(1), frame: 0 }
    }

    pub fn frames_rendered(&self) -> usize {
        self.frame
    }
}

impl Visualizer for FrameLogger {
    fn render(&mut self, particles: &[Particle], tree: &QuadTree) -> bool {
        if self.frame % self.every == 0 {
            let in_bounds = particles.iter().filter(|p| p.is_in_bounds()).count();
            let total_mass = match tree.root().map(|root| tree.node(root)) {
                Some(Node::Internal(internal)) => internal.mass,
                Some(Node::Leaf(i)) => particles[*i].mass,
                None => 0.0,
            };
            info!(
                "frame {}: {}/{} particles in bounds, {} nodes, depth {}, mass {:.6}",
                self.frame,
                in_bounds,
                particles.len(),
                tree.len(),
                tree.depth(),
                total_mass
            );
        }
        self.frame += 1;
        false
    }

    fn terminate(&mut self) {
        info!("rendered {} frames", self.frame);
    }
}
