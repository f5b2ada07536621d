use crate::errors::SimulationError;
use crate::particles::Particle;
use crate::utils::{AggregateAnchor, SimulationConstants};

/// Represents a rectangular region in 2D space.
///
/// Each `Quad` has a center point (cx, cy) that doubles as its partition point,
/// and half extents along each axis.
///
/// # Examples
///
/// ```
/// use rs_barnes_hut::particles::{Quad, Quadrant};
///
/// let quad = Quad { cx: 2.0, cy: 2.0, half_width: 2.0, half_height: 2.0 };
///
/// // Points on the partition lines bin left/low.
/// assert_eq!(quad.quadrant_of(2.0, 1.0), Quadrant::NorthWest);
/// assert_eq!(quad.quadrant_of(2.0, 2.0), Quadrant::SouthWest);
/// assert_eq!(quad.quadrant_of(3.0, 3.0), Quadrant::SouthEast);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quad {
    pub cx: f64,
    pub cy: f64,
    pub half_width: f64,
    pub half_height: f64,
}

/// One of the four children of a quadrant.
///
/// "North" is the low-y half: the domain's y axis grows downward, as on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quadrant {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Quadrant {
    /// Child order used for storage and for traversal.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    #[inline]
    pub fn slot(self) -> usize {
        match self {
            Quadrant::NorthWest => 0,
            Quadrant::NorthEast => 1,
            Quadrant::SouthWest => 2,
            Quadrant::SouthEast => 3,
        }
    }
}

impl Quad {
    /// Routes the point (x, y) to a child quadrant.
    ///
    /// Ties on the vertical partition line go west (`x <= cx`); ties on the
    /// horizontal line go south (`y >= cy`).
    #[inline]
    pub fn quadrant_of(&self, x: f64, y: f64) -> Quadrant {
        match (x <= self.cx, y < self.cy) {
            (true, true) => Quadrant::NorthWest,
            (false, true) => Quadrant::NorthEast,
            (true, false) => Quadrant::SouthWest,
            (false, false) => Quadrant::SouthEast,
        }
    }

    /// The region covered by the given child, with both half extents halved.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_barnes_hut::particles::{Quad, Quadrant};
    ///
    /// let quad = Quad { cx: 2.0, cy: 2.0, half_width: 2.0, half_height: 2.0 };
    /// let ne = quad.child(Quadrant::NorthEast);
    /// assert_eq!((ne.cx, ne.cy), (3.0, 1.0));
    /// assert_eq!(ne.half_width, 1.0);
    /// ```
    #[inline]
    pub fn child(&self, quadrant: Quadrant) -> Quad {
        let hw = self.half_width / 2.0;
        let hh = self.half_height / 2.0;
        let (cx, cy) = match quadrant {
            Quadrant::NorthWest => (self.cx - hw, self.cy - hh),
            Quadrant::NorthEast => (self.cx + hw, self.cy - hh),
            Quadrant::SouthWest => (self.cx - hw, self.cy + hh),
            Quadrant::SouthEast => (self.cx + hw, self.cy + hh),
        };
        Quad { cx, cy, half_width: hw, half_height: hh }
    }

    /// Subdivides the quad into its four children (NW, NE, SW, SE).
    pub fn subdivide(&self) -> [Quad; 4] {
        Quadrant::ALL.map(|q| self.child(q))
    }
}

/// Address of a node inside a [`QuadTree`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Aggregated data for a node with more than one particle beneath it.
#[derive(Clone, Debug, PartialEq)]
pub struct Internal {
    pub quad: Quad,
    /// Total mass of the particles beneath this node.
    pub mass: f64,
    /// Running sums of mass-weighted position.
    pub weighted_x: f64,
    pub weighted_y: f64,
    /// Running sums of plain position.
    pub sum_x: f64,
    pub sum_y: f64,
    pub count: usize,
    /// Children in [`Quadrant::ALL`] order.
    pub children: [Option<NodeId>; 4],
}

impl Internal {
    fn empty(quad: Quad) -> Self {
        Internal {
            quad,
            mass: 0.0,
            weighted_x: 0.0,
            weighted_y: 0.0,
            sum_x: 0.0,
            sum_y: 0.0,
            count: 0,
            children: [None; 4],
        }
    }

    #[inline]
    fn accumulate(&mut self, p: &Particle) {
        self.mass += p.mass;
        self.weighted_x += p.mass * p.x;
        self.weighted_y += p.mass * p.y;
        self.sum_x += p.x;
        self.sum_y += p.y;
        self.count += 1;
    }

    pub fn center_of_mass(&self) -> (f64, f64) {
        (self.weighted_x / self.mass, self.weighted_y / self.mass)
    }

    pub fn mean_position(&self) -> (f64, f64) {
        let n = self.count as f64;
        (self.sum_x / n, self.sum_y / n)
    }

    /// Where the aggregate mass sits when the node is approximated as a point.
    #[inline]
    pub fn anchor(&self, anchor: AggregateAnchor) -> (f64, f64) {
        match anchor {
            AggregateAnchor::MeanPosition => self.mean_position(),
            AggregateAnchor::CenterOfMass => self.center_of_mass(),
        }
    }

    pub fn child(&self, quadrant: Quadrant) -> Option<NodeId> {
        self.children[quadrant.slot()]
    }
}

/// Barnes–Hut tree node.
///
/// - `Leaf`: holds the array index of exactly one in-bounds particle
/// - `Internal`: holds aggregates and up to four children
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Leaf(usize),
    Internal(Internal),
}

enum Descent {
    Into(NodeId, Quad),
    Attach(Quadrant),
    Split(usize),
}

/// Arena-backed Barnes–Hut quad-tree.
///
/// The tree refers to particles by their position in the particle slice it was
/// built from, so it is only meaningful together with that slice. It is rebuilt
/// from scratch every step; [`QuadTree::clear`] drops the nodes but keeps the
/// arena's allocation for the next build.
///
/// # Examples
///
/// ```
/// use rs_barnes_hut::particles::{Particle, QuadTree};
/// use rs_barnes_hut::utils::SimulationConstants;
///
/// let constants = SimulationConstants::default();
/// let particles = vec![
///     Particle::new(0, 1.0, 1.0, 1.0),
///     Particle::new(1, 3.0, 1.0, 2.0),
///     Particle::new(2, 3.0, 3.0, 1.5),
/// ];
///
/// let tree = QuadTree::from_particles(&particles, &constants).expect("distinct particles");
/// assert_eq!(tree.leaf_count(), 3);
///
/// let (ax, ay) = tree.acceleration(&particles, 0, 0.5, &constants);
/// assert!(ax > 0.0 && ay > 0.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct QuadTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl QuadTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a fresh tree over `particles`.
    pub fn from_particles(particles: &[Particle], constants: &SimulationConstants) -> Result<Self, SimulationError> {
        let mut tree = Self::new();
        tree.build(particles, constants)?;
        Ok(tree)
    }

    /// Discards the current nodes and inserts every in-bounds particle, in array order.
    ///
    /// Aggregates are accumulated on the way down during insertion; there is
    /// no separate summary pass. Out-of-bounds particles are skipped.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvableParticles` if two particles share the same
    /// coordinates, or are so close that their quadrant can no longer be
    /// subdivided at floating-point resolution.
    pub fn build(&mut self, particles: &[Particle], constants: &SimulationConstants) -> Result<(), SimulationError> {
        self.clear();
        let root_quad = constants.bounds.root_quad();
        for (i, p) in particles.iter().enumerate() {
            if p.is_in_bounds() {
                self.insert(particles, i, root_quad)?;
            }
        }
        Ok(())
    }

    fn insert(&mut self, particles: &[Particle], incoming: usize, root_quad: Quad) -> Result<(), SimulationError> {
        let p = &particles[incoming];
        let mut current = match self.root {
            Some(root) => root,
            None => {
                self.root = Some(self.push(Node::Leaf(incoming)));
                return Ok(());
            }
        };
        let mut quad = root_quad;

        loop {
            let descent = match &mut self.nodes[current.0] {
                Node::Internal(internal) => {
                    internal.accumulate(p);
                    let quadrant = quad.quadrant_of(p.x, p.y);
                    match internal.child(quadrant) {
                        Some(child) => Descent::Into(child, quad.child(quadrant)),
                        None => Descent::Attach(quadrant),
                    }
                }
                Node::Leaf(resident) => Descent::Split(*resident),
            };

            match descent {
                Descent::Into(child, child_quad) => {
                    current = child;
                    quad = child_quad;
                }
                Descent::Attach(quadrant) => {
                    let leaf = self.push(Node::Leaf(incoming));
                    if let Node::Internal(internal) = &mut self.nodes[current.0] {
                        internal.children[quadrant.slot()] = Some(leaf);
                    }
                    return Ok(());
                }
                Descent::Split(resident) => {
                    let r = &particles[resident];
                    if !can_separate(r, p, &quad) {
                        return Err(SimulationError::UnresolvableParticles { first: r.index, second: p.index });
                    }
                    // The resident moves one level down; the incoming particle is
                    // routed from this node on the next iteration.
                    let mut internal = Internal::empty(quad);
                    internal.accumulate(r);
                    let quadrant = quad.quadrant_of(r.x, r.y);
                    internal.children[quadrant.slot()] = Some(self.push(Node::Leaf(resident)));
                    self.nodes[current.0] = Node::Internal(internal);
                }
            }
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Drops every node, keeping the arena's capacity.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Particle indices held by the leaves, in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().filter_map(|node| match node {
            Node::Leaf(i) => Some(*i),
            Node::Internal(_) => None,
        })
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }

    /// Number of levels below the root (0 for an empty tree or a single leaf).
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|r| (r, 0)).into_iter().collect();
        while let Some((id, level)) = stack.pop() {
            deepest = deepest.max(level);
            if let Node::Internal(internal) = &self.nodes[id.0] {
                stack.extend(internal.children.iter().flatten().map(|&c| (c, level + 1)));
            }
        }
        deepest
    }

    /// Computes the approximate gravitational acceleration on `particles[target]`.
    ///
    /// Walks the tree from the root:
    /// - a leaf holding another in-bounds particle contributes the exact pairwise term
    /// - a leaf holding the target itself, or an out-of-bounds particle, contributes nothing
    /// - an internal node whose `half_width / distance` ratio is below `theta` contributes
    ///   its aggregate mass placed at its anchor; otherwise its children are visited
    ///
    /// With `theta == 0.0` no internal node is ever accepted and the result equals the
    /// exact pairwise sum. The walk uses an explicit stack, so tree depth is not
    /// bounded by the call stack.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_barnes_hut::particles::{Particle, QuadTree};
    /// use rs_barnes_hut::utils::SimulationConstants;
    ///
    /// let constants = SimulationConstants::default();
    /// let particles = vec![
    ///     Particle::new(0, 1.0, 2.0, 1.0),
    ///     Particle::new(1, 2.0, 2.0, 1.0),
    ///     Particle::new(2, 3.0, 2.0, 1.0),
    /// ];
    /// let tree = QuadTree::from_particles(&particles, &constants).unwrap();
    ///
    /// // The middle particle is pulled equally both ways.
    /// let (ax, ay) = tree.acceleration(&particles, 1, 0.0, &constants);
    /// assert!(ax.abs() < 1e-15);
    /// assert_eq!(ay, 0.0);
    /// ```
    pub fn acceleration(
        &self,
        particles: &[Particle],
        target: usize,
        theta: f64,
        constants: &SimulationConstants,
    ) -> (f64, f64) {
        self.acceleration_with(particles, target, theta, constants, &mut Vec::new())
    }

    /// Same as [`QuadTree::acceleration`], reusing `stack` as traversal scratch space.
    pub fn acceleration_with(
        &self,
        particles: &[Particle],
        target: usize,
        theta: f64,
        constants: &SimulationConstants,
        stack: &mut Vec<NodeId>,
    ) -> (f64, f64) {
        let p = &particles[target];
        let (mut ax, mut ay) = (0.0, 0.0);

        stack.clear();
        stack.extend(self.root);
        while let Some(id) = stack.pop() {
            match &self.nodes[id.0] {
                Node::Leaf(other) => {
                    let q = &particles[*other];
                    if *other == target || !q.is_in_bounds() {
                        continue;
                    }
                    let (dx, dy) = constants.point_mass_acceleration(p.x, p.y, q.x, q.y, q.mass);
                    ax += dx;
                    ay += dy;
                }
                Node::Internal(internal) => {
                    let (px, py) = internal.anchor(constants.anchor);
                    let distance = ((px - p.x).powi(2) + (py - p.y).powi(2)).sqrt();
                    if internal.quad.half_width / distance < theta {
                        let (dx, dy) = constants.point_mass_acceleration(p.x, p.y, px, py, internal.mass);
                        ax += dx;
                        ay += dy;
                    } else {
                        // Reversed so the north-west child is visited first.
                        stack.extend(internal.children.iter().rev().flatten());
                    }
                }
            }
        }
        (ax, ay)
    }
}

/// Whether subdividing `quad` can still route `a` and `b` apart.
fn can_separate(a: &Particle, b: &Particle, quad: &Quad) -> bool {
    let coincident = a.x == b.x && a.y == b.y;
    let resolvable = quad.half_width / 2.0 > 0.0 && quad.half_height / 2.0 > 0.0;
    !coincident && resolvable
}
