use nalgebra::{Point3, Vector3};

/// A particle of the kinematics tree.
///
/// Particles are addressed by their index in the [`KinematicsStack`](super::stack::KinematicsStack).
/// Family links are stored as optional indices into the same stack; an absent link
/// means the particle has no mother or produced no daughters.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// PDG code of the particle species.
    pub pdg_code: i32,
    /// Index of the mother particle, if any.
    pub mother: Option<usize>,
    /// Index of the first daughter, if any.
    pub first_daughter: Option<usize>,
    /// Index of the last daughter, if any.
    pub last_daughter: Option<usize>,
    /// Production vertex in cm.
    pub vertex: Point3<f64>,
    /// Momentum at production in GeV/c.
    pub momentum: Vector3<f64>,
}

impl Particle {
    pub fn new(pdg_code: i32) -> Self {
        Self {
            pdg_code,
            mother: None,
            first_daughter: None,
            last_daughter: None,
            vertex: Point3::origin(),
            momentum: Vector3::zeros(),
        }
    }

    pub fn with_mother(mut self, mother: usize) -> Self {
        self.mother = Some(mother);
        self
    }

    pub fn with_daughters(mut self, first: usize, last: usize) -> Self {
        self.first_daughter = Some(first);
        self.last_daughter = Some(last);
        self
    }

    pub fn with_vertex(mut self, vertex: Point3<f64>) -> Self {
        self.vertex = vertex;
        self
    }

    pub fn with_momentum(mut self, momentum: Vector3<f64>) -> Self {
        self.momentum = momentum;
        self
    }

    #[inline]
    pub fn has_daughters(&self) -> bool {
        self.first_daughter.is_some()
    }

    /// Transverse momentum in GeV/c.
    pub fn pt(&self) -> f64 {
        self.momentum.x.hypot(self.momentum.y)
    }
}
