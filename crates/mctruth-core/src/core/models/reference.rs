use nalgebra::{Point3, Vector3};
use phf::phf_map;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The subsystem that recorded a track reference.
///
/// The discriminant is the slot of the subsystem in a legacy reference entry.
/// Slot 0 holds references recorded by the central run manager rather than a
/// detector, which is why the normalized detector id is `slot - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    Run = 0,
    Its = 1,
    Tpc = 2,
    Trd = 3,
    Tof = 4,
    Frame = 5,
    Muon = 6,
}

static ORIGINS_BY_BRANCH: phf::Map<&'static str, Origin> = phf_map! {
    "AliRun" => Origin::Run,
    "ITS" => Origin::Its,
    "TPC" => Origin::Tpc,
    "TRD" => Origin::Trd,
    "TOF" => Origin::Tof,
    "FRAME" => Origin::Frame,
    "MUON" => Origin::Muon,
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown track reference branch: '{0}'")]
pub struct UnknownBranchError(pub String);

impl Origin {
    pub const COUNT: usize = 7;

    pub const ALL: [Origin; Origin::COUNT] = [
        Origin::Run,
        Origin::Its,
        Origin::Tpc,
        Origin::Trd,
        Origin::Tof,
        Origin::Frame,
        Origin::Muon,
    ];

    #[inline]
    pub fn slot(self) -> usize {
        self as usize
    }

    /// Detector id written on realigned references.
    #[inline]
    pub fn detector_id(self) -> i32 {
        self as i32 - 1
    }

    pub fn from_slot(slot: usize) -> Option<Self> {
        Self::ALL.get(slot).copied()
    }

    pub fn branch_name(self) -> &'static str {
        match self {
            Origin::Run => "AliRun",
            Origin::Its => "ITS",
            Origin::Tpc => "TPC",
            Origin::Trd => "TRD",
            Origin::Tof => "TOF",
            Origin::Frame => "FRAME",
            Origin::Muon => "MUON",
        }
    }
}

impl FromStr for Origin {
    type Err = UnknownBranchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ORIGINS_BY_BRANCH
            .get(s)
            .copied()
            .ok_or_else(|| UnknownBranchError(s.to_string()))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.branch_name())
    }
}

/// A point where a track crossed a sensitive boundary of the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackReference {
    /// Index of the track that produced the reference.
    pub label: i32,
    pub origin: Origin,
    /// Normalized detector id, assigned when the reference is realigned.
    pub detector_id: Option<i32>,
    pub position: Point3<f64>,
    pub momentum: Vector3<f64>,
    /// Time of flight in seconds.
    pub time: f64,
}

impl TrackReference {
    pub fn new(label: i32, origin: Origin) -> Self {
        Self {
            label,
            origin,
            detector_id: None,
            position: Point3::origin(),
            momentum: Vector3::zeros(),
            time: 0.0,
        }
    }

    pub fn at(mut self, position: Point3<f64>) -> Self {
        self.position = position;
        self
    }

    pub fn with_momentum(mut self, momentum: Vector3<f64>) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Copy of this reference carrying the detector id of its origin.
    pub fn retagged(&self) -> Self {
        Self {
            detector_id: Some(self.origin.detector_id()),
            ..self.clone()
        }
    }

    /// The label as a track index, if it is not negative.
    #[inline]
    pub fn track_index(&self) -> Option<usize> {
        usize::try_from(self.label).ok()
    }
}

/// One entry of a legacy reference stream.
///
/// References are kept per origin slot and iterated slot by slot, each slot in
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    branches: [Vec<TrackReference>; Origin::COUNT],
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reference: TrackReference) {
        self.branches[reference.origin.slot()].push(reference);
    }

    pub fn branch(&self, origin: Origin) -> &[TrackReference] {
        &self.branches[origin.slot()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackReference> {
        self.branches.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.branches.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.iter().all(Vec::is_empty)
    }
}

impl FromIterator<TrackReference> for Batch {
    fn from_iter<I: IntoIterator<Item = TrackReference>>(iter: I) -> Self {
        let mut batch = Batch::new();
        for reference in iter {
            batch.push(reference);
        }
        batch
    }
}

/// Track references of one event, in whichever layout they were stored.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceTree {
    /// One entry per transported primary, one branch per subsystem, not aligned
    /// with the kinematics tree.
    Legacy(Vec<Batch>),
    /// One group per track index.
    PerTrack(Vec<Vec<TrackReference>>),
}

impl ReferenceTree {
    pub fn needs_realignment(&self) -> bool {
        matches!(self, ReferenceTree::Legacy(_))
    }
}
