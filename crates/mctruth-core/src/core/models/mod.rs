//! Event data model: the kinematics tree and the track references recorded
//! while its particles were transported through the detector.
//!
//! - [`particle`] - a single particle and its family links
//! - [`stack`] - the ordered kinematics tree of one event and the [`stack::AncestryProvider`] view of it
//! - [`reference`] - track references, their subsystem of origin, legacy batches and stored layouts

pub mod particle;
pub mod reference;
pub mod stack;
