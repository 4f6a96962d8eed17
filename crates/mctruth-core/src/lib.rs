//! # mctruth
//!
//! Access to the Monte-Carlo truth of simulated collision events: the kinematics
//! tree of every event and the track references its particles left in the detector
//! subsystems.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer layout.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Particle`, `KinematicsStack`,
//!   `TrackReference`) and the readers/writers of the event tables.
//!
//! - **[`engine`]: The Logic Core.** The realignment of legacy, transport-ordered
//!   reference streams into one group per track, with its cursors, configuration,
//!   diagnostics and progress reporting.
//!
//! - **[`workflows`]: The Public API.** The event handler that loads events from a
//!   store and realigns them on the fly, and the batch run built on top of it.

pub mod core;
pub mod engine;
pub mod workflows;
