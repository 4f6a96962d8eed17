//! # Core Module
//!
//! Stateless building blocks: the event data model and the readers/writers for
//! the tables a simulated run is stored in.
//!
//! - **Event data model** ([`models`]) - particles, the kinematics stack, track references
//! - **File I/O** ([`io`]) - kinematics and track-reference tables, run descriptor, event stores

pub mod io;
pub mod models;
