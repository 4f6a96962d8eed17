//! # Engine Module
//!
//! The realignment engine: regroups legacy track-reference streams by track index
//! so that they line up with the kinematics tree.
//!
//! ## Architecture
//!
//! - **Realignment** ([`realign`]) - the two-phase scan over the reference stream
//! - **Cursors** ([`cursor`]) - explicit read positions of both phases
//! - **Stream access** ([`stream`]) - the [`stream::ReferenceStream`] seam
//! - **Diagnostics** ([`diagnostics`]) - non-fatal findings of a pass
//! - **Configuration** ([`config`]) - integrity policy and logging switches
//! - **Progress Monitoring** ([`progress`]) - callback-based progress reporting
//! - **Error Handling** ([`error`]) - engine error types

pub mod config;
pub mod cursor;
pub mod diagnostics;
pub mod error;
pub mod progress;
pub mod realign;
pub mod stream;
