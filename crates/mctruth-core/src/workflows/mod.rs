//! # Workflows Module
//!
//! High-level entry points that tie the event stores of [`crate::core`] to the
//! realignment engine of [`crate::engine`].
//!
//! ## Overview
//!
//! - **Event handler** ([`event_handler`]) - event-by-event access to the Monte-Carlo
//!   truth of a run, with legacy track references realigned as events are loaded.
//! - **Realignment run** ([`realign_run`]) - processes a list of events and collects
//!   their per-track references for export.

pub mod event_handler;
pub mod realign_run;
