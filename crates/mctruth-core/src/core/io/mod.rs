//! Reading and writing the per-run event tables.
//!
//! Kinematics and track references are exchanged as CSV tables keyed by event
//! number, with a small TOML descriptor for the run. The [`traits::EventFile`]
//! trait gives every table the same read/write API, and [`store`] groups the
//! tables of a run into numbered file sets behind the [`store::EventStore`] trait.

pub mod kinematics;
pub mod run;
pub mod store;
pub mod trackrefs;
pub mod traits;
