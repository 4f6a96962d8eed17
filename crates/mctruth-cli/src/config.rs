//! Layered configuration of the command-line tool: built-in defaults, an optional
//! TOML file, `-S key=value` overrides and finally the dedicated flags.

pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;
