//! `fanctl-agent` library crate.
//!
//! Re-exports the adapters and runtime for integration testing. The
//! binary entrypoint lives in `main.rs`.

pub mod command;
pub mod config;
pub mod disk;
pub mod ipmi;
pub mod load;
pub mod recorder;
pub mod runtime;
