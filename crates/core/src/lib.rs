//! `fanctl-core` -- the fan control algorithm.
//!
//! Pure logic: metric trend tracking, proportional ratio computation,
//! over-limit override with cooldown and the duty-cycle transition
//! policy. Everything that touches hardware or the filesystem sits behind
//! the traits in [`ports`] and lives in the agent crate.

pub mod controller;
pub mod duty;
pub mod error;
pub mod metric;
pub mod ports;
pub mod stats;
pub mod types;
