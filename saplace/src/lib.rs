//! Simulated-annealing analog floorplanner built on the `anaplace` engine.

use std::sync::LazyLock;
use std::time::Instant;

pub mod config;
pub mod io;
pub mod optimizer;
pub mod watchdog;

/// Process start reference for log timestamps.
pub static EPOCH: LazyLock<Instant> = LazyLock::new(Instant::now);
