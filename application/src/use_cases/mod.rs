//! Use cases exposed to front ends.

pub mod run_adaptive_task;
pub mod run_turn;
pub(crate) mod shared;
