//! # Engine Module
//!
//! The stateful machinery of the genetic algorithm.
//!
//! - **Configuration** ([`config`]) - GA parameters, mutation and similarity settings
//! - **Collaborators** ([`collaborators`]) - Contracts for energy evaluation,
//!   cancellation, convergence and fitness, with the built-in implementations
//! - **State Tracking** ([`state`]) - Run state, statistics, terminal outcomes and checkpoints
//! - **Progress Monitoring** ([`progress`]) - Progress events for front ends
//! - **Error Handling** ([`error`]) - Engine-specific error types
//! - **Selection** ([`utils::selection`]) - Fitness-proportional parent selection
//!
//! The generational loop itself is split into tasks: filling the initial
//! population, producing two children per generation, and mutating each child
//! until it is valid and new.

pub mod collaborators;
pub mod config;
pub(crate) mod context;
pub mod error;
pub mod progress;
pub mod state;
pub(crate) mod tasks;
pub mod utils;
