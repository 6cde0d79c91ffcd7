//! # Workflows Module
//!
//! Top-level entry points of the library.
//!
//! - **Search Workflow** ([`search`]) - A complete genetic-algorithm conformer
//!   search: initial population, generational loop, checkpoints, convergence
//!   and cancellation.

pub mod search;
