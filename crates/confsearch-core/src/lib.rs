//! # confsearch Core Library
//!
//! A genetic-algorithm conformer search for flexible molecules. Structures are
//! encoded as vectors of degree-of-freedom values (torsions, ring puckers, rigid
//! placement, protonation) and evolved against an external energy evaluator.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Geometry`, `Structure`),
//!   the closed degree-of-freedom catalogue, genetic operators, SDF I/O and
//!   bond-graph pattern location.
//!
//! - **[`engine`]: The Logic Core.** The stateful GA machinery: configuration,
//!   run state and checkpoints, parent selection, the collaborator contracts
//!   (energy evaluation, validity checks, cancellation, convergence) and the
//!   individual tasks of the generational loop.
//!
//! - **[`workflows`]: The Public API.** [`workflows::search::run`] ties the
//!   engine and core together and drives a complete search.

pub mod core;
pub mod engine;
pub mod workflows;
