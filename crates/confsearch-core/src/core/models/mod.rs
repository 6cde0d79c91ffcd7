//! # Core Models Module
//!
//! Fundamental data structures describing a molecule in 3D.
//!
//! - [`atom`] - A single atom with its element, coordinates and removal flag
//! - [`topology`] - Bonds and bond orders
//! - [`geometry`] - A full geometry (atoms plus bond graph) and bounding volumes
//!
//! Atom indices are stable for the lifetime of a search: atoms are never
//! inserted or deleted, only moved or flagged as detached.

pub mod atom;
pub mod geometry;
pub mod topology;
