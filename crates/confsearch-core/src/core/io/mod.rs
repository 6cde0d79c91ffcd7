//! Provides input/output functionality for molecular file formats.
//!
//! Templates, fixed surroundings and search results are exchanged as MDL V2000
//! SDF records. The [`traits::MolecularFile`] trait gives every format the same
//! path-based and stream-based entry points.

pub mod sdf;
pub mod traits;
