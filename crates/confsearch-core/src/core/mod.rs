//! # Core Module
//!
//! Stateless building blocks of the conformer search.
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds and geometries
//! - **Degrees of Freedom** ([`dof`]) - The closed catalogue of structural variables
//! - **Conformers** ([`conformer`]) - Molecules, structures and the blacklist
//! - **Genetic Operators** ([`genetics`]) - The generic mutation operator
//! - **Pattern Location** ([`topology`]) - Bond-graph discovery of DOF sites
//! - **File I/O** ([`io`]) - Reading and writing MDL SDF files
//! - **Geometry Utilities** ([`utils`]) - Dihedrals, angles and internal coordinates

pub mod conformer;
pub mod dof;
pub mod genetics;
pub mod io;
pub mod models;
pub mod topology;
pub mod utils;
