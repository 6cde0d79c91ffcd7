//! # Conformer Module
//!
//! - [`molecule`] - The static description of what is being searched: template
//!   geometry, the discovered degrees of freedom and optional surroundings
//! - [`structure`] - One candidate conformer with its DOF values, geometry and energy
//! - [`blacklist`] - Every structure accepted so far, used to reject duplicates

pub mod blacklist;
pub mod molecule;
pub mod settings;
pub mod structure;
pub mod validation;
