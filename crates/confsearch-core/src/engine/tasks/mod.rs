//! The steps of the generational loop.
//!
//! [`initialization`] fills the population, [`reproduction`] selects parents
//! and produces two children, [`relaxation`] mutates a child until it is valid
//! and new, then has it evaluated. [`acceptance`] holds the pieces they share.

pub mod acceptance;
pub mod initialization;
pub mod relaxation;
pub mod reproduction;

#[cfg(test)]
pub(crate) mod testing;
