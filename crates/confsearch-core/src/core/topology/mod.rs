//! Locates the chemical sites each degree of freedom controls.

pub mod locator;
