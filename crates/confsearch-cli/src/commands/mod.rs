pub mod dofs;
pub mod run;
