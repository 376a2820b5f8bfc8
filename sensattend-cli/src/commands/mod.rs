//! Command implementations.

pub mod results;
pub mod students;
pub mod submit;
