//! CLI command implementations.

pub mod check;
pub mod common;
pub mod process;
pub mod stages;
