//! Shared helpers: cross-fade windowing and argument validation

pub mod fade;
pub mod validation;
