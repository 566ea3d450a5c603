//! Passes between intermediate languages.
//!
//! The most significant steps in this process are the [`surface_to_core`]
//! pass, which type checks the surface language and is the source of most
//! user-facing diagnostics, and the [`core_to_svcode`] pass, which flattens
//! nested data parallelism into vector instructions.

pub mod core_to_pretty;
pub mod core_to_svcode;
pub mod surface_to_core;
pub mod svcode_to_pretty;
