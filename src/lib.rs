//! Continuation-passing style conversion for the CapyScheme ahead-of-time compiler.
//!
//! The pass takes the core tree produced by the front end and rewrites every procedure
//! call into a tail call that receives an explicit continuation. See
//! [`compiler::cps`] for the rewrite rules and [`compiler::driver`] for running it over a
//! whole program.

pub mod compiler;
pub mod error;
pub mod options;

pub use error::{CpsError, OptionsError, ReadError};
pub use options::CompilerOptions;
