//! Error types.
//!
//! Malformed input and bad command lines are user errors and surface as values. A
//! violated invariant inside the CPS pass is a compiler bug: the pass panics, and
//! [`try_convert_program`](crate::compiler::driver::try_convert_program) turns the panic
//! into a [`CpsError`].

use std::ffi::OsString;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReadError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("bad syntax in {form}: {message}")]
    Syntax { form: String, message: &'static str },
    #[error("{0} must be expanded before CPS conversion")]
    UnsupportedForm(String),
    #[error("wrong number of arguments to primitive {name}: {argc}")]
    Arity { name: String, argc: usize },
    #[error("unsupported datum: {0}")]
    UnsupportedDatum(&'static str),
    #[error("expected exactly one expression, found {0}")]
    ExpressionCount(usize),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CpsError {
    #[error("internal error in CPS conversion: {0}")]
    InternalInvariant(String),
}

#[derive(thiserror::Error, Debug)]
pub enum OptionsError {
    #[error(transparent)]
    Args(#[from] pico_args::Error),
    #[error("--jobs must be at least 1")]
    ZeroJobs,
    #[error("unexpected arguments: {0:?}")]
    Unexpected(Vec<OsString>),
}
