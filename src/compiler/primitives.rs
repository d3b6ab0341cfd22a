//! Primitive procedures known to the compiler
//!
//! Applications of these names are open-coded as `primcall` nodes instead of going
//! through a closure call, so they never need a continuation of their own.

use std::collections::HashMap;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, argc: usize) -> bool {
        match *self {
            Arity::Exactly(n) => argc == n,
            Arity::AtLeast(n) => argc >= n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitive {
    pub name: &'static str,
    pub arity: Arity,
}

/// Terminates the program with its argument as the result. Every top-level form is
/// converted with a continuation that ends in this primitive.
pub const HALT: &str = "halt";

const PRIMITIVE_TABLE: &[(&str, Arity)] = &[
    (HALT, Arity::Exactly(1)),
    ("+", Arity::AtLeast(0)),
    ("-", Arity::AtLeast(1)),
    ("*", Arity::AtLeast(0)),
    ("quotient", Arity::Exactly(2)),
    ("remainder", Arity::Exactly(2)),
    ("=", Arity::AtLeast(1)),
    ("<", Arity::AtLeast(1)),
    (">", Arity::AtLeast(1)),
    ("<=", Arity::AtLeast(1)),
    (">=", Arity::AtLeast(1)),
    ("zero?", Arity::Exactly(1)),
    ("not", Arity::Exactly(1)),
    ("eq?", Arity::Exactly(2)),
    ("eqv?", Arity::Exactly(2)),
    ("null?", Arity::Exactly(1)),
    ("pair?", Arity::Exactly(1)),
    ("fixnum?", Arity::Exactly(1)),
    ("boolean?", Arity::Exactly(1)),
    ("char?", Arity::Exactly(1)),
    ("string?", Arity::Exactly(1)),
    ("symbol?", Arity::Exactly(1)),
    ("vector?", Arity::Exactly(1)),
    ("procedure?", Arity::Exactly(1)),
    ("cons", Arity::Exactly(2)),
    ("car", Arity::Exactly(1)),
    ("cdr", Arity::Exactly(1)),
    ("set-car!", Arity::Exactly(2)),
    ("set-cdr!", Arity::Exactly(2)),
    ("make-vector", Arity::Exactly(2)),
    ("vector-ref", Arity::Exactly(2)),
    ("vector-set!", Arity::Exactly(3)),
    ("vector-length", Arity::Exactly(1)),
    ("make-string", Arity::Exactly(2)),
    ("string-ref", Arity::Exactly(2)),
    ("string-set!", Arity::Exactly(3)),
    ("string-length", Arity::Exactly(1)),
    ("char->integer", Arity::Exactly(1)),
    ("integer->char", Arity::Exactly(1)),
    ("make-box", Arity::Exactly(1)),
    ("box-ref", Arity::Exactly(1)),
    ("box-set!", Arity::Exactly(2)),
    ("error", Arity::AtLeast(1)),
];

static PRIMITIVES: Lazy<HashMap<&'static str, Primitive>> = Lazy::new(|| {
    PRIMITIVE_TABLE
        .iter()
        .map(|&(name, arity)| (name, Primitive { name, arity }))
        .collect()
});

pub fn lookup_primitive(name: &str) -> Option<&'static Primitive> {
    PRIMITIVES.get(name)
}

pub fn is_primitive(name: &str) -> bool {
    PRIMITIVES.contains_key(name)
}
