//! The CPS conversion pass and the pieces around it.

pub mod cps;
pub mod driver;
pub mod pretty;
pub mod primitives;
pub mod reader;
pub mod simple;
pub mod tail;
pub mod tree;

pub use cps::{make_continuation_name, Continuation, Converter, NameSupply};
pub use driver::{convert_form, convert_program, try_convert_program};
pub use reader::{read_expression, read_program};
pub use simple::is_simple;
pub use tail::{mark_tail_positions, only_tail_calls};
pub use tree::{Expression, ExprKind, Program};
