//! Tail positions
//!
//! [`mark_tail_positions`] records on every node whether it is evaluated in tail position
//! of its enclosing procedure. [`only_tail_calls`] checks the property the CPS pass
//! guarantees: no procedure call ever needs to return.
//!
//! Both walk the tree with an explicit stack.

use super::tree::{ExprKind, Expression, Program};

/// Marks `expr` and everything below it. `tail` says whether `expr` itself is in tail
/// position.
///
/// A lambda body is always in tail position. The last expression of a `begin`, the body
/// of a `let` and both branches of an `if` inherit the position of the enclosing node.
/// Nothing else is in tail position.
pub fn mark_tail_positions(expr: &mut Expression, tail: bool) {
    let mut stack = vec![(expr, tail)];

    while let Some((expr, tail)) = stack.pop() {
        expr.tail_position = tail;

        match &mut expr.kind {
            ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::Quote(_) | ExprKind::Nop => {}

            ExprKind::Set { value, .. } => stack.push((&mut **value, false)),

            ExprKind::If {
                test,
                consequent,
                alternative,
            } => {
                stack.push((&mut **test, false));
                stack.push((&mut **consequent, tail));
                stack.push((&mut **alternative, tail));
            }

            ExprKind::Begin(body) => {
                let last = body.len().saturating_sub(1);
                stack.extend(
                    body.iter_mut()
                        .enumerate()
                        .map(|(i, expr)| (expr, tail && i == last)),
                );
            }

            ExprKind::PrimitiveCall { args, .. } | ExprKind::ForeignCall { args, .. } => {
                stack.extend(args.iter_mut().map(|arg| (arg, false)))
            }

            ExprKind::Lambda { body, .. } => stack.push((&mut **body, true)),

            ExprKind::FunCall { callee, args } => {
                stack.push((&mut **callee, false));
                stack.extend(args.iter_mut().map(|arg| (arg, false)));
            }

            ExprKind::Let { bindings, body, .. } => {
                stack.extend(bindings.iter_mut().map(|(_, init)| (init, false)));
                stack.push((&mut **body, tail));
            }
        }
    }
}

/// Marks every top-level form. Top-level forms make up the body of the program's entry
/// procedure, so each of them starts in tail position.
pub fn mark_program(program: &mut Program) {
    mark_container(program);

    for form in program.top_level_forms_mut() {
        mark_tail_positions(form, true);
    }
}

/// A program held in a single `begin` marks that `begin` too.
pub(crate) fn mark_container(program: &mut Program) {
    if let [container] = program.forms.as_mut_slice() {
        if container.is_begin() {
            container.tail_position = true;
        }
    }
}

/// Returns `false` as soon as a procedure call outside tail position is found. Reads the
/// flags left by [`mark_tail_positions`].
pub fn only_tail_calls(expr: &Expression) -> bool {
    let mut stack = vec![expr];

    while let Some(expr) = stack.pop() {
        if expr.is_fun_call() && !expr.tail_position {
            return false;
        }

        expr.for_each_child(|child| stack.push(child));
    }

    true
}

pub fn program_only_tail_calls(program: &Program) -> bool {
    program.top_level_forms().iter().all(only_tail_calls)
}
