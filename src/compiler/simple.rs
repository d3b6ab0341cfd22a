//! Simple expressions
//!
//! An expression is simple when evaluating it can never transfer control: it contains no
//! procedure call and no lambda. Simple expressions are evaluated in place by the CPS
//! pass instead of receiving a continuation of their own.
//!
//! Lambdas are never simple. Creating the closure is harmless, but its body still has to
//! be rewritten to take a continuation parameter.

use super::tree::{ExprKind, Expression};

pub fn is_simple(expr: &Expression) -> bool {
    walk(expr, false)
}

/// Like [`is_simple`], but answers from the cache left by [`cache_simplicity`] wherever a
/// node has one. Nodes built after the cache was filled are walked until cached ones are
/// reached.
pub(crate) fn is_simple_cached(expr: &Expression) -> bool {
    walk(expr, true)
}

fn walk(expr: &Expression, use_cache: bool) -> bool {
    let mut stack = vec![expr];

    while let Some(expr) = stack.pop() {
        if use_cache {
            match expr.simple {
                Some(true) => continue,
                Some(false) => return false,
                None => {}
            }
        }

        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::Quote(_) | ExprKind::Nop => {}

            ExprKind::Set { value, .. } => stack.push(value),

            ExprKind::If {
                test,
                consequent,
                alternative,
            } => {
                stack.push(test);
                stack.push(consequent);
                stack.push(alternative);
            }

            ExprKind::Begin(body) => stack.extend(body.iter()),

            ExprKind::PrimitiveCall { args, .. } | ExprKind::ForeignCall { args, .. } => {
                stack.extend(args.iter())
            }

            ExprKind::Let { bindings, body, .. } => {
                stack.extend(bindings.iter().map(|(_, init)| init));
                stack.push(body);
            }

            ExprKind::Lambda { .. } | ExprKind::FunCall { .. } => return false,
        }
    }

    true
}

/// Records the simplicity of every node below `expr` in a single bottom-up sweep.
///
/// The CPS pass asks about the same subtrees again at every level of a nested argument
/// chain; without the cache each question rescans the rest of the chain.
pub(crate) fn cache_simplicity(expr: &mut Expression) {
    // Preorder numbering: parents come before their children, so a reverse sweep sees
    // every child before its parent.
    let mut parents = Vec::new();
    let mut simple = Vec::new();
    let mut stack = vec![(&*expr, usize::MAX)];
    while let Some((expr, parent)) = stack.pop() {
        let index = parents.len();
        parents.push(parent);
        simple.push(!matches!(
            expr.kind,
            ExprKind::Lambda { .. } | ExprKind::FunCall { .. }
        ));
        let first = stack.len();
        expr.for_each_child(|child| stack.push((child, index)));
        stack[first..].reverse();
    }

    for index in (1..parents.len()).rev() {
        if !simple[index] {
            simple[parents[index]] = false;
        }
    }

    // Second walk in the same order to store the answers.
    let mut answers = simple.into_iter();
    let mut stack = vec![expr];
    while let Some(expr) = stack.pop() {
        expr.simple = answers.next();
        let first = stack.len();
        expr.for_each_child_mut(|child| stack.push(child));
        stack[first..].reverse();
    }
}
