//! Continuation-passing style conversion
//!
//! Rewrites the core tree so that every procedure call becomes a tail call receiving an
//! explicit continuation. Afterwards no call ever returns into compiler generated code,
//! which lets the code generator turn calls into jumps.
//!
//! The rewrite has one rule per node kind:
//!
//! - atoms (literals, variables, quotes, `nop`) are handed to the current continuation;
//! - `set!` of a non-simple value evaluates the value with a continuation that performs
//!   the assignment;
//! - `if` converts both branches with a shared copy of the continuation and, when the
//!   test is not simple, evaluates the test first through a continuation of its own;
//! - `begin` keeps leading simple expressions in place and threads the rest of the
//!   sequence through continuations;
//! - primitive, foreign and procedure calls evaluate their non-simple operands one at a
//!   time, the chain being built from the right-most operand outwards;
//! - `lambda` receives a leading continuation parameter and its body is converted with
//!   it;
//! - `let` keeps simple bindings and turns the others into a cascade of continuations.
//!
//! Only non-simple subexpressions (see [`is_simple`](super::simple::is_simple)) ever get
//! a continuation, so the output stays close to hand written CPS.
//!
//! Both branches of an `if` receive their own copy of the continuation. When an `if` sits
//! in the test position of another `if`, as lowered `and`/`or` chains do, the copied
//! continuation contains both outer branches, so the output doubles with every level of
//! such nesting. Deeply nested tests of this shape are not supported.
//!
//! Input programs may nest arbitrarily deep, so [`Converter`] never recurses. Pending
//! work lives on an explicit task stack and converted subtrees on a result stack; a
//! `Convert` task carries the continuation its subtree is converted with and plays the
//! part of a native call frame.

use std::collections::VecDeque;
use std::mem;
use std::rc::Rc;

use super::primitives::HALT;
use super::simple::{cache_simplicity, is_simple_cached};
use super::tree::*;

/// Name of the `index`-th continuation parameter introduced while converting one
/// top-level form. The `#%` prefix cannot appear in alpha-converted user names.
pub fn make_continuation_name(index: usize) -> String {
    format!("#%k{}", index)
}

/// Hands out continuation names in increasing order.
#[derive(Debug, Default)]
pub struct NameSupply {
    index: usize,
}

impl NameSupply {
    pub fn new() -> Self {
        Self { index: 0 }
    }

    pub fn starting_at(index: usize) -> Self {
        Self { index }
    }

    pub fn fresh(&mut self) -> String {
        let name = make_continuation_name(self.index);
        self.index += 1;
        name
    }

    /// Index the next fresh name will use.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// The rest of the computation.
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    /// A continuation bound elsewhere, e.g. the continuation parameter of the enclosing
    /// lambda. Applying it emits a call.
    Variable(String),
    /// A one-parameter lambda nobody else refers to. Applying it binds the value to
    /// `param` and splices `body` in place, no closure is ever built for it.
    Lambda { param: String, body: Expression },
}

impl Continuation {
    pub fn variable(name: impl Into<String>) -> Self {
        Continuation::Variable(name.into())
    }

    pub fn lambda(param: impl Into<String>, body: Expression) -> Self {
        Continuation::Lambda {
            param: param.into(),
            body,
        }
    }

    /// `(lambda (param) (primcall halt param))`, the continuation of a top-level form.
    pub fn halt(param: impl Into<String>) -> Self {
        let param = param.into();
        let body = make_prim_call(HALT, vec![make_variable(param.clone())]);
        Continuation::Lambda { param, body }
    }

    /// Delivers `value`, which must be simple or a converted lambda, to this continuation.
    pub fn apply(self, value: Expression) -> Expression {
        debug_assert!(
            value.is_lambda() || is_simple_cached(&value),
            "cps: continuation applied to a non-simple value: {}",
            value
        );

        match self {
            Continuation::Variable(name) => make_fun_call(make_variable(name), vec![value]),
            Continuation::Lambda { param, body } => make_let(vec![(param, value)], body),
        }
    }

    /// The continuation as a value that can be passed to a procedure.
    pub fn into_expression(self) -> Expression {
        match self {
            Continuation::Variable(name) => make_variable(name),
            Continuation::Lambda { param, body } => make_lambda(vec![param], false, body),
        }
    }
}

/// A continuation together with the right to consume it.
///
/// An owned continuation is used exactly once, so its body is moved into the output.
/// Once a continuation is needed in two places (the branches of an `if`) it becomes
/// shared and every use copies it, except the last one which takes it over. Using a
/// continuation consumes the handle, so nothing can be spliced twice.
#[derive(Debug)]
enum Cont {
    Owned(Continuation),
    Shared(Rc<Continuation>),
}

impl Cont {
    fn take(self) -> Continuation {
        match self {
            Cont::Owned(k) => k,
            Cont::Shared(k) => Rc::try_unwrap(k).unwrap_or_else(|k| (*k).clone()),
        }
    }

    fn apply(self, value: Expression) -> Expression {
        self.take().apply(value)
    }

    fn into_expression(self) -> Expression {
        self.take().into_expression()
    }

    fn share(self) -> Rc<Continuation> {
        match self {
            Cont::Owned(k) => Rc::new(k),
            Cont::Shared(k) => k,
        }
    }
}

enum Operator {
    Primitive(String),
    Foreign(String),
    /// The first operand is the procedure.
    Call,
}

enum Task {
    /// Convert the expression and push the result.
    Convert(Expression, Cont),
    /// Rest of a `begin`, held as a deque so that peeling off the front stays cheap.
    ConvertSeq(VecDeque<Expression>, Cont),
    /// Both branches are on the result stack, the alternative on top.
    FinishIf { test: Expression, simple: bool },
    /// The converted body is on the result stack.
    FinishLambda {
        k_param: String,
        params: Vec<String>,
        variable_arity: bool,
        k: Cont,
    },
    /// The result on top of the stack consumes the values of the pending expressions.
    /// The last entry is evaluated closest to that result.
    Chain(Vec<(String, Expression)>),
    /// Evaluate the expression first, discarding its value, then continue with the result
    /// on top of the stack.
    SeqFirst(Expression),
    WrapSeq(Vec<Expression>),
    WrapLet(Vec<(String, Expression)>),
}

/// The conversion machine for one top-level form.
pub struct Converter {
    names: NameSupply,
    tasks: Vec<Task>,
    results: Vec<Expression>,
}

impl Converter {
    pub fn new(names: NameSupply) -> Self {
        Self {
            names,
            tasks: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Converts `expr` so that its value is delivered to `k`.
    ///
    /// # Panics
    ///
    /// When `expr` violates the input invariants (a `let*` or `letrec` that has not been
    /// lowered yet). That is a bug in an earlier pass.
    pub fn convert(&mut self, mut expr: Expression, k: Continuation) -> Expression {
        cache_simplicity(&mut expr);

        let base = self.results.len();
        self.tasks.push(Task::Convert(expr, Cont::Owned(k)));

        while let Some(task) = self.tasks.pop() {
            self.step(task);
        }

        assert_eq!(
            self.results.len(),
            base + 1,
            "cps: conversion left an unbalanced result stack"
        );
        self.pop_result()
    }

    fn pop_result(&mut self) -> Expression {
        self.results
            .pop()
            .expect("cps: result stack underflow")
    }

    fn step(&mut self, task: Task) {
        match task {
            Task::Convert(expr, k) => self.convert_expression(expr, k),

            Task::ConvertSeq(body, k) => self.convert_seq(body, k),

            Task::FinishIf { test, simple } => {
                let alternative = self.pop_result();
                let consequent = self.pop_result();

                if simple {
                    self.results.push(make_if(test, consequent, alternative));
                } else {
                    let param = self.names.fresh();
                    let body = make_if(make_variable(param.clone()), consequent, alternative);
                    self.tasks.push(Task::Convert(
                        test,
                        Cont::Owned(Continuation::lambda(param, body)),
                    ));
                }
            }

            Task::FinishLambda {
                k_param,
                params,
                variable_arity,
                k,
            } => {
                let body = self.pop_result();

                let mut formals = Vec::with_capacity(params.len() + 1);
                formals.push(k_param);
                formals.extend(params);

                let lambda = make_lambda(formals, variable_arity, body);
                self.results.push(k.apply(lambda));
            }

            Task::Chain(mut pending) => {
                let body = self.pop_result();
                let (param, expr) = pending.pop().expect("cps: empty continuation chain");

                if !pending.is_empty() {
                    self.tasks.push(Task::Chain(pending));
                }

                self.tasks.push(Task::Convert(
                    expr,
                    Cont::Owned(Continuation::lambda(param, body)),
                ));
            }

            Task::SeqFirst(first) => {
                let rest = self.pop_result();
                let param = self.names.fresh();
                self.tasks.push(Task::Convert(
                    first,
                    Cont::Owned(Continuation::lambda(param, rest)),
                ));
            }

            Task::WrapSeq(prefix) => {
                let rest = self.pop_result();
                self.results.push(make_seq(prefix, rest));
            }

            Task::WrapLet(bindings) => {
                let body = self.pop_result();
                self.results.push(make_let(bindings, body));
            }
        }
    }

    fn convert_expression(&mut self, expr: Expression, k: Cont) {
        let direct = match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::Quote(_) | ExprKind::Nop => {
                true
            }
            ExprKind::Set { .. } | ExprKind::PrimitiveCall { .. } | ExprKind::ForeignCall { .. } => {
                is_simple_cached(&expr)
            }
            _ => false,
        };

        if direct {
            self.results.push(k.apply(expr));
            return;
        }

        match expr.into_kind() {
            ExprKind::Set { name, value } => {
                let param = self.names.fresh();
                let body = k.apply(make_set(name, make_variable(param.clone())));
                self.tasks.push(Task::Convert(
                    *value,
                    Cont::Owned(Continuation::lambda(param, body)),
                ));
            }

            ExprKind::If {
                test,
                consequent,
                alternative,
            } => {
                let k = k.share();
                let simple = is_simple_cached(&test);

                self.tasks.push(Task::FinishIf {
                    test: *test,
                    simple,
                });
                self.tasks
                    .push(Task::Convert(*alternative, Cont::Shared(k.clone())));
                self.tasks.push(Task::Convert(*consequent, Cont::Shared(k)));
            }

            ExprKind::Begin(body) => self.convert_seq(VecDeque::from(body), k),

            ExprKind::PrimitiveCall { name, args } => {
                self.convert_operands(args, Operator::Primitive(name), k)
            }

            ExprKind::ForeignCall { name, args } => {
                self.convert_operands(args, Operator::Foreign(name), k)
            }

            ExprKind::FunCall { callee, args } => {
                let mut operands = Vec::with_capacity(args.len() + 1);
                operands.push(*callee);
                operands.extend(args);
                self.convert_operands(operands, Operator::Call, k)
            }

            ExprKind::Lambda {
                params,
                variable_arity,
                body,
            } => {
                let k_param = self.names.fresh();
                let inner = Cont::Owned(Continuation::variable(k_param.clone()));

                self.tasks.push(Task::FinishLambda {
                    k_param,
                    params,
                    variable_arity,
                    k,
                });
                self.tasks.push(Task::Convert(*body, inner));
            }

            ExprKind::Let {
                kind,
                bindings,
                body,
            } => {
                assert_eq!(
                    kind,
                    BindingKind::Let,
                    "cps: {:?} must be lowered to let before conversion",
                    kind
                );

                let (simple, complex): (Vec<_>, Vec<_>) = bindings
                    .into_iter()
                    .partition(|(_, init)| is_simple_cached(init));

                if !simple.is_empty() {
                    self.tasks.push(Task::WrapLet(simple));
                }
                if !complex.is_empty() {
                    self.tasks.push(Task::Chain(complex));
                }
                self.tasks.push(Task::Convert(*body, k));
            }

            ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::Quote(_) | ExprKind::Nop => {
                unreachable!("cps: atoms are applied directly")
            }
        }
    }

    fn convert_seq(&mut self, mut body: VecDeque<Expression>, k: Cont) {
        if body.is_empty() {
            body.push_back(Expression::nop());
        }

        let leading = body
            .iter()
            .take_while(|expr| is_simple_cached(expr))
            .count();

        if leading + 1 >= body.len() {
            // Everything before the last expression only runs for effect.
            let last = body.pop_back().expect("cps: empty sequence");
            if !body.is_empty() {
                self.tasks.push(Task::WrapSeq(body.into()));
            }
            self.tasks.push(Task::Convert(last, k));
        } else if leading > 0 {
            let prefix = body.drain(..leading).collect();
            self.tasks.push(Task::WrapSeq(prefix));
            self.tasks.push(Task::ConvertSeq(body, k));
        } else {
            let first = body.pop_front().expect("cps: empty sequence");
            self.tasks.push(Task::SeqFirst(first));
            self.tasks.push(Task::ConvertSeq(body, k));
        }
    }

    /// Replaces every non-simple operand by a fresh variable, builds the operation over
    /// the resulting simple operands and then evaluates the replaced operands through a
    /// chain of continuations, starting with the right-most one.
    fn convert_operands(&mut self, mut operands: Vec<Expression>, op: Operator, k: Cont) {
        let mut pending = Vec::new();
        for operand in operands.iter_mut().rev() {
            if !is_simple_cached(operand) {
                let param = self.names.fresh();
                let value = mem::replace(operand, make_variable(param.clone()));
                pending.push((param, value));
            }
        }
        pending.reverse();
        debug_assert!(operands.iter().all(is_simple_cached));

        let operation = match op {
            Operator::Primitive(name) => k.apply(make_prim_call(name, operands)),
            Operator::Foreign(name) => k.apply(make_foreign_call(name, operands)),
            Operator::Call => {
                let mut operands = operands.into_iter();
                let callee = operands.next().expect("cps: call without a callee");

                let mut args = Vec::with_capacity(operands.len() + 1);
                args.push(k.into_expression());
                args.extend(operands);
                make_fun_call(callee, args)
            }
        };

        self.results.push(operation);
        if !pending.is_empty() {
            self.tasks.push(Task::Chain(pending));
        }
    }
}

/// Index of the first continuation name not already used anywhere in `expr`, whether
/// bound, assigned or referenced. Zero for trees that have never been converted.
pub fn first_unused_index(expr: &Expression) -> usize {
    fn index_of(name: &str) -> Option<usize> {
        name.strip_prefix("#%k")?.parse().ok()
    }

    let mut next = 0;
    let mut note = |name: &str| {
        if let Some(index) = index_of(name) {
            next = next.max(index + 1);
        }
    };

    let mut stack = vec![expr];
    while let Some(expr) = stack.pop() {
        match &expr.kind {
            ExprKind::Variable(name) | ExprKind::Set { name, .. } => note(name.as_str()),
            ExprKind::Lambda { params, .. } => {
                params.iter().for_each(|param| note(param.as_str()))
            }
            ExprKind::Let { bindings, .. } => {
                bindings.iter().for_each(|(name, _)| note(name.as_str()))
            }
            _ => {}
        }
        expr.for_each_child(|child| stack.push(child));
    }

    next
}

/// Converts one top-level form in place with a fresh name supply and a halting
/// continuation. The halting continuation takes the first name the form does not use
/// yet, `#%k0` unless the form has been converted before.
pub fn convert_toplevel(form: &mut Expression) -> NameSupply {
    let expr = mem::replace(form, Expression::nop());

    let mut names = NameSupply::starting_at(first_unused_index(&expr));
    let halt = Continuation::halt(names.fresh());

    let mut converter = Converter::new(names);
    *form = converter.convert(expr, halt);
    converter.names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(expr: &Expression) -> Vec<String> {
        let mut found = Vec::new();
        let mut stack = vec![expr];
        while let Some(expr) = stack.pop() {
            match &expr.kind {
                ExprKind::Lambda { params, .. } => found.extend(params.iter().cloned()),
                ExprKind::Let { bindings, .. } => {
                    found.extend(bindings.iter().map(|(name, _)| name.clone()))
                }
                _ => {}
            }
            expr.for_each_child(|child| stack.push(child));
        }
        found
    }

    fn convert(mut expr: Expression) -> Expression {
        convert_toplevel(&mut expr);
        expr
    }

    fn call(callee: &str, args: Vec<Expression>) -> Expression {
        make_fun_call(make_variable(callee), args)
    }

    #[test]
    fn test_continuation_names() {
        assert_eq!(make_continuation_name(0), "#%k0");
        assert_eq!(make_continuation_name(42), "#%k42");

        let mut supply = NameSupply::starting_at(3);
        assert_eq!(supply.fresh(), "#%k3");
        assert_eq!(supply.fresh(), "#%k4");
        assert_eq!(supply.index(), 5);
    }

    #[test]
    fn test_literal() {
        let out = convert(make_fixnum(15));
        assert_eq!(out.to_string(), "(let ((#%k0 15)) (primcall halt #%k0))");
    }

    #[test]
    fn test_variable_continuation_emits_call() {
        let k = Continuation::variable("k");
        assert_eq!(k.apply(make_fixnum(1)).to_string(), "(k 1)");
    }

    #[test]
    fn test_simple_primitive_call() {
        let out = convert(make_prim_call("+", vec![make_fixnum(1), make_fixnum(2)]));
        assert_eq!(
            out.to_string(),
            "(let ((#%k0 (primcall + 1 2))) (primcall halt #%k0))"
        );
    }

    #[test]
    fn test_call_with_simple_operands() {
        let out = convert(call("f", vec![make_variable("x")]));
        assert_eq!(
            out.to_string(),
            "(f (lambda (#%k0) (begin (primcall halt #%k0))) x)"
        );
    }

    #[test]
    fn test_nested_operands_chain_from_the_right() {
        let out = convert(make_prim_call(
            "+",
            vec![
                make_fixnum(22),
                call("f", vec![make_variable("x")]),
                make_fixnum(33),
                call("g", vec![make_variable("y")]),
            ],
        ));

        assert_eq!(
            out.to_string(),
            "(f (lambda (#%k2) (begin (g (lambda (#%k1) (begin (let ((#%k0 (primcall + 22 #%k2 33 #%k1))) (primcall halt #%k0)))) y))) x)"
        );
    }

    #[test]
    fn test_if_with_simple_test() {
        let out = convert(make_if(make_boolean(true), make_fixnum(2), make_fixnum(3)));
        assert_eq!(
            out.to_string(),
            "(if #t (let ((#%k0 2)) (primcall halt #%k0)) (let ((#%k0 3)) (primcall halt #%k0)))"
        );
    }

    #[test]
    fn test_if_with_call_in_test() {
        let out = convert(make_if(call("f", vec![]), make_fixnum(2), make_fixnum(3)));
        assert_eq!(
            out.to_string(),
            "(f (lambda (#%k1) (begin (if #%k1 (let ((#%k0 2)) (primcall halt #%k0)) (let ((#%k0 3)) (primcall halt #%k0))))))"
        );
    }

    #[test]
    fn test_lambda_gets_continuation_parameter() {
        let out = convert(make_lambda(
            vec!["x".to_string()],
            false,
            make_variable("x"),
        ));
        assert_eq!(
            out.to_string(),
            "(let ((#%k0 (lambda (#%k1 x) (begin (#%k1 x))))) (primcall halt #%k0))"
        );
    }

    #[test]
    fn test_variable_arity_lambda_keeps_rest_last() {
        let out = convert(make_lambda(
            vec!["rest".to_string()],
            true,
            make_variable("rest"),
        ));
        let ExprKind::Let { bindings, .. } = &out.kind else {
            panic!("expected let, got {}", out)
        };
        let ExprKind::Lambda {
            params,
            variable_arity,
            ..
        } = &bindings[0].1.kind
        else {
            panic!("expected lambda")
        };
        assert_eq!(params, &["#%k1".to_string(), "rest".to_string()]);
        assert!(*variable_arity);
    }

    #[test]
    fn test_set_with_call() {
        let out = convert(make_set("x", call("f", vec![])));
        assert_eq!(
            out.to_string(),
            "(f (lambda (#%k1) (begin (let ((#%k0 (set! x #%k1))) (primcall halt #%k0)))))"
        );
    }

    #[test]
    fn test_begin_hoists_simple_prefix() {
        let out = convert(make_begin(vec![
            make_set("a", make_fixnum(1)),
            call("f", vec![]),
            make_fixnum(2),
        ]));
        assert_eq!(
            out.to_string(),
            "(begin (set! a 1) (f (lambda (#%k1) (begin (let ((#%k0 2)) (primcall halt #%k0))))))"
        );
    }

    #[test]
    fn test_empty_begin_is_nop() {
        let out = convert(make_begin(vec![]));
        assert_eq!(out.to_string(), "(let ((#%k0 #<nop>)) (primcall halt #%k0))");
    }

    #[test]
    fn test_let_partitions_bindings() {
        let out = convert(make_let(
            vec![
                ("a".to_string(), make_fixnum(1)),
                ("b".to_string(), call("f", vec![])),
            ],
            make_prim_call("+", vec![make_variable("a"), make_variable("b")]),
        ));
        assert_eq!(
            out.to_string(),
            "(let ((a 1)) (f (lambda (b) (begin (let ((#%k0 (primcall + a b))) (primcall halt #%k0))))))"
        );
    }

    #[test]
    fn test_let_cascade_keeps_binding_order() {
        let out = convert(make_let(
            vec![
                ("a".to_string(), call("f", vec![])),
                ("b".to_string(), call("g", vec![])),
            ],
            make_variable("b"),
        ));
        assert_eq!(
            out.to_string(),
            "(f (lambda (a) (begin (g (lambda (b) (begin (let ((#%k0 b)) (primcall halt #%k0))))))))"
        );
    }

    #[test]
    #[should_panic(expected = "must be lowered")]
    fn test_letrec_is_rejected() {
        let expr = Expression::new(ExprKind::Let {
            kind: BindingKind::LetRec,
            bindings: vec![],
            body: Box::new(make_fixnum(1)),
        });
        convert(expr);
    }

    #[test]
    fn test_fresh_names_are_unique() {
        let out = convert(make_begin(vec![
            call("f", vec![call("g", vec![])]),
            make_if(
                call("h", vec![]),
                make_lambda(vec!["y".to_string()], false, call("y", vec![])),
                make_fixnum(0),
            ),
        ]));

        let mut found: Vec<String> = names(&out)
            .into_iter()
            .filter(|name| name.starts_with("#%k"))
            .collect();
        let total = found.len();
        found.sort();
        found.dedup();
        // The halt parameter is bound once per branch of the `if`.
        assert_eq!(total, found.len() + 1);
    }

    #[test]
    fn test_deep_operand_chain() {
        let mut expr = make_if(make_variable("a"), call("f", vec![]), call("g", vec![]));
        for _ in 0..50_000 {
            expr = make_prim_call("+", vec![make_fixnum(1), expr]);
        }

        let supply = convert_toplevel(&mut expr);
        // Halt plus one name per level. The `if` has a simple test.
        assert_eq!(supply.index(), 50_001);

        crate::compiler::tail::mark_tail_positions(&mut expr, true);
        assert!(crate::compiler::tail::only_tail_calls(&expr));
    }

    /// Fails when a name is bound again below a binder of the same name.
    fn assert_no_shadowing(expr: &Expression, bound: &mut Vec<String>) {
        let binders: Vec<String> = match &expr.kind {
            ExprKind::Lambda { params, .. } => params.clone(),
            ExprKind::Let { bindings, .. } => {
                bindings.iter().map(|(name, _)| name.clone()).collect()
            }
            _ => Vec::new(),
        };

        if let ExprKind::Let { bindings, body, .. } = &expr.kind {
            for (_, init) in bindings {
                assert_no_shadowing(init, bound);
            }
            for name in &binders {
                assert!(!bound.contains(name), "{} bound twice in {}", name, expr);
            }
            let depth = bound.len();
            bound.extend(binders);
            assert_no_shadowing(body, bound);
            bound.truncate(depth);
            return;
        }

        for name in &binders {
            assert!(!bound.contains(name), "{} bound twice in {}", name, expr);
        }
        let depth = bound.len();
        bound.extend(binders);
        expr.for_each_child(|child| assert_no_shadowing(child, bound));
        bound.truncate(depth);
    }

    #[test]
    fn test_first_unused_index() {
        assert_eq!(first_unused_index(&make_fixnum(1)), 0);

        let expr = make_let(
            vec![("#%k4".to_string(), make_variable("#%k9"))],
            make_set("#%kx", make_variable("#%k")),
        );
        assert_eq!(first_unused_index(&expr), 10);
    }

    #[test]
    fn test_second_conversion_uses_new_names() {
        let expr = call(
            "f",
            vec![
                make_lambda(vec!["y".to_string()], false, make_variable("y")),
                make_variable("x"),
            ],
        );

        let once = convert(expr);
        assert_no_shadowing(&once, &mut Vec::new());

        let mut twice = once.clone();
        let supply = convert_toplevel(&mut twice);
        assert!(supply.index() > first_unused_index(&once));
        assert_no_shadowing(&twice, &mut Vec::new());

        // The halt continuation of the second run takes the first unused name.
        let halt = make_continuation_name(first_unused_index(&once));
        assert!(
            twice.to_string().contains(&format!("(primcall halt {})", halt)),
            "{}",
            twice
        );
    }

    #[test]
    fn test_nested_if_tests_double_the_output() {
        let nested = |depth: usize| {
            let mut expr = call("f", vec![]);
            for _ in 0..depth {
                expr = make_if(expr, make_fixnum(1), make_fixnum(2));
            }
            convert(expr).size()
        };

        for depth in 1..6 {
            assert!(nested(depth + 1) > 2 * nested(depth), "depth {}", depth);
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "non-simple value")]
    fn test_continuation_rejects_calls() {
        Continuation::halt("r").apply(call("f", vec![]));
    }

    #[test]
    fn test_shared_continuation_is_moved_by_last_user() {
        let k = Rc::new(Continuation::halt("r"));
        let first = Cont::Shared(k.clone());
        let second = Cont::Shared(k);

        assert_eq!(first.take(), Continuation::halt("r"));
        let Cont::Shared(rc) = &second else {
            unreachable!()
        };
        assert_eq!(Rc::strong_count(rc), 1);
        assert_eq!(second.take(), Continuation::halt("r"));
    }
}
