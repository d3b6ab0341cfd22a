//! Core expression tree
//!
//! This is the sugar-free tree the CPS pass consumes and produces. Earlier passes
//! (expansion, alpha conversion, definition conversion) hand it over with every bound
//! name unique and with `and`/`or`/`cond`/`case`/`do`/`let*`/`letrec`/named `let`
//! already lowered to `if`/`let`/`begin`/`set!`.
//!
//! Every node owns its children. Passes take `&mut Expression` and swap owned replacement
//! subtrees in at the parent.

use std::mem;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Fixnum(i64),
    Flonum(f64),
    Character(char),
    String(String),
    Symbol(String),
    Nil,
    True,
    False,
}

/// Quoted data.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Literal(Literal),
    /// `(a b . tail)`; `tail` is `None` for proper lists.
    List(Vec<Datum>, Option<Box<Datum>>),
    Vector(Vec<Datum>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Let,
    LetStar,
    LetRec,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Variable(String),
    Quote(Datum),
    Nop,
    Set {
        name: String,
        value: Box<Expression>,
    },
    If {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternative: Box<Expression>,
    },
    Begin(Vec<Expression>),
    PrimitiveCall {
        name: String,
        args: Vec<Expression>,
    },
    ForeignCall {
        name: String,
        args: Vec<Expression>,
    },
    Lambda {
        params: Vec<String>,
        /// The last parameter collects the remaining arguments.
        variable_arity: bool,
        body: Box<Expression>,
    },
    FunCall {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    Let {
        kind: BindingKind,
        bindings: Vec<(String, Expression)>,
        body: Box<Expression>,
    },
}

#[derive(Debug)]
pub struct Expression {
    pub kind: ExprKind,
    /// Set by [`mark_tail_positions`](super::tail::mark_tail_positions).
    pub tail_position: bool,
    /// Cached answer of [`is_simple`](super::simple::is_simple), filled in by the CPS
    /// pass before it takes the tree apart. Not part of node equality.
    pub(crate) simple: Option<bool>,
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.tail_position == other.tail_position && self.kind == other.kind
    }
}

/// A compilation unit: top-level forms in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub forms: Vec<Expression>,
}

impl Program {
    pub fn new(forms: Vec<Expression>) -> Self {
        Self { forms }
    }

    /// The forms converted independently of each other. A program made of a single
    /// `begin` contributes the elements of that `begin`.
    pub fn top_level_forms(&self) -> &[Expression] {
        match self.forms.as_slice() {
            [Expression {
                kind: ExprKind::Begin(body),
                ..
            }] => body.as_slice(),
            forms => forms,
        }
    }

    pub fn top_level_forms_mut(&mut self) -> &mut [Expression] {
        match self.forms.as_mut_slice() {
            [Expression {
                kind: ExprKind::Begin(body),
                ..
            }] => body.as_mut_slice(),
            forms => forms,
        }
    }
}

impl Expression {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            tail_position: false,
            simple: None,
        }
    }

    pub fn nop() -> Self {
        Self::new(ExprKind::Nop)
    }

    /// Takes the node apart. `Expression` implements `Drop`, so its fields cannot be
    /// moved out by destructuring.
    pub fn into_kind(mut self) -> ExprKind {
        mem::replace(&mut self.kind, ExprKind::Nop)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::Quote(_) | ExprKind::Nop
        )
    }

    pub fn variable_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Variable(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_lambda(&self) -> bool {
        matches!(self.kind, ExprKind::Lambda { .. })
    }

    pub fn is_fun_call(&self) -> bool {
        matches!(self.kind, ExprKind::FunCall { .. })
    }

    pub fn is_begin(&self) -> bool {
        matches!(self.kind, ExprKind::Begin(_))
    }

    /// Calls `f` on every direct child, in evaluation order.
    pub fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a Expression)) {
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::Quote(_) | ExprKind::Nop => {}
            ExprKind::Set { value, .. } => f(value),
            ExprKind::If {
                test,
                consequent,
                alternative,
            } => {
                f(test);
                f(consequent);
                f(alternative);
            }
            ExprKind::Begin(body) => body.iter().for_each(f),
            ExprKind::PrimitiveCall { args, .. } | ExprKind::ForeignCall { args, .. } => {
                args.iter().for_each(f)
            }
            ExprKind::Lambda { body, .. } => f(body),
            ExprKind::FunCall { callee, args } => {
                f(callee);
                args.iter().for_each(f);
            }
            ExprKind::Let { bindings, body, .. } => {
                bindings.iter().for_each(|(_, init)| f(init));
                f(body);
            }
        }
    }

    /// Same as [`for_each_child`](Self::for_each_child), with mutable access.
    pub fn for_each_child_mut<'a>(&'a mut self, mut f: impl FnMut(&'a mut Expression)) {
        match &mut self.kind {
            ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::Quote(_) | ExprKind::Nop => {}
            ExprKind::Set { value, .. } => f(value),
            ExprKind::If {
                test,
                consequent,
                alternative,
            } => {
                f(test);
                f(consequent);
                f(alternative);
            }
            ExprKind::Begin(body) => body.iter_mut().for_each(f),
            ExprKind::PrimitiveCall { args, .. } | ExprKind::ForeignCall { args, .. } => {
                args.iter_mut().for_each(f)
            }
            ExprKind::Lambda { body, .. } => f(body),
            ExprKind::FunCall { callee, args } => {
                f(callee);
                args.iter_mut().for_each(f);
            }
            ExprKind::Let { bindings, body, .. } => {
                bindings.iter_mut().for_each(|(_, init)| f(init));
                f(body);
            }
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            count += 1;
            expr.for_each_child(|child| stack.push(child));
        }
        count
    }

    /// Copies this node with every child replaced by a `Nop`.
    fn shallow_clone(&self) -> Expression {
        let nop = || Box::new(Expression::nop());
        let nops = |n: usize| (0..n).map(|_| Expression::nop()).collect::<Vec<_>>();

        let kind = match &self.kind {
            ExprKind::Literal(lit) => ExprKind::Literal(lit.clone()),
            ExprKind::Variable(name) => ExprKind::Variable(name.clone()),
            ExprKind::Quote(datum) => ExprKind::Quote(datum.clone()),
            ExprKind::Nop => ExprKind::Nop,
            ExprKind::Set { name, .. } => ExprKind::Set {
                name: name.clone(),
                value: nop(),
            },
            ExprKind::If { .. } => ExprKind::If {
                test: nop(),
                consequent: nop(),
                alternative: nop(),
            },
            ExprKind::Begin(body) => ExprKind::Begin(nops(body.len())),
            ExprKind::PrimitiveCall { name, args } => ExprKind::PrimitiveCall {
                name: name.clone(),
                args: nops(args.len()),
            },
            ExprKind::ForeignCall { name, args } => ExprKind::ForeignCall {
                name: name.clone(),
                args: nops(args.len()),
            },
            ExprKind::Lambda {
                params,
                variable_arity,
                ..
            } => ExprKind::Lambda {
                params: params.clone(),
                variable_arity: *variable_arity,
                body: nop(),
            },
            ExprKind::FunCall { args, .. } => ExprKind::FunCall {
                callee: nop(),
                args: nops(args.len()),
            },
            ExprKind::Let { kind, bindings, .. } => ExprKind::Let {
                kind: *kind,
                bindings: bindings
                    .iter()
                    .map(|(name, _)| (name.clone(), Expression::nop()))
                    .collect(),
                body: nop(),
            },
        };

        Expression {
            kind,
            tail_position: self.tail_position,
            simple: self.simple,
        }
    }

    /// Moves every child out of this node, leaving `Nop`s or empty vectors behind.
    fn drain_children(&mut self, out: &mut Vec<Expression>) {
        match &mut self.kind {
            ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::Quote(_) | ExprKind::Nop => {}
            ExprKind::Set { value, .. } | ExprKind::Lambda { body: value, .. } => {
                out.push(mem::replace(&mut **value, Expression::nop()));
            }
            ExprKind::If {
                test,
                consequent,
                alternative,
            } => {
                out.push(mem::replace(&mut **test, Expression::nop()));
                out.push(mem::replace(&mut **consequent, Expression::nop()));
                out.push(mem::replace(&mut **alternative, Expression::nop()));
            }
            ExprKind::Begin(body) => out.append(body),
            ExprKind::PrimitiveCall { args, .. } | ExprKind::ForeignCall { args, .. } => {
                out.append(args)
            }
            ExprKind::FunCall { callee, args } => {
                out.push(mem::replace(&mut **callee, Expression::nop()));
                out.append(args);
            }
            ExprKind::Let { bindings, body, .. } => {
                out.extend(bindings.drain(..).map(|(_, init)| init));
                out.push(mem::replace(&mut **body, Expression::nop()));
            }
        }
    }
}

impl Clone for Expression {
    fn clone(&self) -> Self {
        // Copy the nodes in reverse preorder. Once a node's subtrees are done its children
        // sit on top of `done`, first child topmost.
        let mut order = Vec::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            order.push(expr);
            let first = stack.len();
            expr.for_each_child(|child| stack.push(child));
            stack[first..].reverse();
        }

        let mut done: Vec<Expression> = Vec::with_capacity(order.len());
        for expr in order.into_iter().rev() {
            let mut copy = expr.shallow_clone();
            copy.for_each_child_mut(|slot| {
                *slot = done.pop().expect("clone: missing child");
            });
            done.push(copy);
        }

        done.pop().expect("clone: empty tree")
    }
}

impl Drop for Expression {
    fn drop(&mut self) {
        if self.is_leaf() {
            return;
        }

        // Converted programs nest continuations arbitrarily deep; the derived drop glue
        // would recurse once per level.
        let mut stack = Vec::new();
        self.drain_children(&mut stack);
        while let Some(mut expr) = stack.pop() {
            expr.drain_children(&mut stack);
        }
    }
}

pub fn make_literal(literal: Literal) -> Expression {
    Expression::new(ExprKind::Literal(literal))
}

pub fn make_fixnum(n: i64) -> Expression {
    make_literal(Literal::Fixnum(n))
}

pub fn make_boolean(b: bool) -> Expression {
    make_literal(if b { Literal::True } else { Literal::False })
}

pub fn make_variable(name: impl Into<String>) -> Expression {
    Expression::new(ExprKind::Variable(name.into()))
}

pub fn make_quote(datum: Datum) -> Expression {
    Expression::new(ExprKind::Quote(datum))
}

pub fn make_set(name: impl Into<String>, value: Expression) -> Expression {
    Expression::new(ExprKind::Set {
        name: name.into(),
        value: Box::new(value),
    })
}

pub fn make_if(test: Expression, consequent: Expression, alternative: Expression) -> Expression {
    Expression::new(ExprKind::If {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternative: Box::new(alternative),
    })
}

pub fn make_begin(body: Vec<Expression>) -> Expression {
    Expression::new(ExprKind::Begin(body))
}

/// Prepends `prefix` to `rest`, splicing `rest` when it is itself a `begin`.
pub fn make_seq(mut prefix: Vec<Expression>, rest: Expression) -> Expression {
    if prefix.is_empty() {
        return rest;
    }

    match rest.into_kind() {
        ExprKind::Begin(body) => prefix.extend(body),
        kind => prefix.push(Expression::new(kind)),
    }

    make_begin(prefix)
}

pub fn make_prim_call(name: impl Into<String>, args: Vec<Expression>) -> Expression {
    Expression::new(ExprKind::PrimitiveCall {
        name: name.into(),
        args,
    })
}

pub fn make_foreign_call(name: impl Into<String>, args: Vec<Expression>) -> Expression {
    Expression::new(ExprKind::ForeignCall {
        name: name.into(),
        args,
    })
}

/// Builds a lambda. The body is wrapped in a `begin` unless it already is one.
pub fn make_lambda(params: Vec<String>, variable_arity: bool, body: Expression) -> Expression {
    let body = if body.is_begin() {
        body
    } else {
        make_begin(vec![body])
    };

    Expression::new(ExprKind::Lambda {
        params,
        variable_arity,
        body: Box::new(body),
    })
}

pub fn make_fun_call(callee: Expression, args: Vec<Expression>) -> Expression {
    Expression::new(ExprKind::FunCall {
        callee: Box::new(callee),
        args,
    })
}

pub fn make_let(bindings: Vec<(String, Expression)>, body: Expression) -> Expression {
    Expression::new(ExprKind::Let {
        kind: BindingKind::Let,
        bindings,
        body: Box::new(body),
    })
}
