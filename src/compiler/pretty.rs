//! Pretty printing of the core tree.

use std::fmt;

use pretty::{BoxAllocator, DocAllocator, DocBuilder};
use termcolor::{Color, ColorSpec, WriteColor};

use super::tree::{Datum, ExprKind, Expression, Literal};

fn fg(color: Color) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color));
    spec
}

fn kw(color: Color) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color));
    spec.set_bold(true);
    spec
}

/// `(item item ...)`, broken one item per line when it does not fit.
fn form<'a, D>(allocator: &'a D, items: Vec<DocBuilder<'a, D, ColorSpec>>) -> DocBuilder<'a, D, ColorSpec>
where
    D: DocAllocator<'a, ColorSpec>,
    D::Doc: Clone,
{
    allocator
        .intersperse(items, allocator.line())
        .nest(1)
        .align()
        .group()
        .parens()
}

fn keyword<'a, D>(allocator: &'a D, name: &str) -> DocBuilder<'a, D, ColorSpec>
where
    D: DocAllocator<'a, ColorSpec>,
    D::Doc: Clone,
{
    allocator.text(name.to_string()).annotate(fg(Color::Green))
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Fixnum(n) => write!(f, "{}", n),
            Literal::Flonum(x) => write!(f, "{:?}", x),
            Literal::Character(' ') => f.write_str("#\\space"),
            Literal::Character('\n') => f.write_str("#\\newline"),
            Literal::Character(c) => write!(f, "#\\{}", c),
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Symbol(s) => write!(f, "'{}", s),
            Literal::Nil => f.write_str("'()"),
            Literal::True => f.write_str("#t"),
            Literal::False => f.write_str("#f"),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Literal(Literal::Symbol(s)) => f.write_str(s),
            Datum::Literal(Literal::Nil) => f.write_str("()"),
            Datum::Literal(lit) => lit.fmt(f),
            Datum::List(items, tail) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    item.fmt(f)?;
                }
                if let Some(tail) = tail {
                    write!(f, " . {}", tail)?;
                }
                f.write_str(")")
            }
            Datum::Vector(items) => {
                f.write_str("#(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    item.fmt(f)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl Expression {
    pub fn pretty<'a, D>(&self, allocator: &'a D) -> DocBuilder<'a, D, ColorSpec>
    where
        D: DocAllocator<'a, ColorSpec>,
        D::Doc: Clone,
    {
        match &self.kind {
            ExprKind::Literal(lit) => allocator.text(lit.to_string()).annotate(fg(Color::Cyan)),
            ExprKind::Variable(name) => allocator.text(name.clone()),
            ExprKind::Quote(datum) => form(
                allocator,
                vec![keyword(allocator, "quote"), allocator.text(datum.to_string())],
            ),
            ExprKind::Nop => allocator.text("#<nop>").annotate(fg(Color::Magenta)),

            ExprKind::Set { name, value } => form(
                allocator,
                vec![
                    keyword(allocator, "set!"),
                    allocator.text(name.clone()).annotate(kw(Color::Blue)),
                    value.pretty(allocator),
                ],
            ),

            ExprKind::If {
                test,
                consequent,
                alternative,
            } => form(
                allocator,
                vec![
                    keyword(allocator, "if"),
                    test.pretty(allocator),
                    consequent.pretty(allocator),
                    alternative.pretty(allocator),
                ],
            ),

            ExprKind::Begin(body) => {
                let mut items = vec![keyword(allocator, "begin")];
                items.extend(body.iter().map(|expr| expr.pretty(allocator)));
                form(allocator, items)
            }

            ExprKind::PrimitiveCall { name, args } => {
                let mut items = vec![
                    keyword(allocator, "primcall"),
                    allocator.text(name.clone()).annotate(kw(Color::Blue)),
                ];
                items.extend(args.iter().map(|arg| arg.pretty(allocator)));
                form(allocator, items)
            }

            ExprKind::ForeignCall { name, args } => {
                let mut items = vec![
                    keyword(allocator, "foreign-call"),
                    allocator.text(name.clone()).annotate(kw(Color::Blue)),
                ];
                items.extend(args.iter().map(|arg| arg.pretty(allocator)));
                form(allocator, items)
            }

            ExprKind::Lambda {
                params,
                variable_arity,
                body,
            } => {
                let formals = match params.as_slice() {
                    [rest] if *variable_arity => allocator.text(rest.clone()),
                    _ => Self::pretty_formals(allocator, params, *variable_arity),
                };

                form(
                    allocator,
                    vec![keyword(allocator, "lambda"), formals, body.pretty(allocator)],
                )
            }

            ExprKind::FunCall { callee, args } => {
                let mut items = vec![callee.pretty(allocator)];
                items.extend(args.iter().map(|arg| arg.pretty(allocator)));
                form(allocator, items)
            }

            ExprKind::Let { bindings, body, .. } => {
                let bindings = allocator
                    .intersperse(
                        bindings.iter().map(|(name, init)| {
                            form(
                                allocator,
                                vec![allocator.text(name.clone()), init.pretty(allocator)],
                            )
                        }),
                        allocator.line(),
                    )
                    .align()
                    .group()
                    .parens();

                form(
                    allocator,
                    vec![keyword(allocator, "let"), bindings, body.pretty(allocator)],
                )
            }
        }
    }

    fn pretty_formals<'a, D>(
        allocator: &'a D,
        params: &[String],
        variable_arity: bool,
    ) -> DocBuilder<'a, D, ColorSpec>
    where
        D: DocAllocator<'a, ColorSpec>,
        D::Doc: Clone,
    {
        let (fixed, rest) = if variable_arity && !params.is_empty() {
            (&params[..params.len() - 1], params.last())
        } else {
            (&params[..], None)
        };

        let mut formals = allocator.intersperse(
            fixed.iter().map(|param| allocator.text(param.clone())),
            allocator.space(),
        );

        if let Some(rest) = rest {
            if !fixed.is_empty() {
                formals = formals.append(allocator.space());
            }
            formals = formals
                .append(allocator.text("."))
                .append(allocator.space())
                .append(allocator.text(rest.clone()));
        }

        formals.parens()
    }

    pub fn pretty_print(&self, out: impl WriteColor, width: usize) -> std::io::Result<()> {
        let allocator = BoxAllocator;

        self.pretty(&allocator).1.render_colored(width, out)?;

        Ok(())
    }
}

/// Renders on a single line; use [`Expression::pretty_print`] for laid out output.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut vec = Vec::new();
        let out = termcolor::NoColor::new(&mut vec);
        match self.pretty_print(out, usize::MAX / 2) {
            Ok(_) => f.write_str(&String::from_utf8_lossy(&vec)),
            Err(_) => Err(fmt::Error),
        }
    }
}
