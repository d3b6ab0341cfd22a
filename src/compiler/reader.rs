//! Reading core forms from source text
//!
//! Source is parsed with `r7rs-parser`, turned into [`Datum`]s and then analysed into
//! [`Expression`]s. Only the core forms the CPS pass accepts are recognised; derived
//! syntax has to go through the expander first and is rejected here.
//!
//! Applications whose head names a primitive become `primcall`s unless a `lambda` or
//! `let` in scope rebinds the name.

use r7rs_parser::{
    expr::{Expr, NoIntern},
    parser::Parser,
};

use super::primitives::lookup_primitive;
use super::tree::*;
use crate::error::ReadError;

/// Derived forms that must be lowered before they reach this pass.
const DERIVED_FORMS: &[&str] = &[
    "and",
    "or",
    "cond",
    "case",
    "do",
    "when",
    "unless",
    "let*",
    "letrec",
    "letrec*",
    "let-values",
    "let*-values",
    "define",
    "define-syntax",
    "let-syntax",
    "letrec-syntax",
    "quasiquote",
    "delay",
];

pub fn read_program(source: &str) -> Result<Program, ReadError> {
    let mut i = NoIntern;
    let mut p = Parser::new(&mut i, source, false);
    let mut reader = Reader::new();
    let mut forms = Vec::new();

    while !p.finished() {
        match p.parse(true) {
            Ok(expr) => {
                let datum = datum_from_expr(&expr)?;
                forms.push(reader.expression(&datum)?);
            }
            Err(err) => return Err(ReadError::Parse(err.to_string())),
        }
    }

    log::debug!(target: "reader", "read {} top-level forms", forms.len());

    Ok(Program::new(forms))
}

/// Reads source text that holds exactly one expression.
pub fn read_expression(source: &str) -> Result<Expression, ReadError> {
    let mut program = read_program(source)?;

    match program.forms.len() {
        1 => Ok(program.forms.remove(0)),
        n => Err(ReadError::ExpressionCount(n)),
    }
}

fn strip_syntax(mut expr: &Expr<NoIntern>) -> &Expr<NoIntern> {
    while let Expr::Syntax(_, inner) = expr {
        expr = inner;
    }
    expr
}

pub fn datum_from_expr(expr: &Expr<NoIntern>) -> Result<Datum, ReadError> {
    let datum = match strip_syntax(expr) {
        Expr::Bool(true) => Datum::Literal(Literal::True),
        Expr::Bool(false) => Datum::Literal(Literal::False),
        Expr::Fixnum(x) => Datum::Literal(Literal::Fixnum(*x as i64)),
        Expr::Float(x) => Datum::Literal(Literal::Flonum(*x)),
        Expr::Char(x) => Datum::Literal(Literal::Character(*x)),
        Expr::Str(x) => Datum::Literal(Literal::String(x.to_string())),
        Expr::Symbol(x) => Datum::Literal(Literal::Symbol(x.to_string())),
        Expr::Null => Datum::Literal(Literal::Nil),

        Expr::GrowableVector(x) | Expr::ImmutableVector(x) => Datum::Vector(
            x.iter()
                .map(datum_from_expr)
                .collect::<Result<Vec<_>, _>>()?,
        ),

        Expr::Pair(..) => {
            let mut items = Vec::new();
            let mut cur = strip_syntax(expr);

            let tail = loop {
                match cur {
                    Expr::Pair(car, cdr) => {
                        items.push(datum_from_expr(car)?);
                        cur = strip_syntax(cdr);
                    }
                    Expr::Null => break None,
                    other => break Some(Box::new(datum_from_expr(other)?)),
                }
            };

            Datum::List(items, tail)
        }

        Expr::BigInt(..) => return Err(ReadError::UnsupportedDatum("bignum")),
        Expr::Rational(..) | Expr::BigRational(..) => {
            return Err(ReadError::UnsupportedDatum("rational"))
        }
        Expr::Complex(..) => return Err(ReadError::UnsupportedDatum("complex number")),
        Expr::ByteVector(..) => return Err(ReadError::UnsupportedDatum("bytevector")),
        #[allow(unreachable_patterns)]
        _ => return Err(ReadError::UnsupportedDatum("datum")),
    };

    Ok(datum)
}

fn list_items(datum: &Datum) -> Option<&[Datum]> {
    match datum {
        Datum::List(items, None) => Some(items),
        Datum::Literal(Literal::Nil) => Some(&[]),
        _ => None,
    }
}

fn symbol(datum: &Datum) -> Option<&str> {
    match datum {
        Datum::Literal(Literal::Symbol(name)) => Some(name),
        _ => None,
    }
}

fn syntax_error<T>(form: &Datum, message: &'static str) -> Result<T, ReadError> {
    Err(ReadError::Syntax {
        form: form.to_string(),
        message,
    })
}

/// Analyses data into expressions. Keeps track of the names bound around the current
/// expression so that local bindings shadow keywords and primitives.
pub struct Reader {
    scope: Vec<String>,
}

impl Reader {
    pub fn new() -> Self {
        Self { scope: Vec::new() }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.scope.iter().any(|bound| bound == name)
    }

    pub fn expression(&mut self, datum: &Datum) -> Result<Expression, ReadError> {
        match datum {
            Datum::Literal(Literal::Symbol(name)) => Ok(make_variable(name.clone())),
            Datum::Literal(Literal::Nil) => syntax_error(datum, "empty application"),
            Datum::Literal(lit) => Ok(make_literal(lit.clone())),
            Datum::Vector(_) => Ok(make_quote(datum.clone())),

            Datum::List(_, Some(_)) => syntax_error(datum, "improper list"),
            Datum::List(items, None) => {
                let Some((head, args)) = items.split_first() else {
                    return syntax_error(datum, "empty application");
                };

                match symbol(head) {
                    Some(name) if !self.is_bound(name) => self.special_form(datum, name, args),
                    _ => {
                        let callee = self.expression(head)?;
                        let args = self.expressions(args)?;
                        Ok(make_fun_call(callee, args))
                    }
                }
            }
        }
    }

    fn expressions(&mut self, data: &[Datum]) -> Result<Vec<Expression>, ReadError> {
        data.iter().map(|datum| self.expression(datum)).collect()
    }

    fn special_form(
        &mut self,
        form: &Datum,
        keyword: &str,
        args: &[Datum],
    ) -> Result<Expression, ReadError> {
        match keyword {
            "quote" => match args {
                [datum] => Ok(make_quote(datum.clone())),
                _ => syntax_error(form, "quote takes one datum"),
            },

            "set!" => match args {
                [name, value] => match symbol(name) {
                    Some(name) => Ok(make_set(name, self.expression(value)?)),
                    None => syntax_error(form, "set! target must be a symbol"),
                },
                _ => syntax_error(form, "set! takes a name and a value"),
            },

            "if" => match args {
                [test, consequent] => Ok(make_if(
                    self.expression(test)?,
                    self.expression(consequent)?,
                    Expression::nop(),
                )),
                [test, consequent, alternative] => Ok(make_if(
                    self.expression(test)?,
                    self.expression(consequent)?,
                    self.expression(alternative)?,
                )),
                _ => syntax_error(form, "if takes two or three subforms"),
            },

            "begin" => Ok(make_begin(self.expressions(args)?)),

            "lambda" => match args {
                [formals, body @ ..] if !body.is_empty() => self.lambda(form, formals, body),
                _ => syntax_error(form, "lambda needs formals and a body"),
            },

            "let" => match args {
                [name, ..] if symbol(name).is_some() => {
                    Err(ReadError::UnsupportedForm("named let".to_string()))
                }
                [bindings, body @ ..] if !body.is_empty() => self.let_form(form, bindings, body),
                _ => syntax_error(form, "let needs bindings and a body"),
            },

            "foreign-call" => match args {
                [name, args @ ..] => {
                    let name = match name {
                        Datum::Literal(Literal::Symbol(name))
                        | Datum::Literal(Literal::String(name)) => name.clone(),
                        _ => return syntax_error(form, "foreign-call needs a name"),
                    };
                    Ok(make_foreign_call(name, self.expressions(args)?))
                }
                _ => syntax_error(form, "foreign-call needs a name"),
            },

            _ if DERIVED_FORMS.contains(&keyword) => {
                Err(ReadError::UnsupportedForm(keyword.to_string()))
            }

            _ => match lookup_primitive(keyword) {
                Some(prim) => {
                    if !prim.arity.accepts(args.len()) {
                        return Err(ReadError::Arity {
                            name: keyword.to_string(),
                            argc: args.len(),
                        });
                    }
                    Ok(make_prim_call(keyword, self.expressions(args)?))
                }
                None => Ok(make_fun_call(
                    make_variable(keyword),
                    self.expressions(args)?,
                )),
            },
        }
    }

    fn body(&mut self, body: &[Datum]) -> Result<Expression, ReadError> {
        match body {
            [expr] => self.expression(expr),
            _ => Ok(make_begin(self.expressions(body)?)),
        }
    }

    fn lambda(
        &mut self,
        form: &Datum,
        formals: &Datum,
        body: &[Datum],
    ) -> Result<Expression, ReadError> {
        let mut params = Vec::new();
        let mut variable_arity = false;

        match formals {
            Datum::Literal(Literal::Symbol(rest)) => {
                params.push(rest.clone());
                variable_arity = true;
            }
            Datum::Literal(Literal::Nil) => {}
            Datum::List(items, tail) => {
                for item in items {
                    match symbol(item) {
                        Some(name) => params.push(name.to_string()),
                        None => return syntax_error(form, "formals must be symbols"),
                    }
                }
                if let Some(tail) = tail {
                    match symbol(tail) {
                        Some(rest) => {
                            params.push(rest.to_string());
                            variable_arity = true;
                        }
                        None => return syntax_error(form, "rest formal must be a symbol"),
                    }
                }
            }
            _ => return syntax_error(form, "bad formals"),
        }

        let depth = self.scope.len();
        self.scope.extend(params.iter().cloned());
        let body = self.body(body);
        self.scope.truncate(depth);

        Ok(make_lambda(params, variable_arity, body?))
    }

    fn let_form(
        &mut self,
        form: &Datum,
        bindings: &Datum,
        body: &[Datum],
    ) -> Result<Expression, ReadError> {
        let Some(items) = list_items(bindings) else {
            return syntax_error(form, "let bindings must be a list");
        };

        let mut names = Vec::with_capacity(items.len());
        let mut inits = Vec::with_capacity(items.len());
        for binding in items {
            match list_items(binding) {
                Some([name, init]) => match symbol(name) {
                    Some(name) => {
                        names.push(name.to_string());
                        inits.push(self.expression(init)?);
                    }
                    None => return syntax_error(form, "let binding must bind a symbol"),
                },
                _ => return syntax_error(form, "let binding must be (name init)"),
            }
        }

        let depth = self.scope.len();
        self.scope.extend(names.iter().cloned());
        let body = self.body(body);
        self.scope.truncate(depth);

        Ok(make_let(names.into_iter().zip(inits).collect(), body?))
    }
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(source: &str) -> Expression {
        read_expression(source).unwrap()
    }

    #[test]
    fn test_literals() {
        assert_eq!(read("15"), make_fixnum(15));
        assert_eq!(read("#t"), make_boolean(true));
        assert_eq!(read("#\\a"), make_literal(Literal::Character('a')));
        assert_eq!(read("\"hi\""), make_literal(Literal::String("hi".to_string())));
        assert_eq!(read("x"), make_variable("x"));
    }

    #[test]
    fn test_primitive_and_procedure_calls() {
        let expr = read("(+ 22 (f x) 33 (g y))");
        assert_eq!(expr.to_string(), "(primcall + 22 (f x) 33 (g y))");

        let ExprKind::PrimitiveCall { args, .. } = &expr.kind else {
            panic!("expected primcall, got {}", expr)
        };
        assert!(args[1].is_fun_call());
    }

    #[test]
    fn test_local_binding_shadows_primitive() {
        let expr = read("(lambda (car) (car 1))");
        assert_eq!(expr.to_string(), "(lambda (car) (begin (car 1)))");

        let ExprKind::Lambda { body, .. } = &expr.kind else {
            panic!("expected lambda")
        };
        let ExprKind::Begin(body) = &body.kind else {
            panic!("expected begin")
        };
        assert!(body[0].is_fun_call());

        // The binding ends with the lambda.
        let expr = read("(begin (lambda (car) car) (car x))");
        let ExprKind::Begin(body) = &expr.kind else {
            panic!("expected begin")
        };
        assert!(matches!(body[1].kind, ExprKind::PrimitiveCall { .. }));
    }

    #[test]
    fn test_special_forms() {
        assert_eq!(read("(if a b)").to_string(), "(if a b #<nop>)");
        assert_eq!(read("(set! x 1)").to_string(), "(set! x 1)");
        assert_eq!(read("(quote (a . b))").to_string(), "(quote (a . b))");
        assert_eq!(
            read("(lambda (a . rest) a)").to_string(),
            "(lambda (a . rest) (begin a))"
        );
        assert_eq!(read("(lambda args args)").to_string(), "(lambda args (begin args))");
        assert_eq!(
            read("(let ((x 1) (y 2)) x y)").to_string(),
            "(let ((x 1) (y 2)) (begin x y))"
        );
        assert_eq!(
            read("(foreign-call \"puts\" s)").to_string(),
            "(foreign-call puts s)"
        );
    }

    #[test]
    fn test_rejected_forms() {
        assert_eq!(
            read_expression("(let* ((x 1)) x)"),
            Err(ReadError::UnsupportedForm("let*".to_string()))
        );
        assert_eq!(
            read_expression("(let loop ((i 0)) i)"),
            Err(ReadError::UnsupportedForm("named let".to_string()))
        );
        assert_eq!(
            read_expression("(car 1 2)"),
            Err(ReadError::Arity {
                name: "car".to_string(),
                argc: 2
            })
        );
        assert!(matches!(
            read_expression("(if)"),
            Err(ReadError::Syntax { .. })
        ));
        assert!(matches!(read_expression("()"), Err(ReadError::Syntax { .. })));
        assert_eq!(read_expression("1 2"), Err(ReadError::ExpressionCount(2)));
    }

    #[test]
    fn test_program() {
        let program = read_program("(set! x 1) (f x)").unwrap();
        assert_eq!(program.forms.len(), 2);
        assert!(program.forms[1].is_fun_call());

        assert!(matches!(read_program("(+ 1"), Err(ReadError::Parse(_))));
    }
}
