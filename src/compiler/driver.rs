//! Running the CPS pass over a program
//!
//! Every top-level form is converted on its own, with its own name supply and a
//! continuation that halts the program. Forms share nothing, so with `--jobs` above one
//! they are handed out to worker threads. Each worker rewrites its forms in place, which
//! keeps the program in source order.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use parking_lot::Mutex;

use super::cps::convert_toplevel;
use super::tail::{mark_container, mark_tail_positions, only_tail_calls};
use super::tree::{Expression, Program};
use crate::error::CpsError;
use crate::options::CompilerOptions;

/// Converts one top-level form in place and marks its tail positions.
///
/// # Panics
///
/// When the form violates the input invariants, or when `verify` is set and the
/// converted form still contains a call outside tail position.
pub fn convert_form(form: &mut Expression, verify: bool) {
    let size = form.size();
    let names = convert_toplevel(form);

    mark_tail_positions(form, true);

    log::trace!(
        target: "cps",
        "converted form: {} nodes in, {} out, {} continuation names",
        size,
        form.size(),
        names.index()
    );
    if log::log_enabled!(target: "cps", log::Level::Trace) {
        log::trace!(target: "cps", "{}", form);
    }

    if verify {
        assert!(
            only_tail_calls(form),
            "cps: non-tail call left in converted form"
        );
    }
}

/// Converts every top-level form of `program`.
///
/// Does nothing when `options.cps` is off. With `options.jobs` above one the forms are
/// spread over that many scoped threads. A panic in any form is re-raised on the calling
/// thread once all workers are done.
pub fn convert_program(program: &mut Program, options: &CompilerOptions) {
    if !options.cps {
        log::debug!(target: "cps", "CPS conversion disabled");
        return;
    }

    let verify = options.verify;

    mark_container(program);

    let forms = program.top_level_forms_mut();
    let jobs = options.jobs.clamp(1, forms.len().max(1));

    log::debug!(
        target: "cps",
        "converting {} top-level forms on {} thread(s)",
        forms.len(),
        jobs
    );

    if jobs == 1 {
        for form in forms.iter_mut() {
            convert_form(form, verify);
        }
        return;
    }

    let queue = Mutex::new(forms.iter_mut().enumerate());
    let failure: Mutex<Option<(usize, Box<dyn Any + Send>)>> = Mutex::new(None);

    std::thread::scope(|scope| {
        for _ in 0..jobs {
            scope.spawn(|| loop {
                let next = queue.lock().next();
                let Some((index, form)) = next else {
                    break;
                };

                if let Err(payload) =
                    panic::catch_unwind(AssertUnwindSafe(|| convert_form(form, verify)))
                {
                    let mut failure = failure.lock();
                    // Report the earliest failing form, whatever order the workers finish in.
                    if failure.as_ref().map_or(true, |(first, _)| index < *first) {
                        *failure = Some((index, payload));
                    }
                }
            });
        }
    });

    if let Some((index, payload)) = failure.into_inner() {
        log::debug!(target: "cps", "conversion of top-level form {} failed", index);
        panic::resume_unwind(payload);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Like [`convert_program`], but reports a violated invariant as an error instead of
/// unwinding. The program is left partially converted in that case and should be
/// discarded.
pub fn try_convert_program(
    program: &mut Program,
    options: &CompilerOptions,
) -> Result<(), CpsError> {
    panic::catch_unwind(AssertUnwindSafe(|| convert_program(program, options)))
        .map_err(|payload| CpsError::InternalInvariant(panic_message(&*payload)))
}

#[cfg(test)]
mod tests {
    use super::super::tree::*;
    use super::*;

    fn options(jobs: usize) -> CompilerOptions {
        let mut options = CompilerOptions::new();
        options.set_jobs(jobs);
        options.set_verify(true);
        options
    }

    fn program() -> Program {
        Program::new(vec![
            make_fixnum(1),
            make_fun_call(make_variable("f"), vec![make_variable("x")]),
            make_if(
                make_fun_call(make_variable("p"), vec![]),
                make_prim_call("car", vec![make_variable("x")]),
                make_fixnum(0),
            ),
            make_lambda(vec!["y".to_string()], false, make_variable("y")),
        ])
    }

    #[test]
    fn test_forms_are_independent() {
        let mut program = program();
        convert_program(&mut program, &options(1));

        assert_eq!(
            program.forms[0].to_string(),
            "(let ((#%k0 1)) (primcall halt #%k0))"
        );
        // Every form restarts its names.
        assert_eq!(
            program.forms[1].to_string(),
            "(f (lambda (#%k0) (begin (primcall halt #%k0))) x)"
        );
        assert!(program.forms.iter().all(|form| form.tail_position));
        assert!(program.forms.iter().all(only_tail_calls));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut sequential = program();
        convert_program(&mut sequential, &options(1));

        let mut parallel = program();
        convert_program(&mut parallel, &options(3));

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_single_begin_is_split() {
        let mut program = Program::new(vec![make_begin(vec![
            make_fixnum(1),
            make_fun_call(make_variable("f"), vec![]),
        ])]);
        convert_program(&mut program, &options(2));

        let forms = program.top_level_forms();
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[0].to_string(), "(let ((#%k0 1)) (primcall halt #%k0))");
        assert!(program.forms[0].tail_position);
    }

    #[test]
    fn test_disabled() {
        let mut program = program();
        let before = program.clone();

        let mut options = options(1);
        options.set_cps(false);
        convert_program(&mut program, &options);

        assert_eq!(program, before);
    }

    #[test]
    fn test_invariant_violation_is_reported() {
        let letrec = Expression::new(ExprKind::Let {
            kind: BindingKind::LetRec,
            bindings: vec![("x".to_string(), make_fixnum(1))],
            body: Box::new(make_variable("x")),
        });

        for jobs in [1, 2] {
            let mut program = Program::new(vec![make_fixnum(1), letrec.clone()]);
            let err = try_convert_program(&mut program, &options(jobs)).unwrap_err();
            let CpsError::InternalInvariant(message) = err;
            assert!(message.contains("must be lowered"), "{}", message);
        }
    }

    #[test]
    fn test_empty_program() {
        let mut program = Program::default();
        assert_eq!(try_convert_program(&mut program, &options(4)), Ok(()));
    }
}
