use std::{ffi::OsString, path::PathBuf};

use crate::error::OptionsError;

pub const USAGE: &str = "\
Usage: capy-cps [options] <input file>
Options:
  -h, --help: Print this help message
  --no-cps: Print the forms without converting them
  --verify: Check that every converted form only makes tail calls
  --no-verify: Skip the tail call check (default in release builds)
  --jobs <n>: Convert top-level forms on <n> threads (default: 1)
  --width <n>: Line width of the printed forms (default: 80)";

pub struct CompilerOptions {
    pub cps: bool,
    pub verify: bool,
    pub jobs: usize,
    pub width: usize,
    pub help: bool,
    pub filename: Option<PathBuf>,
}

impl CompilerOptions {
    pub fn new() -> Self {
        CompilerOptions {
            cps: true,
            verify: cfg!(debug_assertions),
            jobs: 1,
            width: 80,
            help: false,
            filename: None,
        }
    }

    pub fn set_cps(&mut self, cps: bool) {
        self.cps = cps;
    }

    pub fn set_verify(&mut self, verify: bool) {
        self.verify = verify;
    }

    pub fn set_jobs(&mut self, jobs: usize) {
        self.jobs = jobs;
    }

    pub fn set_width(&mut self, width: usize) {
        self.width = width;
    }

    pub fn parse() -> Result<Self, OptionsError> {
        parse(pico_args::Arguments::from_env())
    }

    pub fn from_vec(args: Vec<OsString>) -> Result<Self, OptionsError> {
        parse(pico_args::Arguments::from_vec(args))
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self::new()
    }
}

fn parse(mut args: pico_args::Arguments) -> Result<CompilerOptions, OptionsError> {
    let mut options = CompilerOptions::new();

    if args.contains(["-h", "--help"]) {
        options.help = true;
        return Ok(options);
    }

    if args.contains("--no-cps") {
        options.set_cps(false);
    }

    if args.contains("--verify") {
        options.set_verify(true);
    }

    if args.contains("--no-verify") {
        options.set_verify(false);
    }

    if let Some(jobs) = args.opt_value_from_str::<_, usize>("--jobs")? {
        if jobs == 0 {
            return Err(OptionsError::ZeroJobs);
        }
        options.set_jobs(jobs);
    }

    if let Some(width) = args.opt_value_from_str::<_, usize>("--width")? {
        options.set_width(width);
    }

    options.filename = args.opt_free_from_str::<PathBuf>()?;

    let rest = args.finish();
    if !rest.is_empty() {
        return Err(OptionsError::Unexpected(rest));
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_defaults() {
        let options = CompilerOptions::from_vec(args(&["input.scm"])).unwrap();
        assert!(options.cps);
        assert_eq!(options.verify, cfg!(debug_assertions));
        assert_eq!(options.jobs, 1);
        assert_eq!(options.width, 80);
        assert_eq!(options.filename, Some(PathBuf::from("input.scm")));
    }

    #[test]
    fn test_flags() {
        let options = CompilerOptions::from_vec(args(&[
            "--no-cps",
            "--no-verify",
            "--jobs",
            "4",
            "--width",
            "120",
            "x.scm",
        ]))
        .unwrap();
        assert!(!options.cps);
        assert!(!options.verify);
        assert_eq!(options.jobs, 4);
        assert_eq!(options.width, 120);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            CompilerOptions::from_vec(args(&["--jobs", "0"])),
            Err(OptionsError::ZeroJobs)
        ));
        assert!(matches!(
            CompilerOptions::from_vec(args(&["--jobs", "many"])),
            Err(OptionsError::Args(_))
        ));
        assert!(matches!(
            CompilerOptions::from_vec(args(&["a.scm", "b.scm"])),
            Err(OptionsError::Unexpected(_))
        ));
    }

    #[test]
    fn test_help() {
        assert!(CompilerOptions::from_vec(args(&["-h"])).unwrap().help);
    }
}
