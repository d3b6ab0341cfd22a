use std::io::Write;
use std::process::ExitCode;

use capy_cps::{
    compiler::{read_program, try_convert_program},
    CompilerOptions,
};
use termcolor::{ColorChoice, StandardStream};

fn main() -> ExitCode {
    env_logger::init();

    let options = match CompilerOptions::parse() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("capy-cps: {}", e);
            eprintln!("{}", capy_cps::options::USAGE);
            return ExitCode::from(2);
        }
    };

    if options.help {
        println!("{}", capy_cps::options::USAGE);
        return ExitCode::SUCCESS;
    }

    let Some(filename) = options.filename.as_ref() else {
        eprintln!("{}", capy_cps::options::USAGE);
        return ExitCode::from(2);
    };

    let source = match std::fs::read_to_string(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("capy-cps: error reading file {}: {}", filename.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut program = match read_program(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("capy-cps: {}: {}", filename.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = try_convert_program(&mut program, &options) {
        eprintln!("capy-cps: {}: {}", filename.display(), e);
        return ExitCode::FAILURE;
    }

    let mut out = StandardStream::stdout(ColorChoice::Auto);
    for form in program.top_level_forms() {
        let printed = form
            .pretty_print(&mut out, options.width)
            .and_then(|_| writeln!(out));

        if let Err(e) = printed {
            eprintln!("capy-cps: {}", e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
