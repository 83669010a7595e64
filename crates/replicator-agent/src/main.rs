use std::io::{self, Write};
use std::process::ExitCode;

use replicator_agent::{LaunchError, run_agent};
use replicator_config::{PROGRAM_NAME, ResolveError};

fn main() -> ExitCode {
    match run_agent() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(&error),
    }
}

fn report(error: &LaunchError) -> ExitCode {
    if let Some(resolve_error) = error.resolve_error() {
        if let ResolveError::Flags { source } = resolve_error {
            // clap renders usage, help and parse errors itself.
            let _ = source.print();
            return if resolve_error.is_informational() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    }
    let _ = writeln!(io::stderr(), "{PROGRAM_NAME}: {error}");
    ExitCode::FAILURE
}
