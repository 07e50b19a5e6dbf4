use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use fp51::verify::{self, Outcome};

fn main() -> ExitCode {
    // the kernel is only correct on a correctly rounded fma; refuse to run
    // the trials on anything else
    if let Err(err) = fp51::self_check() {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let outcome = match verify::run(verify::DEFAULT_TRIALS, 0, &mut out) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("report write failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    if out.flush().is_err() {
        return ExitCode::FAILURE;
    }

    match outcome {
        Outcome::Pass { .. } => ExitCode::SUCCESS,
        Outcome::Fail(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
