use std::process::ExitCode;

fn main() -> ExitCode {
    match mpdata::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
