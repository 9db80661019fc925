use std::process::ExitCode;

use clap::Parser;

mod platform;

fn main() -> ExitCode {
    let cli = platform::Cli::parse();
    match platform::run_app(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("research: {err:#}");
            ExitCode::FAILURE
        }
    }
}
