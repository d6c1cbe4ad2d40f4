use std::process::ExitCode;

use clap::Parser;
use wskit_cli::Cli;

fn main() -> ExitCode {
    Cli::parse().run()
}
