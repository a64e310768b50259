use std::process::ExitCode;

use anyhow::Result;
use modsync_cli::run_cli;

fn main() -> Result<ExitCode> {
    run_cli()
}
