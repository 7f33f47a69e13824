use clap::Parser;

use paintcore::cli::{run, CliArgs};
use paintcore::logger;

fn main() -> std::process::ExitCode {
    // Session log (overwrites the previous session's log)
    logger::init();

    let args = CliArgs::parse();
    run(args)
}
