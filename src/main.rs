//! Main entry point for the boot0img CLI tool

use boot0img::cli::{self, Args};
use clap::{CommandFactory, Parser};

fn main() {
    // with no arguments at all, default to the usage help
    if std::env::args().len() <= 1 {
        Args::command().print_help().ok();
        return;
    }

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            e.print().ok();
            std::process::exit(1);
        }
        Err(e) => {
            // --help and --version land here
            e.print().ok();
            return;
        }
    };

    if let Err(e) = cli::run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
