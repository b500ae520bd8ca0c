//! Main entry point for the gen-part partition table generator

use boot0img::genpart::{self, NandTable, PartSpec};
use boot0img::VERSION;
use clap::Parser;
use std::io::{self, Write};

/// Command line arguments for gen-part
#[derive(Parser, Debug)]
#[command(name = "gen-part")]
#[command(version = VERSION)]
#[command(about = "Generate an Allwinner NAND-scheme partition table", long_about = None)]
struct Args {
    /// Global byte offset: primes sequential placement and is
    /// subtracted from absolute @addresses
    #[arg(short, long, default_value = "0")]
    offset: String,

    /// Partition specifications: name[@offset]+len, with k/m/g binary
    /// suffixes or s for 512-byte sectors
    #[arg(value_name = "SPEC", required = true)]
    specs: Vec<String>,
}

fn main() {
    let args = Args::parse();

    let mut specs = Vec::new();
    for arg in &args.specs {
        match PartSpec::parse(arg) {
            Some(spec) => specs.push(spec),
            None => eprintln!("missing length information"),
        }
    }

    let table = NandTable::from_specs(&specs, genpart::parse_size(&args.offset));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = table.write_copies(&mut out).and_then(|()| out.flush()) {
        eprintln!("Error: {}", e);
        std::process::exit(5);
    }
}
