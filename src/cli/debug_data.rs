use std::path::PathBuf;
use std::process;

use clap::Args;

#[derive(Args)]
pub struct DebugDataArgs {
    /// Debug-data container (either layout)
    pub input: PathBuf,
}

pub fn cmd_debug_data(args: DebugDataArgs) {
    let bytes = match std::fs::read(&args.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };
    match genlower::debuginfo::decode(&bytes) {
        Ok(data) => print!("{}", data),
        Err(e) => {
            eprintln!("error: {}: {}", args.input.display(), e);
            process::exit(1);
        }
    }
}
