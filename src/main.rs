mod cli;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "genlower",
    version,
    about = "vISA scalar merge, work-item lowering and debug-data inspection"
)]
struct Cli {
    /// Log pass decisions at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge scalar instructions of a textual vISA kernel into vector ones
    Merge(cli::merge::MergeArgs),
    /// Show how a work-item builtin lowers
    LowerWi(cli::lower_wi::LowerWiArgs),
    /// Print the stack-call side-buffer layout
    Layout,
    /// Decode a debug-data container
    DebugData(cli::debug_data::DebugDataArgs),
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Merge(args) => cli::merge::cmd_merge(args),
        Command::LowerWi(args) => cli::lower_wi::cmd_lower_wi(args),
        Command::Layout => cli::layout::cmd_layout(),
        Command::DebugData(args) => cli::debug_data::cmd_debug_data(args),
    }
}
