use std::path::PathBuf;
use std::process;

use clap::Args;

use super::{load_target, read_source, write_output};

#[derive(Args)]
pub struct MergeArgs {
    /// Input .visa kernel
    pub input: PathBuf,
    /// Target platform (e.g. skl, tgllp, pvc) or a target .toml file
    #[arg(long, default_value = "skl")]
    pub target: String,
    /// Print the merge report as JSON instead of the rewritten kernel
    #[arg(long)]
    pub json: bool,
    /// Dump every bundle found before merging (to stderr)
    #[arg(long)]
    pub bundles: bool,
    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn cmd_merge(args: MergeArgs) {
    let MergeArgs {
        input,
        target,
        json,
        bundles,
        output,
    } = args;
    let target = load_target(&target);
    let source = read_source(&input);
    let filename = input.display().to_string();

    let Ok(mut kernel) = genlower::parse_source(&source, &filename) else {
        process::exit(1);
    };
    if bundles {
        eprint!("{}", genlower::bundle_dump(&kernel, &target));
    }
    let report = genlower::visa::merge::merge_scalar(&mut kernel, &target);

    let text = if json {
        match serde_json::to_string_pretty(&report) {
            Ok(mut s) => {
                s.push('\n');
                s
            }
            Err(e) => {
                eprintln!("error: cannot serialize merge report: {}", e);
                process::exit(1);
            }
        }
    } else {
        kernel.to_string()
    };
    write_output(output.as_deref(), &text);

    if !json {
        eprintln!(
            "merged {} bundle(s) on {}: {} -> {} instructions",
            report.merged_count(),
            target.display_name,
            report.insts_before,
            report.insts_after
        );
        for r in &report.rejected {
            eprintln!(
                "warning: {}:{} ({} instructions) not merged: {}",
                r.block, r.start, r.width, r.reason
            );
        }
    }
}
