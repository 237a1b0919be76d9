use std::process;

use clap::Args;

use genlower::wi::WorkItemFn;

use super::load_target;

#[derive(Args)]
pub struct LowerWiArgs {
    /// Builtin name, with or without the `__builtin_IB_get_` prefix
    pub intrinsic: String,
    /// Dimension argument for builtins that take one
    #[arg(long)]
    pub dim: Option<u32>,
    /// Lower under the stack-call convention
    #[arg(long)]
    pub stack_call: bool,
    /// Target platform (e.g. skl, tgllp, pvc) or a target .toml file
    #[arg(long, default_value = "skl")]
    pub target: String,
}

fn lookup(name: &str) -> Option<WorkItemFn> {
    WorkItemFn::from_name(name)
        .or_else(|| WorkItemFn::from_name(&format!("__builtin_IB_get_{}", name)))
}

pub fn cmd_lower_wi(args: LowerWiArgs) {
    let Some(wi) = lookup(&args.intrinsic) else {
        eprintln!("error: unknown work-item builtin '{}'", args.intrinsic);
        let names: Vec<&str> = WorkItemFn::ALL
            .iter()
            .map(|f| f.name().trim_start_matches("__builtin_IB_get_"))
            .collect();
        eprintln!("help: known builtins: {}", names.join(", "));
        process::exit(1);
    };
    if wi.takes_dim() && args.dim.is_none() {
        eprintln!("error: {} takes a dimension; pass --dim", wi.name());
        process::exit(1);
    }
    let dim = if wi.takes_dim() { args.dim } else { None };

    let target = load_target(&args.target);
    let (func, report) = genlower::lower_work_item(wi, dim, args.stack_call, &target);
    print!("{}", func);
    eprintln!(
        "{} lowered under the {} convention ({} instructions)",
        wi.name(),
        report.convention,
        func.len()
    );
}
