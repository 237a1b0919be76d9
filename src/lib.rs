pub mod config;
pub mod debuginfo;
pub mod diagnostic;
pub mod span;
pub mod visa;
pub mod wi;

pub use config::target;

use std::fmt::Write as _;

use diagnostic::{render_diagnostics, Diagnostic};
use target::TargetConfig;
use visa::merge::{merge_scalar, MergeReport, Scanner};
use visa::Kernel;
use wi::{Function, ResolveReport, Type, WorkItemFn};

/// Parse a textual vISA kernel, rendering any diagnostics to stderr.
pub fn parse_source(source: &str, filename: &str) -> Result<Kernel, Vec<Diagnostic>> {
    visa::parser::parse_kernel(source).inspect_err(|errors| {
        render_diagnostics(errors, filename, source);
    })
}

/// Parse a kernel and run scalar merge over it.
pub fn merge_source(
    source: &str,
    filename: &str,
    target: &TargetConfig,
) -> Result<(Kernel, MergeReport), Vec<Diagnostic>> {
    let mut kernel = parse_source(source, filename)?;
    let report = merge_scalar(&mut kernel, target);
    Ok((kernel, report))
}

/// The bundles scalar merge would close in each block, without merging.
pub fn bundle_dump(kernel: &Kernel, target: &TargetConfig) -> String {
    let mut out = String::new();
    for block in &kernel.blocks {
        let _ = writeln!(out, "block {}", block.name);
        for bundle in Scanner::new(block, &kernel.decls, target) {
            let _ = write!(out, "{}", bundle.display(&kernel.decls));
        }
    }
    out
}

/// Build a one-call kernel for `wi`, resolve it and return the result.
///
/// Panics when `wi` takes a dimension and none is given.
pub fn lower_work_item(
    wi: WorkItemFn,
    dim: Option<u32>,
    stack_call: bool,
    target: &TargetConfig,
) -> (Function, ResolveReport) {
    let ret = match wi {
        WorkItemFn::SyncBuffer => Type::Ptr,
        _ => Type::I32,
    };
    let (mut func, table) = wi::single_call_kernel(wi, dim, ret, stack_call, target.grf_size);
    let report = wi::resolve_work_items(&mut func, &table, target);
    (func, report)
}
