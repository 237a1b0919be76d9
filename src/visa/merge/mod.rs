//! Scalar merge: folds runs of scalar instructions with matching operand
//! access patterns into single vector instructions.
//!
//! The scanner walks each block, growing a [`Bundle`] from every merge
//! candidate while the [`pattern`] classifier keeps each operand position
//! identical or contiguous. A closed bundle goes to [`do_merge`], and the
//! resulting instruction replaces the run in place.

pub mod bundle;
pub mod pattern;
pub mod scan;
pub mod synth;

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::config::target::TargetConfig;
use crate::visa::{DeclId, Kernel, Opcode};

pub use bundle::{Bundle, BundleFull};
pub use pattern::{classify, OperandPattern};
pub use scan::{is_merge_candidate, Scanner};
pub use synth::{do_merge, MergeOutcome, Slot, SynthesisError};

/// One bundle that became a vector instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeRecord {
    pub block: String,
    /// Position of the first merged instruction in the block, before merging.
    pub start: usize,
    pub width: usize,
    pub opcode: Opcode,
}

/// A bundle the target could not hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub block: String,
    pub start: usize,
    pub width: usize,
    pub reason: String,
}

/// Summary of one scalar-merge run over a kernel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub kernel: String,
    pub merged: Vec<MergeRecord>,
    /// Declarations now accessed through wider regions.
    pub modified: Vec<String>,
    /// Input declarations created by merges.
    pub new_inputs: Vec<String>,
    /// Declarations no instruction references any more.
    pub dead_decls: Vec<String>,
    pub rejected: Vec<Rejection>,
    pub insts_before: usize,
    pub insts_after: usize,
}

impl MergeReport {
    pub fn merged_count(&self) -> usize {
        self.merged.len()
    }
}

/// Run scalar merge over every block of `kernel`.
pub fn merge_scalar(kernel: &mut Kernel, target: &TargetConfig) -> MergeReport {
    let mut report = MergeReport {
        kernel: kernel.name.clone(),
        insts_before: kernel.inst_count(),
        ..MergeReport::default()
    };
    if !target.merge_enabled {
        tracing::debug!(kernel = %kernel.name, target = %target.name, "scalar merge disabled");
        report.insts_after = report.insts_before;
        return report;
    }
    if let Err(msg) = target.validate() {
        tracing::warn!(kernel = %kernel.name, target = %target.name, "skipping scalar merge: {}", msg);
        report.insts_after = report.insts_before;
        return report;
    }

    let referenced_before: BTreeSet<DeclId> = kernel
        .decls
        .iter()
        .map(|(id, _)| id)
        .filter(|&id| kernel.references(id))
        .collect();
    let mut modified = BTreeSet::new();
    // Inputs created by merges, shared by every later bundle of the kernel.
    let mut new_inputs = Vec::new();

    let Kernel { decls, blocks, .. } = kernel;
    for block in blocks.iter_mut() {
        let mut cursor = 0;
        // Instructions removed so far; maps block positions back to the input.
        let mut shift = 0;
        loop {
            // The bundle borrows the block, so it is dropped before the splice.
            let (start, width, outcome) = {
                let mut scanner = Scanner::starting_at(block, decls, target, cursor);
                let Some(bundle) = scanner.next() else {
                    break;
                };
                tracing::trace!(bundle = %bundle.display(decls), "closing bundle");
                let outcome = do_merge(&bundle, decls, &mut new_inputs, target);
                (bundle.start(), bundle.len(), outcome)
            };
            match outcome {
                Ok(out) => {
                    let opcode = out.inst.opcode;
                    tracing::debug!(
                        block = %block.name,
                        start = start + shift,
                        width,
                        opcode = %opcode,
                        "merged scalar bundle"
                    );
                    report.merged.push(MergeRecord {
                        block: block.name.clone(),
                        start: start + shift,
                        width,
                        opcode,
                    });
                    modified.extend(out.modified);
                    block
                        .insts
                        .splice(start..start + width, std::iter::once(out.inst));
                    shift += width - 1;
                    cursor = start + 1;
                }
                Err(err) => {
                    tracing::warn!(
                        block = %block.name,
                        start = start + shift,
                        width,
                        error = %err,
                        "scalar bundle rejected"
                    );
                    report.rejected.push(Rejection {
                        block: block.name.clone(),
                        start: start + shift,
                        width,
                        reason: err.to_string(),
                    });
                    cursor = start + width;
                }
            }
        }
    }

    let name = |id: &DeclId| kernel.decls.get(*id).name.clone();
    report.modified = modified.iter().map(name).collect();
    report.new_inputs = new_inputs.iter().map(name).collect();
    report.dead_decls = referenced_before
        .iter()
        .filter(|&&id| !kernel.references(id))
        .map(name)
        .collect();
    report.insts_after = kernel.inst_count();
    tracing::debug!(
        kernel = %kernel.name,
        merged = report.merged.len(),
        before = report.insts_before,
        after = report.insts_after,
        "scalar merge done"
    );
    report
}
