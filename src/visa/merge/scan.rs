use super::bundle::Bundle;
use crate::config::target::TargetConfig;
use crate::visa::{BasicBlock, DeclTable, Inst, Operand};

/// Whether `inst` can take part in a scalar-merge bundle at all.
pub fn is_merge_candidate(inst: &Inst, target: &TargetConfig, in_simd_flow: bool) -> bool {
    if !target.merge_enabled
        || inst.exec_size != 1
        || !inst.opcode.is_mergeable()
        || inst.predicate.is_some()
        || inst.cond_mod.is_some()
    {
        return false;
    }
    if !matches!(inst.dst, Operand::Region(_)) || inst.srcs.iter().any(Operand::is_indirect) {
        return false;
    }
    // Inside divergent flow only NoMask instructions have every lane enabled.
    if in_simd_flow && !inst.no_mask {
        return false;
    }
    // Two lanes of the widest operand must fit the operand limit.
    widest_elem(inst) * 2 <= target.max_operand_bytes()
}

fn widest_elem(inst: &Inst) -> u32 {
    std::iter::once(&inst.dst)
        .chain(inst.srcs.iter())
        .map(|op| op.ty().size())
        .max()
        .unwrap_or(1)
}

/// Largest bundle the target can hold for instructions shaped like `seed`.
pub fn bundle_limit(seed: &Inst, target: &TargetConfig) -> usize {
    let by_size = (target.max_operand_bytes() / widest_elem(seed)) as usize;
    target.bundle_limit().min(by_size).max(1)
}

/// Lazily yields one bundle per maximal run of mergeable instructions.
///
/// Each bundle is trimmed to a power-of-two length; the instructions it
/// gives up are scanned again. Call [`Scanner::restart`] to resume from any
/// position, e.g. after a merge failure.
///
/// Bundles borrow the block only, so the declaration table is free again once
/// the scanner is no longer used.
pub struct Scanner<'a, 'd> {
    block: &'a BasicBlock,
    decls: &'d DeclTable,
    target: &'d TargetConfig,
    cursor: usize,
}

impl<'a, 'd> Scanner<'a, 'd> {
    pub fn new(block: &'a BasicBlock, decls: &'d DeclTable, target: &'d TargetConfig) -> Self {
        Self::starting_at(block, decls, target, 0)
    }

    pub fn starting_at(
        block: &'a BasicBlock,
        decls: &'d DeclTable,
        target: &'d TargetConfig,
        cursor: usize,
    ) -> Self {
        Self {
            block,
            decls,
            target,
            cursor,
        }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn restart(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    fn candidate(&self, inst: &Inst) -> bool {
        is_merge_candidate(inst, self.target, self.block.in_simd_flow)
    }

    fn grow(&self, start: usize) -> Bundle<'a> {
        let insts = &self.block.insts;
        let seed = &insts[start];
        let mut bundle = Bundle::new(seed, start, bundle_limit(seed, self.target));
        for inst in &insts[start + 1..] {
            if !self.candidate(inst) || !bundle.can_merge(inst, self.decls) {
                break;
            }
            if bundle.append_inst(inst, self.decls).is_err() {
                break;
            }
        }
        while !bundle.len().is_power_of_two() {
            bundle.delete_last_inst();
        }
        bundle
    }
}

impl<'a> Iterator for Scanner<'a, '_> {
    type Item = Bundle<'a>;

    fn next(&mut self) -> Option<Bundle<'a>> {
        let insts = &self.block.insts;
        while self.cursor < insts.len() {
            let start = self.cursor;
            if !self.candidate(&insts[start]) {
                self.cursor += 1;
                continue;
            }
            let bundle = self.grow(start);
            if bundle.len() >= 2 {
                self.cursor = start + bundle.len();
                tracing::trace!(
                    block = %self.block.name,
                    start,
                    width = bundle.len(),
                    "bundle found"
                );
                return Some(bundle);
            }
            self.cursor += 1;
        }
        None
    }
}
