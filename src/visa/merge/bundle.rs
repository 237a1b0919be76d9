use std::fmt;

use arrayvec::ArrayVec;

use super::pattern::{classify, overlaps, OperandPattern};
use crate::config::target::MAX_BUNDLE_SIZE;
use crate::visa::{DeclTable, Inst, MAX_SRCS};

/// Returned by [`Bundle::append_inst`] when the bundle is at its limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("bundle is full ({limit} instructions)")]
pub struct BundleFull {
    pub limit: usize,
}

/// A run of consecutive scalar instructions that can become one vector
/// instruction.
///
/// Each operand position carries one pattern shared by every adjacent pair
/// in the run. Patterns are unset until the second instruction is appended.
#[derive(Clone, Debug)]
pub struct Bundle<'a> {
    start: usize,
    insts: ArrayVec<&'a Inst, MAX_BUNDLE_SIZE>,
    limit: usize,
    dst_pattern: Option<OperandPattern>,
    src_patterns: [Option<OperandPattern>; MAX_SRCS],
}

impl<'a> Bundle<'a> {
    /// Start a bundle at the instruction at `start` in its block.
    pub fn new(seed: &'a Inst, start: usize, limit: usize) -> Self {
        let limit = limit.clamp(1, MAX_BUNDLE_SIZE);
        let mut insts = ArrayVec::new();
        insts.push(seed);
        Self {
            start,
            insts,
            limit,
            dst_pattern: None,
            src_patterns: [None; MAX_SRCS],
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_full(&self) -> bool {
        self.insts.len() >= self.limit
    }

    pub fn insts(&self) -> &[&'a Inst] {
        &self.insts
    }

    pub fn first(&self) -> &'a Inst {
        self.insts[0]
    }

    fn last(&self) -> &'a Inst {
        self.insts[self.insts.len() - 1]
    }

    pub fn dst_pattern(&self) -> Option<OperandPattern> {
        self.dst_pattern
    }

    pub fn src_pattern(&self, pos: usize) -> Option<OperandPattern> {
        self.src_patterns.get(pos).copied().flatten()
    }

    /// The destination of `inst` must continue the run one element past the
    /// last destination. Repeated writes to one location never merge.
    pub fn can_merge_dst(&self, inst: &Inst, decls: &DeclTable) -> bool {
        let pattern = classify(&self.last().dst, &inst.dst, decls);
        pattern == OperandPattern::Contiguous
            && self.dst_pattern.map_or(true, |p| p == pattern)
    }

    /// Source `pos` of `inst` must relate to the last instruction's source
    /// the same way every earlier pair did.
    pub fn can_merge_source(&self, inst: &Inst, pos: usize, decls: &DeclTable) -> bool {
        let (Some(prev), Some(next)) = (self.last().srcs.get(pos), inst.srcs.get(pos)) else {
            return false;
        };
        let pattern = classify(prev, next, decls);
        pattern.is_mergeable() && self.src_pattern(pos).map_or(true, |p| p == pattern)
    }

    pub fn can_merge(&self, inst: &Inst, decls: &DeclTable) -> bool {
        let seed = self.first();
        if self.is_full()
            || inst.opcode != seed.opcode
            || inst.num_srcs() != seed.num_srcs()
            || inst.exec_size != seed.exec_size
            || inst.saturate != seed.saturate
            || inst.no_mask != seed.no_mask
        {
            return false;
        }
        if !self.can_merge_dst(inst, decls) {
            return false;
        }
        if !(0..inst.num_srcs()).all(|pos| self.can_merge_source(inst, pos, decls)) {
            return false;
        }
        !self.reads_bundle_result(inst, decls)
    }

    /// Whether `inst` reads a location written by an instruction already in
    /// the bundle. A merged instruction reads all lanes before writing any.
    fn reads_bundle_result(&self, inst: &Inst, decls: &DeclTable) -> bool {
        inst.srcs.iter().filter_map(|s| s.as_region()).any(|src| {
            self.insts.iter().any(|prev| {
                prev.dst.as_region().is_some_and(|dst| {
                    overlaps(dst, prev.exec_size, src, inst.exec_size, decls)
                })
            })
        })
    }

    /// Append an instruction already accepted by [`Bundle::can_merge`].
    pub fn append_inst(&mut self, inst: &'a Inst, decls: &DeclTable) -> Result<(), BundleFull> {
        if self.is_full() {
            debug_assert!(false, "append to a full bundle (limit {})", self.limit);
            return Err(BundleFull { limit: self.limit });
        }
        let last = self.last();
        self.dst_pattern = Some(classify(&last.dst, &inst.dst, decls));
        for (pos, slot) in self.src_patterns.iter_mut().enumerate() {
            *slot = match (last.srcs.get(pos), inst.srcs.get(pos)) {
                (Some(a), Some(b)) => Some(classify(a, b, decls)),
                _ => None,
            };
        }
        self.insts.push(inst);
        Ok(())
    }

    /// Drop the most recent instruction. The seed is never removed.
    pub fn delete_last_inst(&mut self) -> Option<&'a Inst> {
        if self.insts.len() <= 1 {
            return None;
        }
        let removed = self.insts.pop();
        if self.insts.len() == 1 {
            self.dst_pattern = None;
            self.src_patterns = [None; MAX_SRCS];
        }
        removed
    }

    pub fn display<'b>(&'b self, decls: &'b DeclTable) -> BundleDisplay<'a, 'b> {
        BundleDisplay {
            bundle: self,
            decls,
        }
    }
}

pub struct BundleDisplay<'a, 'b> {
    bundle: &'b Bundle<'a>,
    decls: &'b DeclTable,
}

impl fmt::Display for BundleDisplay<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.bundle;
        let name = |p: Option<OperandPattern>| p.unwrap_or(OperandPattern::Unknown).name();
        writeln!(f, "Bundle:")?;
        writeln!(f, "Dst pattern:\t{}", name(b.dst_pattern))?;
        write!(f, "Src Pattern:\t")?;
        for pos in 0..b.first().num_srcs() {
            write!(f, "{} ", name(b.src_pattern(pos)))?;
        }
        writeln!(f)?;
        for inst in &b.insts {
            writeln!(f, "{}", inst.display(self.decls))?;
        }
        Ok(())
    }
}
