use std::fmt;

use serde::Serialize;

use crate::visa::{DeclTable, Operand, Region};

/// How an operand of one instruction relates to the corresponding operand
/// of the next instruction in a bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperandPattern {
    /// Shape cannot be compared (indirect, type or modifier mismatch).
    Unknown,
    /// Same location or same immediate.
    Identical,
    /// Next location, exactly one element past the previous one.
    Contiguous,
    /// Anything else.
    Disjoint,
}

impl OperandPattern {
    pub fn name(self) -> &'static str {
        match self {
            OperandPattern::Unknown => "UNKNOWN",
            OperandPattern::Identical => "IDENTICAL",
            OperandPattern::Contiguous => "CONTIGUOUS",
            OperandPattern::Disjoint => "DISJOINT",
        }
    }

    /// Patterns a bundle can be built from.
    pub fn is_mergeable(self) -> bool {
        matches!(self, OperandPattern::Identical | OperandPattern::Contiguous)
    }
}

impl fmt::Display for OperandPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify `b` relative to `a`.
pub fn classify(a: &Operand, b: &Operand, decls: &DeclTable) -> OperandPattern {
    if a.is_indirect() || b.is_indirect() || a.ty() != b.ty() {
        return OperandPattern::Unknown;
    }
    match (a, b) {
        (Operand::Imm { value: va, .. }, Operand::Imm { value: vb, .. }) => {
            if va == vb {
                OperandPattern::Identical
            } else {
                OperandPattern::Disjoint
            }
        }
        (Operand::Region(ra), Operand::Region(rb)) => classify_regions(ra, rb, decls),
        _ => OperandPattern::Disjoint,
    }
}

fn classify_regions(a: &Region, b: &Region, decls: &DeclTable) -> OperandPattern {
    if a.modifier != b.modifier {
        return OperandPattern::Unknown;
    }
    let (Some((base_a, off_a)), Some((base_b, off_b))) =
        (decls.locate(a.decl, a.offset), decls.locate(b.decl, b.offset))
    else {
        return OperandPattern::Unknown;
    };
    if base_a != base_b {
        return OperandPattern::Disjoint;
    }
    if off_a == off_b {
        return OperandPattern::Identical;
    }
    match off_a.checked_add(a.ty.size()) {
        Some(next) if next == off_b => OperandPattern::Contiguous,
        Some(_) => OperandPattern::Disjoint,
        None => OperandPattern::Unknown,
    }
}

/// Whether two regions, each accessed with `exec_size` channels, share a byte.
///
/// Locals only alias themselves; inputs share the GRF base. Positions that
/// overflow are treated as overlapping.
pub fn overlaps(a: &Region, a_exec: u8, b: &Region, b_exec: u8, decls: &DeclTable) -> bool {
    let (Some((base_a, start_a)), Some((base_b, start_b))) =
        (decls.locate(a.decl, a.offset), decls.locate(b.decl, b.offset))
    else {
        return true;
    };
    if base_a != base_b {
        return false;
    }
    match (
        start_a.checked_add(a.byte_len(a_exec)),
        start_b.checked_add(b.byte_len(b_exec)),
    ) {
        (Some(end_a), Some(end_b)) => start_a < end_b && start_b < end_a,
        _ => true,
    }
}
