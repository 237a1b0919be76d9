use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::bundle::Bundle;
use super::pattern::OperandPattern;
use crate::config::target::TargetConfig;
use crate::visa::{Base, DeclId, DeclKind, DeclTable, Declaration, Inst, Operand, Region};

/// Operand position inside an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Dst,
    Src(usize),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Dst => f.write_str("dst"),
            Slot::Src(i) => write!(f, "src{}", i),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("bundle of {0} instruction(s) cannot be merged")]
    BadWidth(usize),
    #[error("{slot} operand pattern {pattern} cannot be vectorized")]
    Pattern { slot: Slot, pattern: OperandPattern },
    #[error("{slot} spans {bytes} bytes, more than the {limit}-byte operand limit")]
    TooWide { slot: Slot, bytes: u32, limit: u32 },
    #[error("{slot} crosses a GRF boundary but starts at byte {start} ({grf}-byte GRF)")]
    Misaligned { slot: Slot, start: u32, grf: u32 },
    #[error("{slot} would run past the end of {decl} ({size} bytes)")]
    OutOfBounds { slot: Slot, decl: String, size: u32 },
    #[error("{slot} lies beyond the addressable register file")]
    Unaddressable { slot: Slot },
    #[error("invalid target: {0}")]
    Target(String),
}

/// Result of merging one bundle.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    pub inst: Inst,
    /// Declarations now accessed through a wider region.
    pub modified: BTreeSet<DeclId>,
    /// Input declarations this merge created to cover several adjacent inputs.
    pub new_inputs: Vec<DeclId>,
}

/// How one widened region will be addressed.
enum Plan {
    Keep(Region),
    NewInput { region: Region, grf_offset: u32 },
}

/// Build one vector instruction from `bundle`.
///
/// Validates every operand against the target before touching `decls`, so
/// an error leaves the declaration table as it was. `merged_inputs` holds
/// the inputs earlier merges of the kernel created; a packed input region
/// already covered by one of them is addressed through it.
pub fn do_merge(
    bundle: &Bundle<'_>,
    decls: &mut DeclTable,
    merged_inputs: &mut Vec<DeclId>,
    target: &TargetConfig,
) -> Result<MergeOutcome, SynthesisError> {
    target.validate().map_err(SynthesisError::Target)?;
    let n = bundle.len();
    if n < 2 || !n.is_power_of_two() {
        return Err(SynthesisError::BadWidth(n));
    }
    let seed = bundle.first();
    let width = n as u32;

    let dst_column: Vec<&Operand> = bundle.insts().iter().map(|i| &i.dst).collect();
    let dst_plan = match bundle.dst_pattern() {
        Some(OperandPattern::Contiguous) => {
            plan_contiguous(Slot::Dst, &dst_column, width, decls, target)?
        }
        other => {
            return Err(SynthesisError::Pattern {
                slot: Slot::Dst,
                pattern: other.unwrap_or(OperandPattern::Unknown),
            })
        }
    };

    let mut src_plans = Vec::with_capacity(seed.num_srcs());
    for pos in 0..seed.num_srcs() {
        let slot = Slot::Src(pos);
        let column: Vec<&Operand> = bundle.insts().iter().map(|i| &i.srcs[pos]).collect();
        let plan = match (bundle.src_pattern(pos), column[0]) {
            (Some(OperandPattern::Identical), Operand::Imm { .. }) => SrcPlan::Imm(*column[0]),
            (Some(OperandPattern::Identical), Operand::Region(r)) => {
                SrcPlan::Region(Plan::Keep(Region { stride: 0, ..*r }))
            }
            (Some(OperandPattern::Contiguous), Operand::Region(_)) => {
                SrcPlan::Region(plan_contiguous(slot, &column, width, decls, target)?)
            }
            (pattern, _) => {
                return Err(SynthesisError::Pattern {
                    slot,
                    pattern: pattern.unwrap_or(OperandPattern::Unknown),
                })
            }
        };
        src_plans.push(plan);
    }

    // Everything fits; now commit.
    let mut outcome_modified = BTreeSet::new();
    let mut created: Vec<DeclId> = Vec::new();
    let mut realize = |plan: Plan, decls: &mut DeclTable| -> Region {
        match plan {
            Plan::Keep(region) => {
                if region.stride != 0 {
                    outcome_modified.insert(region.decl);
                }
                region
            }
            Plan::NewInput { region, grf_offset } => {
                let existing = merged_inputs.iter().copied().find(|&id| {
                    let d = decls.get(id);
                    d.kind == DeclKind::Input { offset: grf_offset }
                        && d.ty == region.ty
                        && d.num_elems == width
                });
                let id = existing.unwrap_or_else(|| {
                    let name = decls.fresh_name("MI");
                    let id = decls.add(Declaration::input(name, region.ty, width, grf_offset));
                    merged_inputs.push(id);
                    created.push(id);
                    id
                });
                outcome_modified.insert(id);
                Region {
                    decl: id,
                    offset: 0,
                    ..region
                }
            }
        }
    };

    let dst = Operand::Region(realize(dst_plan, decls));
    let srcs = src_plans
        .into_iter()
        .map(|plan| match plan {
            SrcPlan::Imm(op) => op,
            SrcPlan::Region(plan) => Operand::Region(realize(plan, decls)),
        })
        .collect();

    let inst = Inst {
        exec_size: n as u8,
        dst,
        srcs,
        ..seed.clone()
    };
    Ok(MergeOutcome {
        inst,
        modified: outcome_modified,
        new_inputs: created,
    })
}

enum SrcPlan {
    Imm(Operand),
    Region(Plan),
}

/// Plan a unit-stride region covering a contiguous column of operands.
fn plan_contiguous(
    slot: Slot,
    column: &[&Operand],
    width: u32,
    decls: &DeclTable,
    target: &TargetConfig,
) -> Result<Plan, SynthesisError> {
    let Some(&first) = column[0].as_region() else {
        return Err(SynthesisError::Pattern {
            slot,
            pattern: OperandPattern::Disjoint,
        });
    };
    let bytes = width * first.ty.size();
    let limit = target.max_operand_bytes();
    if bytes > limit {
        return Err(SynthesisError::TooWide { slot, bytes, limit });
    }

    let Some((base, start)) = decls.locate(first.decl, first.offset) else {
        return Err(SynthesisError::Unaddressable { slot });
    };
    let Some(end) = start.checked_add(bytes) else {
        return Err(SynthesisError::Unaddressable { slot });
    };
    let grf = target.grf_size;
    let crosses = start / grf != (end - 1) / grf;
    if crosses && start % grf != 0 {
        return Err(SynthesisError::Misaligned { slot, start, grf });
    }

    let region = Region {
        stride: 1,
        ..first
    };
    let single_decl = column
        .iter()
        .all(|op| op.as_region().is_some_and(|r| r.decl == first.decl));
    if single_decl {
        let decl = decls.get(first.decl);
        let fits = first
            .offset
            .checked_add(bytes)
            .is_some_and(|reach| reach <= decl.byte_size());
        if !fits {
            return Err(SynthesisError::OutOfBounds {
                slot,
                decl: decl.name.clone(),
                size: decl.byte_size(),
            });
        }
        return Ok(Plan::Keep(region));
    }
    // Different declarations only compare contiguous when they are inputs.
    debug_assert_eq!(base, Base::Grf);
    Ok(Plan::NewInput {
        region,
        grf_offset: start,
    })
}
