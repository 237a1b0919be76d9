//! vISA: the low-level virtual ISA the backend lowers into.
//!
//! A kernel owns a declaration table and a list of basic blocks; each block
//! owns a flat instruction list. Operands address declarations through
//! register regions (declaration + byte offset + stride + element type).
//!
//! Textual form (parsed by [`parser`], printed by `Display`):
//!
//! ```text
//! kernel add4
//! decl V1 d 4
//! input V2 d 4 at 64
//! block BB0
//!   add (1) V1(0)<1>:d V2(0)<0>:d 1:d
//! ```

pub mod lexer;
pub mod merge;
pub mod parser;

use std::fmt;

use arrayvec::ArrayVec;
use serde::Serialize;

/// Maximum number of source operands of one instruction.
pub const MAX_SRCS: usize = 3;

// ─── Types ────────────────────────────────────────────────────────

/// Element type of a register region or immediate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElemType {
    B,
    Ub,
    W,
    Uw,
    D,
    Ud,
    Q,
    Uq,
    Hf,
    F,
    Df,
}

impl ElemType {
    pub const ALL: [ElemType; 11] = [
        ElemType::B,
        ElemType::Ub,
        ElemType::W,
        ElemType::Uw,
        ElemType::D,
        ElemType::Ud,
        ElemType::Q,
        ElemType::Uq,
        ElemType::Hf,
        ElemType::F,
        ElemType::Df,
    ];

    /// Size of one element in bytes.
    pub fn size(self) -> u32 {
        match self {
            ElemType::B | ElemType::Ub => 1,
            ElemType::W | ElemType::Uw | ElemType::Hf => 2,
            ElemType::D | ElemType::Ud | ElemType::F => 4,
            ElemType::Q | ElemType::Uq | ElemType::Df => 8,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            ElemType::B => "b",
            ElemType::Ub => "ub",
            ElemType::W => "w",
            ElemType::Uw => "uw",
            ElemType::D => "d",
            ElemType::Ud => "ud",
            ElemType::Q => "q",
            ElemType::Uq => "uq",
            ElemType::Hf => "hf",
            ElemType::F => "f",
            ElemType::Df => "df",
        }
    }

    pub fn from_suffix(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.suffix() == s)
    }
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

// ─── Declarations ─────────────────────────────────────────────────

/// Index into a kernel's [`DeclTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeclId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    /// Ordinary virtual register, placed by the register allocator.
    Local,
    /// Kernel input pre-bound to a byte offset of the register file.
    Input { offset: u32 },
}

/// A register variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub ty: ElemType,
    pub num_elems: u32,
    pub kind: DeclKind,
}

impl Declaration {
    pub fn local(name: impl Into<String>, ty: ElemType, num_elems: u32) -> Self {
        Self {
            name: name.into(),
            ty,
            num_elems,
            kind: DeclKind::Local,
        }
    }

    pub fn input(name: impl Into<String>, ty: ElemType, num_elems: u32, offset: u32) -> Self {
        Self {
            name: name.into(),
            ty,
            num_elems,
            kind: DeclKind::Input { offset },
        }
    }

    pub fn byte_size(&self) -> u32 {
        self.num_elems.saturating_mul(self.ty.size())
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, DeclKind::Input { .. })
    }
}

/// Where a byte of a region lives, for comparing two regions.
///
/// Inputs are compared by their physical register-file position so that two
/// adjacent input declarations compare as one contiguous range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Base {
    Decl(DeclId),
    Grf,
}

#[derive(Clone, Debug, Default)]
pub struct DeclTable {
    decls: Vec<Declaration>,
}

impl DeclTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, decl: Declaration) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.decls[id.0 as usize]
    }

    pub fn find(&self, name: &str) -> Option<DeclId> {
        self.decls
            .iter()
            .position(|d| d.name == name)
            .map(|i| DeclId(i as u32))
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.decls
            .iter()
            .enumerate()
            .map(|(i, d)| (DeclId(i as u32), d))
    }

    /// Resolve a declaration-relative byte offset to a comparable position.
    ///
    /// `None` when an input's register-file position overflows.
    pub fn locate(&self, decl: DeclId, offset: u32) -> Option<(Base, u32)> {
        match self.get(decl).kind {
            DeclKind::Input { offset: base } => Some((Base::Grf, base.checked_add(offset)?)),
            DeclKind::Local => Some((Base::Decl(decl), offset)),
        }
    }

    /// Pick a fresh name with the given prefix.
    pub fn fresh_name(&self, prefix: &str) -> String {
        let mut n = self.decls.len();
        loop {
            let candidate = format!("{}{}", prefix, n);
            if self.find(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}

// ─── Operands ─────────────────────────────────────────────────────

/// Source modifier applied when reading a region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SrcMod {
    #[default]
    None,
    Neg,
    Abs,
    NegAbs,
}

/// A direct register region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub decl: DeclId,
    /// Byte offset from the start of `decl`.
    pub offset: u32,
    /// Horizontal stride in elements (0 = broadcast).
    pub stride: u16,
    pub ty: ElemType,
    pub modifier: SrcMod,
}

impl Region {
    pub fn new(decl: DeclId, offset: u32, stride: u16, ty: ElemType) -> Self {
        Self {
            decl,
            offset,
            stride,
            ty,
            modifier: SrcMod::None,
        }
    }

    /// Bytes touched by an access of `exec_size` channels.
    pub fn byte_len(&self, exec_size: u8) -> u32 {
        let elem = self.ty.size();
        let lanes = u32::from(exec_size.max(1));
        (lanes - 1) * u32::from(self.stride) * elem + elem
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Region(Region),
    Imm { value: i64, ty: ElemType },
    /// Register-indirect access through an address variable.
    Indirect { addr: DeclId, offset: i16, ty: ElemType },
}

impl Operand {
    pub fn ty(&self) -> ElemType {
        match self {
            Operand::Region(r) => r.ty,
            Operand::Imm { ty, .. } | Operand::Indirect { ty, .. } => *ty,
        }
    }

    pub fn as_region(&self) -> Option<&Region> {
        match self {
            Operand::Region(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_indirect(&self) -> bool {
        matches!(self, Operand::Indirect { .. })
    }
}

// ─── Instructions ─────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    Mov,
    Not,
    Add,
    Mul,
    Mad,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Asr,
    Min,
    Max,
    Avg,
    Cmp,
    Sel,
}

impl Opcode {
    pub const ALL: [Opcode; 16] = [
        Opcode::Mov,
        Opcode::Not,
        Opcode::Add,
        Opcode::Mul,
        Opcode::Mad,
        Opcode::And,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Shl,
        Opcode::Shr,
        Opcode::Asr,
        Opcode::Min,
        Opcode::Max,
        Opcode::Avg,
        Opcode::Cmp,
        Opcode::Sel,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mov => "mov",
            Opcode::Not => "not",
            Opcode::Add => "add",
            Opcode::Mul => "mul",
            Opcode::Mad => "mad",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::Asr => "asr",
            Opcode::Min => "min",
            Opcode::Max => "max",
            Opcode::Avg => "avg",
            Opcode::Cmp => "cmp",
            Opcode::Sel => "sel",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == s)
    }

    pub fn num_srcs(self) -> usize {
        match self {
            Opcode::Mov | Opcode::Not => 1,
            Opcode::Mad => 3,
            _ => 2,
        }
    }

    /// Whether lanes of this opcode are independent, so N scalar copies
    /// equal one N-wide instance.
    pub fn is_mergeable(self) -> bool {
        !matches!(self, Opcode::Cmp | Opcode::Sel)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Predicate {
    pub flag: u8,
    pub inverse: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CondOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CondOp {
    pub const ALL: [CondOp; 6] = [
        CondOp::Eq,
        CondOp::Ne,
        CondOp::Gt,
        CondOp::Ge,
        CondOp::Lt,
        CondOp::Le,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            CondOp::Eq => "eq",
            CondOp::Ne => "ne",
            CondOp::Gt => "gt",
            CondOp::Ge => "ge",
            CondOp::Lt => "lt",
            CondOp::Le => "le",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.mnemonic() == s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CondMod {
    pub op: CondOp,
    pub flag: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inst {
    pub opcode: Opcode,
    pub exec_size: u8,
    /// Write-enable: execute regardless of the channel mask.
    pub no_mask: bool,
    pub saturate: bool,
    pub predicate: Option<Predicate>,
    pub cond_mod: Option<CondMod>,
    pub dst: Operand,
    pub srcs: ArrayVec<Operand, MAX_SRCS>,
}

impl Inst {
    /// A scalar (exec size 1) instruction with no predicate or modifiers.
    pub fn scalar(opcode: Opcode, dst: Operand, srcs: &[Operand]) -> Self {
        debug_assert_eq!(srcs.len(), opcode.num_srcs());
        Self {
            opcode,
            exec_size: 1,
            no_mask: false,
            saturate: false,
            predicate: None,
            cond_mod: None,
            dst,
            srcs: srcs.iter().copied().collect(),
        }
    }

    pub fn num_srcs(&self) -> usize {
        self.srcs.len()
    }

    pub fn display<'a>(&'a self, decls: &'a DeclTable) -> InstDisplay<'a> {
        InstDisplay { inst: self, decls }
    }
}

// ─── Blocks and kernels ───────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
    pub name: String,
    /// Block sits inside divergent (SIMD) control flow.
    pub in_simd_flow: bool,
    pub insts: Vec<Inst>,
}

impl BasicBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            in_simd_flow: false,
            insts: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Kernel {
    pub name: String,
    pub decls: DeclTable,
    pub blocks: Vec<BasicBlock>,
}

impl Kernel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decls: DeclTable::new(),
            blocks: Vec::new(),
        }
    }

    pub fn inst_count(&self) -> usize {
        self.blocks.iter().map(|b| b.insts.len()).sum()
    }

    /// Whether any operand of any instruction names `decl`.
    pub fn references(&self, decl: DeclId) -> bool {
        self.blocks.iter().flat_map(|b| &b.insts).any(|inst| {
            std::iter::once(&inst.dst)
                .chain(inst.srcs.iter())
                .any(|op| match op {
                    Operand::Region(r) => r.decl == decl,
                    Operand::Indirect { addr, .. } => *addr == decl,
                    Operand::Imm { .. } => false,
                })
        })
    }
}

// ─── Display ──────────────────────────────────────────────────────

struct OperandDisplay<'a> {
    op: &'a Operand,
    decls: &'a DeclTable,
}

impl fmt::Display for OperandDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Operand::Region(r) => {
                match r.modifier {
                    SrcMod::None => {}
                    SrcMod::Neg => f.write_str("-")?,
                    SrcMod::Abs => f.write_str("(abs)")?,
                    SrcMod::NegAbs => f.write_str("-(abs)")?,
                }
                write!(
                    f,
                    "{}({})<{}>:{}",
                    self.decls.get(r.decl).name,
                    r.offset,
                    r.stride,
                    r.ty
                )
            }
            Operand::Imm { value, ty } => write!(f, "{}:{}", value, ty),
            Operand::Indirect { addr, offset, ty } => {
                write!(f, "r[{}, {}]:{}", self.decls.get(*addr).name, offset, ty)
            }
        }
    }
}

pub struct InstDisplay<'a> {
    inst: &'a Inst,
    decls: &'a DeclTable,
}

impl fmt::Display for InstDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inst = self.inst;
        if let Some(pred) = inst.predicate {
            let bang = if pred.inverse { "!" } else { "" };
            write!(f, "({}f{}) ", bang, pred.flag)?;
        }
        write!(f, "{}", inst.opcode)?;
        if inst.saturate {
            f.write_str(".sat")?;
        }
        if let Some(cm) = inst.cond_mod {
            write!(f, ".{}.f{}", cm.op.mnemonic(), cm.flag)?;
        }
        if inst.no_mask {
            write!(f, " ({}, nomask)", inst.exec_size)?;
        } else {
            write!(f, " ({})", inst.exec_size)?;
        }
        for op in std::iter::once(&inst.dst).chain(inst.srcs.iter()) {
            write!(
                f,
                " {}",
                OperandDisplay {
                    op,
                    decls: self.decls
                }
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "kernel {}", self.name)?;
        for (_, decl) in self.decls.iter() {
            match decl.kind {
                DeclKind::Local => {
                    writeln!(f, "decl {} {} {}", decl.name, decl.ty, decl.num_elems)?
                }
                DeclKind::Input { offset } => writeln!(
                    f,
                    "input {} {} {} at {}",
                    decl.name, decl.ty, decl.num_elems, offset
                )?,
            }
        }
        for block in &self.blocks {
            if block.in_simd_flow {
                writeln!(f, "block {} simd_cf", block.name)?;
            } else {
                writeln!(f, "block {}", block.name)?;
            }
            for inst in &block.insts {
                writeln!(f, "  {}", inst.display(&self.decls))?;
            }
        }
        Ok(())
    }
}
