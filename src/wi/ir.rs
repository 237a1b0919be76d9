//! Minimal SSA function IR for work-item resolution.
//!
//! Instructions live in an arena; the body is an ordered list of arena ids,
//! so inserting before or erasing an instruction never invalidates the ids
//! of the others.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int(u32),
    Vector { bits: u32, lanes: u32 },
    Ptr,
}

impl Type {
    pub const I1: Type = Type::Int(1);
    pub const I8: Type = Type::Int(8);
    pub const I16: Type = Type::Int(16);
    pub const I32: Type = Type::Int(32);
    pub const I64: Type = Type::Int(64);

    pub fn vec(bits: u32, lanes: u32) -> Self {
        Type::Vector { bits, lanes }
    }

    /// Bit width of one element (pointers are 64-bit).
    pub fn scalar_bits(self) -> u32 {
        match self {
            Type::Int(bits) | Type::Vector { bits, .. } => bits,
            Type::Ptr => 64,
        }
    }

    pub fn lanes(self) -> Option<u32> {
        match self {
            Type::Vector { lanes, .. } => Some(lanes),
            _ => None,
        }
    }

    pub fn elem(self) -> Type {
        match self {
            Type::Vector { bits, .. } => Type::Int(bits),
            other => other,
        }
    }

    pub fn byte_size(self) -> u32 {
        let bytes = self.scalar_bits().div_ceil(8);
        bytes * self.lanes().unwrap_or(1)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Vector { bits, lanes } => write!(f, "<{} x i{}>", lanes, bits),
            Type::Ptr => f.write_str("ptr"),
        }
    }
}

/// Mask `value` to `bits` bits.
pub fn truncate_bits(value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

/// Sign-extend the low `bits` bits of `value`.
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits >= 64 {
        value as i64
    } else {
        let shift = 64 - bits;
        ((value << shift) as i64) >> shift
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Function parameter by position.
    Arg(u32),
    Inst(InstId),
    Const { ty: Type, value: u64 },
    ConstVector { bits: u32, lanes: Vec<u64> },
    Undef(Type),
}

impl Value {
    pub fn int(bits: u32, value: u64) -> Self {
        Value::Const {
            ty: Type::Int(bits),
            value: truncate_bits(value, bits),
        }
    }

    pub fn i32(value: u32) -> Self {
        Value::int(32, u64::from(value))
    }

    pub fn as_const(&self) -> Option<u64> {
        match self {
            Value::Const { value, .. } => Some(*value),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Sgt,
}

impl IntPredicate {
    pub fn eval(self, lhs: u64, rhs: u64, bits: u32) -> bool {
        match self {
            IntPredicate::Eq => truncate_bits(lhs, bits) == truncate_bits(rhs, bits),
            IntPredicate::Sgt => sign_extend(lhs, bits) > sign_extend(rhs, bits),
        }
    }

    fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Sgt => "sgt",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Mul,
    LShr,
}

impl BinOp {
    pub fn eval(self, lhs: u64, rhs: u64, bits: u32) -> u64 {
        let raw = match self {
            BinOp::Add => lhs.wrapping_add(rhs),
            BinOp::Mul => lhs.wrapping_mul(rhs),
            BinOp::LShr => truncate_bits(lhs, bits).checked_shr(rhs as u32).unwrap_or(0),
        };
        truncate_bits(raw, bits)
    }

    fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Mul => "mul",
            BinOp::LShr => "lshr",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastOp {
    ZExt,
    Trunc,
    BitCast,
    IntToPtr,
}

impl CastOp {
    fn mnemonic(self) -> &'static str {
        match self {
            CastOp::ZExt => "zext",
            CastOp::Trunc => "trunc",
            CastOp::BitCast => "bitcast",
            CastOp::IntToPtr => "inttoptr",
        }
    }
}

/// Hardware reads the backend exposes as intrinsics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenIntrinsic {
    /// The thread payload register R0.
    GetR0,
    SimdSize,
    SimdLaneId,
}

impl GenIntrinsic {
    pub fn name(self) -> &'static str {
        match self {
            GenIntrinsic::GetR0 => "llvm.genx.GenISA.getR0",
            GenIntrinsic::SimdSize => "llvm.genx.GenISA.simdSize",
            GenIntrinsic::SimdLaneId => "llvm.genx.GenISA.simdLaneId",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstKind {
    Call { callee: String, args: Vec<Value> },
    Intrinsic(GenIntrinsic),
    ExtractElement { vector: Value, index: Value },
    InsertElement { vector: Value, elem: Value, index: Value },
    ICmp { pred: IntPredicate, lhs: Value, rhs: Value },
    Select { cond: Value, on_true: Value, on_false: Value },
    Binary { op: BinOp, lhs: Value, rhs: Value },
    Cast { op: CastOp, value: Value },
    Load { ptr: Value, align: u32 },
    Ret(Option<Value>),
}

impl InstKind {
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            InstKind::Call { args, .. } => args.iter().collect(),
            InstKind::Intrinsic(_) => Vec::new(),
            InstKind::ExtractElement { vector, index } => vec![vector, index],
            InstKind::InsertElement {
                vector,
                elem,
                index,
            } => vec![vector, elem, index],
            InstKind::ICmp { lhs, rhs, .. } | InstKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Select {
                cond,
                on_true,
                on_false,
            } => vec![cond, on_true, on_false],
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Load { ptr, .. } => vec![ptr],
            InstKind::Ret(value) => value.iter().collect(),
        }
    }

    fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            InstKind::Call { args, .. } => args.iter_mut().collect(),
            InstKind::Intrinsic(_) => Vec::new(),
            InstKind::ExtractElement { vector, index } => vec![vector, index],
            InstKind::InsertElement {
                vector,
                elem,
                index,
            } => vec![vector, elem, index],
            InstKind::ICmp { lhs, rhs, .. } | InstKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Select {
                cond,
                on_true,
                on_false,
            } => vec![cond, on_true, on_false],
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Load { ptr, .. } => vec![ptr],
            InstKind::Ret(value) => value.iter_mut().collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inst {
    pub kind: InstKind,
    /// Result type (`Ret` carries the returned type or `None` for void).
    pub ty: Option<Type>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub ret: Option<Type>,
    pub params: Vec<Param>,
    /// Compiled with the stack-call convention (`"visaStackCall"`).
    pub stack_call: bool,
    /// Required work-group size from metadata, when known.
    pub known_group_size: Option<[u32; 3]>,
    arena: Vec<Option<Inst>>,
    order: Vec<InstId>,
}

impl Function {
    pub fn new(name: impl Into<String>, ret: Option<Type>) -> Self {
        Self {
            name: name.into(),
            ret,
            params: Vec::new(),
            stack_call: false,
            known_group_size: None,
            arena: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn add_param(&mut self, name: impl Into<String>, ty: Type) -> Value {
        self.params.push(Param {
            name: name.into(),
            ty,
        });
        Value::Arg(self.params.len() as u32 - 1)
    }

    fn alloc(&mut self, inst: Inst) -> InstId {
        let id = InstId(self.arena.len() as u32);
        self.arena.push(Some(inst));
        id
    }

    /// Append an instruction at the end of the body.
    pub fn push(&mut self, kind: InstKind, ty: Option<Type>) -> Value {
        let id = self.alloc(Inst { kind, ty });
        self.order.push(id);
        Value::Inst(id)
    }

    pub fn insert_before(&mut self, at: InstId, inst: Inst) -> InstId {
        let pos = self
            .position(at)
            .unwrap_or_else(|| panic!("insert before erased instruction %{}", at.0));
        let id = self.alloc(inst);
        self.order.insert(pos, id);
        id
    }

    pub fn position(&self, id: InstId) -> Option<usize> {
        self.order.iter().position(|&i| i == id)
    }

    pub fn inst(&self, id: InstId) -> Option<&Inst> {
        self.arena.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Live instructions in body order.
    pub fn body(&self) -> impl Iterator<Item = (InstId, &Inst)> {
        self.order
            .iter()
            .filter_map(|&id| self.inst(id).map(|inst| (id, inst)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn value_ty(&self, value: &Value) -> Option<Type> {
        match value {
            Value::Arg(i) => self.params.get(*i as usize).map(|p| p.ty),
            Value::Inst(id) => self.inst(*id).and_then(|i| i.ty),
            Value::Const { ty, .. } | Value::Undef(ty) => Some(*ty),
            Value::ConstVector { bits, lanes } => Some(Type::vec(*bits, lanes.len() as u32)),
        }
    }

    /// Rewrite every operand equal to `from` into `to`.
    pub fn replace_all_uses_with(&mut self, from: &Value, to: &Value) -> usize {
        let mut count = 0;
        for inst in self.arena.iter_mut().flatten() {
            for op in inst.kind.operands_mut() {
                if op == from {
                    *op = to.clone();
                    count += 1;
                }
            }
        }
        count
    }

    pub fn erase(&mut self, id: InstId) {
        if let Some(pos) = self.position(id) {
            self.order.remove(pos);
        }
        if let Some(slot) = self.arena.get_mut(id.0 as usize) {
            *slot = None;
        }
    }

    /// Whether any live instruction uses `value`.
    pub fn has_uses(&self, value: &Value) -> bool {
        self.body()
            .any(|(_, inst)| inst.kind.operands().contains(&value))
    }

    pub fn calls(&self) -> impl Iterator<Item = (InstId, &str)> {
        self.body().filter_map(|(id, inst)| match &inst.kind {
            InstKind::Call { callee, .. } => Some((id, callee.as_str())),
            _ => None,
        })
    }
}

// ─── Display ──────────────────────────────────────────────────────

struct Bare<'a>(&'a Function, &'a Value);
struct Typed<'a>(&'a Function, &'a Value);

impl fmt::Display for Bare<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.1 {
            Value::Arg(i) => match self.0.params.get(*i as usize) {
                Some(p) => write!(f, "%{}", p.name),
                None => write!(f, "%arg{}", i),
            },
            Value::Inst(id) => write!(f, "%{}", id.0),
            Value::Const { value, ty } if *ty == Type::I1 => {
                f.write_str(if *value != 0 { "true" } else { "false" })
            }
            Value::Const { value, ty } => {
                write!(f, "{}", sign_extend(*value, ty.scalar_bits()))
            }
            Value::ConstVector { bits, lanes } => {
                f.write_str("<")?;
                for (i, v) in lanes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "i{} {}", bits, v)?;
                }
                f.write_str(">")
            }
            Value::Undef(_) => f.write_str("undef"),
        }
    }
}

impl fmt::Display for Typed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.value_ty(self.1) {
            Some(ty) => write!(f, "{} {}", ty, Bare(self.0, self.1)),
            None => write!(f, "void {}", Bare(self.0, self.1)),
        }
    }
}

impl Function {
    fn fmt_inst(&self, f: &mut fmt::Formatter<'_>, id: InstId, inst: &Inst) -> fmt::Result {
        let ty = inst.ty.map_or_else(|| "void".to_string(), |t| t.to_string());
        if !matches!(inst.kind, InstKind::Ret(_)) && inst.ty.is_some() {
            write!(f, "%{} = ", id.0)?;
        }
        match &inst.kind {
            InstKind::Call { callee, args } => {
                write!(f, "call {} @{}(", ty, callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Typed(self, arg))?;
                }
                f.write_str(")")
            }
            InstKind::Intrinsic(intr) => write!(f, "call {} @{}()", ty, intr.name()),
            InstKind::ExtractElement { vector, index } => write!(
                f,
                "extractelement {}, {}",
                Typed(self, vector),
                Typed(self, index)
            ),
            InstKind::InsertElement {
                vector,
                elem,
                index,
            } => write!(
                f,
                "insertelement {}, {}, {}",
                Typed(self, vector),
                Typed(self, elem),
                Typed(self, index)
            ),
            InstKind::ICmp { pred, lhs, rhs } => write!(
                f,
                "icmp {} {}, {}",
                pred.mnemonic(),
                Typed(self, lhs),
                Bare(self, rhs)
            ),
            InstKind::Select {
                cond,
                on_true,
                on_false,
            } => write!(
                f,
                "select {}, {}, {}",
                Typed(self, cond),
                Typed(self, on_true),
                Typed(self, on_false)
            ),
            InstKind::Binary { op, lhs, rhs } => write!(
                f,
                "{} {}, {}",
                op.mnemonic(),
                Typed(self, lhs),
                Bare(self, rhs)
            ),
            InstKind::Cast { op, value } => {
                write!(f, "{} {} to {}", op.mnemonic(), Typed(self, value), ty)
            }
            InstKind::Load { ptr, align } => {
                write!(f, "load {}, {}, align {}", ty, Typed(self, ptr), align)
            }
            InstKind::Ret(Some(value)) => write!(f, "ret {}", Typed(self, value)),
            InstKind::Ret(None) => f.write_str("ret void"),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ret = self.ret.map_or_else(|| "void".to_string(), |t| t.to_string());
        write!(f, "define {} @{}(", ret, self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} %{}", p.ty, p.name)?;
        }
        f.write_str(")")?;
        if self.stack_call {
            f.write_str(" \"visaStackCall\"")?;
        }
        writeln!(f, " {{")?;
        if let Some([x, y, z]) = self.known_group_size {
            writeln!(f, "  ; reqd_work_group_size {} {} {}", x, y, z)?;
        }
        for (id, inst) in self.body() {
            f.write_str("  ")?;
            self.fmt_inst(f, id, inst)?;
            writeln!(f)?;
        }
        writeln!(f, "}}")
    }
}
