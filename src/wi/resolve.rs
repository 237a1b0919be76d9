use std::fmt;

use super::builder::Builder;
use super::implicit_args::{ImplicitArgKind, ImplicitArgs};
use super::intrinsic::WorkItemFn;
use super::ir::{Function, GenIntrinsic, InstId, InstKind, IntPredicate, Type, Value};
use super::layout::{self, build_load};
use crate::config::target::TargetConfig;

/// How a function receives its work-item state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Convention {
    /// Values arrive as trailing implicit arguments.
    Default,
    /// Values are read from the side buffer and hardware registers.
    StackCall,
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Convention::Default => f.write_str("default"),
            Convention::StackCall => f.write_str("stack-call"),
        }
    }
}

/// Three-wide size vectors a builtin can index by dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SizeField {
    GlobalSize,
    LocalSize,
    EnqueuedLocalSize,
    GlobalOffset,
    NumGroups,
}

impl SizeField {
    fn implicit_arg(self) -> ImplicitArgKind {
        match self {
            SizeField::GlobalSize => ImplicitArgKind::GlobalSize,
            SizeField::LocalSize => ImplicitArgKind::LocalSize,
            SizeField::EnqueuedLocalSize => ImplicitArgKind::EnqueuedLocalWorkSize,
            // Global offsets sit in the first lanes of the payload header.
            SizeField::GlobalOffset => ImplicitArgKind::PayloadHeader,
            SizeField::NumGroups => ImplicitArgKind::NumGroups,
        }
    }

    /// Side-buffer offset and element width.
    fn side_buffer(self) -> (u32, u32) {
        match self {
            SizeField::GlobalSize => (layout::GLOBAL_SIZE_X, 64),
            // The enqueued size is taken to equal the local size.
            SizeField::LocalSize | SizeField::EnqueuedLocalSize => (layout::LOCAL_SIZE_X, 32),
            SizeField::GlobalOffset => (layout::GLOBAL_OFFSET_X, 64),
            SizeField::NumGroups => (layout::GROUP_COUNT_X, 32),
        }
    }
}

/// Where the pieces of work-item state come from under one convention.
trait ArgSource {
    fn convention(&self) -> Convention;
    fn r0(&self, b: &mut Builder<'_>) -> Value;
    fn local_id(&self, b: &mut Builder<'_>, axis: u32) -> Value;
    /// A three-lane vector whose lanes are at most `ret_bits` wide.
    fn size_vector(&self, b: &mut Builder<'_>, field: SizeField, ret_bits: u32) -> Value;
    fn work_dim(&self, b: &mut Builder<'_>) -> Value;
}

/// Implicit argument positions of one function.
///
/// A function without the trailing implicit parameters is only an error
/// once a builtin actually asks for one of them.
struct InjectedArgs<'t> {
    table: &'t ImplicitArgs,
    first: Option<usize>,
    params: usize,
    func: String,
}

impl<'t> InjectedArgs<'t> {
    fn new(table: &'t ImplicitArgs, func: &Function) -> Self {
        Self {
            table,
            first: table.first_index(func),
            params: func.params.len(),
            func: func.name.clone(),
        }
    }

    fn get(&self, kind: ImplicitArgKind) -> Value {
        let first = self.first.unwrap_or_else(|| {
            panic!(
                "function {} has {} parameters but {} implicit arguments",
                self.func,
                self.params,
                self.table.len()
            )
        });
        let pos = self
            .table
            .kinds()
            .iter()
            .position(|&k| k == kind)
            .unwrap_or_else(|| {
                panic!(
                    "function {} has no {} implicit argument",
                    self.func,
                    kind.name()
                )
            });
        Value::Arg((first + pos) as u32)
    }
}

impl ArgSource for InjectedArgs<'_> {
    fn convention(&self) -> Convention {
        Convention::Default
    }

    fn r0(&self, _: &mut Builder<'_>) -> Value {
        self.get(ImplicitArgKind::R0)
    }

    fn local_id(&self, _: &mut Builder<'_>, axis: u32) -> Value {
        self.get(match axis {
            0 => ImplicitArgKind::LocalIdX,
            1 => ImplicitArgKind::LocalIdY,
            _ => ImplicitArgKind::LocalIdZ,
        })
    }

    fn size_vector(&self, _: &mut Builder<'_>, field: SizeField, _: u32) -> Value {
        self.get(field.implicit_arg())
    }

    fn work_dim(&self, _: &mut Builder<'_>) -> Value {
        self.get(ImplicitArgKind::WorkDim)
    }
}

/// Stack-call functions read the side buffer and hardware registers.
struct SideBuffer {
    r0_lanes: u32,
}

impl ArgSource for SideBuffer {
    fn convention(&self) -> Convention {
        Convention::StackCall
    }

    fn r0(&self, b: &mut Builder<'_>) -> Value {
        b.intrinsic(GenIntrinsic::GetR0, Type::vec(32, self.r0_lanes))
    }

    fn local_id(&self, b: &mut Builder<'_>, axis: u32) -> Value {
        // Each hardware thread owns simd * 3 i16 ids laid out x, y, z.
        let table = build_load(b, layout::LOCAL_IDS, Type::I64);

        let simd = b.intrinsic(GenIntrinsic::SimdSize, Type::I32);
        let wide = b.icmp(IntPredicate::Sgt, simd.clone(), Value::i32(16));
        let simd = b.select(wide, simd, Value::i32(16));

        let r0 = self.r0(b);
        let thread = b.extract_element(r0, Value::i32(2));
        let lane = b.intrinsic(GenIntrinsic::SimdLaneId, Type::I16);

        let stride = b.mul(simd.clone(), Value::i32(6));
        let stride = b.zext(stride, Type::I32);
        let thread_base = b.mul(stride, thread);
        let thread_base = b.zext(thread_base, Type::I64);
        let thread_base = b.add(thread_base, table);

        let axis_base = b.mul(simd, Value::i32(axis * 2));
        let lane_offset = b.mul(lane, Value::int(16, 2));
        let axis_base = b.zext(axis_base, Type::I64);
        let lane_offset = b.zext(lane_offset, Type::I64);
        let addr = b.add(axis_base, lane_offset);
        let addr = b.add(addr, thread_base);

        let ptr = b.int_to_ptr(addr);
        b.load(ptr, Type::I16, 2)
    }

    fn size_vector(&self, b: &mut Builder<'_>, field: SizeField, ret_bits: u32) -> Value {
        let (offset, bits) = field.side_buffer();
        let loaded = build_load(b, offset, Type::vec(bits, 3));
        if ret_bits >= bits {
            return loaded;
        }
        let mut narrow = Value::Undef(Type::vec(ret_bits, 3));
        for lane in 0..3 {
            let elem = b.extract_element(loaded.clone(), Value::i32(lane));
            let elem = b.trunc(elem, Type::Int(ret_bits));
            narrow = b.insert_element(narrow, elem, Value::i32(lane));
        }
        narrow
    }

    fn work_dim(&self, b: &mut Builder<'_>) -> Value {
        let word = build_load(b, layout::NUM_WORK_DIM / 4 * 4, Type::I32);
        b.lshr(word, Value::i32(24))
    }
}

/// Outcome of resolving one function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveReport {
    pub convention: Convention,
    pub resolved: Vec<WorkItemFn>,
    /// Uses of the enqueued local size replaced by the known group size.
    pub group_size_uses: usize,
}

/// Rewrite every work-item builtin call in `func`.
///
/// Panics when a builtin needs an implicit argument `func` lacks, or when a
/// call is malformed.
pub fn resolve_work_items(
    func: &mut Function,
    table: &ImplicitArgs,
    target: &TargetConfig,
) -> ResolveReport {
    let injected = InjectedArgs::new(table, func);
    let side_buffer = SideBuffer {
        r0_lanes: target.r0_lanes(),
    };
    let source: &dyn ArgSource = if func.stack_call {
        &side_buffer
    } else {
        &injected
    };
    let convention = source.convention();
    tracing::debug!(function = %func.name, convention = %convention, "resolving work-item calls");

    let calls: Vec<(InstId, WorkItemFn)> = func
        .calls()
        .filter_map(|(id, callee)| WorkItemFn::from_name(callee).map(|wi| (id, wi)))
        .collect();

    let mut resolved = Vec::with_capacity(calls.len());
    for (id, wi) in calls {
        let (ret, dim) = call_signature(func, id, wi);
        let mut b = Builder::before(func, id);
        let mut value = lower(wi, &mut b, source, &injected, dim, ret);
        if let (Type::Int(have), Type::Int(want)) = (b.ty(&value), ret) {
            if have < want {
                value = b.zext(value, ret);
            }
        }
        func.replace_all_uses_with(&Value::Inst(id), &value);
        func.erase(id);
        tracing::trace!(function = %func.name, intrinsic = wi.name(), "resolved");
        resolved.push(wi);
    }

    let mut group_size_uses = 0;
    if let Some([x, y, z]) = func.known_group_size {
        if let Some(arg) = table.arg(func, ImplicitArgKind::EnqueuedLocalWorkSize) {
            let size = Value::ConstVector {
                bits: 32,
                lanes: vec![u64::from(x), u64::from(y), u64::from(z)],
            };
            group_size_uses = func.replace_all_uses_with(&arg, &size);
        }
    }

    tracing::debug!(
        function = %func.name,
        resolved = resolved.len(),
        group_size_uses,
        "work-item resolution done"
    );
    ResolveReport {
        convention,
        resolved,
        group_size_uses,
    }
}

fn call_signature(func: &Function, id: InstId, wi: WorkItemFn) -> (Type, Option<Value>) {
    let inst = func
        .inst(id)
        .unwrap_or_else(|| panic!("call %{} was erased", id.0));
    let ret = inst
        .ty
        .unwrap_or_else(|| panic!("{} must return a value", wi.name()));
    let dim = match &inst.kind {
        InstKind::Call { args, .. } => args.first().cloned(),
        _ => None,
    };
    if wi.takes_dim() && dim.is_none() {
        panic!("{} takes a dimension argument", wi.name());
    }
    (ret, dim)
}

/// One arm per builtin, no fallthrough.
fn lower(
    wi: WorkItemFn,
    b: &mut Builder<'_>,
    source: &dyn ArgSource,
    injected: &InjectedArgs<'_>,
    dim: Option<Value>,
    ret: Type,
) -> Value {
    let dim = dim.unwrap_or_else(|| Value::i32(0));
    match wi {
        WorkItemFn::LocalIdX => source.local_id(b, 0),
        WorkItemFn::LocalIdY => source.local_id(b, 1),
        WorkItemFn::LocalIdZ => source.local_id(b, 2),
        WorkItemFn::GroupId => {
            // dim 0 lives in R0.1, dims 1 and 2 in R0.6 and R0.7.
            let r0 = source.r0(b);
            let is_x = b.icmp(IntPredicate::Eq, dim.clone(), Value::i32(0));
            let base = b.select(is_x, Value::i32(1), Value::i32(5));
            let lane = b.add(dim, base);
            b.extract_element(r0, lane)
        }
        WorkItemFn::LocalThreadId => {
            let r0 = source.r0(b);
            let word = b.extract_element(r0, Value::i32(2));
            b.trunc(word, Type::I8)
        }
        WorkItemFn::GlobalSize => indexed(source, b, SizeField::GlobalSize, ret, dim),
        WorkItemFn::LocalSize => indexed(source, b, SizeField::LocalSize, ret, dim),
        WorkItemFn::EnqueuedLocalSize => {
            indexed(source, b, SizeField::EnqueuedLocalSize, ret, dim)
        }
        WorkItemFn::GlobalOffset => indexed(source, b, SizeField::GlobalOffset, ret, dim),
        WorkItemFn::NumGroups => indexed(source, b, SizeField::NumGroups, ret, dim),
        WorkItemFn::WorkDim => source.work_dim(b),
        WorkItemFn::GridOrigin => {
            let origin = injected.get(ImplicitArgKind::StageInGridOrigin);
            b.extract_element(origin, dim)
        }
        WorkItemFn::GridSize => {
            let size = injected.get(ImplicitArgKind::StageInGridSize);
            b.extract_element(size, dim)
        }
        WorkItemFn::SyncBuffer => injected.get(ImplicitArgKind::SyncBuffer),
    }
}

fn indexed(
    source: &dyn ArgSource,
    b: &mut Builder<'_>,
    field: SizeField,
    ret: Type,
    dim: Value,
) -> Value {
    let vector = source.size_vector(b, field, ret.scalar_bits());
    b.extract_element(vector, dim)
}
