use super::ir::{CastOp, GenIntrinsic, Inst, InstKind};
use super::*;
use crate::config::target::TargetConfig;

const R0: u32 = 1;
const WORK_DIM: u32 = 3;
const ENQUEUED_LOCAL_SIZE: u32 = 7;
const LOCAL_ID_X: u32 = 8;
const GRID_SIZE: u32 = 12;
const SYNC_BUFFER: u32 = 13;

/// `kernel(ptr %buf, <implicit args>)` returning one builtin call.
fn kernel(wi: WorkItemFn, dim: Option<u32>, ret: Type, stack_call: bool) -> Function {
    let mut f = Function::new("kernel", Some(ret));
    f.stack_call = stack_call;
    f.add_param("buf", Type::Ptr);
    ImplicitArgs::all().attach(&mut f, 32);
    let args = dim.map(|d| vec![Value::i32(d)]).unwrap_or_default();
    let call = f.push(
        InstKind::Call {
            callee: wi.name().to_string(),
            args,
        },
        Some(ret),
    );
    f.push(InstKind::Ret(Some(call)), Some(ret));
    f
}

fn resolve(f: &mut Function) -> ResolveReport {
    resolve_work_items(f, &ImplicitArgs::all(), &TargetConfig::skl())
}

fn returned(f: &Function) -> Value {
    f.body()
        .find_map(|(_, inst)| match &inst.kind {
            InstKind::Ret(Some(v)) => Some(v.clone()),
            _ => None,
        })
        .expect("function returns a value")
}

fn def<'f>(f: &'f Function, value: &Value) -> &'f Inst {
    let Value::Inst(id) = value else {
        panic!("{:?} is not an instruction", value)
    };
    f.inst(*id).expect("live instruction")
}

fn kinds(f: &Function) -> Vec<&InstKind> {
    f.body().map(|(_, inst)| &inst.kind).collect()
}

#[test]
fn group_id_indexes_r0_lane() {
    let mut f = kernel(WorkItemFn::GroupId, Some(1), Type::I32, false);
    let report = resolve(&mut f);
    assert_eq!(report.convention, Convention::Default);
    assert_eq!(report.resolved, vec![WorkItemFn::GroupId]);
    assert!(f.calls().next().is_none());

    let ret = returned(&f);
    assert_eq!(
        def(&f, &ret).kind,
        InstKind::ExtractElement {
            vector: Value::Arg(R0),
            index: Value::i32(6),
        }
    );
}

#[test]
fn group_id_x_is_lane_one() {
    let mut f = kernel(WorkItemFn::GroupId, Some(0), Type::I32, false);
    resolve(&mut f);
    let ret = returned(&f);
    assert!(matches!(
        &def(&f, &ret).kind,
        InstKind::ExtractElement { index, .. } if *index == Value::i32(1)
    ));
}

#[test]
fn group_id_with_runtime_dimension_selects_base() {
    let mut f = Function::new("kernel", Some(Type::I32));
    let dim = f.add_param("dim", Type::I32);
    ImplicitArgs::all().attach(&mut f, 32);
    let call = f.push(
        InstKind::Call {
            callee: WorkItemFn::GroupId.name().to_string(),
            args: vec![dim],
        },
        Some(Type::I32),
    );
    f.push(InstKind::Ret(Some(call)), Some(Type::I32));
    resolve(&mut f);

    let k = kinds(&f);
    assert!(matches!(k[0], InstKind::ICmp { .. }));
    assert!(matches!(k[1], InstKind::Select { .. }));
    assert!(matches!(k[2], InstKind::Binary { .. }));
    assert!(matches!(k[3], InstKind::ExtractElement { .. }));
}

#[test]
fn stack_call_group_id_reads_r0_register() {
    let mut f = kernel(WorkItemFn::GroupId, Some(2), Type::I32, true);
    let report = resolve(&mut f);
    assert_eq!(report.convention, Convention::StackCall);

    let ret = returned(&f);
    let InstKind::ExtractElement { vector, index } = &def(&f, &ret).kind else {
        panic!("expected extractelement");
    };
    assert_eq!(*index, Value::i32(7));
    let r0 = def(&f, vector);
    assert_eq!(r0.kind, InstKind::Intrinsic(GenIntrinsic::GetR0));
    assert_eq!(r0.ty, Some(Type::vec(32, 8)));
}

#[test]
fn stack_call_local_size_loads_side_buffer() {
    let mut f = kernel(WorkItemFn::LocalSize, Some(2), Type::I32, true);
    resolve(&mut f);

    let ret = returned(&f);
    let InstKind::ExtractElement { vector, index } = &def(&f, &ret).kind else {
        panic!("expected extractelement");
    };
    assert_eq!(*index, Value::i32(2));
    let load = def(&f, vector);
    assert_eq!(load.ty, Some(Type::vec(32, 3)));
    let InstKind::Load { ptr, align: 4 } = &load.kind else {
        panic!("expected aligned load, got {:?}", load.kind);
    };
    assert_eq!(
        def(&f, ptr).kind,
        InstKind::Cast {
            op: CastOp::IntToPtr,
            value: Value::i32(4),
        }
    );
}

#[test]
fn stack_call_enqueued_size_reads_local_size() {
    let mut f = kernel(WorkItemFn::EnqueuedLocalSize, Some(0), Type::I32, true);
    resolve(&mut f);
    assert!(kinds(&f).contains(&&InstKind::Cast {
        op: CastOp::IntToPtr,
        value: Value::i32(4),
    }));
}

#[test]
fn stack_call_global_size_truncates_lanes() {
    let mut f = kernel(WorkItemFn::GlobalSize, Some(1), Type::I32, true);
    resolve(&mut f);

    let loads: Vec<&Inst> = f
        .body()
        .map(|(_, i)| i)
        .filter(|i| matches!(i.kind, InstKind::Load { .. }))
        .collect();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].ty, Some(Type::vec(64, 3)));
    let truncs = kinds(&f)
        .into_iter()
        .filter(|k| matches!(k, InstKind::Cast { op: CastOp::Trunc, .. }))
        .count();
    assert_eq!(truncs, 3);
    assert_eq!(def(&f, &returned(&f)).ty, Some(Type::I32));
}

#[test]
fn stack_call_global_size_keeps_wide_lanes() {
    let mut f = kernel(WorkItemFn::GlobalSize, Some(0), Type::I64, true);
    resolve(&mut f);
    assert!(!kinds(&f)
        .iter()
        .any(|k| matches!(k, InstKind::Cast { op: CastOp::Trunc, .. })));
    assert_eq!(def(&f, &returned(&f)).ty, Some(Type::I64));
}

#[test]
fn local_id_is_zero_extended_argument() {
    let mut f = kernel(WorkItemFn::LocalIdX, None, Type::I32, false);
    resolve(&mut f);
    let ret = returned(&f);
    let inst = def(&f, &ret);
    assert_eq!(
        inst.kind,
        InstKind::Cast {
            op: CastOp::ZExt,
            value: Value::Arg(LOCAL_ID_X),
        }
    );
    assert_eq!(inst.ty, Some(Type::I32));
}

#[test]
fn stack_call_local_id_loads_from_id_table() {
    let mut f = kernel(WorkItemFn::LocalIdY, None, Type::I32, true);
    resolve(&mut f);

    let ret = returned(&f);
    let InstKind::Cast {
        op: CastOp::ZExt,
        value,
    } = &def(&f, &ret).kind
    else {
        panic!("expected zext");
    };
    let load = def(&f, value);
    assert_eq!(load.ty, Some(Type::I16));
    assert!(matches!(load.kind, InstKind::Load { align: 2, .. }));

    let k = kinds(&f);
    assert!(k.contains(&&InstKind::Cast {
        op: CastOp::IntToPtr,
        value: Value::i32(layout::LOCAL_IDS),
    }));
    assert!(k.contains(&&InstKind::Intrinsic(GenIntrinsic::SimdSize)));
    assert!(k.contains(&&InstKind::Intrinsic(GenIntrinsic::SimdLaneId)));
}

#[test]
fn local_thread_id_truncates_r0_word() {
    let mut f = kernel(WorkItemFn::LocalThreadId, None, Type::I32, false);
    resolve(&mut f);
    let ret = returned(&f);
    let InstKind::Cast {
        op: CastOp::ZExt,
        value,
    } = &def(&f, &ret).kind
    else {
        panic!("expected zext");
    };
    let trunc = def(&f, value);
    assert_eq!(trunc.ty, Some(Type::I8));
    let InstKind::Cast {
        op: CastOp::Trunc,
        value: word,
    } = &trunc.kind
    else {
        panic!("expected trunc");
    };
    assert_eq!(
        def(&f, word).kind,
        InstKind::ExtractElement {
            vector: Value::Arg(R0),
            index: Value::i32(2),
        }
    );
}

#[test]
fn work_dim_uses_argument_directly() {
    let mut f = kernel(WorkItemFn::WorkDim, None, Type::I32, false);
    resolve(&mut f);
    assert_eq!(returned(&f), Value::Arg(WORK_DIM));
    assert_eq!(f.len(), 1);
}

#[test]
fn stack_call_work_dim_shifts_header_word() {
    let mut f = Function::new("kernel", Some(Type::I32));
    f.stack_call = true;
    let call = f.push(
        InstKind::Call {
            callee: WorkItemFn::WorkDim.name().to_string(),
            args: vec![],
        },
        Some(Type::I32),
    );
    f.push(InstKind::Ret(Some(call)), Some(Type::I32));
    resolve_work_items(&mut f, &ImplicitArgs::default(), &TargetConfig::skl());

    insta::assert_snapshot!(f.to_string(), @r#"
    define i32 @kernel() "visaStackCall" {
      %2 = inttoptr i32 0 to ptr
      %3 = load i32, ptr %2, align 4
      %4 = lshr i32 %3, 24
      ret i32 %4
    }
    "#);
}

#[test]
fn grid_size_is_injected_under_stack_call() {
    let mut f = kernel(WorkItemFn::GridSize, Some(1), Type::I32, true);
    resolve(&mut f);
    assert_eq!(
        def(&f, &returned(&f)).kind,
        InstKind::ExtractElement {
            vector: Value::Arg(GRID_SIZE),
            index: Value::i32(1),
        }
    );
}

#[test]
fn sync_buffer_is_pointer_argument() {
    let mut f = kernel(WorkItemFn::SyncBuffer, None, Type::Ptr, false);
    resolve(&mut f);
    assert_eq!(returned(&f), Value::Arg(SYNC_BUFFER));
}

#[test]
fn unrelated_calls_are_untouched() {
    let mut f = Function::new("kernel", None);
    ImplicitArgs::all().attach(&mut f, 32);
    f.push(
        InstKind::Call {
            callee: "__builtin_IB_get_global_id".to_string(),
            args: vec![Value::i32(0)],
        },
        Some(Type::I32),
    );
    f.push(InstKind::Ret(None), None);
    let report = resolve(&mut f);
    assert!(report.resolved.is_empty());
    assert_eq!(f.calls().count(), 1);
}

#[test]
fn every_call_is_resolved_in_order() {
    let mut f = Function::new("kernel", None);
    ImplicitArgs::all().attach(&mut f, 32);
    for wi in [WorkItemFn::LocalIdZ, WorkItemFn::NumGroups, WorkItemFn::WorkDim] {
        let dim = wi.takes_dim().then(|| Value::i32(0));
        f.push(
            InstKind::Call {
                callee: wi.name().to_string(),
                args: dim.into_iter().collect(),
            },
            Some(Type::I32),
        );
    }
    f.push(InstKind::Ret(None), None);
    let report = resolve(&mut f);
    assert_eq!(
        report.resolved,
        vec![WorkItemFn::LocalIdZ, WorkItemFn::NumGroups, WorkItemFn::WorkDim]
    );
    assert_eq!(f.calls().count(), 0);
}

#[test]
fn known_group_size_replaces_enqueued_size() {
    let mut f = kernel(WorkItemFn::EnqueuedLocalSize, Some(0), Type::I32, false);
    f.known_group_size = Some([8, 4, 1]);
    let report = resolve(&mut f);
    assert_eq!(report.group_size_uses, 1);
    assert!(!f.has_uses(&Value::Arg(ENQUEUED_LOCAL_SIZE)));
    assert_eq!(
        def(&f, &returned(&f)).kind,
        InstKind::ExtractElement {
            vector: Value::ConstVector {
                bits: 32,
                lanes: vec![8, 4, 1],
            },
            index: Value::i32(0),
        }
    );
}

#[test]
#[should_panic(expected = "function kernel has 0 parameters but 13 implicit arguments")]
fn injected_builtin_without_parameters_panics() {
    let mut f = Function::new("kernel", Some(Type::I32));
    let call = f.push(
        InstKind::Call {
            callee: WorkItemFn::WorkDim.name().to_string(),
            args: vec![],
        },
        Some(Type::I32),
    );
    f.push(InstKind::Ret(Some(call)), Some(Type::I32));
    resolve(&mut f);
}

#[test]
fn parameterless_helpers_resolve_cleanly() {
    for stack_call in [false, true] {
        let mut f = Function::new("helper", None);
        f.stack_call = stack_call;
        f.known_group_size = Some([8, 1, 1]);
        f.push(InstKind::Ret(None), None);
        let report = resolve(&mut f);
        assert!(report.resolved.is_empty());
        assert_eq!(report.group_size_uses, 0);
    }
}

#[test]
fn stack_call_side_buffer_builtins_need_no_parameters() {
    let mut f = Function::new("helper", Some(Type::I32));
    f.stack_call = true;
    let call = f.push(
        InstKind::Call {
            callee: WorkItemFn::LocalSize.name().to_string(),
            args: vec![Value::i32(1)],
        },
        Some(Type::I32),
    );
    f.push(InstKind::Ret(Some(call)), Some(Type::I32));
    let report = resolve(&mut f);
    assert_eq!(report.convention, Convention::StackCall);
    assert_eq!(report.resolved, vec![WorkItemFn::LocalSize]);
}

#[test]
fn implicit_arg_lookup_tolerates_short_functions() {
    let table = ImplicitArgs::all();
    let short = Function::new("helper", None);
    assert_eq!(table.first_index(&short), None);
    assert_eq!(table.arg(&short, ImplicitArgKind::WorkDim), None);

    let full = kernel(WorkItemFn::WorkDim, None, Type::I32, false);
    assert_eq!(table.first_index(&full), Some(1));
    assert_eq!(table.arg(&full, ImplicitArgKind::WorkDim), Some(Value::Arg(WORK_DIM)));
}

#[test]
#[should_panic(expected = "takes a dimension argument")]
fn missing_dimension_panics() {
    let mut f = kernel(WorkItemFn::GlobalOffset, None, Type::I32, false);
    resolve(&mut f);
}

#[test]
fn single_call_kernel_resolves() {
    let (mut f, table) = single_call_kernel(WorkItemFn::NumGroups, Some(2), Type::I32, false, 32);
    let report = resolve_work_items(&mut f, &table, &TargetConfig::skl());
    assert_eq!(report.resolved, vec![WorkItemFn::NumGroups]);
    assert_eq!(
        def(&f, &returned(&f)).kind,
        InstKind::ExtractElement {
            vector: Value::Arg(3),
            index: Value::i32(2),
        }
    );
}
