//! Work-item function resolution.
//!
//! Rewrites calls to work-item builtins (`__builtin_IB_get_local_id_x`,
//! `__builtin_IB_get_group_id`, ...) into reads of implicit kernel
//! arguments, or, for stack-call functions, into side-buffer loads and
//! hardware register reads.

pub mod builder;
pub mod implicit_args;
pub mod intrinsic;
pub mod ir;
pub mod layout;
pub mod resolve;

#[cfg(test)]
mod tests;

pub use implicit_args::{ImplicitArgKind, ImplicitArgs};
pub use intrinsic::WorkItemFn;
pub use ir::{Function, Type, Value};
pub use resolve::{resolve_work_items, Convention, ResolveReport};

use ir::InstKind;

/// A function holding one call to `wi` and returning its result, with every
/// implicit argument attached. Used to inspect a builtin's lowering.
pub fn single_call_kernel(
    wi: WorkItemFn,
    dim: Option<u32>,
    ret: Type,
    stack_call: bool,
    grf_size: u32,
) -> (Function, ImplicitArgs) {
    let mut func = Function::new("kernel", Some(ret));
    func.stack_call = stack_call;
    let table = ImplicitArgs::all();
    table.attach(&mut func, grf_size);
    let args = dim.map(|d| vec![Value::i32(d)]).unwrap_or_default();
    let call = func.push(
        InstKind::Call {
            callee: wi.name().to_string(),
            args,
        },
        Some(ret),
    );
    func.push(InstKind::Ret(Some(call)), Some(ret));
    (func, table)
}
