//! Byte layout of the side buffer the stack-call convention reads
//! work-item state from.
//!
//! Offsets accumulate field by field, so each constant is the previous one
//! plus the previous field's size.

use super::builder::Builder;
use super::ir::{Type, Value};

pub const STRUCT_SIZE: u32 = 0;
pub const VERSION: u32 = STRUCT_SIZE + 1;
pub const NUM_WORK_DIM: u32 = VERSION + 1;
pub const SIMDSIZE: u32 = NUM_WORK_DIM + 1;
pub const LOCAL_SIZE_X: u32 = SIMDSIZE + 1;
pub const LOCAL_SIZE_Y: u32 = LOCAL_SIZE_X + 4;
pub const LOCAL_SIZE_Z: u32 = LOCAL_SIZE_Y + 4;
pub const GLOBAL_SIZE_X: u32 = LOCAL_SIZE_Z + 4;
pub const GLOBAL_SIZE_Y: u32 = GLOBAL_SIZE_X + 8;
pub const GLOBAL_SIZE_Z: u32 = GLOBAL_SIZE_Y + 8;
pub const PRINTF_BUFFER: u32 = GLOBAL_SIZE_Z + 8;
pub const GLOBAL_OFFSET_X: u32 = PRINTF_BUFFER + 8;
pub const GLOBAL_OFFSET_Y: u32 = GLOBAL_OFFSET_X + 8;
pub const GLOBAL_OFFSET_Z: u32 = GLOBAL_OFFSET_Y + 8;
pub const LOCAL_IDS: u32 = GLOBAL_OFFSET_Z + 8;
pub const GROUP_COUNT_X: u32 = LOCAL_IDS + 8;
pub const GROUP_COUNT_Y: u32 = GROUP_COUNT_X + 4;
pub const GROUP_COUNT_Z: u32 = GROUP_COUNT_Y + 4;
pub const TOTAL_SIZE: u32 = GROUP_COUNT_Z + 4;

/// One row of the side-buffer table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: u32,
    pub size: u32,
}

pub const FIELDS: [Field; 18] = [
    field("struct_size", STRUCT_SIZE, 1),
    field("struct_version", VERSION, 1),
    field("num_work_dim", NUM_WORK_DIM, 1),
    field("simd_width", SIMDSIZE, 1),
    field("local_size_x", LOCAL_SIZE_X, 4),
    field("local_size_y", LOCAL_SIZE_Y, 4),
    field("local_size_z", LOCAL_SIZE_Z, 4),
    field("global_size_x", GLOBAL_SIZE_X, 8),
    field("global_size_y", GLOBAL_SIZE_Y, 8),
    field("global_size_z", GLOBAL_SIZE_Z, 8),
    field("printf_buffer_ptr", PRINTF_BUFFER, 8),
    field("global_offset_x", GLOBAL_OFFSET_X, 8),
    field("global_offset_y", GLOBAL_OFFSET_Y, 8),
    field("global_offset_z", GLOBAL_OFFSET_Z, 8),
    field("local_id_table_ptr", LOCAL_IDS, 8),
    field("group_count_x", GROUP_COUNT_X, 4),
    field("group_count_y", GROUP_COUNT_Y, 4),
    field("group_count_z", GROUP_COUNT_Z, 4),
];

const fn field(name: &'static str, offset: u32, size: u32) -> Field {
    Field { name, offset, size }
}

/// Load a value of type `ty` from byte `offset` of the side buffer.
///
/// Loads start at the offset rounded down to the element size. When that
/// moves the start, twice the bytes are loaded and the wanted bytes are
/// copied into a fresh byte vector before the final bitcast.
pub fn build_load(b: &mut Builder<'_>, offset: u32, ty: Type) -> Value {
    let elem = ty.elem();
    let elem_bytes = elem.byte_size();
    let size = ty.byte_size();
    let aligned = offset / elem_bytes * elem_bytes;
    let load_bytes = if offset == aligned { size } else { size * 2 };
    let load_lanes = load_bytes / elem_bytes;
    let load_ty = if load_lanes == 1 {
        elem
    } else {
        Type::vec(elem.scalar_bits(), load_lanes)
    };

    let ptr = b.int_to_ptr(Value::i32(aligned));
    let loaded = b.load(ptr, load_ty, elem_bytes);
    if offset == aligned {
        return b.bitcast(loaded, ty);
    }

    let bytes = b.bitcast(loaded, Type::vec(8, load_bytes));
    let mut packed = Value::Undef(Type::vec(8, size));
    for i in offset..offset + size {
        let byte = b.extract_element(bytes.clone(), Value::i32(i - aligned));
        packed = b.insert_element(packed, byte, Value::i32(i - offset));
    }
    b.bitcast(packed, ty)
}
