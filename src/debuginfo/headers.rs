//! On-disk headers. Every field is a little-endian `u32`.

use bytemuck::{Pod, Zeroable};

/// "IGCD": per-kernel vISA and GenISA blobs.
pub const KERNEL_BLOBS_MAGIC: u32 = u32::from_le_bytes(*b"IGCD");
/// "DBGL": string, directory, file and line tables.
pub const LINE_TABLES_MAGIC: u32 = u32::from_le_bytes(*b"DBGL");
pub const VERSION: u32 = 1;

/// Byte offset of the `size` field in both program headers.
pub const SIZE_FIELD_OFFSET: usize = 8;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct BlobProgramHeader {
    pub magic: u32,
    pub version: u32,
    pub size: u32,
    pub device: u32,
    pub stepping_id: u32,
    pub pointer_size: u32,
    pub num_kernels: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct BlobKernelHeader {
    /// Padded name length, NUL included.
    pub name_size: u32,
    pub visa_size: u32,
    pub gen_isa_size: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct LineProgramHeader {
    pub magic: u32,
    pub version: u32,
    pub size: u32,
    pub string_table_size: u32,
    pub dir_table_size: u32,
    pub file_table_size: u32,
    pub device: u32,
    pub stepping_id: u32,
    pub pointer_size: u32,
    pub num_kernels: u32,
    pub num_kernels_with_debug_data: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct LineKernelHeader {
    pub kernel_index: u32,
    pub code_offset: u32,
    pub size: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct LineEntryRaw {
    pub offset: u32,
    pub line_column: u32,
    pub file_index: u32,
}

/// Convert every word of `value` between host and little-endian order.
pub fn swap_to_le<T: Pod>(mut value: T) -> T {
    if cfg!(target_endian = "big") {
        for word in bytemuck::cast_slice_mut::<u8, u32>(bytemuck::bytes_of_mut(&mut value)) {
            *word = word.swap_bytes();
        }
    }
    value
}
