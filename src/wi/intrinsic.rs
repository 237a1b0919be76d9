/// Work-item builtins the resolver rewrites.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkItemFn {
    LocalIdX,
    LocalIdY,
    LocalIdZ,
    GroupId,
    LocalThreadId,
    GlobalSize,
    LocalSize,
    EnqueuedLocalSize,
    GlobalOffset,
    WorkDim,
    NumGroups,
    GridOrigin,
    GridSize,
    SyncBuffer,
}

impl WorkItemFn {
    pub const ALL: [WorkItemFn; 14] = [
        WorkItemFn::LocalIdX,
        WorkItemFn::LocalIdY,
        WorkItemFn::LocalIdZ,
        WorkItemFn::GroupId,
        WorkItemFn::LocalThreadId,
        WorkItemFn::GlobalSize,
        WorkItemFn::LocalSize,
        WorkItemFn::EnqueuedLocalSize,
        WorkItemFn::GlobalOffset,
        WorkItemFn::WorkDim,
        WorkItemFn::NumGroups,
        WorkItemFn::GridOrigin,
        WorkItemFn::GridSize,
        WorkItemFn::SyncBuffer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WorkItemFn::LocalIdX => "__builtin_IB_get_local_id_x",
            WorkItemFn::LocalIdY => "__builtin_IB_get_local_id_y",
            WorkItemFn::LocalIdZ => "__builtin_IB_get_local_id_z",
            WorkItemFn::GroupId => "__builtin_IB_get_group_id",
            WorkItemFn::LocalThreadId => "__builtin_IB_get_local_thread_id",
            WorkItemFn::GlobalSize => "__builtin_IB_get_global_size",
            WorkItemFn::LocalSize => "__builtin_IB_get_local_size",
            WorkItemFn::EnqueuedLocalSize => "__builtin_IB_get_enqueued_local_size",
            WorkItemFn::GlobalOffset => "__builtin_IB_get_global_offset",
            WorkItemFn::WorkDim => "__builtin_IB_get_work_dim",
            WorkItemFn::NumGroups => "__builtin_IB_get_num_groups",
            WorkItemFn::GridOrigin => "__builtin_IB_get_grid_origin",
            WorkItemFn::GridSize => "__builtin_IB_get_grid_size",
            WorkItemFn::SyncBuffer => "__builtin_IB_get_sync_buffer",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Whether the builtin takes a dimension argument.
    pub fn takes_dim(self) -> bool {
        matches!(
            self,
            WorkItemFn::GroupId
                | WorkItemFn::GlobalSize
                | WorkItemFn::LocalSize
                | WorkItemFn::EnqueuedLocalSize
                | WorkItemFn::GlobalOffset
                | WorkItemFn::NumGroups
                | WorkItemFn::GridOrigin
                | WorkItemFn::GridSize
        )
    }
}
