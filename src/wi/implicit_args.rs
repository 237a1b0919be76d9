use super::ir::{Function, Type, Value};

/// Arguments the runtime appends after a kernel's explicit parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImplicitArgKind {
    R0,
    PayloadHeader,
    WorkDim,
    NumGroups,
    GlobalSize,
    LocalSize,
    EnqueuedLocalWorkSize,
    LocalIdX,
    LocalIdY,
    LocalIdZ,
    StageInGridOrigin,
    StageInGridSize,
    SyncBuffer,
}

impl ImplicitArgKind {
    pub const ALL: [ImplicitArgKind; 13] = [
        ImplicitArgKind::R0,
        ImplicitArgKind::PayloadHeader,
        ImplicitArgKind::WorkDim,
        ImplicitArgKind::NumGroups,
        ImplicitArgKind::GlobalSize,
        ImplicitArgKind::LocalSize,
        ImplicitArgKind::EnqueuedLocalWorkSize,
        ImplicitArgKind::LocalIdX,
        ImplicitArgKind::LocalIdY,
        ImplicitArgKind::LocalIdZ,
        ImplicitArgKind::StageInGridOrigin,
        ImplicitArgKind::StageInGridSize,
        ImplicitArgKind::SyncBuffer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ImplicitArgKind::R0 => "r0",
            ImplicitArgKind::PayloadHeader => "payloadHeader",
            ImplicitArgKind::WorkDim => "workDim",
            ImplicitArgKind::NumGroups => "numGroups",
            ImplicitArgKind::GlobalSize => "globalSize",
            ImplicitArgKind::LocalSize => "localSize",
            ImplicitArgKind::EnqueuedLocalWorkSize => "enqueuedLocalSize",
            ImplicitArgKind::LocalIdX => "localIdX",
            ImplicitArgKind::LocalIdY => "localIdY",
            ImplicitArgKind::LocalIdZ => "localIdZ",
            ImplicitArgKind::StageInGridOrigin => "stageInGridOrigin",
            ImplicitArgKind::StageInGridSize => "stageInGridSize",
            ImplicitArgKind::SyncBuffer => "syncBuffer",
        }
    }

    /// IR type of the argument; R0 is one GRF of dwords.
    pub fn ty(self, grf_size: u32) -> Type {
        match self {
            ImplicitArgKind::R0 => Type::vec(32, grf_size / 4),
            ImplicitArgKind::PayloadHeader => Type::vec(32, 8),
            ImplicitArgKind::WorkDim => Type::I32,
            ImplicitArgKind::NumGroups
            | ImplicitArgKind::GlobalSize
            | ImplicitArgKind::LocalSize
            | ImplicitArgKind::EnqueuedLocalWorkSize
            | ImplicitArgKind::StageInGridOrigin
            | ImplicitArgKind::StageInGridSize => Type::vec(32, 3),
            ImplicitArgKind::LocalIdX | ImplicitArgKind::LocalIdY | ImplicitArgKind::LocalIdZ => {
                Type::I16
            }
            ImplicitArgKind::SyncBuffer => Type::Ptr,
        }
    }
}

/// Ordered implicit arguments of one function, matched against the tail of
/// its parameter list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImplicitArgs {
    kinds: Vec<ImplicitArgKind>,
}

impl ImplicitArgs {
    pub fn new(kinds: Vec<ImplicitArgKind>) -> Self {
        Self { kinds }
    }

    /// Every kind, in declaration order.
    pub fn all() -> Self {
        Self::new(ImplicitArgKind::ALL.to_vec())
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kinds(&self) -> &[ImplicitArgKind] {
        &self.kinds
    }

    pub fn contains(&self, kind: ImplicitArgKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Append one parameter per implicit argument to `func`.
    pub fn attach(&self, func: &mut Function, grf_size: u32) {
        for kind in &self.kinds {
            func.add_param(kind.name(), kind.ty(grf_size));
        }
    }

    /// Index of the first implicit parameter of `func`, or `None` when
    /// `func` has fewer parameters than the table has entries.
    pub fn first_index(&self, func: &Function) -> Option<usize> {
        func.params.len().checked_sub(self.kinds.len())
    }

    /// The parameter carrying `kind` in `func`, if both have it.
    pub fn arg(&self, func: &Function, kind: ImplicitArgKind) -> Option<Value> {
        let first = self.first_index(func)?;
        let pos = self.kinds.iter().position(|&k| k == kind)?;
        Some(Value::Arg((first + pos) as u32))
    }
}
