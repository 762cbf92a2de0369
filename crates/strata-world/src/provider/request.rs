//! Work items for the review and processing pools.

use glam::IVec3;
use strata_math::Region3i;
use strata_voxel::ChunkState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Re-check the lifecycle state of every chunk in the region.
    Review,
    /// Make sure every chunk in the region exists or is being prepared.
    Produce,
    /// Stop the receiving worker.
    Exit,
}

/// A request for the review pool.
#[derive(Clone, Copy, Debug)]
pub struct ChunkRequest {
    pub kind: RequestKind,
    pub region: Region3i,
}

impl ChunkRequest {
    pub fn review(region: Region3i) -> Self {
        Self {
            kind: RequestKind::Review,
            region,
        }
    }

    pub fn produce(region: Region3i) -> Self {
        Self {
            kind: RequestKind::Produce,
            region,
        }
    }

    pub fn exit() -> Self {
        Self {
            kind: RequestKind::Exit,
            region: Region3i::EMPTY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Load,
    Generate,
    SecondPass,
    InternalLight,
    PropagateLight,
    Deflate,
    Shutdown,
}

impl TaskKind {
    /// The stage task that advances a chunk out of `state`, if any.
    /// Completion is a plain state flip and runs inline.
    pub fn for_stage(state: ChunkState) -> Option<TaskKind> {
        match state {
            ChunkState::AdjacencyGenerationPending => Some(TaskKind::SecondPass),
            ChunkState::InternalLightGenerationPending => Some(TaskKind::InternalLight),
            ChunkState::LightPropagationPending => Some(TaskKind::PropagateLight),
            ChunkState::FullLightConnectivityPending | ChunkState::Complete => None,
        }
    }
}

/// A unit of heavy work for the processing pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkTask {
    pub kind: TaskKind,
    pub pos: IVec3,
}

impl ChunkTask {
    pub fn new(kind: TaskKind, pos: IVec3) -> Self {
        Self { kind, pos }
    }

    pub fn shutdown() -> Self {
        Self::new(TaskKind::Shutdown, IVec3::ZERO)
    }
}
