//! Chunk lifecycle phases.

use serde::{Deserialize, Serialize};

/// Ordered generation phases. A chunk only ever moves forward, and only when
/// every neighbor has reached at least its current phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChunkState {
    AdjacencyGenerationPending = 0,
    InternalLightGenerationPending = 1,
    LightPropagationPending = 2,
    FullLightConnectivityPending = 3,
    Complete = 4,
}

impl ChunkState {
    pub const ALL: [ChunkState; 5] = [
        ChunkState::AdjacencyGenerationPending,
        ChunkState::InternalLightGenerationPending,
        ChunkState::LightPropagationPending,
        ChunkState::FullLightConnectivityPending,
        ChunkState::Complete,
    ];

    /// Persisted id (0..=4).
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn by_id(id: i32) -> Option<ChunkState> {
        usize::try_from(id).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// The following phase, or `None` once complete.
    pub fn next(self) -> Option<ChunkState> {
        Self::by_id(i32::from(self.id()) + 1)
    }

    pub fn is_complete(self) -> bool {
        self == ChunkState::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_ordered() {
        for pair in ChunkState::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), Some(pair[1]));
        }
        assert_eq!(ChunkState::Complete.next(), None);
    }

    #[test]
    fn test_by_id() {
        assert_eq!(ChunkState::by_id(0), Some(ChunkState::AdjacencyGenerationPending));
        assert_eq!(ChunkState::by_id(4), Some(ChunkState::Complete));
        assert_eq!(ChunkState::by_id(5), None);
        assert_eq!(ChunkState::by_id(-1), None);
    }
}
