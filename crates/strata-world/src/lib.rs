//! Chunk production for the Strata voxel world.
//!
//! The [`LocalChunkProvider`] keeps a near cache of live chunks around the
//! observed regions, generates or loads missing ones on background worker
//! pools, drives each chunk through its lifecycle states as its neighborhood
//! catches up, and evicts chunks that drift out of view into a [`ChunkStore`].

pub mod generator;
pub mod monitor;
pub mod provider;
pub mod store;

pub use generator::{
    ChunkGeneratorManager, FirstPassGenerator, FlatGenerator, GenerateError, LanternDecorator,
    SecondPassGenerator, StackableTestGenerator,
};
pub use monitor::{ThreadMonitor, WorkerMonitor};
pub use provider::{
    CacheRegion, ChunkReadyEvent, LocalChunkProvider, Observer, ObserverId, ProviderError,
    TrackedObserver,
};
pub use store::{ChunkStore, CompressedChunkStore, MemoryChunkStore};
