//! Chunk storage for the Strata voxel world: block definitions, pluggable per-block
//! arrays with lossless deflation, the chunk entity and its lifecycle states,
//! persistence messages, and lock-holding multi-chunk views.

pub mod bit_packed;
pub mod block;
pub mod chunk;
pub mod chunk_serial;
pub mod chunk_state;
pub mod chunk_type;
pub mod context;
pub mod events;
pub mod extensions;
pub mod statistics;
pub mod tera;
pub mod world_view;

pub use block::{BlockDef, BlockId, BlockRegistry, BlockShape, RegistryError};
pub use chunk::{Chunk, ChunkData, ChunkError, ChunkGuard, ChunkRecord, DeflateReport, MAX_LIGHT};
pub use chunk_serial::{ChunkMessage, ChunkSerError, ModDataMessage};
pub use chunk_state::ChunkState;
pub use chunk_type::ChunkType;
pub use context::ChunkContext;
pub use events::{ChunkEvent, ChunkMonitor, ListenerId};
pub use extensions::{ExtensionEntry, ExtensionError, ExtensionRegistry};
pub use statistics::ChunkStatistics;
pub use tera::{
    ArraySize, TeraArray, TeraArrayEntry, TeraArrayError, TeraArrayRegistry, TeraDeflator,
};
pub use world_view::{ViewChunks, WorldView, WorldViewError};
