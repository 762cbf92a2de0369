//! The chunk entity.
//!
//! A [`Chunk`] pairs lock-free metadata (position, lifecycle state, dirty and
//! disposed flags) with a [`ChunkData`] behind a `parking_lot::Mutex`. All
//! array access goes through the [`ChunkGuard`] returned by [`Chunk::lock`], so
//! a lock is always released when the guard leaves scope, even on panic.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use glam::IVec3;
use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::block::{BlockDef, BlockId};
use crate::chunk_state::ChunkState;
use crate::chunk_type::ChunkType;
use crate::context::ChunkContext;
use crate::events::ChunkEvent;
use crate::statistics::ChunkStatistics;
use crate::tera::{ArraySize, TeraArray, TeraDeflator};

/// Highest sunlight or block light level.
pub const MAX_LIGHT: u8 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("light value {0} exceeds {MAX_LIGHT}")]
    LightOutOfRange(u8),
}

/// Scoped exclusive access to a chunk's arrays.
pub type ChunkGuard<'a> = MutexGuard<'a, ChunkData>;

// ---------------------------------------------------------------------------
// ChunkData
// ---------------------------------------------------------------------------

/// Per-block arrays of one chunk. Positions are local, in `[0, size)`.
pub struct ChunkData {
    pos: IVec3,
    size: ArraySize,
    blocks: Box<dyn TeraArray>,
    sunlight: Box<dyn TeraArray>,
    light: Box<dyn TeraArray>,
    extra: Box<dyn TeraArray>,
    extensions: FxHashMap<String, Box<dyn TeraArray>>,
    context: Arc<ChunkContext>,
}

/// Estimated array sizes in bytes before and after a deflation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeflateReport {
    /// Block, sunlight, light and extra arrays.
    pub before: [usize; 4],
    pub after: [usize; 4],
    pub extensions_before: usize,
    pub extensions_after: usize,
}

impl DeflateReport {
    pub fn total_before(&self) -> usize {
        self.before.iter().sum::<usize>() + self.extensions_before
    }

    pub fn total_after(&self) -> usize {
        self.after.iter().sum::<usize>() + self.extensions_after
    }
}

fn reduction_percent(before: usize, after: usize) -> f64 {
    if before == 0 {
        0.0
    } else {
        100.0 - 100.0 * after as f64 / before as f64
    }
}

impl ChunkData {
    /// Zeroed arrays in the context's configured encodings.
    pub fn new(pos: IVec3, chunk_type: ChunkType, context: Arc<ChunkContext>) -> Self {
        let size = chunk_type.array_size();
        Self {
            pos,
            size,
            blocks: context.block_encoding.create(size),
            sunlight: context.sunlight_encoding.create(size),
            light: context.light_encoding.create(size),
            extra: context.extra_encoding.create(size),
            extensions: FxHashMap::default(),
            context,
        }
    }

    /// Assembles data from decoded arrays. Sizes are checked by the caller.
    pub(crate) fn from_arrays(
        pos: IVec3,
        arrays: [Box<dyn TeraArray>; 4],
        extensions: FxHashMap<String, Box<dyn TeraArray>>,
        context: Arc<ChunkContext>,
    ) -> Self {
        let [blocks, sunlight, light, extra] = arrays;
        Self {
            pos,
            size: blocks.size(),
            blocks,
            sunlight,
            light,
            extra,
            extensions,
            context,
        }
    }

    pub fn pos(&self) -> IVec3 {
        self.pos
    }

    pub fn size(&self) -> ArraySize {
        self.size
    }

    pub fn context(&self) -> &Arc<ChunkContext> {
        &self.context
    }

    pub fn is_in_bounds(&self, pos: IVec3) -> bool {
        self.size.contains(pos.x, pos.y, pos.z)
    }

    #[inline]
    fn cell(&self, pos: IVec3) -> (usize, usize, usize) {
        debug_assert!(self.is_in_bounds(pos), "{pos} outside chunk of size {}", self.size);
        (pos.x as usize, pos.y as usize, pos.z as usize)
    }

    pub fn get_block(&self, pos: IVec3) -> BlockId {
        let (x, y, z) = self.cell(pos);
        BlockId(self.blocks.get(x, y, z))
    }

    /// Definition of the block at `pos`.
    pub fn block_def(&self, pos: IVec3) -> &BlockDef {
        self.context.blocks.get(self.get_block(pos))
    }

    /// Returns `true` if the stored block changed. Placing a non-liquid block
    /// clears the cell's extra (liquid) data.
    pub fn set_block(&mut self, pos: IVec3, block: BlockId) -> bool {
        let (x, y, z) = self.cell(pos);
        let old = self.blocks.set(x, y, z, block.0);
        if old == block.0 {
            return false;
        }
        if !self.context.blocks.get(block).liquid {
            self.extra.set(x, y, z, 0);
        }
        true
    }

    /// Compare-and-set on the block array.
    pub fn set_block_if(&mut self, pos: IVec3, block: BlockId, expected: BlockId) -> bool {
        if block == expected {
            return false;
        }
        let (x, y, z) = self.cell(pos);
        if !self.blocks.set_if(x, y, z, block.0, expected.0) {
            return false;
        }
        if !self.context.blocks.get(block).liquid {
            self.extra.set(x, y, z, 0);
        }
        true
    }

    pub fn get_sunlight(&self, pos: IVec3) -> u8 {
        let (x, y, z) = self.cell(pos);
        self.sunlight.get(x, y, z) as u8
    }

    pub fn set_sunlight(&mut self, pos: IVec3, value: u8) -> Result<bool, ChunkError> {
        if value > MAX_LIGHT {
            return Err(ChunkError::LightOutOfRange(value));
        }
        let (x, y, z) = self.cell(pos);
        Ok(self.sunlight.set(x, y, z, u16::from(value)) != u16::from(value))
    }

    pub fn get_light(&self, pos: IVec3) -> u8 {
        let (x, y, z) = self.cell(pos);
        self.light.get(x, y, z) as u8
    }

    pub fn set_light(&mut self, pos: IVec3, value: u8) -> Result<bool, ChunkError> {
        if value > MAX_LIGHT {
            return Err(ChunkError::LightOutOfRange(value));
        }
        let (x, y, z) = self.cell(pos);
        Ok(self.light.set(x, y, z, u16::from(value)) != u16::from(value))
    }

    /// Liquid/extra byte.
    pub fn get_extra(&self, pos: IVec3) -> u8 {
        let (x, y, z) = self.cell(pos);
        self.extra.get(x, y, z) as u8
    }

    pub fn set_extra(&mut self, pos: IVec3, value: u8) -> bool {
        let (x, y, z) = self.cell(pos);
        self.extra.set(x, y, z, u16::from(value)) != u16::from(value)
    }

    pub fn set_extra_if(&mut self, pos: IVec3, value: u8, expected: u8) -> bool {
        let (x, y, z) = self.cell(pos);
        self.extra.set_if(x, y, z, u16::from(value), u16::from(expected))
    }

    /// Fills the sunlight and light arrays with one value.
    pub fn fill_light(&mut self, sunlight: u8, light: u8) -> Result<(), ChunkError> {
        for value in [sunlight, light] {
            if value > MAX_LIGHT {
                return Err(ChunkError::LightOutOfRange(value));
            }
        }
        self.sunlight.fill(u16::from(sunlight));
        self.light.fill(u16::from(light));
        Ok(())
    }

    pub fn is_extension_allocated(&self, id: &str) -> bool {
        self.extensions.contains_key(id)
    }

    /// The named extension array, allocated on first use. Unknown ids are
    /// logged and yield `None`.
    pub fn extension_data(&mut self, id: &str) -> Option<&mut Box<dyn TeraArray>> {
        if !self.extensions.contains_key(id) {
            let Some(entry) = self.context.extensions.get(id) else {
                tracing::error!(
                    id,
                    chunk = %self.pos,
                    "cannot allocate unknown chunk extension"
                );
                return None;
            };
            let array = entry.create(self.size);
            self.extensions.insert(id.to_string(), array);
        }
        self.extensions.get_mut(id)
    }

    /// Allocated extension arrays.
    pub fn extensions(&self) -> impl Iterator<Item = (&str, &dyn TeraArray)> {
        self.extensions
            .iter()
            .map(|(id, array)| (id.as_str(), array.as_ref()))
    }

    /// Block, sunlight, light and extra arrays.
    pub fn arrays(&self) -> [&dyn TeraArray; 4] {
        [
            self.blocks.as_ref(),
            self.sunlight.as_ref(),
            self.light.as_ref(),
            self.extra.as_ref(),
        ]
    }

    pub fn estimated_memory(&self) -> usize {
        self.arrays()
            .iter()
            .map(|array| array.estimated_memory())
            .sum::<usize>()
            + self.extension_memory()
    }

    fn extension_memory(&self) -> usize {
        self.extensions
            .values()
            .map(|array| array.estimated_memory())
            .sum()
    }

    /// Replaces every array with its smallest lossless encoding.
    pub fn deflate(&mut self) -> DeflateReport {
        let context = Arc::clone(&self.context);
        let deflator = TeraDeflator::new(&context.arrays);
        let mut report = DeflateReport {
            extensions_before: self.extension_memory(),
            ..DeflateReport::default()
        };
        let primaries = [
            &mut self.blocks,
            &mut self.sunlight,
            &mut self.light,
            &mut self.extra,
        ];
        for (i, array) in primaries.into_iter().enumerate() {
            report.before[i] = array.estimated_memory();
            *array = deflator.deflate(array.as_ref());
            report.after[i] = array.estimated_memory();
        }
        for array in self.extensions.values_mut() {
            *array = deflator.deflate(array.as_ref());
        }
        report.extensions_after = self.extension_memory();
        report
    }
}

impl Clone for ChunkData {
    fn clone(&self) -> Self {
        Self {
            pos: self.pos,
            size: self.size,
            blocks: self.blocks.copy(),
            sunlight: self.sunlight.copy(),
            light: self.light.copy(),
            extra: self.extra.copy(),
            extensions: self
                .extensions
                .iter()
                .map(|(id, array)| (id.clone(), array.copy()))
                .collect(),
            context: Arc::clone(&self.context),
        }
    }
}

impl fmt::Debug for ChunkData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkData")
            .field("pos", &self.pos)
            .field("size", &self.size)
            .field(
                "encodings",
                &self.arrays().map(|array| array.encoding()),
            )
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// A chunk of the world.
///
/// Registered with the context's chunk monitor for its whole life. State,
/// dirty and disposed are readable without the lock and may be stale.
pub struct Chunk {
    pos: IVec3,
    chunk_type: ChunkType,
    state: AtomicU8,
    dirty: AtomicBool,
    disposed: AtomicBool,
    data: Mutex<ChunkData>,
    context: Arc<ChunkContext>,
}

impl Chunk {
    /// A fresh, empty chunk awaiting adjacency generation.
    pub fn new(pos: IVec3, chunk_type: ChunkType, context: Arc<ChunkContext>) -> Self {
        let data = ChunkData::new(pos, chunk_type, Arc::clone(&context));
        Self::from_data(data, chunk_type, ChunkState::AdjacencyGenerationPending)
    }

    pub fn from_data(data: ChunkData, chunk_type: ChunkType, state: ChunkState) -> Self {
        let pos = data.pos();
        let context = Arc::clone(data.context());
        context.monitor.register_chunk(pos);
        Self {
            pos,
            chunk_type,
            state: AtomicU8::new(state.id()),
            dirty: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
            data: Mutex::new(data),
            context,
        }
    }

    pub fn pos(&self) -> IVec3 {
        self.pos
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn context(&self) -> &Arc<ChunkContext> {
        &self.context
    }

    pub fn state(&self) -> ChunkState {
        let raw = self.state.load(Ordering::Acquire);
        ChunkState::by_id(i32::from(raw)).unwrap_or(ChunkState::Complete)
    }

    /// Advances the lifecycle state. Backward requests are logged and
    /// ignored. Returns `true` if the state changed.
    pub fn set_state(&self, new: ChunkState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let old = ChunkState::by_id(i32::from(current)).unwrap_or(ChunkState::Complete);
            if new == old {
                return false;
            }
            if new < old {
                tracing::warn!(
                    chunk = %self.pos,
                    ?old,
                    ?new,
                    "ignoring backward chunk state transition"
                );
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                new.id(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.context.monitor.post(&ChunkEvent::StateChanged {
                        pos: self.pos,
                        old,
                        new,
                    });
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Marks the chunk disposed and unregisters it. Later calls do nothing.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.context.monitor.unregister_chunk(self.pos);
        }
    }

    pub fn lock(&self) -> ChunkGuard<'_> {
        self.data.lock()
    }

    pub fn try_lock(&self) -> Option<ChunkGuard<'_>> {
        self.data.try_lock()
    }

    pub fn is_locked(&self) -> bool {
        self.data.is_locked()
    }

    /// World position of the chunk's block at local (0, 0, 0).
    pub fn chunk_world_pos(&self) -> IVec3 {
        self.pos * self.chunk_type.size()
    }

    pub fn block_world_pos(&self, local: IVec3) -> IVec3 {
        self.chunk_world_pos() + local
    }

    pub fn estimated_memory(&self) -> usize {
        self.lock().estimated_memory()
    }

    /// Re-encodes all arrays into their smallest lossless encodings and fires
    /// [`ChunkEvent::Deflated`].
    pub fn deflate(&self) -> DeflateReport {
        let state = self.state();
        if state != ChunkState::Complete {
            tracing::warn!(
                chunk = %self.pos,
                ?state,
                "deflating a chunk that is not complete"
            );
        }
        let report = self.lock().deflate();
        let (before, after) = (report.total_before(), report.total_after());
        if self.context.deflation_logging {
            let field = |i: usize| reduction_percent(report.before[i], report.after[i]);
            tracing::info!(
                chunk = %self.pos,
                size_before = before,
                size_after = after,
                total = format_args!("{:.2}%", reduction_percent(before, after)),
                blocks = format_args!("{:.2}%", field(0)),
                sunlight = format_args!("{:.2}%", field(1)),
                light = format_args!("{:.2}%", field(2)),
                extra = format_args!("{:.2}%", field(3)),
                "chunk deflated"
            );
        }
        self.context.monitor.record_deflation(self.pos, before, after);
        report
    }

    /// Block-run statistics, computed under the lock.
    pub fn statistics(&self) -> ChunkStatistics {
        ChunkStatistics::collect(&self.lock())
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos)
            .field("chunk_type", &self.chunk_type)
            .field("state", &self.state())
            .field("dirty", &self.is_dirty())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ChunkRecord
// ---------------------------------------------------------------------------

/// Detached snapshot of a chunk, not registered with the monitor.
///
/// Stores persist records rather than live chunks, so a caller that already
/// holds a chunk's guard can hand its data over without locking again.
#[derive(Clone, Debug)]
pub struct ChunkRecord {
    pub pos: IVec3,
    pub chunk_type: ChunkType,
    pub state: ChunkState,
    pub data: ChunkData,
}

impl ChunkRecord {
    /// Copies `data`, which must be the locked contents of `chunk`.
    pub fn capture(chunk: &Chunk, data: &ChunkData) -> Self {
        Self {
            pos: chunk.pos(),
            chunk_type: chunk.chunk_type(),
            state: chunk.state(),
            data: data.clone(),
        }
    }

    /// Locks `chunk` and copies it.
    pub fn snapshot(chunk: &Chunk) -> Self {
        let data = chunk.lock();
        Self::capture(chunk, &data)
    }

    /// Turns the snapshot back into a live, registered chunk.
    pub fn into_chunk(self) -> Chunk {
        Chunk::from_data(self.data, self.chunk_type, self.state)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
