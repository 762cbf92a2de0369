//! Far stores for chunks evicted from the near cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use dashmap::DashMap;
use glam::IVec3;
use parking_lot::Mutex;
use strata_voxel::{Chunk, ChunkContext, ChunkRecord, ChunkSerError};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::monitor::{ThreadMonitor, WorkerMonitor};

/// Pool name of the compression workers.
pub const STORE_WORKERS: &str = "strata-chunk-store";
const STORE_WORKER_COUNT: usize = 2;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chunk encoding: {0}")]
    Encode(#[from] ChunkSerError),
    #[error("chunk decompression: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
}

/// Persistent chunk storage keyed by chunk position.
pub trait ChunkStore: Send + Sync {
    /// A fresh, live copy of the stored chunk.
    fn get(&self, pos: IVec3) -> Option<Arc<Chunk>>;

    fn put(&self, record: ChunkRecord);

    fn contains(&self, pos: IVec3) -> bool;

    /// Approximate stored size in megabytes.
    fn size(&self) -> f32;

    fn dispose(&self);
}

fn megabytes(bytes: usize) -> f32 {
    bytes as f32 / (1 << 20) as f32
}

// ---------------------------------------------------------------------------
// MemoryChunkStore
// ---------------------------------------------------------------------------

/// Keeps encoded, uncompressed chunk messages in memory.
pub struct MemoryChunkStore {
    context: Arc<ChunkContext>,
    chunks: DashMap<IVec3, Vec<u8>>,
    bytes: AtomicUsize,
}

impl MemoryChunkStore {
    pub fn new(context: Arc<ChunkContext>) -> Self {
        Self {
            context,
            chunks: DashMap::new(),
            bytes: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn get(&self, pos: IVec3) -> Option<Arc<Chunk>> {
        let bytes = self.chunks.get(&pos)?;
        match ChunkRecord::decode(&bytes, &self.context) {
            Ok(record) => Some(Arc::new(record.into_chunk())),
            Err(err) => {
                error!(chunk = %pos, "error loading chunk: {err}");
                None
            }
        }
    }

    fn put(&self, record: ChunkRecord) {
        let pos = record.pos;
        match record.encode() {
            Ok(bytes) => {
                self.bytes.fetch_add(bytes.len(), Ordering::Relaxed);
                if let Some(old) = self.chunks.insert(pos, bytes) {
                    self.bytes.fetch_sub(old.len(), Ordering::Relaxed);
                }
            }
            Err(err) => error!(chunk = %pos, "error saving chunk: {err}"),
        }
    }

    fn contains(&self, pos: IVec3) -> bool {
        self.chunks.contains_key(&pos)
    }

    fn size(&self) -> f32 {
        megabytes(self.bytes.load(Ordering::Relaxed))
    }

    fn dispose(&self) {}
}

// ---------------------------------------------------------------------------
// CompressedChunkStore
// ---------------------------------------------------------------------------

struct CompressedShared {
    context: Arc<ChunkContext>,
    /// Records queued for compression, served directly until saved.
    pending: DashMap<IVec3, Arc<ChunkRecord>>,
    compressed: DashMap<IVec3, Vec<u8>>,
    bytes: AtomicUsize,
}

impl CompressedShared {
    fn save(&self, record: &Arc<ChunkRecord>) -> Result<(), StoreError> {
        let encoded = record.encode()?;
        let compressed = lz4_flex::compress_prepend_size(&encoded);
        self.bytes.fetch_add(compressed.len(), Ordering::Relaxed);
        if let Some(old) = self.compressed.insert(record.pos, compressed) {
            self.bytes.fetch_sub(old.len(), Ordering::Relaxed);
        }
        self.pending
            .remove_if(&record.pos, |_, queued| Arc::ptr_eq(queued, record));
        Ok(())
    }

    fn load(&self, pos: IVec3) -> Result<Option<ChunkRecord>, StoreError> {
        let Some(compressed) = self.compressed.get(&pos) else {
            return Ok(None);
        };
        let encoded = lz4_flex::decompress_size_prepended(&compressed)?;
        Ok(Some(ChunkRecord::decode(&encoded, &self.context)?))
    }
}

/// Compresses chunks on two background workers and keeps the compressed
/// bytes in memory.
pub struct CompressedChunkStore {
    shared: Arc<CompressedShared>,
    queue: Mutex<Option<Sender<Arc<ChunkRecord>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CompressedChunkStore {
    pub fn new(context: Arc<ChunkContext>, threads: Arc<ThreadMonitor>) -> std::io::Result<Self> {
        let shared = Arc::new(CompressedShared {
            context,
            pending: DashMap::new(),
            compressed: DashMap::new(),
            bytes: AtomicUsize::new(0),
        });
        let (sender, receiver) = unbounded::<Arc<ChunkRecord>>();

        let mut workers = Vec::with_capacity(STORE_WORKER_COUNT);
        for i in 0..STORE_WORKER_COUNT {
            let shared = Arc::clone(&shared);
            let receiver = receiver.clone();
            let threads = Arc::clone(&threads);
            let handle = std::thread::Builder::new()
                .name(format!("chunk-store-{i}"))
                .spawn(move || {
                    let monitor = threads.create(STORE_WORKERS, &["saved"]);
                    compression_loop(&shared, &receiver, &monitor);
                })?;
            workers.push(handle);
        }

        Ok(Self {
            shared,
            queue: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        })
    }

    /// Number of records still waiting for compression.
    pub fn pending_len(&self) -> usize {
        self.shared.pending.len()
    }
}

fn compression_loop(
    shared: &CompressedShared,
    receiver: &Receiver<Arc<ChunkRecord>>,
    monitor: &WorkerMonitor,
) {
    // Drains the queue before exiting once the sender is dropped.
    while let Ok(record) = receiver.recv() {
        if monitor.run(|| shared.save(&record)) {
            monitor.increment(0);
        }
    }
    monitor.set_active(false);
    debug!("chunk store worker stopped");
}

impl ChunkStore for CompressedChunkStore {
    fn get(&self, pos: IVec3) -> Option<Arc<Chunk>> {
        if let Some(record) = self.shared.pending.get(&pos).map(|r| Arc::clone(&r)) {
            return Some(Arc::new(ChunkRecord::clone(&record).into_chunk()));
        }
        match self.shared.load(pos) {
            Ok(record) => record.map(|record| Arc::new(record.into_chunk())),
            Err(err) => {
                error!(chunk = %pos, "error loading chunk: {err}");
                None
            }
        }
    }

    fn put(&self, record: ChunkRecord) {
        let record = Arc::new(record);
        self.shared.pending.insert(record.pos, Arc::clone(&record));
        let queue = self.queue.lock();
        let queued = queue
            .as_ref()
            .is_some_and(|sender| sender.send(Arc::clone(&record)).is_ok());
        drop(queue);
        if !queued {
            warn!(chunk = %record.pos, "compression queue closed, saving inline");
            if let Err(err) = self.shared.save(&record) {
                error!(chunk = %record.pos, "error saving chunk: {err}");
            }
        }
    }

    fn contains(&self, pos: IVec3) -> bool {
        self.shared.pending.contains_key(&pos) || self.shared.compressed.contains_key(&pos)
    }

    fn size(&self) -> f32 {
        megabytes(self.shared.bytes.load(Ordering::Relaxed))
    }

    /// Closes the queue and waits for the workers to drain it.
    fn dispose(&self) {
        self.queue.lock().take();
        for handle in self.workers.lock().drain(..) {
            if handle.join().is_err() {
                error!("chunk store worker panicked");
            }
        }
    }
}

impl Drop for CompressedChunkStore {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
