//! The local chunk provider.
//!
//! Chunks near registered observers are kept in a concurrent near cache and
//! driven through their lifecycle by two worker pools:
//!
//! - review workers consume [`ChunkRequest`]s. A `Produce` request makes sure
//!   every chunk of a region exists (queueing a load or generate task), a
//!   `Review` request checks whether chunks can advance to their next phase.
//! - processing workers take [`ChunkTask`]s from a priority queue keyed by the
//!   distance to the closest observer and run generation, lighting and
//!   deflation.
//!
//! A chunk only advances once every chunk of its 3x3(x3) neighborhood has
//! reached at least its phase. Chunks that leave every observed region are
//! written to the far store and dropped from the near cache when it grows past
//! its capacity.

mod region;
mod request;
mod task_queue;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use glam::IVec3;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use strata_config::ProviderConfig;
use strata_lighting::{generate_internal_lighting, propagate_boundary_light};
use strata_math::{Region3i, grid_distance};
use strata_voxel::{
    Chunk, ChunkContext, ChunkError, ChunkRecord, ChunkState, ChunkType, ViewChunks, WorldView,
};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::generator::{ChunkGeneratorManager, GenerateError};
use crate::monitor::{ThreadMonitor, WorkerMonitor};
use crate::store::ChunkStore;

pub use region::{CacheRegion, Observer, ObserverId, TrackedObserver};
pub use request::{ChunkRequest, ChunkTask, RequestKind, TaskKind};
pub use task_queue::TaskQueue;

/// Monitor name of the review pool.
pub const REVIEW_WORKERS: &str = "strata-chunk-review";
/// Monitor name of the processing pool.
pub const PROCESSING_WORKERS: &str = "strata-chunk-processing";

const REVIEW_KEYS: &[&str] = &["review", "produce"];
/// Minimum margin, in chunks, kept around observed regions on eviction.
const KEEP_MARGIN: i32 = 4;
const PROCESSING_KEYS: &[&str] = &["tasks"];

/// Sent once per chunk when it and its whole neighborhood are complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkReadyEvent {
    pub pos: IVec3,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to spawn chunk worker: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Error)]
enum TaskError {
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("lighting chunk {pos} failed: {source}")]
    Lighting {
        pos: IVec3,
        #[source]
        source: ChunkError,
    },
}

/// State shared by the provider handle and its workers.
struct Inner {
    chunk_type: ChunkType,
    config: ProviderConfig,
    context: Arc<ChunkContext>,
    generator: ChunkGeneratorManager,
    far_store: Box<dyn ChunkStore>,
    near_cache: DashMap<IVec3, Arc<Chunk>>,
    /// Positions with a queued load or generate task.
    preparing: DashSet<IVec3>,
    /// Positions whose ready event was sent.
    notified: DashSet<IVec3>,
    regions: RwLock<FxHashMap<ObserverId, CacheRegion>>,
    requests: Sender<ChunkRequest>,
    request_rx: Receiver<ChunkRequest>,
    tasks: TaskQueue,
    sink: RwLock<Option<Sender<ChunkReadyEvent>>>,
    local_extents: IVec3,
    disposed: AtomicBool,
}

impl Inner {
    fn get_chunk(&self, pos: IVec3) -> Option<Arc<Chunk>> {
        self.near_cache.get(&pos).map(|entry| Arc::clone(entry.value()))
    }

    fn neighborhood(&self, pos: IVec3) -> Region3i {
        Region3i::from_center_extents(pos, self.local_extents)
    }

    /// Region produced for an observed region: the region plus the prefetch
    /// margin, so chunks at its edge can complete.
    fn produce_region(&self, region: &Region3i) -> Region3i {
        region.expand(self.chunk_type.chunk_extents(self.config.prefetch_margin))
    }

    fn offer_request(&self, request: ChunkRequest) {
        if request.kind != RequestKind::Exit && request.region.is_empty() {
            return;
        }
        // The receiver lives in `self`, so sending cannot fail.
        let _ = self.requests.send(request);
    }

    /// Grid distance to the nearest observer; unobserved chunks sort last.
    fn score(&self, pos: IVec3) -> i32 {
        self.regions
            .read()
            .values()
            .map(|region| grid_distance(pos, region.center()))
            .min()
            .unwrap_or(i32::MAX)
    }

    fn offer_task(&self, kind: TaskKind, pos: IVec3) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        let key = self.score(pos);
        trace!(chunk = %pos, ?kind, key, "task queued");
        self.tasks.push(ChunkTask::new(kind, pos), key);
    }

    fn handle_request(&self, request: &ChunkRequest, monitor: &WorkerMonitor) {
        match request.kind {
            RequestKind::Review => {
                for pos in &request.region {
                    self.check_state(pos);
                }
                monitor.increment(0);
            }
            RequestKind::Produce => {
                for pos in &request.region {
                    self.check_or_create(pos);
                }
                monitor.increment(1);
            }
            RequestKind::Exit => {}
        }
    }

    /// Makes sure a chunk exists at `pos`, queueing a load or generate task
    /// at most once.
    fn check_or_create(&self, pos: IVec3) {
        if !self.chunk_type.is_stackable() && pos.y != 0 {
            error!(
                chunk = %pos,
                chunk_type = ?self.chunk_type,
                "chunk type is not stackable, ignoring chunk"
            );
            return;
        }
        if let Some(chunk) = self.get_chunk(pos) {
            self.check_state_of(&chunk);
            return;
        }
        if self.preparing.insert(pos) {
            let kind = if self.far_store.contains(pos) {
                TaskKind::Load
            } else {
                TaskKind::Generate
            };
            self.offer_task(kind, pos);
        }
    }

    fn check_state(&self, pos: IVec3) {
        if let Some(chunk) = self.get_chunk(pos) {
            self.check_state_of(&chunk);
        }
    }

    /// Queues the task of the chunk's next phase once its neighborhood has
    /// caught up.
    fn check_state_of(&self, chunk: &Arc<Chunk>) {
        let state = chunk.state();
        if state == ChunkState::Complete || !self.neighbors_reached(chunk.pos(), state) {
            return;
        }
        match TaskKind::for_stage(state) {
            Some(kind) => self.offer_task(kind, chunk.pos()),
            None => self.complete(chunk),
        }
    }

    fn neighbors_reached(&self, pos: IVec3, state: ChunkState) -> bool {
        self.neighborhood(pos).iter().all(|adj| {
            adj == pos
                || self
                    .get_chunk(adj)
                    .is_some_and(|chunk| chunk.state() >= state)
        })
    }

    fn complete(&self, chunk: &Arc<Chunk>) {
        if !chunk.set_state(ChunkState::Complete) {
            return;
        }
        let pos = chunk.pos();
        debug!(chunk = %pos, "chunk complete");
        if self.context.deflation_enabled {
            self.offer_task(TaskKind::Deflate, pos);
        }
        for adj in &self.neighborhood(pos) {
            self.check_chunk_ready(adj);
        }
    }

    /// Sends the ready event for `pos` if its whole neighborhood is complete
    /// and no event was sent for it yet.
    fn check_chunk_ready(&self, pos: IVec3) {
        let Some(sink) = self.sink.read().clone() else {
            return;
        };
        let all_complete = self.neighborhood(pos).iter().all(|adj| {
            self.get_chunk(adj)
                .is_some_and(|chunk| chunk.state() == ChunkState::Complete)
        });
        if all_complete && self.notified.insert(pos) {
            debug!(chunk = %pos, "chunk ready");
            if sink.send(ChunkReadyEvent { pos }).is_err() {
                debug!(chunk = %pos, "ready sink closed");
            }
        }
    }

    fn run_task(&self, task: ChunkTask) -> Result<(), TaskError> {
        let pos = task.pos;
        match task.kind {
            TaskKind::Load | TaskKind::Generate if self.near_cache.contains_key(&pos) => {
                self.preparing.remove(&pos);
                Ok(())
            }
            TaskKind::Load => self.load(pos),
            TaskKind::Generate => self.generate(pos),
            TaskKind::SecondPass => {
                self.with_local_view(pos, ChunkState::AdjacencyGenerationPending, |view| {
                    self.generator.second_pass(pos, view);
                    Ok(ChunkState::InternalLightGenerationPending)
                })
            }
            TaskKind::InternalLight => self.internal_light(pos),
            TaskKind::PropagateLight => {
                self.with_local_view(pos, ChunkState::LightPropagationPending, |view| {
                    let changed = propagate_boundary_light(view)
                        .map_err(|source| TaskError::Lighting { pos, source })?;
                    trace!(chunk = %pos, changed, "light propagated");
                    Ok(ChunkState::FullLightConnectivityPending)
                })
            }
            TaskKind::Deflate => {
                if let Some(chunk) = self.get_chunk(pos).filter(|c| !c.is_disposed()) {
                    chunk.deflate();
                }
                Ok(())
            }
            TaskKind::Shutdown => Ok(()),
        }
    }

    fn load(&self, pos: IVec3) -> Result<(), TaskError> {
        match self.far_store.get(pos) {
            Some(chunk) => {
                trace!(chunk = %pos, state = ?chunk.state(), "chunk loaded from far store");
                self.insert_new(chunk);
                Ok(())
            }
            None => {
                warn!(chunk = %pos, "chunk missing from far store, generating instead");
                self.generate(pos)
            }
        }
    }

    fn generate(&self, pos: IVec3) -> Result<(), TaskError> {
        match self.generator.generate_chunk(pos) {
            Ok(chunk) => {
                self.insert_new(Arc::new(chunk));
                Ok(())
            }
            Err(err) => {
                self.preparing.remove(&pos);
                Err(err.into())
            }
        }
    }

    /// Publishes a freshly loaded or generated chunk. An existing entry stays
    /// authoritative and the newcomer is dropped.
    fn insert_new(&self, chunk: Arc<Chunk>) {
        let pos = chunk.pos();
        if self.disposed.load(Ordering::Acquire) {
            self.preparing.remove(&pos);
            chunk.dispose();
            return;
        }
        let complete = chunk.state() == ChunkState::Complete;
        match self.near_cache.entry(pos) {
            Entry::Occupied(_) => {
                warn!(chunk = %pos, "chunk already in the near cache, dropping duplicate");
                chunk.dispose();
            }
            Entry::Vacant(slot) => {
                slot.insert(chunk);
            }
        }
        self.preparing.remove(&pos);
        if complete {
            for adj in &self.neighborhood(pos) {
                self.check_chunk_ready(adj);
            }
        }
        self.offer_request(ChunkRequest::review(self.neighborhood(pos)));
    }

    fn internal_light(&self, pos: IVec3) -> Result<(), TaskError> {
        let Some(chunk) = self.get_chunk(pos) else {
            return Ok(());
        };
        {
            let mut data = chunk.lock();
            if chunk.is_disposed() || chunk.state() != ChunkState::InternalLightGenerationPending {
                return Ok(());
            }
            generate_internal_lighting(&mut data)
                .map_err(|source| TaskError::Lighting { pos, source })?;
            chunk.set_state(ChunkState::LightPropagationPending);
        }
        self.offer_request(ChunkRequest::review(self.neighborhood(pos)));
        Ok(())
    }

    /// Locks the neighborhood of `pos` and runs `work` if the chunk is still
    /// in `expected`, then advances it to the returned phase.
    fn with_local_view<F>(&self, pos: IVec3, expected: ChunkState, work: F) -> Result<(), TaskError>
    where
        F: FnOnce(&mut WorldView<'_>) -> Result<ChunkState, TaskError>,
    {
        let Some(chunks) = ViewChunks::local(pos, self.chunk_type, |p| self.get_chunk(p)) else {
            debug!(chunk = %pos, "neighborhood incomplete, skipping task");
            return Ok(());
        };
        {
            let mut view = chunks.lock();
            if !view.is_valid_view() {
                return Ok(());
            }
            let Some(chunk) = view.chunk(IVec3::ZERO).cloned() else {
                return Ok(());
            };
            if chunk.state() != expected {
                return Ok(());
            }
            let next = work(&mut view)?;
            chunk.set_state(next);
        }
        self.offer_request(ChunkRequest::review(self.neighborhood(pos)));
        Ok(())
    }

    /// Region kept in the near cache for an observed region. Never narrower
    /// than four chunks around it, whatever the prefetch margin.
    fn keep_region(&self, region: &Region3i) -> Region3i {
        let margin = self.config.prefetch_margin.max(KEEP_MARGIN);
        region.expand(self.chunk_type.chunk_extents(margin))
    }

    /// Writes unobserved, unlocked chunks to the far store once the near
    /// cache is over capacity. Locked chunks are skipped, so the bound is
    /// soft.
    fn enforce_cache_size(&self) {
        let capacity = self.config.cache_capacity();
        if self.near_cache.len() <= capacity {
            return;
        }
        let keep: Vec<Region3i> = self
            .regions
            .read()
            .values()
            .map(|region| region.region())
            .filter(|region| !region.is_empty())
            .map(|region| self.keep_region(&region))
            .collect();
        let positions: Vec<IVec3> = self.near_cache.iter().map(|entry| *entry.key()).collect();

        let mut evicted = 0usize;
        let mut skipped = 0usize;
        for pos in positions {
            if keep.iter().any(|region| region.encompasses(pos)) {
                continue;
            }
            let Some(chunk) = self.get_chunk(pos) else {
                continue;
            };
            let Some(data) = chunk.try_lock() else {
                skipped += 1;
                continue;
            };
            self.far_store.put(ChunkRecord::capture(&chunk, &data));
            self.near_cache.remove_if(&pos, |_, cached| Arc::ptr_eq(cached, &chunk));
            // Dispose while still locked.
            chunk.dispose();
            drop(data);
            self.notified.remove(&pos);
            evicted += 1;
        }
        debug!(
            evicted,
            skipped,
            remaining = self.near_cache.len(),
            capacity,
            "near cache compacted"
        );
    }

    /// Saves every cached chunk and empties the near cache.
    fn flush(&self) {
        let positions: Vec<IVec3> = self.near_cache.iter().map(|entry| *entry.key()).collect();
        let count = positions.len();
        for pos in positions {
            if let Some((_, chunk)) = self.near_cache.remove(&pos) {
                self.far_store.put(ChunkRecord::snapshot(&chunk));
                chunk.dispose();
            }
        }
        self.preparing.clear();
        self.notified.clear();
        debug!(count, "near cache flushed to far store");
    }
}

fn review_loop(inner: &Inner, monitor: &WorkerMonitor) {
    while let Ok(request) = inner.request_rx.recv() {
        if request.kind == RequestKind::Exit {
            break;
        }
        monitor.run(|| {
            inner.handle_request(&request, monitor);
            Ok::<(), TaskError>(())
        });
    }
    monitor.set_active(false);
    debug!(worker = monitor.thread(), "review worker stopped");
}

fn processing_loop(inner: &Inner, monitor: &WorkerMonitor) {
    loop {
        let task = inner.tasks.take();
        if task.kind == TaskKind::Shutdown {
            break;
        }
        if monitor.run(|| inner.run_task(task)) {
            monitor.increment(0);
        }
    }
    monitor.set_active(false);
    debug!(worker = monitor.thread(), "processing worker stopped");
}

/// Waits up to `timeout` for `handles` to finish and detaches the rest.
fn join_within(pool: &str, handles: Vec<JoinHandle<()>>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while handles.iter().any(|h| !h.is_finished()) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    let mut detached = 0;
    for handle in handles {
        if !handle.is_finished() {
            detached += 1;
        } else if handle.join().is_err() {
            error!(pool, "worker thread panicked");
        }
    }
    if detached > 0 {
        warn!(pool, detached, "timed out awaiting worker termination");
    }
}

/// Pool sizes are taken from the config but never exceed twice the cores.
fn pool_size(configured: usize) -> usize {
    configured.clamp(1, num_cpus::get().max(1) * 2)
}

/// Keeps chunks around observers generated, lit and cached.
pub struct LocalChunkProvider {
    inner: Arc<Inner>,
    threads: Arc<ThreadMonitor>,
    review_workers: Mutex<Vec<JoinHandle<()>>>,
    processing_workers: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalChunkProvider {
    /// Starts both worker pools. The chunk type and context come from the
    /// generator.
    pub fn new(
        config: &ProviderConfig,
        generator: ChunkGeneratorManager,
        far_store: Box<dyn ChunkStore>,
        threads: Arc<ThreadMonitor>,
    ) -> Result<Self, ProviderError> {
        let chunk_type = generator.chunk_type();
        let context = Arc::clone(generator.context());
        let (requests, request_rx) = crossbeam_channel::unbounded();
        let inner = Arc::new(Inner {
            chunk_type,
            config: config.clone(),
            context,
            generator,
            far_store,
            near_cache: DashMap::new(),
            preparing: DashSet::new(),
            notified: DashSet::new(),
            regions: RwLock::new(FxHashMap::default()),
            requests,
            request_rx,
            tasks: TaskQueue::new(),
            sink: RwLock::new(None),
            local_extents: chunk_type.chunk_extents(1),
            disposed: AtomicBool::new(false),
        });
        let provider = Self {
            inner,
            threads,
            review_workers: Mutex::new(Vec::new()),
            processing_workers: Mutex::new(Vec::new()),
        };

        let review_threads = pool_size(config.review_threads);
        let processing_threads = pool_size(config.processing_threads);
        for i in 0..review_threads {
            let handle = provider.spawn_worker(
                format!("chunk-review-{i}"),
                REVIEW_WORKERS,
                REVIEW_KEYS,
                review_loop,
            )?;
            provider.review_workers.lock().push(handle);
        }
        for i in 0..processing_threads {
            let handle = provider.spawn_worker(
                format!("chunk-processing-{i}"),
                PROCESSING_WORKERS,
                PROCESSING_KEYS,
                processing_loop,
            )?;
            provider.processing_workers.lock().push(handle);
        }
        info!(
            ?chunk_type,
            review_threads,
            processing_threads,
            capacity = config.cache_capacity(),
            "chunk provider started"
        );
        Ok(provider)
    }

    fn spawn_worker(
        &self,
        thread_name: String,
        pool: &'static str,
        keys: &'static [&'static str],
        body: fn(&Inner, &WorkerMonitor),
    ) -> std::io::Result<JoinHandle<()>> {
        let inner = Arc::clone(&self.inner);
        let threads = Arc::clone(&self.threads);
        thread::Builder::new().name(thread_name).spawn(move || {
            let monitor = threads.create(pool, keys);
            body(&inner, &monitor);
        })
    }

    /// Starts keeping `distance` chunks across loaded around `observer`.
    pub fn add_region_observer(&self, observer: Arc<dyn Observer>, distance: i32) {
        let mut region = CacheRegion::new(observer, distance, self.inner.chunk_type);
        let id = region.observer_id();
        let produce = self.inner.produce_region(&region.region());
        region.set_up_to_date();
        if self.inner.regions.write().insert(id, region).is_some() {
            warn!(observer = %id, "observer registered twice, replacing its region");
        }
        debug!(observer = %id, distance, "region observer added");
        self.inner.tasks.rescore(|task| self.inner.score(task.pos));
        self.inner.offer_request(ChunkRequest::produce(produce));
    }

    /// Stops tracking the observer. Its chunks become evictable.
    pub fn remove_region_observer(&self, id: ObserverId) -> bool {
        let removed = self.inner.regions.write().remove(&id).is_some();
        if removed {
            debug!(observer = %id, "region observer removed");
            self.inner.tasks.rescore(|task| self.inner.score(task.pos));
        }
        removed
    }

    /// Follows observer movement, produces regions that moved and evicts
    /// chunks when the near cache is over capacity. Call once per tick.
    pub fn update(&self) {
        if self.is_disposed() {
            return;
        }
        let mut moved = Vec::new();
        {
            let mut regions = self.inner.regions.write();
            for region in regions.values_mut() {
                region.update();
                if region.is_dirty() {
                    region.set_up_to_date();
                    moved.push(region.region());
                }
            }
        }
        if !moved.is_empty() {
            self.inner.tasks.rescore(|task| self.inner.score(task.pos));
            for region in &moved {
                self.inner
                    .offer_request(ChunkRequest::produce(self.inner.produce_region(region)));
            }
        }
        self.inner.enforce_cache_size();
    }

    /// The cached chunk at `pos`, in whatever phase it is.
    pub fn get_chunk(&self, pos: IVec3) -> Option<Arc<Chunk>> {
        self.inner.get_chunk(pos)
    }

    /// `true` if a chunk at `pos` is in the near cache, in any phase.
    pub fn is_chunk_available(&self, pos: IVec3) -> bool {
        self.inner.near_cache.contains_key(&pos)
    }

    /// Where ready events go. `None` stops delivery.
    pub fn set_world_sink(&self, sink: Option<Sender<ChunkReadyEvent>>) {
        *self.inner.sink.write() = sink;
    }

    /// Size of the far store in megabytes.
    pub fn size(&self) -> f32 {
        self.inner.far_store.size()
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.inner.chunk_type
    }

    pub fn near_cache_len(&self) -> usize {
        self.inner.near_cache.len()
    }

    pub fn pending_tasks(&self) -> usize {
        self.inner.tasks.len()
    }

    pub fn review_stats(&self) -> Vec<Arc<WorkerMonitor>> {
        self.threads.by_name(REVIEW_WORKERS)
    }

    pub fn processing_stats(&self) -> Vec<Arc<WorkerMonitor>> {
        self.threads.by_name(PROCESSING_WORKERS)
    }

    pub fn thread_monitor(&self) -> &Arc<ThreadMonitor> {
        &self.threads
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Stops the workers, saves every cached chunk and disposes the far
    /// store. Later calls do nothing.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("disposing chunk provider");
        let timeout = Duration::from_millis(self.inner.config.shutdown_timeout_ms);

        // Pending requests are dropped so exits are seen right away.
        while self.inner.request_rx.try_recv().is_ok() {}
        let review = std::mem::take(&mut *self.review_workers.lock());
        for _ in &review {
            self.inner.offer_request(ChunkRequest::exit());
        }
        let processing = std::mem::take(&mut *self.processing_workers.lock());
        for _ in &processing {
            self.inner.tasks.push(ChunkTask::shutdown(), i32::MIN);
        }
        join_within(REVIEW_WORKERS, review, timeout);
        join_within(PROCESSING_WORKERS, processing, timeout);

        self.inner.flush();
        self.inner.far_store.dispose();
        info!("chunk provider disposed");
    }
}

impl Drop for LocalChunkProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{FirstPassGenerator, FlatGenerator};
    use crate::store::MemoryChunkStore;
    use glam::Vec3;
    use std::sync::atomic::AtomicUsize;
    use strata_voxel::ChunkData;

    const DEADLINE: Duration = Duration::from_secs(60);

    fn config(prefetch_margin: i32) -> ProviderConfig {
        ProviderConfig {
            review_threads: 2,
            processing_threads: 2,
            prefetch_margin,
            ..ProviderConfig::default()
        }
    }

    /// Counts first-pass runs per position.
    struct CountingGenerator {
        calls: Arc<DashMap<IVec3, usize>>,
    }

    impl FirstPassGenerator for CountingGenerator {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn generate(&self, pos: IVec3, _data: &mut ChunkData) -> Result<(), ChunkError> {
            *self.calls.entry(pos).or_insert(0) += 1;
            Ok(())
        }
    }

    fn flat_provider(config: &ProviderConfig) -> LocalChunkProvider {
        let context = Arc::new(ChunkContext::with_defaults());
        let mut generator = ChunkGeneratorManager::new(ChunkType::Classic, Arc::clone(&context));
        // A high surface keeps lighting cheap.
        generator.add_first_pass(FlatGenerator::new(&context, 250));
        let store = Box::new(MemoryChunkStore::new(context));
        LocalChunkProvider::new(config, generator, store, Arc::new(ThreadMonitor::new())).unwrap()
    }

    type CallCounts = Arc<DashMap<IVec3, usize>>;

    fn counting_provider(config: &ProviderConfig) -> (LocalChunkProvider, CallCounts) {
        let context = Arc::new(ChunkContext::with_defaults());
        let calls = Arc::new(DashMap::new());
        let mut generator = ChunkGeneratorManager::new(ChunkType::Classic, Arc::clone(&context));
        generator.add_first_pass(CountingGenerator {
            calls: Arc::clone(&calls),
        });
        let store = Box::new(MemoryChunkStore::new(context));
        let threads = Arc::new(ThreadMonitor::new());
        let provider = LocalChunkProvider::new(config, generator, store, threads).unwrap();
        (provider, calls)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + DEADLINE;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    fn observer_at_origin() -> Arc<TrackedObserver> {
        Arc::new(TrackedObserver::new(ObserverId(1), Some(Vec3::new(8.0, 200.0, 8.0))))
    }

    fn is_complete(provider: &LocalChunkProvider, pos: IVec3) -> bool {
        provider
            .get_chunk(pos)
            .is_some_and(|chunk| chunk.state() == ChunkState::Complete)
    }

    #[test]
    fn test_origin_neighborhood_completes_with_one_ready_event() {
        let provider = flat_provider(&config(4));
        let (tx, rx) = crossbeam_channel::unbounded();
        provider.set_world_sink(Some(tx));
        provider.add_region_observer(observer_at_origin(), 2);

        let neighborhood = Region3i::from_center_extents(IVec3::ZERO, IVec3::new(1, 0, 1));
        assert!(wait_until(|| neighborhood.iter().all(|pos| is_complete(&provider, pos))));
        assert!(wait_until(|| !rx.is_empty()));

        // Give the workers time for duplicate reviews to run.
        thread::sleep(Duration::from_millis(200));
        provider.update();
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.iter().filter(|e| e.pos == IVec3::ZERO).count(), 1);

        let processed: u64 = provider.processing_stats().iter().map(|m| m.counter(0)).sum();
        assert!(processed > 0);
        assert_eq!(provider.thread_monitor().total_errors(), 0);
        provider.dispose();
    }

    #[test]
    fn test_chunk_without_neighbors_stays_pending() {
        let provider = flat_provider(&config(0));
        provider.add_region_observer(observer_at_origin(), 0);

        assert!(wait_until(|| provider.get_chunk(IVec3::ZERO).is_some()));
        thread::sleep(Duration::from_millis(200));
        let chunk = provider.get_chunk(IVec3::ZERO).unwrap();
        assert_eq!(chunk.state(), ChunkState::AdjacencyGenerationPending);
        assert_eq!(provider.near_cache_len(), 1);
        assert!(provider.is_chunk_available(IVec3::ZERO));
        assert!(!provider.is_chunk_available(IVec3::X));
    }

    #[test]
    fn test_concurrent_creation_generates_once() {
        let (provider, calls) = counting_provider(&config(0));
        let pos = IVec3::new(7, 0, -3);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| provider.inner.check_or_create(pos));
            }
        });
        assert!(wait_until(|| provider.get_chunk(pos).is_some()));
        let first = provider.get_chunk(pos).unwrap();

        let seen: Vec<Arc<Chunk>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| provider.get_chunk(pos).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(seen.iter().all(|chunk| Arc::ptr_eq(chunk, &first)));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(calls.get(&pos).map(|c| *c), Some(1));
    }

    #[test]
    fn test_eviction_skips_locked_chunks_and_reloads() {
        let (provider, calls) = counting_provider(&ProviderConfig {
            max_memory_mb: 0,
            ..config(0)
        });
        let positions = [IVec3::new(10, 0, 10), IVec3::new(20, 0, 20), IVec3::new(30, 0, 30)];
        for pos in positions {
            provider.inner.check_or_create(pos);
        }
        assert!(wait_until(|| positions.iter().all(|p| provider.get_chunk(*p).is_some())));

        let held = provider.get_chunk(positions[0]).unwrap();
        {
            let _guard = held.lock();
            provider.update();
            assert!(provider.get_chunk(positions[0]).is_some());
            assert!(provider.get_chunk(positions[1]).is_none());
            assert!(provider.get_chunk(positions[2]).is_none());
            assert!(provider.inner.far_store.contains(positions[1]));
        }
        assert!(!held.is_disposed());

        provider.inner.check_or_create(positions[1]);
        assert!(wait_until(|| provider.get_chunk(positions[1]).is_some()));
        assert_eq!(calls.get(&positions[1]).map(|c| *c), Some(1));
    }

    #[test]
    fn test_observed_chunks_are_not_evicted() {
        let provider = flat_provider(&ProviderConfig {
            max_memory_mb: 0,
            ..config(0)
        });
        provider.add_region_observer(observer_at_origin(), 0);
        assert!(wait_until(|| provider.get_chunk(IVec3::ZERO).is_some()));
        provider.update();
        assert!(provider.get_chunk(IVec3::ZERO).is_some());

        assert!(provider.remove_region_observer(ObserverId(1)));
        assert!(!provider.remove_region_observer(ObserverId(1)));
        provider.update();
        assert!(provider.get_chunk(IVec3::ZERO).is_none());
    }

    #[test]
    fn test_eviction_keeps_four_chunks_around_observers() {
        let (provider, _calls) = counting_provider(&ProviderConfig {
            max_memory_mb: 0,
            ..config(0)
        });
        provider.add_region_observer(observer_at_origin(), 0);
        let near = IVec3::new(3, 0, 0);
        let far = IVec3::new(10, 0, 0);
        provider.inner.check_or_create(near);
        provider.inner.check_or_create(far);
        assert!(wait_until(|| {
            [IVec3::ZERO, near, far].iter().all(|p| provider.is_chunk_available(*p))
        }));

        provider.update();
        assert!(provider.is_chunk_available(IVec3::ZERO));
        assert!(provider.is_chunk_available(near));
        assert!(!provider.is_chunk_available(far));
        assert!(provider.inner.far_store.contains(far));
        provider.dispose();
    }

    #[test]
    fn test_evicted_chunk_is_disposed_before_unlock() {
        let (provider, _calls) = counting_provider(&ProviderConfig {
            max_memory_mb: 0,
            ..config(0)
        });
        let pos = IVec3::new(10, 0, 10);
        provider.inner.check_or_create(pos);
        assert!(wait_until(|| provider.is_chunk_available(pos)));

        let evicted = Arc::downgrade(&provider.get_chunk(pos).unwrap());
        let locked_on_dispose = Arc::new(Mutex::new(None));
        {
            let locked_on_dispose = Arc::clone(&locked_on_dispose);
            provider.inner.context.monitor.add_listener(move |event| {
                if let strata_voxel::ChunkEvent::Disposed { pos: disposed } = event {
                    if *disposed == pos {
                        *locked_on_dispose.lock() = evicted.upgrade().map(|c| c.is_locked());
                    }
                }
            });
        }
        provider.update();
        assert!(!provider.is_chunk_available(pos));
        assert_eq!(*locked_on_dispose.lock(), Some(true));
    }

    #[test]
    fn test_phase_advances_only_after_neighbors_catch_up() {
        let provider = flat_provider(&config(4));
        let inner = Arc::downgrade(&provider.inner);
        let transitions = Arc::new(AtomicUsize::new(0));
        let lagging = Arc::new(AtomicUsize::new(0));
        {
            let transitions = Arc::clone(&transitions);
            let lagging = Arc::clone(&lagging);
            provider.inner.context.monitor.add_listener(move |event| {
                let strata_voxel::ChunkEvent::StateChanged { pos, old, .. } = event else {
                    return;
                };
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                transitions.fetch_add(1, Ordering::Relaxed);
                let behind = inner.neighborhood(*pos).iter().any(|adj| {
                    adj != *pos && inner.get_chunk(adj).is_none_or(|chunk| chunk.state() < *old)
                });
                if behind {
                    lagging.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
        provider.add_region_observer(observer_at_origin(), 2);
        assert!(wait_until(|| is_complete(&provider, IVec3::ZERO)));
        provider.dispose();

        // Four transitions per chunk from generated to complete.
        assert!(transitions.load(Ordering::Relaxed) >= 4);
        assert_eq!(lagging.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_states_never_regress() {
        let provider = flat_provider(&config(4));
        let observed: Arc<DashMap<IVec3, ChunkState>> = Arc::new(DashMap::new());
        let regressions = Arc::new(AtomicUsize::new(0));
        {
            let observed = Arc::clone(&observed);
            let regressions = Arc::clone(&regressions);
            provider.inner.context.monitor.add_listener(move |event| {
                if let strata_voxel::ChunkEvent::StateChanged { pos, old, new } = event {
                    if new <= old {
                        regressions.fetch_add(1, Ordering::Relaxed);
                    }
                    observed.insert(*pos, *new);
                }
            });
        }
        provider.add_region_observer(observer_at_origin(), 2);
        assert!(wait_until(|| is_complete(&provider, IVec3::ZERO)));
        assert_eq!(regressions.load(Ordering::Relaxed), 0);
        assert_eq!(observed.get(&IVec3::ZERO).map(|s| *s), Some(ChunkState::Complete));
    }

    #[test]
    fn test_dispose_flushes_and_is_idempotent() {
        let provider = flat_provider(&config(0));
        provider.add_region_observer(observer_at_origin(), 0);
        assert!(wait_until(|| provider.get_chunk(IVec3::ZERO).is_some()));

        provider.dispose();
        provider.dispose();
        assert!(provider.is_disposed());
        assert_eq!(provider.near_cache_len(), 0);
        assert!(provider.inner.far_store.contains(IVec3::ZERO));
        assert_eq!(provider.thread_monitor().active_count(), 0);
    }
}
