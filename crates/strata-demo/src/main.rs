//! Headless driver for the Strata chunk provider.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! One observer walks east across the world while chunks are generated, lit,
//! deflated and evicted around it; ready events and worker statistics are logged.
//! Run with `cargo run -p strata-demo -- --chunk-type stackable --generator stackable`.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::{IVec3, Vec3};
use strata_config::{CliArgs, Config, default_config_dir};
use strata_voxel::{BlockRegistry, ChunkContext, ExtensionRegistry, TeraArrayRegistry};
use strata_world::{
    ChunkGeneratorManager, CompressedChunkStore, LocalChunkProvider, ObserverId, ProviderError,
    ThreadMonitor, TrackedObserver,
};
use tracing::{debug, error, info};

const WATCH_DISTANCE: i32 = 4;
const TICK: Duration = Duration::from_millis(50);
const TICKS: u32 = 400;
const STATS_EVERY: u32 = 40;
/// Blocks the observer moves east per tick.
const WALK_SPEED: f32 = 0.5;

fn main() {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    strata_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    if let Err(err) = run(&config) {
        error!("demo failed: {err}");
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), ProviderError> {
    let context = Arc::new(ChunkContext::new(
        BlockRegistry::with_defaults(),
        TeraArrayRegistry::with_defaults(),
        ExtensionRegistry::new(),
        &config.block_data,
    ));
    info!(encodings = ?context.encodings(), "chunk context ready");

    let threads = Arc::new(ThreadMonitor::new());
    let generator = ChunkGeneratorManager::from_config(&config.world, Arc::clone(&context));
    let store = CompressedChunkStore::new(Arc::clone(&context), Arc::clone(&threads))?;
    let provider = LocalChunkProvider::new(&config.provider, generator, Box::new(store), threads)?;

    let (sink, ready_events) = crossbeam_channel::unbounded();
    provider.set_world_sink(Some(sink));

    let mut position = Vec3::new(8.0, 8.0, 8.0);
    let observer = Arc::new(TrackedObserver::new(ObserverId(1), Some(position)));
    provider.add_region_observer(observer.clone(), WATCH_DISTANCE);

    let started = Instant::now();
    let mut ready = 0usize;
    for tick in 0..TICKS {
        position.x += WALK_SPEED;
        observer.set_position(Some(position));
        provider.update();

        for event in ready_events.try_iter() {
            ready += 1;
            debug!(chunk = %event.pos, "chunk ready");
        }
        if tick % STATS_EVERY == 0 {
            log_stats(&provider, ready);
        }
        thread::sleep(TICK);
    }

    log_stats(&provider, ready);
    if let Some(chunk) = provider.get_chunk(IVec3::ZERO) {
        let statistics = chunk.statistics();
        info!(
            chunk = %statistics.chunk(),
            runs = statistics.runs(),
            "origin chunk statistics"
        );
    }
    provider.dispose();

    info!(
        elapsed = ?started.elapsed(),
        ready,
        far_store_mb = format_args!("{:.2}", provider.size()),
        created = context.monitor.created_chunks(),
        disposed = context.monitor.disposed_chunks(),
        deflated = context.monitor.deflated_chunks(),
        "demo finished"
    );
    Ok(())
}

fn log_stats(provider: &LocalChunkProvider, ready: usize) {
    let reviews: u64 = provider.review_stats().iter().map(|m| m.counter(0)).sum();
    let produces: u64 = provider.review_stats().iter().map(|m| m.counter(1)).sum();
    let tasks: u64 = provider.processing_stats().iter().map(|m| m.counter(0)).sum();
    let errors = provider.thread_monitor().total_errors();
    info!(
        near_cache = provider.near_cache_len(),
        pending_tasks = provider.pending_tasks(),
        reviews,
        produces,
        tasks,
        errors,
        ready,
        "provider stats"
    );
}
