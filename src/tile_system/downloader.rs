use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Context;
use bevy::prelude::*;
use crossbeam_channel::{SendTimeoutError, Sender};

use crate::tile_system::loader::TileSource;
use crate::tile_system::scheduler::{CompletedTile, DownloadRequest, SchedulerShared};
use crate::tile_system::types::TileError;

/// What a worker did with one request
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RequestOutcome {
    /// Decoded and handed to the render thread
    Delivered,
    /// Dropped without a fetch because the user zoomed away
    Stale,
    /// The scheduler shut down before the result could be delivered
    Abandoned,
    Failed(TileError),
}

pub(crate) fn spawn_worker(
    index: usize,
    shared: Arc<SchedulerShared>,
    source: Arc<dyn TileSource>,
    completed: Sender<CompletedTile>,
) -> anyhow::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("tile-download-{index}"))
        .spawn(move || worker_loop(&shared, source.as_ref(), &completed))
        .context("failed to spawn tile download worker")
}

fn worker_loop(shared: &SchedulerShared, source: &dyn TileSource, completed: &Sender<CompletedTile>) {
    while !shared.is_shutting_down() {
        let Some(request) = shared.queue.pop_timeout(shared.config.poll_interval) else {
            continue;
        };
        if shared.is_shutting_down() {
            shared.release(&request.key);
            break;
        }
        process_request(shared, source, request, completed);
    }
    debug!("Tile download worker {:?} exiting", thread::current().name());
}

/// Validate, fetch, decode and deliver one tile.
///
/// Every path either delivers the tile (its in-flight marker is cleared when the
/// render thread installs it) or clears the marker here, exactly once.
pub(crate) fn process_request(
    shared: &SchedulerShared,
    source: &dyn TileSource,
    request: DownloadRequest,
    completed: &Sender<CompletedTile>,
) -> RequestOutcome {
    let key = request.key;

    if !key.is_valid() {
        warn!("Invalid tile coordinates: {}", key);
        shared.mark_failed(key);
        return RequestOutcome::Failed(TileError::MalformedKey(key));
    }

    if shared.is_stale(&key) {
        debug!("Dropping stale request for tile {}", key);
        shared.release(&key);
        return RequestOutcome::Stale;
    }

    debug!(
        "Fetching tile {} (priority {}, queued for {:?})",
        key,
        request.priority,
        request.requested_at.elapsed()
    );

    let decoded = source.fetch(key).and_then(|bytes| {
        image::load_from_memory(&bytes).map_err(|err| TileError::Decode {
            key,
            reason: err.to_string(),
        })
    });

    match decoded {
        Ok(image) => deliver(shared, CompletedTile { key, image }, completed),
        Err(err) if err.is_permanent() => {
            warn!("Tile {} failed permanently: {}", key, err);
            shared.mark_failed(key);
            RequestOutcome::Failed(err)
        }
        Err(err) => {
            debug!("Tile {} will be retried: {}", key, err);
            shared.release(&key);
            RequestOutcome::Failed(err)
        }
    }
}

/// Hand a decoded tile to the render thread.
///
/// The completed queue is bounded, so the send waits while it is full but gives
/// up once the scheduler shuts down.
fn deliver(shared: &SchedulerShared, mut tile: CompletedTile, completed: &Sender<CompletedTile>) -> RequestOutcome {
    let key = tile.key;
    loop {
        match completed.send_timeout(tile, shared.config.poll_interval) {
            Ok(()) => return RequestOutcome::Delivered,
            Err(SendTimeoutError::Timeout(returned)) if !shared.is_shutting_down() => tile = returned,
            Err(_) => {
                debug!("Abandoning decoded tile {}", key);
                shared.release(&key);
                return RequestOutcome::Abandoned;
            }
        }
    }
}
