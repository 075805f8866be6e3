use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use image::DynamicImage;
use parking_lot::{Condvar, Mutex};

use crate::tile_system::cache::{TileCache, TileResidency};
use crate::tile_system::downloader;
use crate::tile_system::loader::TileSource;
use crate::tile_system::types::TileKey;

/// A tile request with priority information
#[derive(Clone, Debug)]
pub struct DownloadRequest {
    pub key: TileKey,
    /// Lower values are served first
    pub priority: i32,
    pub requested_at: Instant,
    /// Enqueue order, breaks ties between equal priorities
    sequence: u64,
}

impl DownloadRequest {
    fn new(key: TileKey, priority: i32, sequence: u64) -> Self {
        Self {
            key,
            priority,
            requested_at: Instant::now(),
            sequence,
        }
    }
}

impl Eq for DownloadRequest {}

impl PartialEq for DownloadRequest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for DownloadRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the greatest element: lowest priority value, then oldest
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for DownloadRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Blocking priority queue shared between the render thread and the workers.
#[derive(Default)]
pub struct DownloadQueue {
    heap: Mutex<BinaryHeap<DownloadRequest>>,
    available: Condvar,
}

impl DownloadQueue {
    pub fn push(&self, request: DownloadRequest) {
        self.heap.lock().push(request);
        self.available.notify_one();
    }

    /// Pop the most urgent request, waiting at most `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<DownloadRequest> {
        let deadline = Instant::now() + timeout;
        let mut heap = self.heap.lock();
        loop {
            if let Some(request) = heap.pop() {
                return Some(request);
            }
            if self.available.wait_until(&mut heap, deadline).timed_out() {
                return heap.pop();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    fn wake_all(&self) {
        self.available.notify_all();
    }
}

/// Where a requested tile currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    InFlight,
    Failed,
}

/// A decoded tile waiting to be turned into a texture on the render thread
pub struct CompletedTile {
    pub key: TileKey,
    pub image: DynamicImage,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub worker_count: usize,
    pub poll_interval: Duration,
    pub stale_zoom_threshold: u8,
    pub completed_capacity: usize,
}

/// State shared by the scheduler handle and every worker thread.
pub(crate) struct SchedulerShared {
    pub(crate) queue: DownloadQueue,
    /// In-flight and failed keys. A key holds at most one state at a time.
    pub(crate) requests: DashMap<TileKey, RequestState>,
    pub(crate) target_zoom: AtomicU8,
    pub(crate) shutdown: AtomicBool,
    pub(crate) config: SchedulerConfig,
    residency: Arc<dyn TileResidency>,
    sequence: AtomicU64,
}

impl SchedulerShared {
    /// Drop the in-flight marker for a key that will not be installed.
    pub(crate) fn release(&self, key: &TileKey) {
        self.requests
            .remove_if(key, |_, state| *state == RequestState::InFlight);
    }

    /// Move a key from in-flight to failed.
    pub(crate) fn mark_failed(&self, key: TileKey) {
        self.requests.insert(key, RequestState::Failed);
    }

    pub(crate) fn is_stale(&self, key: &TileKey) -> bool {
        let target = self.target_zoom.load(AtomicOrdering::Relaxed);
        key.zoom.abs_diff(target) > self.config.stale_zoom_threshold
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutdown.load(AtomicOrdering::Relaxed)
    }
}

/// Priority download queue plus a fixed pool of fetch workers.
///
/// `request` is the only way to start network activity. It never blocks on the
/// network; workers hand decoded images back through a bounded channel that the
/// render thread drains with [`TileScheduler::install_completed`].
pub struct TileScheduler {
    shared: Arc<SchedulerShared>,
    completed_tx: Sender<CompletedTile>,
    completed_rx: Receiver<CompletedTile>,
    workers: Vec<JoinHandle<()>>,
}

impl TileScheduler {
    /// Create a scheduler with no running workers.
    pub fn new(config: SchedulerConfig, residency: Arc<dyn TileResidency>, target_zoom: u8) -> Self {
        let (completed_tx, completed_rx) = crossbeam_channel::bounded(config.completed_capacity);
        let shared = SchedulerShared {
            queue: DownloadQueue::default(),
            requests: DashMap::new(),
            target_zoom: AtomicU8::new(target_zoom),
            shutdown: AtomicBool::new(false),
            config,
            residency,
            sequence: AtomicU64::new(0),
        };

        Self {
            shared: Arc::new(shared),
            completed_tx,
            completed_rx,
            workers: Vec::new(),
        }
    }

    /// Spawn the worker pool that fetches from `source`.
    pub fn start(&mut self, source: Arc<dyn TileSource>) -> anyhow::Result<()> {
        for index in 0..self.shared.config.worker_count {
            let handle = downloader::spawn_worker(
                index,
                Arc::clone(&self.shared),
                Arc::clone(&source),
                self.completed_tx.clone(),
            )?;
            self.workers.push(handle);
        }
        info!("Started {} tile download workers", self.workers.len());
        Ok(())
    }

    /// Ask for a tile. No-op if it is cached, in flight or failed.
    ///
    /// Returns whether a new download request was enqueued.
    pub fn request(&self, key: TileKey, priority: i32) -> bool {
        if self.shared.residency.is_resident(&key) {
            return false;
        }

        match self.shared.requests.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(RequestState::InFlight);
                let sequence = self.shared.sequence.fetch_add(1, AtomicOrdering::Relaxed);
                self.shared
                    .queue
                    .push(DownloadRequest::new(key, priority, sequence));
                true
            }
        }
    }

    /// Move decoded tiles from the completed queue into `cache`, turning each
    /// image into the cache's texture type with `upload`.
    ///
    /// Runs on the render thread; at most `limit` tiles per call.
    pub fn install_completed<T>(
        &self,
        cache: &TileCache<T>,
        limit: usize,
        mut upload: impl FnMut(TileKey, DynamicImage) -> T,
    ) -> usize {
        let mut installed = 0;
        while installed < limit {
            let Ok(completed) = self.completed_rx.try_recv() else {
                break;
            };
            let key = completed.key;
            cache.put(key, upload(key, completed.image));
            self.shared.release(&key);
            installed += 1;
        }
        installed
    }

    /// Zoom level the user is looking at; requests too far from it are dropped.
    pub fn set_target_zoom(&self, zoom: u8) {
        self.shared.target_zoom.store(zoom, AtomicOrdering::Relaxed);
    }

    pub fn target_zoom(&self) -> u8 {
        self.shared.target_zoom.load(AtomicOrdering::Relaxed)
    }

    /// Allow every failed tile to be requested again.
    pub fn clear_failed(&self) -> usize {
        let before = self.failed_count();
        self.shared
            .requests
            .retain(|_, state| *state != RequestState::Failed);
        before
    }

    pub fn is_in_flight(&self, key: &TileKey) -> bool {
        self.state(key) == Some(RequestState::InFlight)
    }

    pub fn is_failed(&self, key: &TileKey) -> bool {
        self.state(key) == Some(RequestState::Failed)
    }

    fn state(&self, key: &TileKey) -> Option<RequestState> {
        self.shared.requests.get(key).map(|state| *state)
    }

    pub fn in_flight_count(&self) -> usize {
        self.count(RequestState::InFlight)
    }

    pub fn failed_count(&self) -> usize {
        self.count(RequestState::Failed)
    }

    fn count(&self, wanted: RequestState) -> usize {
        self.shared
            .requests
            .iter()
            .filter(|entry| *entry.value() == wanted)
            .count()
    }

    /// Requests waiting for a worker
    pub fn queued_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop the workers and wait for them to exit.
    ///
    /// Workers notice within one poll interval, or once their current fetch
    /// finishes or times out.
    pub fn shutdown(&mut self) {
        self.signal_shutdown();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("A tile download worker panicked");
            }
        }
    }

    fn signal_shutdown(&self) {
        self.shared.shutdown.store(true, AtomicOrdering::Relaxed);
        self.shared.queue.wake_all();
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<SchedulerShared> {
        &self.shared
    }

    #[cfg(test)]
    pub(crate) fn completed_sender(&self) -> Sender<CompletedTile> {
        self.completed_tx.clone()
    }
}

impl Drop for TileScheduler {
    fn drop(&mut self) {
        // Workers may be stuck in a fetch, so only signal them here
        self.signal_shutdown();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_config(worker_count: usize) -> SchedulerConfig {
        SchedulerConfig {
            worker_count,
            poll_interval: Duration::from_millis(20),
            stale_zoom_threshold: 2,
            completed_capacity: 64,
        }
    }

    fn idle_scheduler(cache: &Arc<TileCache<u32>>, zoom: u8) -> TileScheduler {
        let residency: Arc<dyn TileResidency> = cache.clone();
        TileScheduler::new(test_config(0), residency, zoom)
    }

    #[test]
    fn queue_orders_by_priority_then_fifo() {
        let queue = DownloadQueue::default();
        queue.push(DownloadRequest::new(TileKey::new(5, 0, 0), 2, 0));
        queue.push(DownloadRequest::new(TileKey::new(5, 1, 0), 0, 1));
        queue.push(DownloadRequest::new(TileKey::new(5, 2, 0), 1, 2));
        queue.push(DownloadRequest::new(TileKey::new(5, 3, 0), 0, 3));

        let order: Vec<u32> = std::iter::from_fn(|| queue.pop_timeout(Duration::ZERO))
            .map(|request| request.key.x)
            .collect();
        assert_eq!(order, vec![1, 3, 2, 0]);
    }

    #[test]
    fn pop_times_out_on_empty_queue() {
        let queue = DownloadQueue::default();
        let started = Instant::now();
        assert!(queue.pop_timeout(Duration::from_millis(30)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn pop_wakes_when_a_request_arrives() {
        let queue = Arc::new(DownloadQueue::default());
        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                queue.push(DownloadRequest::new(TileKey::new(3, 1, 1), 0, 0));
            })
        };
        let popped = queue.pop_timeout(Duration::from_secs(5));
        producer.join().unwrap();
        assert_eq!(popped.map(|r| r.key), Some(TileKey::new(3, 1, 1)));
    }

    #[test]
    fn repeated_requests_enqueue_once() {
        let cache = Arc::new(TileCache::new());
        let scheduler = idle_scheduler(&cache, 8);
        let key = TileKey::new(8, 10, 10);

        assert!(scheduler.request(key, 0));
        assert!(!scheduler.request(key, 0));
        assert_eq!(scheduler.queued_len(), 1);
        assert_eq!(scheduler.in_flight_count(), 1);
    }

    #[test]
    fn cached_and_failed_keys_are_not_requested() {
        let cache = Arc::new(TileCache::new());
        let scheduler = idle_scheduler(&cache, 8);
        let cached = TileKey::new(8, 1, 1);
        let failed = TileKey::new(8, 2, 2);
        cache.put(cached, 1);
        scheduler.shared().mark_failed(failed);

        assert!(!scheduler.request(cached, 0));
        assert!(!scheduler.request(failed, 0));
        assert_eq!(scheduler.queued_len(), 0);
        assert!(scheduler.is_failed(&failed));
    }

    #[test]
    fn concurrent_requests_for_one_key_enqueue_once() {
        let cache = Arc::new(TileCache::new());
        let scheduler = Arc::new(idle_scheduler(&cache, 8));
        let key = TileKey::new(8, 3, 3);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                std::thread::spawn(move || scheduler.request(key, 0))
            })
            .collect();
        let enqueued = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|&enqueued| enqueued)
            .count();

        assert_eq!(enqueued, 1);
        assert_eq!(scheduler.queued_len(), 1);
    }

    #[test]
    fn nine_tile_view_enqueues_nine_requests() {
        use crate::tile_system::visible_range::TileRange;

        let cache = Arc::new(TileCache::new());
        let scheduler = idle_scheduler(&cache, 5);
        let range = TileRange { zoom: 5, start_x: 15, end_x: 17, start_y: 15, end_y: 17 };
        for key in range.keys() {
            scheduler.request(key, 0);
        }

        assert_eq!(scheduler.queued_len(), 9);
        assert_eq!(scheduler.in_flight_count(), 9);
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_failed_allows_retry() {
        let cache = Arc::new(TileCache::new());
        let scheduler = idle_scheduler(&cache, 10);
        let key = TileKey::new(10, 4, 4);
        scheduler.shared().mark_failed(key);

        assert_eq!(scheduler.clear_failed(), 1);
        assert!(scheduler.request(key, 0));
    }

    #[test]
    fn install_moves_completed_tiles_into_cache() {
        let cache = Arc::new(TileCache::new());
        let scheduler = idle_scheduler(&cache, 6);
        let key = TileKey::new(6, 7, 7);
        scheduler.request(key, 0);

        scheduler
            .completed_sender()
            .send(CompletedTile {
                key,
                image: DynamicImage::new_rgba8(4, 4),
            })
            .unwrap();

        // Still in flight while waiting in the completed queue
        assert!(!scheduler.request(key, 0));

        let installed = scheduler.install_completed(&cache, 8, |_, image| image.width());
        assert_eq!(installed, 1);
        assert_eq!(cache.get(&key), Some(4));
        assert!(!scheduler.is_in_flight(&key));
        assert!(!scheduler.request(key, 0));
    }

    #[test]
    fn install_respects_per_call_limit() {
        let cache = Arc::new(TileCache::new());
        let scheduler = idle_scheduler(&cache, 6);
        let sender = scheduler.completed_sender();
        for x in 0..5 {
            let key = TileKey::new(6, x, 0);
            scheduler.request(key, 0);
            sender
                .send(CompletedTile { key, image: DynamicImage::new_rgba8(1, 1) })
                .unwrap();
        }

        assert_eq!(scheduler.install_completed(&cache, 2, |_, _| 0), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(scheduler.in_flight_count(), 3);
    }
}
