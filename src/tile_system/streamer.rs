use std::sync::Arc;
use std::time::Duration;

use bevy::prelude::*;
use image::DynamicImage;

use crate::resources::constants::{PRIORITY_VISIBLE, PRIORITY_ZOOM_PRELOAD};
use crate::resources::{MapView, TileStreamConfig};
use crate::tile_system::cache::{TileCache, TileResidency};
use crate::tile_system::fallback::{resolve_fallback, Fallback};
use crate::tile_system::loader::TileSource;
use crate::tile_system::scheduler::TileScheduler;
use crate::tile_system::types::TileKey;
use crate::tile_system::visible_range::{visible_tile_range, TileRange};
use crate::tile_system::zoom::{ZoomState, ZoomTransition};
use crate::utils::coordinate_conversion::TileGrid;

/// What to draw in one tile slot this frame
#[derive(Debug, Clone, PartialEq)]
pub enum TileDraw<T> {
    Actual(T),
    Fallback(Fallback<T>),
    Blank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileSlot<T> {
    pub key: TileKey,
    pub draw: TileDraw<T>,
}

/// Per-frame answer of the streaming cache for the visible range.
///
/// Images are borrowed for this frame only; the next plan replaces them.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct FramePlan<T = Handle<Image>> {
    pub frame: u64,
    pub range: Option<TileRange>,
    pub slots: Vec<TileSlot<T>>,
}

impl<T> Default for FramePlan<T> {
    fn default() -> Self {
        Self {
            frame: 0,
            range: None,
            slots: Vec::new(),
        }
    }
}

impl<T> FramePlan<T> {
    /// Counts of actual, fallback and blank slots
    pub fn counts(&self) -> (usize, usize, usize) {
        self.slots.iter().fold((0, 0, 0), |(actual, fallback, blank), slot| match slot.draw {
            TileDraw::Actual(_) => (actual + 1, fallback, blank),
            TileDraw::Fallback(_) => (actual, fallback + 1, blank),
            TileDraw::Blank => (actual, fallback, blank + 1),
        })
    }
}

/// The tile streaming cache as seen by the frame loop: cache store, download
/// scheduler and zoom transitions behind one resource.
#[derive(Resource)]
pub struct TileStreamer<T = Handle<Image>> {
    cache: Arc<TileCache<T>>,
    scheduler: TileScheduler,
    zoom: ZoomTransition,
    grid: TileGrid,
    min_zoom: u8,
    max_zoom: u8,
    fallback_depth: u8,
    max_cache_size: usize,
    low_water_fraction: f64,
    maintenance_interval_frames: u64,
    max_installs_per_frame: usize,
}

impl<T: Clone + Send + Sync + 'static> TileStreamer<T> {
    /// Build the streamer for `config`. No workers run until [`TileStreamer::start`].
    pub fn new(config: &TileStreamConfig) -> Self {
        let cache = Arc::new(TileCache::new());
        let residency: Arc<dyn TileResidency> = cache.clone();
        let scheduler = TileScheduler::new(config.scheduler_config(), residency, config.start_zoom);

        Self {
            cache,
            scheduler,
            zoom: ZoomTransition::new(config.start_zoom, config.eviction_grace_delay),
            grid: TileGrid::new(config.tile_size),
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            fallback_depth: config.fallback_depth,
            max_cache_size: config.max_cache_size,
            low_water_fraction: config.low_water_fraction,
            maintenance_interval_frames: config.maintenance_interval_frames,
            max_installs_per_frame: config.max_installs_per_frame,
        }
    }

    pub fn start(&mut self, source: Arc<dyn TileSource>) -> anyhow::Result<()> {
        self.scheduler.start(source)
    }

    pub fn begin_frame(&self) -> u64 {
        self.cache.advance_frame()
    }

    /// Turn decoded tiles into `T` on the calling thread and cache them.
    pub fn install_completed(&self, upload: impl FnMut(TileKey, DynamicImage) -> T) -> usize {
        self.scheduler
            .install_completed(&self.cache, self.max_installs_per_frame, upload)
    }

    /// Probe the cache for every tile of the visible range, requesting misses
    /// and resolving a fallback for each of them.
    pub fn plan_frame(&self, view: &MapView) -> FramePlan<T> {
        let range = visible_tile_range(&self.grid, &view.view_bounds(), view.zoom);
        let slots = range
            .keys()
            .map(|key| {
                let draw = match self.cache.get(&key) {
                    Some(image) => TileDraw::Actual(image),
                    None => {
                        self.scheduler.request(key, PRIORITY_VISIBLE);
                        resolve_fallback(
                            &self.cache,
                            key,
                            self.grid.tile_size,
                            self.fallback_depth,
                            self.min_zoom,
                        )
                        .map_or(TileDraw::Blank, TileDraw::Fallback)
                    }
                };
                TileSlot { key, draw }
            })
            .collect();

        FramePlan {
            frame: self.cache.current_frame(),
            range: Some(range),
            slots,
        }
    }

    /// Run LRU maintenance on every `maintenance_interval_frames`-th frame.
    pub fn maintain_if_due(&self, frame: u64) -> usize {
        if frame % self.maintenance_interval_frames != 0 {
            return 0;
        }
        self.cache.maintain(self.max_cache_size, self.low_water_fraction)
    }

    /// Switch the active zoom level, keeping the same point under the camera.
    ///
    /// Failed tiles become retry-eligible, the new visible range is requested
    /// as a preload burst and tiles of the old level are evicted after the
    /// grace delay. Returns false when `zoom` is out of range or already active.
    pub fn set_zoom_level(&mut self, view: &mut MapView, zoom: u8) -> bool {
        if zoom < self.min_zoom || zoom > self.max_zoom || zoom == view.zoom {
            return false;
        }

        let from = view.zoom;
        view.switch_zoom(zoom);
        self.zoom.begin(zoom);

        let cleared = self.scheduler.clear_failed();
        self.scheduler.set_target_zoom(zoom);

        let range = visible_tile_range(&self.grid, &view.view_bounds(), zoom);
        let requested = range
            .keys()
            .filter(|&key| self.scheduler.request(key, PRIORITY_ZOOM_PRELOAD))
            .count();

        info!(
            "Zoom {} -> {}: preloading {} tiles, {} failed tiles cleared",
            from, zoom, requested, cleared
        );
        true
    }

    /// Advance deferred evictions by the frame time.
    pub fn tick_evictions(&mut self, delta: Duration) -> Vec<u8> {
        self.zoom.tick(delta, &self.cache)
    }

    pub fn cache(&self) -> &TileCache<T> {
        &self.cache
    }

    pub fn scheduler(&self) -> &TileScheduler {
        &self.scheduler
    }

    pub fn zoom_state(&self) -> ZoomState {
        self.zoom.state()
    }

    /// Stop and join the download workers.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TileStreamConfig {
        TileStreamConfig {
            start_zoom: 5,
            maintenance_interval_frames: 10,
            ..Default::default()
        }
    }

    /// View at zoom 5, looking at the middle of tile (16, 16), small enough
    /// that the visible range is the tile plus its overscan ring.
    fn view_on_tile_16() -> MapView {
        let grid = TileGrid::default();
        let mut view = MapView::new(grid, 5, 0.0, 0.0, 2, 18);
        let (ox, oy) = grid.tile_origin(16, 16, 5);
        view.center_x = ox + 128.0;
        view.center_y = oy + 128.0;
        view.set_viewport(20.0, 20.0);
        view
    }

    #[test]
    fn empty_cache_requests_the_visible_range() {
        let streamer: TileStreamer<u32> = TileStreamer::new(&config());
        let view = view_on_tile_16();

        streamer.begin_frame();
        let plan = streamer.plan_frame(&view);

        assert_eq!(plan.slots.len(), 9);
        assert_eq!(plan.counts(), (0, 0, 9));
        assert_eq!(streamer.scheduler().queued_len(), 9);
        assert_eq!(streamer.scheduler().in_flight_count(), 9);
        assert!(streamer.cache().is_empty());

        // The next frame asks again without enqueueing duplicates
        streamer.begin_frame();
        streamer.plan_frame(&view);
        assert_eq!(streamer.scheduler().queued_len(), 9);
    }

    #[test]
    fn cached_and_ancestor_tiles_are_drawn() {
        let streamer: TileStreamer<u32> = TileStreamer::new(&config());
        let view = view_on_tile_16();
        streamer.cache().put(TileKey::new(5, 16, 16), 516);
        streamer.cache().put(TileKey::new(4, 8, 8), 488);

        streamer.begin_frame();
        let plan = streamer.plan_frame(&view);

        let draw_for = |x, y| {
            plan.slots
                .iter()
                .find(|slot| slot.key == TileKey::new(5, x, y))
                .map(|slot| slot.draw.clone())
        };
        assert_eq!(draw_for(16, 16), Some(TileDraw::Actual(516)));
        let Some(TileDraw::Fallback(fallback)) = draw_for(17, 17) else {
            panic!("expected a fallback for 5/17/17");
        };
        assert_eq!(fallback.source, TileKey::new(4, 8, 8));
        assert_eq!((fallback.rect.x, fallback.rect.y, fallback.rect.size), (128, 128, 128));
        assert_eq!(draw_for(15, 15), Some(TileDraw::Blank));

        assert!(streamer.cache().is_essential(&TileKey::new(5, 16, 16)));
        assert!(!streamer.scheduler().is_in_flight(&TileKey::new(5, 16, 16)));
        assert_eq!(streamer.scheduler().in_flight_count(), 8);
    }

    #[test]
    fn zoom_change_clears_failed_and_preloads() {
        let mut streamer: TileStreamer<u32> = TileStreamer::new(&config());
        let mut view = view_on_tile_16();
        let failed = TileKey::new(5, 3, 3);
        streamer.scheduler().request(failed, 0);
        streamer.scheduler().shared().mark_failed(failed);
        assert!(streamer.scheduler().is_failed(&failed));

        assert!(streamer.set_zoom_level(&mut view, 6));
        assert_eq!(view.zoom, 6);
        assert_eq!(streamer.scheduler().target_zoom(), 6);
        assert!(!streamer.scheduler().is_failed(&failed));
        assert_eq!(streamer.zoom_state(), ZoomState::Transitioning { from: 5, to: 6 });
        assert!(streamer.scheduler().queued_len() > 1);
        assert!(streamer.scheduler().request(failed, 0));
    }

    #[test]
    fn zoom_level_outside_range_is_ignored() {
        let mut streamer: TileStreamer<u32> = TileStreamer::new(&config());
        let mut view = view_on_tile_16();
        assert!(!streamer.set_zoom_level(&mut view, 1));
        assert!(!streamer.set_zoom_level(&mut view, 19));
        assert!(!streamer.set_zoom_level(&mut view, 5));
        assert_eq!(streamer.zoom_state(), ZoomState::Stable(5));
    }

    #[test]
    fn old_level_is_evicted_after_grace_delay() {
        let mut streamer: TileStreamer<u32> = TileStreamer::new(&config());
        let mut view = view_on_tile_16();
        streamer.cache().put(TileKey::new(5, 16, 16), 1);

        streamer.set_zoom_level(&mut view, 6);
        assert!(streamer.tick_evictions(Duration::from_millis(500)).is_empty());
        assert!(streamer.cache().contains(&TileKey::new(5, 16, 16)));

        assert_eq!(streamer.tick_evictions(Duration::from_millis(600)), vec![5]);
        assert!(!streamer.cache().contains(&TileKey::new(5, 16, 16)));
        assert_eq!(streamer.zoom_state(), ZoomState::Stable(6));
    }

    #[test]
    fn maintenance_runs_on_interval() {
        let config = TileStreamConfig { max_cache_size: 8, ..config() };
        let streamer: TileStreamer<u32> = TileStreamer::new(&config);
        for x in 0..8 {
            streamer.cache().put(TileKey::new(5, x, 0), x);
        }
        assert_eq!(streamer.maintain_if_due(7), 0);
        assert_eq!(streamer.cache().len(), 8);
        assert_eq!(streamer.maintain_if_due(10), 2);
        assert_eq!(streamer.cache().len(), 6);
    }

    #[test]
    fn installs_are_drawn_next_frame() {
        let streamer: TileStreamer<u32> = TileStreamer::new(&config());
        let view = view_on_tile_16();
        let key = TileKey::new(5, 16, 16);

        streamer.plan_frame(&view);
        streamer
            .scheduler()
            .completed_sender()
            .send(crate::tile_system::scheduler::CompletedTile {
                key,
                image: DynamicImage::new_rgba8(4, 4),
            })
            .unwrap();

        assert_eq!(streamer.install_completed(|_, image| image.width()), 1);
        assert!(!streamer.scheduler().is_in_flight(&key));
        let plan = streamer.plan_frame(&view);
        assert!(plan.slots.iter().any(|slot| slot.draw == TileDraw::Actual(4)));
    }
}
