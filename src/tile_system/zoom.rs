use std::time::Duration;

use bevy::prelude::*;

use crate::tile_system::cache::TileCache;
use crate::utils::coordinate_conversion::TileGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomState {
    Stable(u8),
    /// Switched to `to`; tiles of `from` are kept until their eviction fires
    Transitioning { from: u8, to: u8 },
}

impl ZoomState {
    pub fn current(&self) -> u8 {
        match *self {
            ZoomState::Stable(zoom) => zoom,
            ZoomState::Transitioning { to, .. } => to,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingEviction {
    zoom: u8,
    remaining: Duration,
}

/// Tracks the active zoom level and the delayed eviction of levels left behind.
#[derive(Debug, Clone)]
pub struct ZoomTransition {
    state: ZoomState,
    pending: Vec<PendingEviction>,
    grace_delay: Duration,
}

impl ZoomTransition {
    pub fn new(zoom: u8, grace_delay: Duration) -> Self {
        Self {
            state: ZoomState::Stable(zoom),
            pending: Vec::new(),
            grace_delay,
        }
    }

    pub fn state(&self) -> ZoomState {
        self.state
    }

    pub fn current_zoom(&self) -> u8 {
        self.state.current()
    }

    /// Switch to `to`, scheduling the eviction of the level being left.
    ///
    /// Returns the previous level, or `None` when `to` is already current.
    /// Returning to a level with a pending eviction cancels that eviction.
    pub fn begin(&mut self, to: u8) -> Option<u8> {
        let from = self.current_zoom();
        if from == to {
            return None;
        }

        self.pending.retain(|pending| pending.zoom != to);
        match self.pending.iter_mut().find(|pending| pending.zoom == from) {
            Some(pending) => pending.remaining = self.grace_delay,
            None => self.pending.push(PendingEviction {
                zoom: from,
                remaining: self.grace_delay,
            }),
        }

        self.state = ZoomState::Transitioning { from, to };
        Some(from)
    }

    /// Advance the eviction timers by `delta`, evicting every level whose grace
    /// delay ran out. Returns the evicted levels.
    pub fn tick<T>(&mut self, delta: Duration, cache: &TileCache<T>) -> Vec<u8> {
        if self.pending.is_empty() {
            return Vec::new();
        }

        let mut due = Vec::new();
        self.pending.retain_mut(|pending| {
            pending.remaining = pending.remaining.saturating_sub(delta);
            if pending.remaining.is_zero() {
                due.push(pending.zoom);
                false
            } else {
                true
            }
        });

        for &zoom in &due {
            let evicted = cache.evict_zoom(zoom);
            debug!("Grace delay over for zoom {}: evicted {} tiles", zoom, evicted);
        }

        if self.pending.is_empty() {
            self.state = ZoomState::Stable(self.current_zoom());
        }
        due
    }

    /// Levels whose tiles are still kept around as fallback imagery
    #[cfg(test)]
    pub fn pending_evictions(&self) -> impl Iterator<Item = u8> + '_ {
        self.pending.iter().map(|pending| pending.zoom)
    }
}

/// Map a flipped world pixel at `from` to the pixel over the same geographic
/// point at `to`.
pub fn remap_center(grid: &TileGrid, center: (f64, f64), from: u8, to: u8) -> (f64, f64) {
    let old_world = grid.world_size(from) as f64;
    let new_world = grid.world_size(to) as f64;
    let ratio_x = (center.0 / old_world).clamp(0.0, 1.0);
    let ratio_y = (center.1 / old_world).clamp(0.0, 1.0);
    (ratio_x * new_world, ratio_y * new_world)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile_system::types::TileKey;

    const GRACE: Duration = Duration::from_secs(1);

    fn cache_with_levels(levels: &[u8]) -> TileCache<u8> {
        let cache = TileCache::new();
        for &zoom in levels {
            cache.put(TileKey::new(zoom, 0, 0), zoom);
            cache.put(TileKey::new(zoom, 1, 0), zoom);
        }
        cache
    }

    #[test]
    fn same_level_is_not_a_transition() {
        let mut zoom = ZoomTransition::new(5, GRACE);
        assert_eq!(zoom.begin(5), None);
        assert_eq!(zoom.state(), ZoomState::Stable(5));
    }

    #[test]
    fn old_level_survives_until_grace_delay() {
        let cache = cache_with_levels(&[5, 6]);
        let mut zoom = ZoomTransition::new(5, GRACE);

        assert_eq!(zoom.begin(6), Some(5));
        assert_eq!(zoom.state(), ZoomState::Transitioning { from: 5, to: 6 });

        assert!(zoom.tick(Duration::from_millis(600), &cache).is_empty());
        assert!(cache.contains(&TileKey::new(5, 0, 0)));

        assert_eq!(zoom.tick(Duration::from_millis(400), &cache), vec![5]);
        assert!(!cache.contains(&TileKey::new(5, 0, 0)));
        assert!(cache.contains(&TileKey::new(6, 0, 0)));
        assert_eq!(zoom.state(), ZoomState::Stable(6));
    }

    #[test]
    fn returning_to_a_level_cancels_its_eviction() {
        let cache = cache_with_levels(&[5, 6]);
        let mut zoom = ZoomTransition::new(5, GRACE);

        zoom.begin(6);
        zoom.tick(Duration::from_millis(500), &cache);
        assert_eq!(zoom.begin(5), Some(6));
        assert_eq!(zoom.pending_evictions().collect::<Vec<_>>(), vec![6]);

        zoom.tick(GRACE, &cache);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&TileKey::new(5, 1, 0)));
        assert_eq!(zoom.state(), ZoomState::Stable(5));
    }

    #[test]
    fn rapid_zooming_evicts_each_level_left_behind() {
        let cache = cache_with_levels(&[5, 6, 7, 8]);
        let mut zoom = ZoomTransition::new(5, GRACE);

        zoom.begin(6);
        zoom.tick(Duration::from_millis(300), &cache);
        zoom.begin(7);
        zoom.tick(Duration::from_millis(300), &cache);
        zoom.begin(8);

        let mut evicted = zoom.tick(GRACE, &cache);
        evicted.sort_unstable();
        assert_eq!(evicted, vec![5, 6, 7]);
        assert_eq!(cache.len(), 2);
        assert_eq!(zoom.state(), ZoomState::Stable(8));
    }

    #[test]
    fn remap_keeps_geographic_point() {
        let grid = TileGrid::default();
        let (px, py) = grid.lat_lon_to_pixel(53.2, 6.5, 8);
        let remapped = remap_center(&grid, (px, py), 8, 11);
        let (lat, lon) = grid.pixel_to_lat_lon(remapped.0, remapped.1, 11);
        assert!((lat - 53.2).abs() < 1e-6);
        assert!((lon - 6.5).abs() < 1e-6);
    }

    #[test]
    fn remap_clamps_outside_world() {
        let grid = TileGrid::default();
        assert_eq!(remap_center(&grid, (-50.0, 5000.0), 2, 3), (0.0, 2048.0));
    }
}
