use std::sync::atomic::{AtomicU64, Ordering};

use bevy::prelude::*;
use dashmap::DashMap;

use crate::tile_system::types::TileKey;

/// Lets the scheduler ask whether a tile is already resident without knowing
/// what kind of image the cache holds.
pub trait TileResidency: Send + Sync {
    fn is_resident(&self, key: &TileKey) -> bool;
}

/// A cached tile and its usage metadata
#[derive(Debug)]
pub struct TileRecord<T> {
    /// Decoded image or texture handle; dropping it releases the resource
    pub image: T,
    pub zoom: u8,
    /// Frame counter value of the last read
    pub last_used_frame: u64,
    /// Set by reads during the current frame, cleared by maintenance
    pub essential: bool,
}

/// Bounded store of decoded tiles, safe to read from the render thread while
/// installs happen concurrently.
///
/// Recency is measured with a frame counter instead of wall-clock time, so
/// eviction order depends only on how often the map is drawn.
pub struct TileCache<T> {
    records: DashMap<TileKey, TileRecord<T>>,
    frame: AtomicU64,
}

impl<T> Default for TileCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TileCache<T> {
    /// Create a new empty tile cache
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            frame: AtomicU64::new(0),
        }
    }

    /// Bump the frame counter; called once per rendered frame.
    pub fn advance_frame(&self) -> u64 {
        self.frame.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn current_frame(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    /// Look a tile up for drawing in the current frame.
    ///
    /// A hit refreshes `last_used_frame` and marks the tile essential. Never fetches.
    pub fn get(&self, key: &TileKey) -> Option<T>
    where
        T: Clone,
    {
        let frame = self.current_frame();
        self.records.get_mut(key).map(|mut record| {
            record.last_used_frame = frame;
            record.essential = true;
            record.image.clone()
        })
    }

    /// Like [`TileCache::get`] but without protecting the tile from eviction.
    /// Used when a tile is only borrowed as a stand-in for a missing descendant.
    pub fn get_for_fallback(&self, key: &TileKey) -> Option<T>
    where
        T: Clone,
    {
        let frame = self.current_frame();
        self.records.get_mut(key).map(|mut record| {
            record.last_used_frame = frame;
            record.image.clone()
        })
    }

    /// Insert or replace a tile.
    pub fn put(&self, key: TileKey, image: T) {
        let record = TileRecord {
            image,
            zoom: key.zoom,
            last_used_frame: self.current_frame(),
            essential: false,
        };
        self.records.insert(key, record);
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn is_essential(&self, key: &TileKey) -> bool {
        self.records.get(key).is_some_and(|record| record.essential)
    }

    /// Get the number of tiles in the cache
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Evict the least recently used tiles until at most
    /// `max_size * low_water_fraction` remain, skipping essential ones.
    ///
    /// Does nothing below `max_size`. Afterwards every essential flag is reset
    /// so the next frame's reads can mark what is actually on screen.
    /// Returns the number of evicted tiles.
    pub fn maintain(&self, max_size: usize, low_water_fraction: f64) -> usize {
        let size = self.len();
        if size < max_size {
            return 0;
        }

        let target = (max_size as f64 * low_water_fraction).floor() as usize;
        let mut candidates: Vec<(TileKey, u64)> = self
            .records
            .iter()
            .filter(|entry| !entry.essential)
            .map(|entry| (*entry.key(), entry.last_used_frame))
            .collect();
        candidates.sort_by_key(|&(key, frame)| (frame, key));

        let mut evicted = 0;
        for (key, _) in candidates {
            if self.len() <= target {
                break;
            }
            // A read may have marked the tile essential since the snapshot
            if self.records.remove_if(&key, |_, record| !record.essential).is_some() {
                evicted += 1;
            }
        }

        self.records
            .iter_mut()
            .for_each(|mut record| record.essential = false);

        debug!(
            "Cache maintenance at frame {}: evicted {} of {} tiles, {} remain",
            self.current_frame(),
            evicted,
            size,
            self.len()
        );
        evicted
    }

    /// Remove every tile belonging to `zoom`. Returns how many were removed.
    pub fn evict_zoom(&self, zoom: u8) -> usize {
        let before = self.len();
        self.records.retain(|_, record| record.zoom != zoom);
        let removed = before.saturating_sub(self.len());
        if removed > 0 {
            debug!("Evicted {} tiles from zoom {}", removed, zoom);
        }
        removed
    }
}

impl<T: Send + Sync> TileResidency for TileCache<T> {
    fn is_resident(&self, key: &TileKey) -> bool {
        self.contains(key)
    }
}
