use std::str::FromStr;
use std::time::Duration;

use bevy::prelude::*;
use thiserror::Error;

use crate::resources::constants::*;
use crate::tile_system::scheduler::SchedulerConfig;

/// Runtime switches for diagnostic output
#[derive(Resource, Default)]
pub struct DebugSettings {
    pub debug_mode: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tile size {0} is not a power of two")]
    TileSize(u32),
    #[error("minimum zoom {min} is above maximum zoom {max}")]
    ZoomRange { min: u8, max: u8 },
    #[error("start zoom {zoom} is outside {min}..={max}")]
    StartZoom { zoom: u8, min: u8, max: u8 },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("low water fraction {0} is outside (0, 1]")]
    LowWaterFraction(f64),
    #[error("tile URL template {0:?} lacks a {{z}}, {{x}} or {{y}} placeholder")]
    UrlTemplate(String),
}

/// Every tunable of the tile streaming cache
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct TileStreamConfig {
    pub tile_url_template: String,
    pub user_agent: String,
    pub tile_size: u32,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub start_zoom: u8,
    pub start_lat: f64,
    pub start_lon: f64,
    pub max_cache_size: usize,
    pub low_water_fraction: f64,
    pub maintenance_interval_frames: u64,
    pub worker_count: usize,
    pub fetch_timeout: Duration,
    pub queue_poll_interval: Duration,
    pub stale_zoom_threshold: u8,
    pub completed_queue_capacity: usize,
    pub max_installs_per_frame: usize,
    pub fallback_depth: u8,
    pub eviction_grace_delay: Duration,
}

impl Default for TileStreamConfig {
    fn default() -> Self {
        Self {
            tile_url_template: DEFAULT_TILE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            tile_size: DEFAULT_TILE_SIZE,
            min_zoom: MIN_ZOOM_LEVEL,
            max_zoom: MAX_ZOOM_LEVEL,
            start_zoom: DEFAULT_ZOOM_LEVEL,
            start_lat: DEFAULT_START_LAT,
            start_lon: DEFAULT_START_LON,
            max_cache_size: DEFAULT_MAX_CACHE_TILES,
            low_water_fraction: DEFAULT_LOW_WATER_FRACTION,
            maintenance_interval_frames: DEFAULT_MAINTENANCE_INTERVAL_FRAMES,
            worker_count: DEFAULT_WORKER_COUNT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            queue_poll_interval: DEFAULT_QUEUE_POLL_INTERVAL,
            stale_zoom_threshold: DEFAULT_STALE_ZOOM_THRESHOLD,
            completed_queue_capacity: DEFAULT_COMPLETED_QUEUE_CAPACITY,
            max_installs_per_frame: DEFAULT_MAX_INSTALLS_PER_FRAME,
            fallback_depth: DEFAULT_FALLBACK_DEPTH,
            eviction_grace_delay: DEFAULT_EVICTION_GRACE_DELAY,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|value| value.trim().parse::<T>().ok())
}

fn positive<T: FromStr + PartialOrd + Default>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    parsed::<T>(lookup, name).filter(|value| *value > T::default())
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<Duration> {
    positive::<u64>(lookup, name).map(Duration::from_millis)
}

impl TileStreamConfig {
    /// Defaults overridden by `MARINE_RADAR_*` environment variables.
    ///
    /// Unparsable or non-positive values are ignored. If the combination is
    /// inconsistent the defaults are used instead and a warning is logged.
    pub fn from_env() -> Self {
        let config = Self::from_lookup(|name| std::env::var(name).ok());
        match config.validate() {
            Ok(()) => config,
            Err(err) => {
                warn!("Ignoring tile stream settings from the environment: {}", err);
                Self::default()
            }
        }
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            tile_url_template: non_empty("MARINE_RADAR_TILE_URL").unwrap_or(defaults.tile_url_template),
            user_agent: non_empty("MARINE_RADAR_USER_AGENT").unwrap_or(defaults.user_agent),
            tile_size: positive(&lookup, "MARINE_RADAR_TILE_SIZE").unwrap_or(defaults.tile_size),
            min_zoom: parsed(&lookup, "MARINE_RADAR_MIN_ZOOM").unwrap_or(defaults.min_zoom),
            max_zoom: parsed(&lookup, "MARINE_RADAR_MAX_ZOOM").unwrap_or(defaults.max_zoom),
            start_zoom: parsed(&lookup, "MARINE_RADAR_START_ZOOM").unwrap_or(defaults.start_zoom),
            start_lat: parsed::<f64>(&lookup, "MARINE_RADAR_START_LAT")
                .filter(|lat| lat.is_finite())
                .unwrap_or(defaults.start_lat),
            start_lon: parsed::<f64>(&lookup, "MARINE_RADAR_START_LON")
                .filter(|lon| (-180.0..=180.0).contains(lon))
                .unwrap_or(defaults.start_lon),
            max_cache_size: positive(&lookup, "MARINE_RADAR_MAX_CACHE_TILES")
                .unwrap_or(defaults.max_cache_size),
            low_water_fraction: parsed(&lookup, "MARINE_RADAR_LOW_WATER_FRACTION")
                .unwrap_or(defaults.low_water_fraction),
            maintenance_interval_frames: positive(&lookup, "MARINE_RADAR_MAINTENANCE_INTERVAL_FRAMES")
                .unwrap_or(defaults.maintenance_interval_frames),
            worker_count: positive(&lookup, "MARINE_RADAR_WORKERS").unwrap_or(defaults.worker_count),
            fetch_timeout: millis(&lookup, "MARINE_RADAR_FETCH_TIMEOUT_MS").unwrap_or(defaults.fetch_timeout),
            queue_poll_interval: millis(&lookup, "MARINE_RADAR_QUEUE_POLL_MS")
                .unwrap_or(defaults.queue_poll_interval),
            stale_zoom_threshold: parsed(&lookup, "MARINE_RADAR_STALE_ZOOM_THRESHOLD")
                .unwrap_or(defaults.stale_zoom_threshold),
            completed_queue_capacity: positive(&lookup, "MARINE_RADAR_COMPLETED_QUEUE_CAPACITY")
                .unwrap_or(defaults.completed_queue_capacity),
            max_installs_per_frame: positive(&lookup, "MARINE_RADAR_MAX_INSTALLS_PER_FRAME")
                .unwrap_or(defaults.max_installs_per_frame),
            fallback_depth: parsed(&lookup, "MARINE_RADAR_FALLBACK_DEPTH").unwrap_or(defaults.fallback_depth),
            eviction_grace_delay: parsed::<u64>(&lookup, "MARINE_RADAR_EVICTION_GRACE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.eviction_grace_delay),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tile_size.is_power_of_two() {
            return Err(ConfigError::TileSize(self.tile_size));
        }
        if self.min_zoom > self.max_zoom || self.max_zoom > 30 {
            return Err(ConfigError::ZoomRange { min: self.min_zoom, max: self.max_zoom });
        }
        if !(self.min_zoom..=self.max_zoom).contains(&self.start_zoom) {
            return Err(ConfigError::StartZoom {
                zoom: self.start_zoom,
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Zero("worker count"));
        }
        if self.max_cache_size == 0 {
            return Err(ConfigError::Zero("maximum cache size"));
        }
        if self.maintenance_interval_frames == 0 {
            return Err(ConfigError::Zero("maintenance interval"));
        }
        if self.completed_queue_capacity == 0 {
            return Err(ConfigError::Zero("completed queue capacity"));
        }
        if self.max_installs_per_frame == 0 {
            return Err(ConfigError::Zero("installs per frame"));
        }
        if !(self.low_water_fraction > 0.0 && self.low_water_fraction <= 1.0) {
            return Err(ConfigError::LowWaterFraction(self.low_water_fraction));
        }
        let template = &self.tile_url_template;
        if !["{z}", "{x}", "{y}"].iter().all(|placeholder| template.contains(placeholder)) {
            return Err(ConfigError::UrlTemplate(template.clone()));
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            worker_count: self.worker_count,
            poll_interval: self.queue_poll_interval,
            stale_zoom_threshold: self.stale_zoom_threshold,
            completed_capacity: self.completed_queue_capacity,
        }
    }
}
