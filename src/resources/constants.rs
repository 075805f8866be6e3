use std::time::Duration;

/// Constants for the tile streaming system
pub const DEFAULT_TILE_SIZE: u32 = 256;
pub const MIN_ZOOM_LEVEL: u8 = 2; // Furthest zoom out
pub const MAX_ZOOM_LEVEL: u8 = 18; // Closest zoom in
pub const DEFAULT_ZOOM_LEVEL: u8 = 3;

/// Latitude limit of the square Web Mercator raster
pub const MERCATOR_MAX_LATITUDE: f64 = 85.05112878;

pub const DEFAULT_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const DEFAULT_USER_AGENT: &str = "MarineRadar/1.0 (bevy; educational project)";

pub const DEFAULT_MAX_CACHE_TILES: usize = 800;
pub const DEFAULT_LOW_WATER_FRACTION: f64 = 0.75;
pub const DEFAULT_MAINTENANCE_INTERVAL_FRAMES: u64 = 120;

pub const DEFAULT_WORKER_COUNT: usize = 8;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_STALE_ZOOM_THRESHOLD: u8 = 2;
pub const DEFAULT_COMPLETED_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_MAX_INSTALLS_PER_FRAME: usize = 32;

pub const DEFAULT_FALLBACK_DEPTH: u8 = 4;
pub const DEFAULT_EVICTION_GRACE_DELAY: Duration = Duration::from_secs(1);

// Somewhere in the North Sea, a reasonable place to look for shipping traffic
pub const DEFAULT_START_LAT: f64 = 54.0;
pub const DEFAULT_START_LON: f64 = 4.0;

/// Download priorities, lower is served first
pub const PRIORITY_VISIBLE: i32 = 0;
pub const PRIORITY_ZOOM_PRELOAD: i32 = 1;

/// Camera zoom factor limits and the thresholds that switch discrete zoom levels
pub const MIN_ZOOM_FACTOR: f64 = 0.25;
pub const MAX_ZOOM_FACTOR: f64 = 4.0;
pub const ZOOM_IN_THRESHOLD: f64 = 0.5;
pub const ZOOM_OUT_THRESHOLD: f64 = 2.0;
pub const SCROLL_ZOOM_STEP: f64 = 0.1;
