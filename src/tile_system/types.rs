use std::fmt;

use thiserror::Error;

/// Identifies one tile of the slippy-map grid.
///
/// Only keys with `x, y <= 2^zoom - 1` address real tiles; see [`TileKey::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub const fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Whether both indices fall inside the grid for this zoom level.
    pub fn is_valid(&self) -> bool {
        if self.zoom >= 32 {
            return false;
        }
        let max_index = (1u64 << self.zoom) - 1;
        (self.x as u64) <= max_index && (self.y as u64) <= max_index
    }

    /// The tile `levels` zoom steps up that covers this one.
    pub fn ancestor(&self, levels: u8) -> Option<TileKey> {
        if levels > self.zoom {
            return None;
        }
        Some(TileKey::new(
            self.zoom - levels,
            self.x >> levels,
            self.y >> levels,
        ))
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Why a tile could not be produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TileError {
    /// Indices outside the grid for the key's zoom level
    #[error("tile {0} is outside the grid")]
    MalformedKey(TileKey),

    /// The server reported that the tile does not exist
    #[error("tile {0} does not exist on the server")]
    PermanentAbsence(TileKey),

    /// Timeout, connection error or unexpected status; retried on the next request
    #[error("transient failure fetching tile {key}: {reason}")]
    Transient { key: TileKey, reason: String },

    /// The payload arrived but is not a decodable image
    #[error("tile {key} could not be decoded: {reason}")]
    Decode { key: TileKey, reason: String },
}

impl TileError {
    /// Permanent failures park the key in the failed set until the next zoom change.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, TileError::Transient { .. })
    }
}
