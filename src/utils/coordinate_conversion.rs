use std::f64::consts::PI;

use crate::resources::constants::{DEFAULT_TILE_SIZE, MERCATOR_MAX_LATITUDE};

/// Web Mercator raster addressing for a fixed tile size.
///
/// Pixel space is the world raster of `tile_size * 2^zoom` pixels per axis with
/// the vertical axis flipped: `y = 0` is the south edge and `y = world_size` the
/// north edge, so it lines up with a y-up camera. This is the y-up form of the
/// raster convention with `y = 0` at the north edge: the raster row of a pixel
/// is `world_size - y`. Tile rows keep the slippy-map convention (row 0 at the
/// north edge).
///
/// Longitudes outside `[-180, 180]` are not wrapped. Callers passing them get
/// pixel coordinates outside the world raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub tile_size: u32,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE)
    }
}

impl TileGrid {
    pub const fn new(tile_size: u32) -> Self {
        Self { tile_size }
    }

    /// Number of tiles per axis at `zoom`.
    pub fn tiles_per_axis(&self, zoom: u8) -> u32 {
        1u32 << zoom
    }

    /// Highest valid tile index at `zoom` (`2^zoom - 1`).
    pub fn max_tile_index(&self, zoom: u8) -> u32 {
        self.tiles_per_axis(zoom) - 1
    }

    /// World raster edge length in pixels (`tile_size * 2^zoom`).
    pub fn world_size(&self, zoom: u8) -> u64 {
        self.tile_size as u64 * self.tiles_per_axis(zoom) as u64
    }

    /// Project a latitude/longitude to flipped world pixels.
    ///
    /// Latitude is clamped to the Mercator-valid band first.
    pub fn lat_lon_to_pixel(&self, lat: f64, lon: f64, zoom: u8) -> (f64, f64) {
        let lat = lat.clamp(-MERCATOR_MAX_LATITUDE, MERCATOR_MAX_LATITUDE);
        let n = self.tiles_per_axis(zoom) as f64;
        let tile_size = self.tile_size as f64;

        let x = (lon + 180.0) / 360.0 * n;
        let lat_rad = lat.to_radians();
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;

        let world = self.world_size(zoom) as f64;
        (x * tile_size, world - y * tile_size)
    }

    /// Inverse of [`TileGrid::lat_lon_to_pixel`], un-flipping the vertical axis.
    pub fn pixel_to_lat_lon(&self, px: f64, py: f64, zoom: u8) -> (f64, f64) {
        let n = self.tiles_per_axis(zoom) as f64;
        let tile_size = self.tile_size as f64;
        let world = self.world_size(zoom) as f64;

        let x = px / tile_size;
        let y = (world - py) / tile_size;

        let lon = x / n * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
        (lat, lon)
    }

    /// Tile column/row containing a flipped world pixel, clamped to the grid.
    pub fn pixel_to_tile(&self, px: f64, py: f64, zoom: u8) -> (u32, u32) {
        let max_index = self.max_tile_index(zoom) as i64;
        let tile_size = self.tile_size as f64;
        let column = (px / tile_size).floor() as i64;
        let row = max_index - (py / tile_size).floor() as i64;
        (
            column.clamp(0, max_index) as u32,
            row.clamp(0, max_index) as u32,
        )
    }

    /// Bottom-left corner of a tile in flipped world pixels.
    pub fn tile_origin(&self, x: u32, y: u32, zoom: u8) -> (f64, f64) {
        let tile_size = self.tile_size as f64;
        let row_from_south = self.max_tile_index(zoom) as f64 - y as f64;
        (x as f64 * tile_size, row_from_south * tile_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_size_doubles_per_zoom() {
        let grid = TileGrid::default();
        assert_eq!(grid.world_size(0), 256);
        assert_eq!(grid.world_size(2), 1024);
        assert_eq!(grid.world_size(18), 256 * (1 << 18));
    }

    #[test]
    fn round_trip_recovers_lat_lon() {
        let grid = TileGrid::default();
        for zoom in 2..=18u8 {
            let mut lat = -85.0;
            while lat <= 85.0 {
                let mut lon = -180.0;
                while lon <= 180.0 {
                    let (px, py) = grid.lat_lon_to_pixel(lat, lon, zoom);
                    let (back_lat, back_lon) = grid.pixel_to_lat_lon(px, py, zoom);
                    assert!((back_lat - lat).abs() < 1e-6, "lat {lat} at z{zoom} gave {back_lat}");
                    assert!((back_lon - lon).abs() < 1e-6, "lon {lon} at z{zoom} gave {back_lon}");
                    lon += 17.5;
                }
                lat += 8.5;
            }
        }
    }

    #[test]
    fn vertical_axis_is_flipped() {
        let grid = TileGrid::default();
        let world = grid.world_size(4) as f64;
        let (_, north) = grid.lat_lon_to_pixel(MERCATOR_MAX_LATITUDE, 0.0, 4);
        let (_, south) = grid.lat_lon_to_pixel(-MERCATOR_MAX_LATITUDE, 0.0, 4);
        let (x, equator) = grid.lat_lon_to_pixel(0.0, 0.0, 4);

        assert!((north - world).abs() < 1e-6);
        assert!(south.abs() < 1e-6);
        assert!((equator - world / 2.0).abs() < 1e-6);
        assert!((x - world / 2.0).abs() < 1e-6);
    }

    #[test]
    fn latitude_is_clamped_to_mercator_band() {
        let grid = TileGrid::default();
        let (_, polar) = grid.lat_lon_to_pixel(90.0, 0.0, 3);
        let (_, edge) = grid.lat_lon_to_pixel(MERCATOR_MAX_LATITUDE, 0.0, 3);
        assert!(polar.is_finite());
        assert_eq!(polar, edge);
    }

    #[test]
    fn pixel_to_tile_uses_north_origin_rows() {
        let grid = TileGrid::default();
        // zoom 2: 4x4 tiles, top-left pixel region is row 0
        assert_eq!(grid.pixel_to_tile(10.0, 1020.0, 2), (0, 0));
        assert_eq!(grid.pixel_to_tile(1020.0, 10.0, 2), (3, 3));
        assert_eq!(grid.pixel_to_tile(-50.0, 5000.0, 2), (0, 0));
    }

    #[test]
    fn tile_origin_matches_pixel_to_tile() {
        let grid = TileGrid::default();
        let (ox, oy) = grid.tile_origin(5, 9, 5);
        assert_eq!(grid.pixel_to_tile(ox + 1.0, oy + 1.0, 5), (5, 9));
    }
}
