use crate::tile_system::types::TileKey;
use crate::utils::coordinate_conversion::TileGrid;

/// Tiles of overscan added on every edge of the visible rectangle
pub const OVERSCAN_TILES: i64 = 1;

/// Inclusive rectangle of tile indices at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub start_x: u32,
    pub end_x: u32,
    pub start_y: u32,
    pub end_y: u32,
}

impl TileRange {
    pub fn width(&self) -> u32 {
        self.end_x - self.start_x + 1
    }

    pub fn height(&self) -> u32 {
        self.end_y - self.start_y + 1
    }

    pub fn len(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    #[cfg(test)]
    pub fn contains(&self, key: &TileKey) -> bool {
        key.zoom == self.zoom
            && (self.start_x..=self.end_x).contains(&key.x)
            && (self.start_y..=self.end_y).contains(&key.y)
    }

    /// Keys in row-major order, north to south.
    pub fn keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        (self.start_y..=self.end_y).flat_map(move |y| {
            (self.start_x..=self.end_x).map(move |x| TileKey::new(self.zoom, x, y))
        })
    }
}

/// Camera footprint in flipped world pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBounds {
    pub center_x: f64,
    pub center_y: f64,
    /// Half of the viewport size, already multiplied by the camera zoom factor
    pub half_width: f64,
    pub half_height: f64,
}

/// Tile rectangle covering `view` at `zoom`, plus [`OVERSCAN_TILES`] on each edge.
///
/// World y grows northward while tile rows grow southward, so the top edge of
/// the view selects the first row.
pub fn visible_tile_range(grid: &TileGrid, view: &ViewBounds, zoom: u8) -> TileRange {
    let world = grid.world_size(zoom) as f64;
    let tile_size = grid.tile_size as f64;
    let max_index = grid.max_tile_index(zoom) as i64;

    let left = (view.center_x - view.half_width).clamp(0.0, world);
    let right = (view.center_x + view.half_width).clamp(0.0, world);
    let bottom = (view.center_y - view.half_height).clamp(0.0, world);
    let top = (view.center_y + view.half_height).clamp(0.0, world);

    let column = |px: f64| (px / tile_size).floor() as i64;
    let row = |py: f64| max_index - (py / tile_size).floor() as i64;

    let start_x = (column(left) - OVERSCAN_TILES).clamp(0, max_index);
    let end_x = (column(right) + OVERSCAN_TILES).clamp(0, max_index);
    let mut start_y = (row(top) - OVERSCAN_TILES).clamp(0, max_index);
    let mut end_y = (row(bottom) + OVERSCAN_TILES).clamp(0, max_index);
    if start_y > end_y {
        std::mem::swap(&mut start_y, &mut end_y);
    }

    TileRange {
        zoom,
        start_x: start_x as u32,
        end_x: end_x as u32,
        start_y: start_y as u32,
        end_y: end_y as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centered_on_tile(grid: &TileGrid, zoom: u8, x: u32, y: u32, half: f64) -> ViewBounds {
        let (ox, oy) = grid.tile_origin(x, y, zoom);
        let half_tile = grid.tile_size as f64 / 2.0;
        ViewBounds {
            center_x: ox + half_tile,
            center_y: oy + half_tile,
            half_width: half,
            half_height: half,
        }
    }

    #[test]
    fn viewport_larger_than_world_clamps_to_full_grid() {
        let grid = TileGrid::default();
        let view = ViewBounds {
            center_x: 512.0,
            center_y: 512.0,
            half_width: 5000.0,
            half_height: 5000.0,
        };
        let range = visible_tile_range(&grid, &view, 2);
        assert_eq!(
            range,
            TileRange { zoom: 2, start_x: 0, end_x: 3, start_y: 0, end_y: 3 }
        );
    }

    #[test]
    fn small_view_gets_one_tile_of_overscan() {
        let grid = TileGrid::default();
        let view = centered_on_tile(&grid, 5, 16, 16, 10.0);
        let range = visible_tile_range(&grid, &view, 5);
        assert_eq!((range.start_x, range.end_x), (15, 17));
        assert_eq!((range.start_y, range.end_y), (15, 17));
        assert_eq!(range.len(), 9);
    }

    #[test]
    fn view_at_grid_corner_stays_in_bounds() {
        let grid = TileGrid::default();
        let view = centered_on_tile(&grid, 4, 0, 0, 100.0);
        let range = visible_tile_range(&grid, &view, 4);
        assert_eq!((range.start_x, range.start_y), (0, 0));
        assert_eq!((range.end_x, range.end_y), (1, 1));
    }

    #[test]
    fn every_intersecting_tile_is_included() {
        let grid = TileGrid::default();
        let zoom = 6;
        let view = ViewBounds {
            center_x: 3000.0,
            center_y: 9100.0,
            half_width: 700.0,
            half_height: 420.0,
        };
        let range = visible_tile_range(&grid, &view, zoom);
        let tile_size = grid.tile_size as f64;

        for y in 0..grid.tiles_per_axis(zoom) {
            for x in 0..grid.tiles_per_axis(zoom) {
                let (ox, oy) = grid.tile_origin(x, y, zoom);
                let intersects = ox < view.center_x + view.half_width
                    && ox + tile_size > view.center_x - view.half_width
                    && oy < view.center_y + view.half_height
                    && oy + tile_size > view.center_y - view.half_height;
                if intersects {
                    assert!(range.contains(&TileKey::new(zoom, x, y)), "missing {x},{y}");
                }
            }
        }
    }

    #[test]
    fn keys_walk_the_whole_rectangle() {
        let range = TileRange { zoom: 3, start_x: 2, end_x: 4, start_y: 1, end_y: 2 };
        let keys: Vec<_> = range.keys().collect();
        assert_eq!(keys.len(), 6);
        assert_eq!(keys[0], TileKey::new(3, 2, 1));
        assert_eq!(keys[5], TileKey::new(3, 4, 2));
    }
}
