use bevy::prelude::*;

use crate::resources::constants::*;
use crate::tile_system::visible_range::ViewBounds;
use crate::tile_system::zoom::remap_center;
use crate::utils::coordinate_conversion::TileGrid;

/// Camera state of the 2D map: where it looks, how far it is zoomed and how
/// big the window is.
///
/// `center` is in flipped world pixels of the current discrete `zoom` level.
/// `zoom_factor` is the number of world pixels per screen pixel.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct MapView {
    pub grid: TileGrid,
    pub center_x: f64,
    pub center_y: f64,
    pub zoom: u8,
    pub zoom_factor: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl MapView {
    pub fn new(grid: TileGrid, zoom: u8, lat: f64, lon: f64, min_zoom: u8, max_zoom: u8) -> Self {
        let (center_x, center_y) = grid.lat_lon_to_pixel(lat, lon, zoom);
        Self {
            grid,
            center_x,
            center_y,
            zoom,
            zoom_factor: 1.0,
            viewport_width: 1280.0,
            viewport_height: 720.0,
            min_zoom,
            max_zoom,
        }
    }

    pub fn world_size(&self) -> f64 {
        self.grid.world_size(self.zoom) as f64
    }

    pub fn view_bounds(&self) -> ViewBounds {
        ViewBounds {
            center_x: self.center_x,
            center_y: self.center_y,
            half_width: self.viewport_width / 2.0 * self.zoom_factor,
            half_height: self.viewport_height / 2.0 * self.zoom_factor,
        }
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport_width = width.max(1.0);
        self.viewport_height = height.max(1.0);
        self.clamp_center();
    }

    /// Keep the view inside the world. An axis wider than the world is centered.
    pub fn clamp_center(&mut self) {
        let world = self.world_size();
        let bounds = self.view_bounds();
        self.center_x = clamp_axis(self.center_x, bounds.half_width, world);
        self.center_y = clamp_axis(self.center_y, bounds.half_height, world);
    }

    /// Move the map by a screen-space drag delta (y down).
    pub fn pan_by_screen(&mut self, delta: Vec2) {
        self.center_x -= delta.x as f64 * self.zoom_factor;
        self.center_y += delta.y as f64 * self.zoom_factor;
        self.clamp_center();
    }

    /// Window cursor position (top-left origin) to flipped world pixels.
    pub fn screen_to_world(&self, cursor: Vec2) -> (f64, f64) {
        let dx = cursor.x as f64 - self.viewport_width / 2.0;
        let dy = cursor.y as f64 - self.viewport_height / 2.0;
        (
            self.center_x + dx * self.zoom_factor,
            self.center_y - dy * self.zoom_factor,
        )
    }

    pub fn cursor_lat_lon(&self, cursor: Vec2) -> (f64, f64) {
        let (px, py) = self.screen_to_world(cursor);
        self.grid.pixel_to_lat_lon(px, py, self.zoom)
    }

    /// Scale the zoom factor by `1 + step * amount`, keeping the world point under
    /// `anchor` in place. Positive amounts zoom out.
    ///
    /// Returns the discrete level the factor now asks for, if it crossed a
    /// threshold.
    pub fn apply_scroll(&mut self, amount: f64, anchor: Option<Vec2>) -> Option<u8> {
        let anchor = anchor.unwrap_or(Vec2::new(
            (self.viewport_width / 2.0) as f32,
            (self.viewport_height / 2.0) as f32,
        ));
        let before = self.screen_to_world(anchor);

        self.zoom_factor = (self.zoom_factor * (1.0 + SCROLL_ZOOM_STEP * amount))
            .clamp(MIN_ZOOM_FACTOR, MAX_ZOOM_FACTOR);

        let after = self.screen_to_world(anchor);
        self.center_x += before.0 - after.0;
        self.center_y += before.1 - after.1;
        self.clamp_center();

        self.zoom_intent()
    }

    /// Discrete level change requested by the current zoom factor.
    pub fn zoom_intent(&self) -> Option<u8> {
        if self.zoom_factor < ZOOM_IN_THRESHOLD && self.zoom < self.max_zoom {
            Some(self.zoom + 1)
        } else if self.zoom_factor > ZOOM_OUT_THRESHOLD && self.zoom > self.min_zoom {
            Some(self.zoom - 1)
        } else {
            None
        }
    }

    /// Switch the discrete level, keeping the same geographic point centered.
    pub fn switch_zoom(&mut self, zoom: u8) {
        let (x, y) = remap_center(&self.grid, (self.center_x, self.center_y), self.zoom, zoom);
        self.center_x = x;
        self.center_y = y;
        self.zoom = zoom;
        self.zoom_factor = 1.0;
        self.clamp_center();
    }
}

fn clamp_axis(center: f64, half_extent: f64, world: f64) -> f64 {
    if half_extent * 2.0 >= world {
        world / 2.0
    } else {
        center.clamp(half_extent, world - half_extent)
    }
}
