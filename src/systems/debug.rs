use bevy::prelude::*;

use crate::debug_log;
use crate::resources::{DebugSettings, MapView};
use crate::tile_system::streamer::{FramePlan, TileStreamer};

/// System to toggle debug mode with the 1 key
pub fn toggle_debug_mode(
    keyboard_input: Res<ButtonInput<KeyCode>>,
    mut debug_settings: ResMut<DebugSettings>,
) {
    if keyboard_input.just_pressed(KeyCode::Digit1) {
        debug_settings.debug_mode = !debug_settings.debug_mode;
        info!("Debug mode: {}", if debug_settings.debug_mode { "ON" } else { "OFF" });
    }
}

/// Periodic stream statistics and the position under the cursor
pub fn debug_info(
    debug_settings: Res<DebugSettings>,
    view: Res<MapView>,
    plan: Res<FramePlan>,
    streamer: Option<Res<TileStreamer>>,
    windows: Query<&Window>,
) {
    if !debug_settings.debug_mode {
        return;
    }

    let Some(streamer) = streamer else {
        debug_log!(debug_settings, "Zoom {} | tile streamer not running", view.zoom);
        return;
    };

    let scheduler = streamer.scheduler();
    let (actual, fallback, blank) = plan.counts();
    debug_log!(
        debug_settings,
        "Zoom {} ({:?}) x{:.2} | Cache: {} tiles | Queued: {} | In flight: {} | Failed: {} | Visible: {} actual, {} fallback, {} blank",
        view.zoom,
        streamer.zoom_state(),
        view.zoom_factor,
        streamer.cache().len(),
        scheduler.queued_len(),
        scheduler.in_flight_count(),
        scheduler.failed_count(),
        actual,
        fallback,
        blank
    );

    if let Some(cursor) = windows.get_single().ok().and_then(Window::cursor_position) {
        let (lat, lon) = view.cursor_lat_lon(cursor);
        let (px, py) = view.screen_to_world(cursor);
        let (tile_x, tile_y) = view.grid.pixel_to_tile(px, py, view.zoom);
        debug_log!(
            debug_settings,
            "Cursor at {:.5}, {:.5} | Tile {}/{}/{}",
            lat, lon, view.zoom, tile_x, tile_y
        );
    }
}
