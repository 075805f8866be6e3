use bevy::prelude::*;

use crate::components::MapCamera;
use crate::debug_log;
use crate::resources::{DebugSettings, MapView, TileStreamConfig};
use crate::systems::tiles::init_tile_streamer;
use crate::utils::coordinate_conversion::TileGrid;

/// Initialize resources for the application
pub fn init_resources(config: &TileStreamConfig) -> MapView {
    MapView::new(
        TileGrid::new(config.tile_size),
        config.start_zoom,
        config.start_lat,
        config.start_lon,
        config.min_zoom,
        config.max_zoom,
    )
}

/// Spawn the map camera and bring up the tile streamer.
///
/// Without a streamer the map stays empty; the rest of the app keeps running.
pub fn setup(
    mut commands: Commands,
    config: Res<TileStreamConfig>,
    view: Res<MapView>,
    debug_settings: Res<DebugSettings>,
) {
    commands.spawn((Camera2d, MapCamera));

    match init_tile_streamer(&config) {
        Ok(streamer) => commands.insert_resource(streamer),
        Err(err) => error!("Tile streaming disabled: {:#}", err),
    }

    let (lat, lon) = view.grid.pixel_to_lat_lon(view.center_x, view.center_y, view.zoom);
    debug_log!(debug_settings, "Starting at {:.4}, {:.4} (zoom {})", lat, lon, view.zoom);
}
