use bevy::prelude::*;

pub mod cache;
pub mod downloader;
pub mod fallback;
pub mod loader;
pub mod rendering;
pub mod scheduler;
pub mod streamer;
pub mod types;
pub mod visible_range;
pub mod zoom;

use crate::plugins::MapSet;
use crate::systems::tiles::{
    begin_tile_frame, install_completed_tiles, plan_visible_tiles, run_cache_maintenance,
    stop_tile_workers, tick_zoom_evictions,
};
use self::rendering::sync_tile_sprites;
use self::streamer::TileStreamer;

/// Main plugin for the tile system
pub struct TileSystemPlugin;

impl Plugin for TileSystemPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (begin_tile_frame, install_completed_tiles, plan_visible_tiles)
                .chain()
                .in_set(MapSet::Stream)
                .run_if(resource_exists::<TileStreamer>),
        )
        .add_systems(
            Update,
            (
                sync_tile_sprites,
                (run_cache_maintenance, tick_zoom_evictions).run_if(resource_exists::<TileStreamer>),
            )
                .chain()
                .in_set(MapSet::Render),
        )
        .add_systems(Last, stop_tile_workers.run_if(resource_exists::<TileStreamer>));
    }
}
