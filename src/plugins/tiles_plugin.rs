use bevy::prelude::*;
use crate::tile_system::TileSystemPlugin;

/// Plugin for the streamed map tiles
pub struct TilesPlugin;

impl Plugin for TilesPlugin {
    fn build(&self, app: &mut App) {
        // Registers the whole per-frame streaming pipeline
        app.add_plugins(TileSystemPlugin);
    }
}
