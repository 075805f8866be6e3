use bevy::prelude::*;
use crate::plugins::MapSet;
use crate::systems::{
    camera::{handle_zoom_input, pan_map, sync_camera_projection},
    window::track_viewport,
};
use crate::tile_system::streamer::TileStreamer;

/// Plugin for map panning, zooming and the camera
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app
            .add_systems(Update, (
                track_viewport,
                pan_map,
                handle_zoom_input.run_if(resource_exists::<TileStreamer>),
            ).chain().in_set(MapSet::Input))
            .add_systems(Update, sync_camera_projection.in_set(MapSet::Render));
    }
}
