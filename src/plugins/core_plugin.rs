use bevy::prelude::*;
use bevy::time::common_conditions::on_timer;
use std::time::Duration;

use crate::resources::{DebugSettings, TileStreamConfig};
use crate::systems::debug::{debug_info, toggle_debug_mode};
use crate::systems::setup::{init_resources, setup};
use crate::tile_system::streamer::FramePlan;

/// Order of the per-frame map work
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapSet {
    /// Window, pan and zoom input
    Input,
    /// Install, plan, maintain, evict
    Stream,
    /// Sprites and camera
    Render,
}

/// Core plugin that handles the basic app setup
pub struct CorePlugin;

impl Plugin for CorePlugin {
    fn build(&self, app: &mut App) {
        let config = TileStreamConfig::from_env();
        let view = init_resources(&config);

        app.insert_resource(ClearColor(Color::srgb(0.67, 0.83, 0.87)))
            .insert_resource(view)
            .insert_resource(config)
            .insert_resource(DebugSettings::default())
            .init_resource::<FramePlan>()
            .configure_sets(Update, (MapSet::Input, MapSet::Stream, MapSet::Render).chain())
            .add_systems(Startup, setup)
            .add_systems(Update, (
                toggle_debug_mode,
                debug_info.run_if(on_timer(Duration::from_secs(2))),
            ));
    }
}
