mod tile;

pub use tile::*;

use bevy::prelude::*;

/// Marker for the orthographic camera looking at the map
#[derive(Component)]
pub struct MapCamera;
