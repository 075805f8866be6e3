use bevy::prelude::*;

use crate::tile_system::types::TileKey;

/// Sprite showing one slot of the visible tile range
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSprite {
    pub key: TileKey,
}
