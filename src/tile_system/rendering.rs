use std::collections::HashMap;

use bevy::prelude::*;

use crate::components::TileSprite;
use crate::resources::MapView;
use crate::tile_system::streamer::{FramePlan, TileDraw};
use crate::tile_system::types::TileKey;

/// Sprite translation of a tile, relative to the view center.
///
/// The camera stays at the origin; only offsets are narrowed to `f32`, which
/// keeps deep zoom levels free of float jitter.
pub fn tile_translation(view: &MapView, key: TileKey) -> Vec3 {
    let (ox, oy) = view.grid.tile_origin(key.x, key.y, key.zoom);
    let half = view.grid.tile_size as f64 / 2.0;
    Vec3::new(
        (ox + half - view.center_x) as f32,
        (oy + half - view.center_y) as f32,
        0.0,
    )
}

fn apply_draw(draw: &TileDraw<Handle<Image>>, tile_size: f32, sprite: &mut Sprite, visibility: &mut Visibility) {
    match draw {
        TileDraw::Actual(image) => {
            sprite.image = image.clone();
            sprite.rect = None;
            *visibility = Visibility::Inherited;
        }
        TileDraw::Fallback(fallback) => {
            let rect = fallback.rect;
            sprite.image = fallback.image.clone();
            sprite.rect = Some(Rect::new(
                rect.x as f32,
                rect.y as f32,
                (rect.x + rect.size) as f32,
                (rect.y + rect.size) as f32,
            ));
            *visibility = Visibility::Inherited;
        }
        TileDraw::Blank => {
            sprite.image = Handle::default();
            sprite.rect = None;
            *visibility = Visibility::Hidden;
        }
    }
    sprite.custom_size = Some(Vec2::splat(tile_size));
}

/// Keep exactly one sprite per slot of the frame plan.
pub fn sync_tile_sprites(
    mut commands: Commands,
    plan: Res<FramePlan>,
    view: Res<MapView>,
    mut sprites: Query<(Entity, &TileSprite, &mut Sprite, &mut Transform, &mut Visibility)>,
) {
    let tile_size = view.grid.tile_size as f32;
    let mut unplaced: HashMap<TileKey, &TileDraw<Handle<Image>>> =
        plan.slots.iter().map(|slot| (slot.key, &slot.draw)).collect();

    for (entity, tile, mut sprite, mut transform, mut visibility) in sprites.iter_mut() {
        match unplaced.remove(&tile.key) {
            Some(draw) => {
                apply_draw(draw, tile_size, &mut sprite, &mut visibility);
                transform.translation = tile_translation(&view, tile.key);
            }
            None => commands.entity(entity).despawn(),
        }
    }

    for (key, draw) in unplaced {
        let mut sprite = Sprite::default();
        let mut visibility = Visibility::Inherited;
        apply_draw(draw, tile_size, &mut sprite, &mut visibility);
        commands.spawn((
            TileSprite { key },
            sprite,
            Transform::from_translation(tile_translation(&view, key)),
            visibility,
        ));
    }
}
