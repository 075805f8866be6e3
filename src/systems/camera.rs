use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;

use crate::components::MapCamera;
use crate::resources::MapView;
use crate::tile_system::streamer::TileStreamer;

/// Keyboard panning speed in screen pixels per second
const PAN_SPEED: f32 = 600.0;
/// Pixel-unit wheel deltas per line
const PIXELS_PER_SCROLL_LINE: f32 = 100.0;

/// Drag with the left mouse button or use WASD/arrow keys to move the map.
pub fn pan_map(
    time: Res<Time>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    keyboard_input: Res<ButtonInput<KeyCode>>,
    mut mouse_motion_events: EventReader<MouseMotion>,
    mut view: ResMut<MapView>,
) {
    let drag: Vec2 = mouse_motion_events.read().map(|event| event.delta).sum();
    if mouse_buttons.pressed(MouseButton::Left) && drag != Vec2::ZERO {
        view.pan_by_screen(drag);
    }

    let pressed = |keys: [KeyCode; 2]| keys.iter().any(|key| keyboard_input.pressed(*key));
    let mut direction = Vec2::ZERO;
    if pressed([KeyCode::KeyW, KeyCode::ArrowUp]) {
        direction.y += 1.0;
    }
    if pressed([KeyCode::KeyS, KeyCode::ArrowDown]) {
        direction.y -= 1.0;
    }
    if pressed([KeyCode::KeyA, KeyCode::ArrowLeft]) {
        direction.x -= 1.0;
    }
    if pressed([KeyCode::KeyD, KeyCode::ArrowRight]) {
        direction.x += 1.0;
    }

    if direction != Vec2::ZERO {
        // Moving the view east is dragging the map west
        let step = direction.normalize() * PAN_SPEED * time.delta_secs();
        view.pan_by_screen(Vec2::new(-step.x, step.y));
    }
}

/// Scroll to change the zoom factor around the cursor, `+`/`-` to step levels.
pub fn handle_zoom_input(
    mut wheel_events: EventReader<MouseWheel>,
    keyboard_input: Res<ButtonInput<KeyCode>>,
    windows: Query<&Window>,
    mut view: ResMut<MapView>,
    mut streamer: ResMut<TileStreamer>,
) {
    let scroll: f32 = wheel_events
        .read()
        .map(|event| match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / PIXELS_PER_SCROLL_LINE,
        })
        .sum();

    let mut target = None;
    if scroll != 0.0 {
        let cursor = windows.get_single().ok().and_then(Window::cursor_position);
        // Wheel up zooms in, which shrinks the factor
        target = view.apply_scroll(-scroll as f64, cursor);
    }

    if keyboard_input.any_just_pressed([KeyCode::Equal, KeyCode::NumpadAdd]) {
        target = Some(view.zoom.saturating_add(1));
    }
    if keyboard_input.any_just_pressed([KeyCode::Minus, KeyCode::NumpadSubtract]) {
        target = Some(view.zoom.saturating_sub(1));
    }

    if let Some(zoom) = target {
        streamer.set_zoom_level(&mut view, zoom);
    }
}

/// The camera never moves; tiles are placed relative to the view center.
pub fn sync_camera_projection(
    view: Res<MapView>,
    mut cameras: Query<&mut OrthographicProjection, With<MapCamera>>,
) {
    if !view.is_changed() {
        return;
    }
    for mut projection in cameras.iter_mut() {
        projection.scale = view.zoom_factor as f32;
    }
}
