use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::resources::MapView;

/// Follow the primary window size so the visible range matches what is on screen
pub fn track_viewport(windows: Query<&Window, With<PrimaryWindow>>, mut view: ResMut<MapView>) {
    let Ok(window) = windows.get_single() else {
        return;
    };

    let (width, height) = (window.width() as f64, window.height() as f64);
    if width != view.viewport_width || height != view.viewport_height {
        view.set_viewport(width, height);
    }
}
