use std::sync::Arc;

use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;

use crate::resources::{MapView, TileStreamConfig};
use crate::tile_system::loader::HttpTileSource;
use crate::tile_system::streamer::{FramePlan, TileStreamer};

/// Build the streamer for `config` and start its download workers.
pub fn init_tile_streamer(config: &TileStreamConfig) -> anyhow::Result<TileStreamer> {
    let source = HttpTileSource::new(
        &config.tile_url_template,
        &config.user_agent,
        config.fetch_timeout,
    )?;
    let mut streamer = TileStreamer::new(config);
    streamer.start(Arc::new(source))?;
    info!(
        "Tile streamer started: {} workers, cache limit {} tiles, source {}",
        config.worker_count, config.max_cache_size, config.tile_url_template
    );
    Ok(streamer)
}

pub fn begin_tile_frame(streamer: Res<TileStreamer>) {
    streamer.begin_frame();
}

/// Upload tiles decoded by the workers into GPU-bound image assets.
pub fn install_completed_tiles(streamer: Res<TileStreamer>, mut images: ResMut<Assets<Image>>) {
    let installed = streamer.install_completed(|_, image| {
        images.add(Image::from_dynamic(image, true, RenderAssetUsages::RENDER_WORLD))
    });
    if installed > 0 {
        debug!("Installed {} tiles, cache holds {}", installed, streamer.cache().len());
    }
}

pub fn plan_visible_tiles(streamer: Res<TileStreamer>, view: Res<MapView>, mut plan: ResMut<FramePlan>) {
    *plan = streamer.plan_frame(&view);

    #[cfg(feature = "tile_debug")]
    {
        let (actual, fallback, blank) = plan.counts();
        debug!(
            "Frame {}: {} actual, {} fallback, {} blank",
            plan.frame, actual, fallback, blank
        );
    }
}

pub fn run_cache_maintenance(streamer: Res<TileStreamer>) {
    streamer.maintain_if_due(streamer.cache().current_frame());
}

pub fn tick_zoom_evictions(time: Res<Time>, mut streamer: ResMut<TileStreamer>) {
    streamer.tick_evictions(time.delta());
}

/// Join the download workers when the app is closing.
pub fn stop_tile_workers(mut exit_events: EventReader<AppExit>, mut streamer: ResMut<TileStreamer>) {
    if exit_events.read().next().is_some() {
        info!("Stopping tile download workers");
        streamer.shutdown();
    }
}
