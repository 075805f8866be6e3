use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::tile_system::types::{TileError, TileKey};

/// Where tile payloads come from. Implementations are called from worker
/// threads and may block.
pub trait TileSource: Send + Sync {
    /// Fetch the encoded image bytes for `key`.
    fn fetch(&self, key: TileKey) -> Result<Vec<u8>, TileError>;
}

/// Fetches tiles from an XYZ tile server over HTTP
pub struct HttpTileSource {
    /// HTTP client for making requests
    client: Client,
    /// URL template with `{z}`, `{x}` and `{y}` placeholders
    url_template: String,
}

impl HttpTileSource {
    pub fn new(url_template: &str, user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("failed to build tile HTTP client")?;

        Ok(Self {
            client,
            url_template: url_template.to_string(),
        })
    }

    pub fn tile_url(&self, key: TileKey) -> String {
        expand_url_template(&self.url_template, key)
    }
}

impl TileSource for HttpTileSource {
    fn fetch(&self, key: TileKey) -> Result<Vec<u8>, TileError> {
        let url = self.tile_url(key);
        let transient = |reason: String| TileError::Transient { key, reason };

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| transient(err.to_string()))?;

        classify_status(key, response.status())?;

        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| transient(format!("reading body: {err}")))
    }
}

/// Substitute the tile coordinates into a `{z}/{x}/{y}` URL template.
pub fn expand_url_template(template: &str, key: TileKey) -> String {
    template
        .replace("{z}", &key.zoom.to_string())
        .replace("{x}", &key.x.to_string())
        .replace("{y}", &key.y.to_string())
}

/// 200 carries a tile, 404 means the tile will never exist, anything else is
/// worth retrying later.
pub fn classify_status(key: TileKey, status: StatusCode) -> Result<(), TileError> {
    match status {
        StatusCode::OK => Ok(()),
        StatusCode::NOT_FOUND => Err(TileError::PermanentAbsence(key)),
        other => Err(TileError::Transient {
            key,
            reason: format!("HTTP status {other}"),
        }),
    }
}
