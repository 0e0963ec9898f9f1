//! # Map Tile Fetching
//!
//! Downloads a single raster tile from any slippy-map tile server and decodes
//! it into an owned RGBA buffer ready for annotation.
//!
//! ## Tile Server
//! - **URL**: templated, `{z}`, `{x}` and `{y}` are substituted per request
//!   (default `https://tile.openstreetmap.org/{z}/{x}/{y}.png`)
//! - **Format**: any raster format the `image` crate can decode (PNG, JPEG)
//! - **Timeout**: taken from [`NetworkConfig`], never an ambient default
//!
//! ## Error Handling
//! Every failure is final for the current run: there is no retry and no
//! fallback tile. The caller treats any [`TileError`] as "tile unavailable".

use image::RgbaImage;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::config::{NetworkConfig, TileConfig};
use crate::TileAddress;

/// Reasons a tile could not be obtained.
#[derive(Error, Debug)]
pub enum TileError {
    /// Connection, timeout or protocol failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("tile server answered {0}")]
    Status(StatusCode),

    /// The body is not a raster image
    #[error("undecodable tile: {0}")]
    Decode(#[from] image::ImageError),
}

/// Anything that can produce the raster for a tile address.
pub trait TileSource {
    /// Fetch and decode the tile at `address`.
    ///
    /// The returned image is a fresh copy owned by the caller, so drawing on
    /// it never touches shared state.
    fn fetch(&self, address: TileAddress) -> Result<RgbaImage, TileError>;
}

/// Tile source backed by a blocking HTTP client and a URL template.
pub struct HttpTileSource {
    client: Client,
    url_template: String,
}

impl HttpTileSource {
    pub fn new(tiles: &TileConfig, network: &NetworkConfig) -> Result<Self, TileError> {
        Ok(Self {
            client: network.client()?,
            url_template: tiles.url_template.clone(),
        })
    }

    /// Build the request URL for `address`.
    pub fn url(&self, address: TileAddress) -> String {
        self.url_template
            .replace("{z}", &address.zoom.to_string())
            .replace("{x}", &address.x.to_string())
            .replace("{y}", &address.y.to_string())
    }
}

impl TileSource for HttpTileSource {
    fn fetch(&self, address: TileAddress) -> Result<RgbaImage, TileError> {
        let url = self.url(address);
        debug!("fetching tile {} from {}", address, url);

        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(TileError::Status(status));
        }

        let bytes = response.bytes()?;
        let image = decode_tile(&bytes)?;
        debug!(
            "tile {} decoded: {}x{} px ({} bytes)",
            address,
            image.width(),
            image.height(),
            bytes.len()
        );
        Ok(image)
    }
}

/// Decode an encoded tile body into RGBA, whatever the source colour model.
///
/// OSM tiles are usually palette PNGs; converting up front lets the marker be
/// drawn in any colour.
pub fn decode_tile(bytes: &[u8]) -> Result<RgbaImage, TileError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}
