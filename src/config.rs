//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! photo-locator.toml file. It provides a single place to configure the tile
//! server, the zoom levels of the mosaic, the marker, the reverse geocoder and
//! the network timeout shared by every HTTP request.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::ZoomLevel;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "photo-locator.toml";

/// Application configuration loaded from photo-locator.toml
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Tile server and mosaic layout
    pub tiles: TileConfig,
    /// Marker drawn over each tile
    pub marker: MarkerConfig,
    /// Reverse geocoding service
    pub geocoder: GeocoderConfig,
    /// Settings shared by every HTTP client
    pub network: NetworkConfig,
}

/// Tile server configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TileConfig {
    /// URL with `{z}`, `{x}` and `{y}` placeholders
    pub url_template: String,
    /// Zoom levels of the mosaic, from widest to closest
    pub zoom_levels: Vec<ZoomLevel>,
    /// Credit line printed under the mosaic
    pub attribution: String,
}

/// Marker appearance
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Distance in pixels from the marker centre to its outline
    pub half_width: u32,
    /// Outline thickness in pixels
    pub stroke_width: u32,
}

/// Reverse geocoder configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Set false to never look up a place name
    pub enabled: bool,
    /// Nominatim-compatible `/reverse` endpoint
    pub url: String,
    /// Address granularity (Nominatim zoom, 3 = country .. 18 = building)
    pub zoom: ZoomLevel,
}

/// HTTP settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User-Agent header; public OSM services reject anonymous clients
    pub user_agent: String,
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Blocking HTTP client carrying this timeout and user agent.
    pub fn client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(self.timeout())
            .user_agent(self.user_agent.as_str())
            .build()
    }
}

impl Default for TileConfig {
    fn default() -> Self {
        TileConfig {
            url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            zoom_levels: vec![7, 10, 13],
            attribution:
                "Tiles provided by OpenStreetMap.org (c) OpenStreetMap contributors, CC-BY-SA"
                    .to_string(),
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        MarkerConfig {
            half_width: 10,
            stroke_width: 1,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        GeocoderConfig {
            enabled: true,
            url: "https://nominatim.openstreetmap.org/reverse".to_string(),
            zoom: 14,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            timeout_secs: 10,
            user_agent: concat!("photo-locator/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tiles: TileConfig::default(),
            marker: MarkerConfig::default(),
            geocoder: GeocoderConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from photo-locator.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(
                        "loaded configuration from {} (tiles: {})",
                        path.display(),
                        config.tiles.url_template
                    );
                    config
                }
                Err(e) => {
                    warn!("invalid config file {}: {}", path.display(), e);
                    warn!("using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                info!(
                    "no config file at {}, using default configuration",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// Save current configuration to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!("configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}
