//! # Photo Locator Core Library
//!
//! This library turns the GPS position embedded in a photo's EXIF block into a
//! small multi-scale map mosaic: one OpenStreetMap tile per configured zoom
//! level, each with a square marker drawn over the exact spot where the photo
//! was taken, plus an optional reverse-geocoded place name for the caption.
//!
//! ## Design Philosophy
//!
//! ### Pure math, explicit I/O
//! - **Tile addressing** ([`tile_math`]) is pure Web Mercator arithmetic with no
//!   failure mode beyond the projection's latitude domain
//! - **Network access** lives behind two small traits, [`tile_source::TileSource`]
//!   and [`geocode::ReverseGeocoder`], so the orchestration can be exercised
//!   without a network
//! - **No global state**: configuration (including the HTTP timeout) is passed
//!   in explicitly, and report sections are accumulated in an owned
//!   [`report::ReportBuilder`]
//!
//! ### Failure policy
//! - A single failed tile discards the whole mosaic ([`LocateError::TileUnavailable`]);
//!   the report never shows a half-complete map
//! - A failed reverse geocode only drops the caption
//! - Nothing is retried
//!
//! ### Data Flow
//! 1. **EXIF**: [`photo::read_photo`] yields tag records and an optional [`GeoPoint`]
//! 2. **Resolve**: [`tile_math::forward`] maps the point to a [`TileAddress`] per zoom level
//! 3. **Fetch**: a [`tile_source::TileSource`] downloads and decodes the tile
//! 4. **Annotate**: [`marker::annotate`] draws the marker at the interpolated pixel
//! 5. **Assemble**: [`report::ReportBuilder`] lays the [`AnnotatedTileSet`] and
//!    caption into the report
//!
//! ## Core Types
//!
//! - [`GeoPoint`]: a latitude/longitude pair in decimal degrees
//! - [`TileAddress`]: a slippy-map `(zoom, x, y)` tile index
//! - [`TileBounds`]: the corners of a tile, used for pixel interpolation
//! - [`AnnotatedTileSet`]: the finished mosaic handed to the report

use image::RgbaImage;
use std::fmt;
use thiserror::Error;

pub mod annotator;
pub mod config;
pub mod geocode;
pub mod marker;
pub mod photo;
pub mod report;
pub mod tile_math;
pub mod tile_source;

#[cfg(test)]
mod tests;

/// Zoom level of the slippy-map tile grid; zoom `z` has `2^z × 2^z` tiles.
pub type ZoomLevel = u8;

/// Deepest zoom level accepted for a mosaic.
///
/// Public tile servers stop between 19 and 22. Tile indices are `u32`, so
/// the grid size `2^zoom` and the neighbour index `x + 1` must both fit.
pub const MAX_ZOOM: ZoomLevel = 24;

/// Latitude limit of the Web Mercator projection, in degrees.
///
/// Beyond this the forward transform runs into the tangent/secant
/// singularities at the poles.
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// A geographic position in signed decimal degrees.
///
/// Southern latitudes and western longitudes are negative. A point is only
/// meaningful for tile resolution when [`GeoPoint::is_projectable`] holds.
///
/// # Example
/// ```
/// use photo_locator::GeoPoint;
///
/// let brescia = GeoPoint::new(45.5416, 10.2118);
/// assert!(brescia.is_projectable());
///
/// let pole = GeoPoint::new(89.9, 0.0);
/// assert!(!pole.is_projectable());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    /// Degrees north of the equator
    pub latitude: f64,
    /// Degrees east of Greenwich
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when the point lies inside the Web Mercator domain:
    /// `|latitude| < 85.0511` and `longitude ∈ [-180, 180)`.
    pub fn is_projectable(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() < MAX_LATITUDE
            && (-180.0..180.0).contains(&self.longitude)
    }

    /// Returns the point unchanged if it is projectable.
    pub fn validated(self) -> Result<Self, LocateError> {
        if self.is_projectable() {
            Ok(self)
        } else {
            Err(LocateError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// A tile in the slippy-map scheme. `x` and `y` are in `[0, 2^zoom)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileAddress {
    pub zoom: ZoomLevel,
    pub x: u32,
    pub y: u32,
}

impl TileAddress {
    pub fn new(zoom: ZoomLevel, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// The neighbouring tile one column east. Used to find the tile's right edge.
    pub fn east(&self) -> Self {
        Self::new(self.zoom, self.x + 1, self.y)
    }

    /// The neighbouring tile one row south. Used to find the tile's bottom edge.
    pub fn south(&self) -> Self {
        Self::new(self.zoom, self.x, self.y + 1)
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Geographic corners of a tile.
///
/// Only three corners are needed: together they give the tile's angular
/// width and height for linear pixel interpolation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileBounds {
    pub top_left: GeoPoint,
    pub top_right: GeoPoint,
    pub bottom_left: GeoPoint,
}

impl TileBounds {
    /// Latitude span of the tile in degrees (positive).
    pub fn delta_latitude(&self) -> f64 {
        self.top_left.latitude - self.bottom_left.latitude
    }

    /// Longitude span of the tile in degrees (positive).
    pub fn delta_longitude(&self) -> f64 {
        self.top_right.longitude - self.top_left.longitude
    }
}

/// One marker-annotated tile of the mosaic.
#[derive(Clone, Debug)]
pub struct AnnotatedTile {
    pub zoom: ZoomLevel,
    pub address: TileAddress,
    pub image: RgbaImage,
}

/// The finished mosaic: one annotated tile per configured zoom level, in
/// configuration order (wide to close).
///
/// Only ever constructed when every tile was fetched successfully.
#[derive(Clone, Debug, Default)]
pub struct AnnotatedTileSet {
    tiles: Vec<AnnotatedTile>,
}

impl AnnotatedTileSet {
    pub(crate) fn from_tiles(tiles: Vec<AnnotatedTile>) -> Self {
        Self { tiles }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnnotatedTile> {
        self.tiles.iter()
    }

    pub fn zoom_levels(&self) -> Vec<ZoomLevel> {
        self.tiles.iter().map(|tile| tile.zoom).collect()
    }
}

impl IntoIterator for AnnotatedTileSet {
    type Item = AnnotatedTile;
    type IntoIter = std::vec::IntoIter<AnnotatedTile>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.into_iter()
    }
}

impl<'a> IntoIterator for &'a AnnotatedTileSet {
    type Item = &'a AnnotatedTile;
    type IntoIter = std::slice::Iter<'a, AnnotatedTile>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.iter()
    }
}

/// Errors that abort the map section of a report.
///
/// Reverse geocoding failures never appear here; they are recovered inside
/// [`annotator::LocationAnnotator::reverse_geocode`] as a missing caption.
#[derive(Error, Debug)]
pub enum LocateError {
    /// The point is outside the Web Mercator domain
    #[error("coordinate {latitude}, {longitude} is outside the Web Mercator domain")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// A configured zoom level is deeper than [`MAX_ZOOM`]
    #[error("zoom level {zoom} exceeds the maximum of {MAX_ZOOM}")]
    InvalidZoom { zoom: ZoomLevel },

    /// A tile could not be fetched or decoded; the whole mosaic is discarded
    #[error("tile {address} unavailable")]
    TileUnavailable {
        address: TileAddress,
        #[source]
        source: tile_source::TileError,
    },
}
