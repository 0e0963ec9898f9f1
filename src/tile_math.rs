//! # Slippy-Map Tile Addressing
//!
//! Conversions between geographic coordinates and the `(zoom, x, y)` tile
//! indices used by OpenStreetMap-style tile servers under the Web Mercator
//! projection.
//!
//! ## Tile Grid
//! At zoom `z` the world is covered by `n = 2^z` columns and `n` rows of
//! square tiles. Column 0 starts at 180°W, row 0 starts at the northern edge
//! of the projection (≈85.0511°N).
//!
//! ### Forward transform
//! ```text
//! x = floor((lon + 180) / 360 * n)
//! y = floor((1 - ln(tan(lat) + sec(lat)) / π) / 2 * n)
//! ```
//!
//! ### Inverse transform
//! Returns the **north-west corner** of a tile, not its centre:
//! ```text
//! lon = x / n * 360 - 180
//! lat = atan(sinh(π * (1 - 2y / n)))
//! ```
//!
//! Indices are truncated with `floor`, so a point lying exactly on a tile
//! edge belongs to the tile whose west or north edge it is.
//! Nothing here validates its input; callers check
//! [`GeoPoint::is_projectable`] and keep zoom levels at or below
//! [`MAX_ZOOM`](crate::MAX_ZOOM).

use crate::{GeoPoint, TileAddress, TileBounds, ZoomLevel};
use std::f64::consts::PI;

/// Number of tiles along one axis at `zoom`.
fn tiles_per_axis(zoom: ZoomLevel) -> f64 {
    2f64.powi(i32::from(zoom))
}

/// Tile containing `point` at `zoom`.
///
/// # Example
/// ```
/// use photo_locator::{tile_math, GeoPoint};
///
/// let address = tile_math::forward(GeoPoint::new(0.0, -180.0), 4);
/// assert_eq!((address.x, address.y), (0, 8));
/// ```
pub fn forward(point: GeoPoint, zoom: ZoomLevel) -> TileAddress {
    let n = tiles_per_axis(zoom);
    let lat_rad = point.latitude.to_radians();

    let x = ((point.longitude + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    TileAddress::new(zoom, x as u32, y as u32)
}

/// North-west corner of `address`.
pub fn inverse(address: TileAddress) -> GeoPoint {
    let n = tiles_per_axis(address.zoom);

    let longitude = f64::from(address.x) / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * f64::from(address.y) / n)).sinh().atan();

    GeoPoint::new(lat_rad.to_degrees(), longitude)
}

/// Corners of `address`, built from three inverse transforms: the tile
/// itself, its eastern neighbour and its southern neighbour.
pub fn bounds(address: TileAddress) -> TileBounds {
    TileBounds {
        top_left: inverse(address),
        top_right: inverse(address.east()),
        bottom_left: inverse(address.south()),
    }
}
