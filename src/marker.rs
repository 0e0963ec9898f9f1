//! Marker overlay for map tiles
//!
//! Places the point of interest inside a fetched tile by linear
//! interpolation between the tile's corners, then draws an unfilled square
//! around it with embedded-graphics so the map underneath stays readable.

use embedded_graphics::{
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    Pixel,
};
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::config::MarkerConfig;
use crate::{GeoPoint, TileBounds};

/// Largest half width honoured; keeps the corner span within `i32`.
const MAX_HALF_WIDTH: i32 = i32::MAX / 4;

/// Outline drawn around the point of interest.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerStyle {
    pub half_width: u32,
    pub stroke_width: u32,
    pub color: Rgb888,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self::from(&MarkerConfig::default())
    }
}

impl From<&MarkerConfig> for MarkerStyle {
    fn from(config: &MarkerConfig) -> Self {
        Self {
            half_width: config.half_width,
            stroke_width: config.stroke_width,
            color: Rgb888::BLACK,
        }
    }
}

/// Pixel position of `point` inside a `width × height` tile covering `bounds`.
///
/// Image rows grow downward while latitude grows upward, hence the flip on
/// the y axis. The interpolation is linear in degrees, which slightly
/// misplaces the point vertically because Mercator stretches latitude within
/// a tile; at tile scale the error is well under the marker size.
pub fn pixel_position(
    bounds: &TileBounds,
    point: GeoPoint,
    width: u32,
    height: u32,
) -> (f64, f64) {
    let width = f64::from(width);
    let height = f64::from(height);

    let x = (point.longitude - bounds.top_left.longitude) / bounds.delta_longitude() * width;
    let y =
        height - (point.latitude - bounds.bottom_left.latitude) / bounds.delta_latitude() * height;
    (x, y)
}

/// Draw the marker for `point` on `tile` and hand the tile back.
///
/// Positions are not clamped: a point that falls outside the raster (only
/// possible through rounding at tile edges) yields a partly or fully
/// invisible marker instead of an error.
pub fn annotate(
    mut tile: RgbaImage,
    bounds: &TileBounds,
    point: GeoPoint,
    style: &MarkerStyle,
) -> RgbaImage {
    let (x, y) = pixel_position(bounds, point, tile.width(), tile.height());
    let centre = Point::new(x as i32, y as i32);
    debug!("marker for {} at pixel ({}, {})", point, centre.x, centre.y);

    let half = i32::try_from(style.half_width)
        .unwrap_or(i32::MAX)
        .min(MAX_HALF_WIDTH);
    let top_left = Point::new(centre.x.saturating_sub(half), centre.y.saturating_sub(half));
    let bottom_right = Point::new(centre.x.saturating_add(half), centre.y.saturating_add(half));

    let mut canvas = TileCanvas { image: &mut tile };
    Rectangle::with_corners(top_left, bottom_right)
        .into_styled(PrimitiveStyle::with_stroke(style.color, style.stroke_width))
        .draw(&mut canvas)
        .ok();

    tile
}

/// Draw target over an RGBA tile. Pixels outside the raster are dropped.
struct TileCanvas<'a> {
    image: &'a mut RgbaImage,
}

impl OriginDimensions for TileCanvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for TileCanvas<'_> {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.image.dimensions();
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < width && y < height {
                self.image
                    .put_pixel(x, y, Rgba([color.r(), color.g(), color.b(), 255]));
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let visible = area.intersection(&self.bounding_box());
        self.draw_iter(visible.points().map(|point| Pixel(point, color)))
    }
}
