//! # Location Annotation
//!
//! Orchestrates tile resolution, fetching and marker drawing across the
//! configured zoom levels, and runs the reverse geocoding lookup as an
//! independent sibling operation.
//!
//! ## Failure Policy
//! - [`LocationAnnotator::build_mosaic`] is all-or-nothing: the first tile
//!   that cannot be fetched aborts the build and every tile already
//!   annotated is dropped.
//! - [`LocationAnnotator::reverse_geocode`] never fails; any
//!   [`GeocodeError`](crate::geocode::GeocodeError) becomes `None`.
//!
//! The annotator keeps no state between calls.

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::geocode::ReverseGeocoder;
use crate::marker::{self, MarkerStyle};
use crate::tile_math;
use crate::tile_source::TileSource;
use crate::{AnnotatedTile, AnnotatedTileSet, GeoPoint, LocateError, ZoomLevel, MAX_ZOOM};

/// Everything the report needs about where a photo was taken.
///
/// Either half may be missing independently: a failed tile drops the mosaic
/// but keeps the caption, a failed lookup drops the caption but keeps the
/// mosaic.
#[derive(Clone, Debug)]
pub struct Location {
    pub point: GeoPoint,
    pub place: Option<String>,
    pub mosaic: Option<AnnotatedTileSet>,
}

/// Builds marker-annotated mosaics and place names for a coordinate.
pub struct LocationAnnotator<T, G> {
    tiles: T,
    geocoder: G,
    zoom_levels: Vec<ZoomLevel>,
    style: MarkerStyle,
    geocode_zoom: Option<ZoomLevel>,
}

impl<T: TileSource, G: ReverseGeocoder> LocationAnnotator<T, G> {
    /// Annotator using the zoom levels, marker and geocoder settings of `config`.
    pub fn new(tiles: T, geocoder: G, config: &Config) -> Self {
        Self {
            tiles,
            geocoder,
            zoom_levels: config.tiles.zoom_levels.clone(),
            style: MarkerStyle::from(&config.marker),
            geocode_zoom: config.geocoder.enabled.then_some(config.geocoder.zoom),
        }
    }

    pub fn zoom_levels(&self) -> &[ZoomLevel] {
        &self.zoom_levels
    }

    /// One annotated tile per configured zoom level, in configuration order.
    ///
    /// The coordinate and every zoom level are validated before any request
    /// is made. An empty zoom list yields an empty mosaic.
    pub fn build_mosaic(&self, point: GeoPoint) -> Result<AnnotatedTileSet, LocateError> {
        let point = point.validated()?;
        if let Some(&zoom) = self.zoom_levels.iter().find(|&&zoom| zoom > MAX_ZOOM) {
            return Err(LocateError::InvalidZoom { zoom });
        }

        let mut tiles = Vec::with_capacity(self.zoom_levels.len());
        for &zoom in &self.zoom_levels {
            let address = tile_math::forward(point, zoom);
            let image = self
                .tiles
                .fetch(address)
                .map_err(|source| LocateError::TileUnavailable { address, source })?;

            let bounds = tile_math::bounds(address);
            let image = marker::annotate(image, &bounds, point, &self.style);
            tiles.push(AnnotatedTile {
                zoom,
                address,
                image,
            });
        }

        debug!("mosaic for {} built from {} tiles", point, tiles.len());
        Ok(AnnotatedTileSet::from_tiles(tiles))
    }

    /// Place name for `point` at address granularity `zoom`, if any.
    pub fn reverse_geocode(&self, point: GeoPoint, zoom: ZoomLevel) -> Option<String> {
        match self.geocoder.lookup(point, zoom) {
            Ok(place) => {
                debug!("{} is in {}", point, place);
                Some(place)
            }
            Err(e) => {
                warn!("no place name for {}: {}", point, e);
                None
            }
        }
    }

    /// Mosaic and place name for `point`, each recovered independently.
    ///
    /// Only an invalid coordinate is an error, since then neither half can
    /// be produced.
    pub fn locate(&self, point: GeoPoint) -> Result<Location, LocateError> {
        let point = point.validated()?;
        info!("locating photo at {}", point);

        let mosaic = match self.build_mosaic(point) {
            Ok(mosaic) => Some(mosaic),
            Err(e) => {
                warn!("map omitted: {}", e);
                None
            }
        };

        let place = self
            .geocode_zoom
            .and_then(|zoom| self.reverse_geocode(point, zoom));

        Ok(Location {
            point,
            place,
            mosaic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::GeocodeError;
    use crate::tile_source::TileError;
    use crate::TileAddress;
    use image::{Rgba, RgbaImage};
    use reqwest::StatusCode;
    use std::cell::RefCell;

    /// Serves blank tiles and records every request; fails at chosen zooms.
    #[derive(Default)]
    struct FakeTiles {
        failing: Vec<ZoomLevel>,
        requests: RefCell<Vec<TileAddress>>,
    }

    impl TileSource for FakeTiles {
        fn fetch(&self, address: TileAddress) -> Result<RgbaImage, TileError> {
            self.requests.borrow_mut().push(address);
            if self.failing.contains(&address.zoom) {
                Err(TileError::Status(StatusCode::SERVICE_UNAVAILABLE))
            } else {
                Ok(RgbaImage::from_pixel(256, 256, Rgba([255, 255, 255, 255])))
            }
        }
    }

    struct FakeGeocoder(Option<&'static str>);

    impl ReverseGeocoder for FakeGeocoder {
        fn lookup(&self, _point: GeoPoint, _zoom: ZoomLevel) -> Result<String, GeocodeError> {
            self.0.map(str::to_string).ok_or(GeocodeError::NoResult)
        }
    }

    fn annotator(
        failing: Vec<ZoomLevel>,
        place: Option<&'static str>,
    ) -> LocationAnnotator<FakeTiles, FakeGeocoder> {
        let tiles = FakeTiles {
            failing,
            ..FakeTiles::default()
        };
        LocationAnnotator::new(tiles, FakeGeocoder(place), &Config::default())
    }

    const BRESCIA: GeoPoint = GeoPoint {
        latitude: 45.5416,
        longitude: 10.2118,
    };

    #[test]
    fn test_mosaic_has_one_marked_tile_per_zoom() {
        let annotator = annotator(vec![], None);
        let mosaic = annotator.build_mosaic(BRESCIA).unwrap();

        assert_eq!(mosaic.zoom_levels(), vec![7, 10, 13]);
        for tile in &mosaic {
            assert_eq!(tile.address, tile_math::forward(BRESCIA, tile.zoom));
            let marked = tile
                .image
                .pixels()
                .any(|p| *p == Rgba([0, 0, 0, 255]));
            assert!(marked, "zoom {} has no marker", tile.zoom);
        }
    }

    #[test]
    fn test_one_failed_tile_discards_mosaic() {
        let annotator = annotator(vec![10], Some("Brescia"));

        match annotator.build_mosaic(BRESCIA) {
            Err(LocateError::TileUnavailable { address, .. }) => assert_eq!(address.zoom, 10),
            other => panic!("expected TileUnavailable, got {other:?}"),
        }
        // No retry, and nothing after the failure is requested
        let zooms: Vec<_> = annotator.tiles.requests.borrow().iter().map(|a| a.zoom).collect();
        assert_eq!(zooms, vec![7, 10]);
    }

    #[test]
    fn test_invalid_coordinate_makes_no_request() {
        let annotator = annotator(vec![], Some("North Pole"));
        let pole = GeoPoint::new(89.0, 0.0);

        assert!(matches!(
            annotator.build_mosaic(pole),
            Err(LocateError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            annotator.locate(pole),
            Err(LocateError::InvalidCoordinate { .. })
        ));
        assert!(annotator.tiles.requests.borrow().is_empty());
    }

    #[test]
    fn test_zoom_beyond_maximum_is_rejected_before_fetching() {
        let mut config = Config::default();
        config.tiles.zoom_levels = vec![7, MAX_ZOOM + 1, 40];
        let annotator =
            LocationAnnotator::new(FakeTiles::default(), FakeGeocoder(Some("Brescia")), &config);

        match annotator.build_mosaic(GeoPoint::new(10.0, 179.9)) {
            Err(LocateError::InvalidZoom { zoom }) => assert_eq!(zoom, MAX_ZOOM + 1),
            other => panic!("expected InvalidZoom, got {other:?}"),
        }
        assert!(annotator.tiles.requests.borrow().is_empty());

        // The caption does not depend on the mosaic
        let location = annotator.locate(BRESCIA).unwrap();
        assert!(location.mosaic.is_none());
        assert_eq!(location.place.as_deref(), Some("Brescia"));
    }

    #[test]
    fn test_deepest_zoom_resolves_at_the_antimeridian() {
        let mut config = Config::default();
        config.tiles.zoom_levels = vec![MAX_ZOOM];
        let annotator =
            LocationAnnotator::new(FakeTiles::default(), FakeGeocoder(None), &config);

        let mosaic = annotator.build_mosaic(GeoPoint::new(10.0, 179.9)).unwrap();
        let tile = mosaic.iter().next().unwrap();
        assert!(tile.address.x < 1u32 << MAX_ZOOM);
        assert!(tile.address.y < 1u32 << MAX_ZOOM);
    }

    #[test]
    fn test_empty_zoom_list_yields_empty_mosaic() {
        let mut config = Config::default();
        config.tiles.zoom_levels.clear();
        let annotator =
            LocationAnnotator::new(FakeTiles::default(), FakeGeocoder(None), &config);

        let mosaic = annotator.build_mosaic(BRESCIA).unwrap();
        assert!(mosaic.is_empty());
    }

    #[test]
    fn test_geocode_failure_is_soft() {
        let annotator = annotator(vec![], None);
        assert_eq!(annotator.reverse_geocode(BRESCIA, 14), None);
        assert!(annotator.build_mosaic(BRESCIA).is_ok());
    }

    #[test]
    fn test_locate_keeps_caption_when_tiles_fail() {
        let annotator = annotator(vec![13], Some("Brescia, Lombardia, Italia"));
        let location = annotator.locate(BRESCIA).unwrap();

        assert!(location.mosaic.is_none());
        assert_eq!(location.place.as_deref(), Some("Brescia, Lombardia, Italia"));
    }

    #[test]
    fn test_locate_skips_lookup_when_geocoder_disabled() {
        let mut config = Config::default();
        config.geocoder.enabled = false;
        let annotator =
            LocationAnnotator::new(FakeTiles::default(), FakeGeocoder(Some("Brescia")), &config);

        let location = annotator.locate(BRESCIA).unwrap();
        assert!(location.place.is_none());
        assert_eq!(location.mosaic.map(|m| m.len()), Some(3));
    }
}
