//! # Reverse Geocoding
//!
//! Turns a coordinate into a human-readable place description through a
//! Nominatim-compatible `/reverse` endpoint.
//!
//! ## Request
//! `GET {url}?format=xml&lat={lat}&lon={lon}&zoom={zoom}&addressdetails=1`
//!
//! Parameters are appended to any query already present in `{url}`, so
//! keyed endpoints (`...?key=abc`) keep their key.
//!
//! The `zoom` parameter selects address granularity (3 = country,
//! 10 = city, 14 = suburb, 18 = building) and is unrelated to the zoom levels
//! of the tile mosaic.
//!
//! ## Response
//! ```xml
//! <reversegeocode timestamp="..." querystring="...">
//!   <result place_id="..." lat="45.54" lon="10.21">Via Roma, Brescia, Italia</result>
//!   <addressparts>...</addressparts>
//! </reversegeocode>
//! ```
//! The text of the first `<result>` element, taken verbatim, is the place
//! name. A document without `<result>` (Nominatim answers `<error>` for
//! open sea) or whose first `<result>` is empty means no place name.

use quick_xml::escape::{unescape, EscapeError};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use std::str;
use thiserror::Error;
use tracing::debug;

use crate::config::{GeocoderConfig, NetworkConfig};
use crate::{GeoPoint, ZoomLevel};

/// Reasons a place name could not be produced.
///
/// None of these is fatal to a report: the caller drops the caption.
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoder answered {0}")]
    Status(StatusCode),

    #[error("invalid geocoder URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid XML escape: {0}")]
    Escape(#[from] EscapeError),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] str::Utf8Error),

    #[error("no result for this location")]
    NoResult,
}

/// A reverse geocoding service.
pub trait ReverseGeocoder {
    /// Place name for `point` at address granularity `zoom`.
    fn lookup(&self, point: GeoPoint, zoom: ZoomLevel) -> Result<String, GeocodeError>;
}

/// Nominatim client over blocking HTTP.
pub struct NominatimGeocoder {
    client: Client,
    endpoint: Url,
}

impl NominatimGeocoder {
    pub fn new(geocoder: &GeocoderConfig, network: &NetworkConfig) -> Result<Self, GeocodeError> {
        Ok(Self {
            client: network.client()?,
            endpoint: Url::parse(&geocoder.url)?,
        })
    }

    /// Build the request URL for `point`.
    pub fn url(&self, point: GeoPoint, zoom: ZoomLevel) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("format", "xml")
            .append_pair("lat", &point.latitude.to_string())
            .append_pair("lon", &point.longitude.to_string())
            .append_pair("zoom", &zoom.to_string())
            .append_pair("addressdetails", "1");
        url
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn lookup(&self, point: GeoPoint, zoom: ZoomLevel) -> Result<String, GeocodeError> {
        let url = self.url(point, zoom);
        debug!("reverse geocoding {} via {}", point, url);

        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status));
        }

        let body = response.text()?;
        parse_place_name(&body)
    }
}

/// Extract the text of the first `<result>` element of a Nominatim reply.
///
/// Later `<result>` elements are never consulted, even when the first one
/// is empty.
pub fn parse_place_name(xml: &str) -> Result<String, GeocodeError> {
    let mut reader = Reader::from_str(xml);
    let mut in_result = false;
    let mut place = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(elt) if elt.name().as_ref() == b"result" => in_result = true,

            Event::Empty(elt) if elt.name().as_ref() == b"result" => break,

            Event::Text(text) if in_result => {
                place.push_str(&unescape(str::from_utf8(&text)?)?);
            }

            Event::GeneralRef(reference) if in_result => {
                let entity = format!("&{};", str::from_utf8(&reference)?);
                place.push_str(&unescape(&entity)?);
            }

            Event::End(elt) if in_result && elt.name().as_ref() == b"result" => break,

            Event::Eof => break,

            _ => (),
        }
    }

    if place.is_empty() {
        Err(GeocodeError::NoResult)
    } else {
        Ok(place)
    }
}
