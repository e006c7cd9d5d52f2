//! Conversion between geodetic points and the EWKT text PostGIS
//! accepts for and returns from a `geography(Point, 4326)` column.
//!
//! The wire form lists longitude before latitude:
//!
//! ```
//! use specimen_backend::geo::{encode, GeoPoint};
//!
//! let tokyo = GeoPoint::new(35.6, 139.7);
//! assert_eq!(encode(&tokyo).unwrap().as_deref(), Some("SRID=4326;POINT(139.7 35.6)"));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The literal that starts every encoded point.
pub const WIRE_PREFIX: &str = "SRID=4326;POINT(";

const WIRE_SUFFIX: char = ')';

/// A location on the Earth’s surface. Either both coordinates are
/// present or neither is; see [`encode`].
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        GeoPoint {
            lat: Some(lat),
            lng: Some(lng),
        }
    }

    /// The point used when no location was recorded.
    pub fn absent() -> Self {
        GeoPoint::default()
    }

    pub fn is_absent(&self) -> bool {
        self.lat.is_none() && self.lng.is_none()
    }
}

/// Enumerates the ways a point can fail to cross the wire.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("expected text starting with \"SRID=4326;POINT(\", got {0:?}")]
    MissingPrefix(String),

    #[error("expected text ending with \")\", got {0:?}")]
    MissingSuffix(String),

    #[error("expected two coordinates, found {0}")]
    MissingCoordinate(usize),

    #[error("expected two coordinates, found {0}")]
    ExtraCoordinates(usize),

    #[error("{0:?} is not a coordinate")]
    InvalidNumber(String),

    #[error("point has a {present} but no {missing}")]
    PartialPoint {
        present: &'static str,
        missing: &'static str,
    },

    #[error("coordinate {0} is not finite")]
    NonFinite(f64),
}

/// Encodes a point. Returns `Ok(None)` for a point with neither
/// coordinate, which is stored as NULL rather than as `(0, 0)`.
///
/// Coordinates are written with `f64`’s shortest round-tripping
/// representation, so decoding the result gives back the same values.
pub fn encode(point: &GeoPoint) -> Result<Option<String>, CodecError> {
    let (lat, lng) = match (point.lat, point.lng) {
        (None, None) => return Ok(None),
        (Some(_), None) => {
            return Err(CodecError::PartialPoint {
                present: "latitude",
                missing: "longitude",
            })
        }
        (None, Some(_)) => {
            return Err(CodecError::PartialPoint {
                present: "longitude",
                missing: "latitude",
            })
        }
        (Some(lat), Some(lng)) => (lat, lng),
    };

    for coordinate in [lat, lng] {
        if !coordinate.is_finite() {
            return Err(CodecError::NonFinite(coordinate));
        }
    }

    Ok(Some(format!("{}{} {}{}", WIRE_PREFIX, lng, lat, WIRE_SUFFIX)))
}

/// Decodes a point from its wire form. Both coordinates of the result
/// are always present. Surrounding whitespace is ignored; anything else
/// outside `SRID=4326;POINT(lng lat)` is an error.
pub fn decode(wire: &str) -> Result<GeoPoint, CodecError> {
    let body = wire
        .trim()
        .strip_prefix(WIRE_PREFIX)
        .ok_or_else(|| CodecError::MissingPrefix(wire.to_owned()))?
        .strip_suffix(WIRE_SUFFIX)
        .ok_or_else(|| CodecError::MissingSuffix(wire.to_owned()))?;

    let tokens = body.split_whitespace().collect::<Vec<_>>();

    match tokens.len() {
        2 => {}
        n if n < 2 => return Err(CodecError::MissingCoordinate(n)),
        n => return Err(CodecError::ExtraCoordinates(n)),
    }

    let parse = |token: &str| -> Result<f64, CodecError> {
        token
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| CodecError::InvalidNumber(token.to_owned()))
    };

    let lng = parse(tokens[0])?;
    let lat = parse(tokens[1])?;

    Ok(GeoPoint::new(lat, lng))
}

/// Decodes an optional column value; NULL reads back as the absent
/// point.
pub fn decode_option(wire: Option<&str>) -> Result<GeoPoint, CodecError> {
    match wire {
        Some(wire) => decode(wire),
        None => Ok(GeoPoint::absent()),
    }
}
