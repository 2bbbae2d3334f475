use serde::{Deserialize, Serialize};

use crate::VelometerError;

/// A position fix as delivered by the position source, before validation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RawFix {
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon")]
    pub longitude: f64,
    /// Fix time in seconds
    pub timestamp: f64,
    /// Sensor-reported speed in m/s, if the source provides one
    #[serde(default)]
    pub speed: Option<f64>,
    /// Course over ground in degrees, if the source provides one
    #[serde(default)]
    pub heading: Option<f64>,
}

/// A validated position fix. Coordinates and timestamp are always finite.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeoSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_s: f64,
    pub speed_mps: Option<f64>,
    /// Heading in [0, 360), `None` when the source did not report one
    pub heading_deg: Option<f64>,
}

impl GeoSample {
    /// Validates a raw fix into a canonical sample.
    ///
    /// Fails with [`VelometerError::InvalidSample`] when the coordinates or the
    /// timestamp are not finite, or the coordinates are outside their ranges.
    pub fn from_raw(raw: &RawFix) -> Result<Self, VelometerError> {
        if !raw.latitude.is_finite() || !raw.longitude.is_finite() {
            return Err(VelometerError::InvalidSample {
                reason: format!(
                    "non-finite coordinates ({}, {})",
                    raw.latitude, raw.longitude
                ),
            });
        }
        if !raw.timestamp.is_finite() {
            return Err(VelometerError::InvalidSample {
                reason: format!("non-finite timestamp {}", raw.timestamp),
            });
        }
        if !(-90.0..=90.0).contains(&raw.latitude) || !(-180.0..=180.0).contains(&raw.longitude) {
            return Err(VelometerError::InvalidSample {
                reason: format!(
                    "coordinates out of range ({}, {})",
                    raw.latitude, raw.longitude
                ),
            });
        }

        Ok(Self {
            latitude: raw.latitude,
            longitude: raw.longitude,
            timestamp_s: raw.timestamp,
            speed_mps: raw.speed,
            heading_deg: raw.heading.and_then(normalize_heading),
        })
    }
}

/// Wraps a heading into [0, 360). Non-finite headings are treated as unavailable.
pub fn normalize_heading(heading: f64) -> Option<f64> {
    if !heading.is_finite() {
        return None;
    }
    Some(((heading % 360.) + 360.) % 360.)
}
