use super::GeoSample;

/// Picks the speed for the current fix.
///
/// A finite sensor-reported speed is used as-is. Without one, the secant speed
/// between the previous and the current fix is used, provided time moved
/// forward between them. Otherwise the speed is unknown.
pub fn resolve_speed(
    raw_speed: Option<f64>,
    delta_meters: f64,
    previous: Option<&GeoSample>,
    current: &GeoSample,
) -> Option<f64> {
    if let Some(speed) = raw_speed.filter(|s| s.is_finite()) {
        return Some(speed);
    }

    let previous = previous?;
    let dt = current.timestamp_s - previous.timestamp_s;
    if dt.is_finite() && dt > 0. && delta_meters.is_finite() {
        Some(delta_meters / dt)
    } else {
        None
    }
}
