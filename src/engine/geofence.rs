use crate::model::attendance::Coordinates;
use crate::model::location_zone::LocationZone;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters.
pub fn haversine_m(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceResult<'a> {
    /// Closest containing zone, or the closest zone overall when outside.
    pub zone: &'a LocationZone,
    pub distance_m: f64,
    pub inside: bool,
}

/// Resolves a point against the zones. Among containing zones the nearest
/// wins; with none containing, the nearest zone is still reported for
/// display. `None` only when there are no zones.
pub fn locate(point: Coordinates, zones: &[LocationZone]) -> Option<GeofenceResult<'_>> {
    let mut nearest: Option<(&LocationZone, f64)> = None;
    let mut nearest_inside: Option<(&LocationZone, f64)> = None;

    for zone in zones {
        let distance = haversine_m(
            point,
            Coordinates {
                lat: zone.lat,
                lng: zone.lng,
            },
        );
        if nearest.is_none_or(|(_, d)| distance < d) {
            nearest = Some((zone, distance));
        }
        if distance <= zone.radius_m && nearest_inside.is_none_or(|(_, d)| distance < d) {
            nearest_inside = Some((zone, distance));
        }
    }

    match (nearest_inside, nearest) {
        (Some((zone, distance_m)), _) => Some(GeofenceResult {
            zone,
            distance_m,
            inside: true,
        }),
        (None, Some((zone, distance_m))) => Some(GeofenceResult {
            zone,
            distance_m,
            inside: false,
        }),
        (None, None) => None,
    }
}
