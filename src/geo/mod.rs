use crate::models::order::{GeoPoint, OrderRecord};

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Restaurant-to-dropoff distance, preferring the backend's computed value.
pub fn trip_distance_km(record: &OrderRecord) -> f64 {
    match record.distance {
        Some(distance) if distance.is_finite() && distance >= 0.0 => distance,
        _ => haversine_km(&record.restaurant.point(), &record.dropoff_point()),
    }
}
