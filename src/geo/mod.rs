pub mod client;
pub mod polygon;

use crate::models::location::GeoPoint;

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

#[cfg(test)]
mod tests {
    use super::haversine_km;
    use crate::models::location::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 4.0511,
            lng: 9.7679,
        };
        assert!(haversine_km(&p, &p) < 1e-9);
    }

    #[test]
    fn douala_to_yaounde_is_around_200_km() {
        let douala = GeoPoint {
            lat: 4.0511,
            lng: 9.7679,
        };
        let yaounde = GeoPoint {
            lat: 3.8480,
            lng: 11.5021,
        };
        let distance = haversine_km(&douala, &yaounde);
        assert!((distance - 193.0).abs() < 10.0);
    }
}
