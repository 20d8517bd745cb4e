pub mod proximity;

use crate::models::driver::GeoPoint;

pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance in kilometres.
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    // Rounding can push the term a hair past 1.0 for antipodal points.
    let haversine = (sin_lat * sin_lat + phi1.cos() * phi2.cos() * sin_lng * sin_lng).min(1.0);
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    distance_km(a.lat, a.lng, b.lat, b.lng)
}

#[cfg(test)]
mod tests {
    use super::{distance_km, haversine_km};
    use crate::models::driver::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 53.5511,
            lng: 9.9937,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        let points = [
            (0.0, 0.0, 0.0, 0.1),
            (51.5074, -0.1278, 48.8566, 2.3522),
            (-33.8688, 151.2093, 35.6762, 139.6503),
            (10.0, 179.9, 10.0, -179.9),
        ];
        for (lat1, lng1, lat2, lng2) in points {
            let there = distance_km(lat1, lng1, lat2, lng2);
            let back = distance_km(lat2, lng2, lat1, lng1);
            assert!((there - back).abs() < 1e-9);
        }
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint {
            lat: 51.5074,
            lng: -0.1278,
        };
        let paris = GeoPoint {
            lat: 48.8566,
            lng: 2.3522,
        };
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn tenth_of_a_degree_on_the_equator_is_about_11_km() {
        let distance = distance_km(0.0, 0.0, 0.0, 0.1);
        assert!((distance - 11.12).abs() < 0.01);
    }

    #[test]
    fn antipodal_points_are_half_the_circumference_apart() {
        let distance = distance_km(0.0, 0.0, 0.0, 180.0);
        assert!((distance - std::f64::consts::PI * super::EARTH_RADIUS_KM).abs() < 1e-6);
    }
}
