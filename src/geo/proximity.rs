use serde::{Deserialize, Serialize};

use crate::geo::haversine_km;
use crate::models::driver::{Availability, Driver, GeoPoint};

/// Approximate length of one degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Rectangular prefilter around a search centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub center_lng: f64,
    /// Half-width in degrees; `None` when the box spans every meridian.
    pub lng_delta: Option<f64>,
}

impl BoundingBox {
    pub fn around(center: GeoPoint, radius_km: f64) -> Self {
        let lat_delta = radius_km / KM_PER_DEGREE;
        let meridian_scale = center.lat.to_radians().cos();

        let lng_delta = if meridian_scale <= f64::EPSILON {
            None
        } else {
            Some(radius_km / (KM_PER_DEGREE * meridian_scale)).filter(|delta| *delta < 180.0)
        };

        Self {
            min_lat: center.lat - lat_delta,
            max_lat: center.lat + lat_delta,
            center_lng: center.lng,
            lng_delta,
        }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        if point.lat < self.min_lat || point.lat > self.max_lat {
            return false;
        }

        match self.lng_delta {
            None => true,
            Some(delta) => {
                // Wrapped difference so boxes straddling the antimeridian still match.
                let diff = (point.lng - self.center_lng + 540.0).rem_euclid(360.0) - 180.0;
                diff.abs() <= delta
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    #[default]
    Unordered,
    Distance,
    Rating,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyDriver {
    #[serde(flatten)]
    pub driver: Driver,
    pub distance_km: f64,
}

/// ONLINE drivers within `radius_km` of `center`.
///
/// The pool is narrowed with a [`BoundingBox`] before the exact great-circle
/// check. Drivers that never reported a location are skipped.
pub fn find_within<I>(center: GeoPoint, radius_km: f64, pool: I, ranking: Ranking) -> Vec<NearbyDriver>
where
    I: IntoIterator<Item = Driver>,
{
    let bbox = BoundingBox::around(center, radius_km);

    let mut nearby: Vec<NearbyDriver> = pool
        .into_iter()
        .filter(|driver| driver.availability == Availability::Online)
        .filter_map(|driver| {
            let location = driver.location?;
            if !bbox.contains(&location) {
                return None;
            }

            let distance_km = haversine_km(&center, &location);
            (distance_km <= radius_km).then_some(NearbyDriver {
                driver,
                distance_km,
            })
        })
        .collect();

    match ranking {
        Ranking::Unordered => {}
        Ranking::Distance => nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km)),
        Ranking::Rating => nearby.sort_by(|a, b| {
            b.driver
                .stats
                .rating
                .total_cmp(&a.driver.stats.rating)
                .then(a.distance_km.total_cmp(&b.distance_km))
        }),
    }

    nearby
}
