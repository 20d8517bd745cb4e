use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};

use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::driver::GeoPoint;
use crate::models::quote::Quote;

/// A flat amount or a percentage of the running subtotal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment {
    Flat(f64),
    Percent(f64),
}

impl Adjustment {
    fn amount_on(&self, subtotal: f64) -> f64 {
        match *self {
            Adjustment::Flat(amount) => amount.max(0.0),
            Adjustment::Percent(pct) => subtotal * pct.clamp(0.0, 100.0) / 100.0,
        }
    }
}

/// Local hours `[start_hour, end_hour)`; wraps past midnight when start > end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl PeakWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub per_kg_rate: f64,
    pub free_weight_kg: f64,
    pub peak_surcharge: Adjustment,
    pub peak_windows: Vec<PeakWindow>,
    pub peak_utc_offset: FixedOffset,
    pub average_speed_kmh: f64,
    /// Keys are upper-case promo codes.
    pub promo_codes: HashMap<String, Adjustment>,
    pub minimum_total: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fare: 5.0,
            per_km_rate: 1.5,
            per_kg_rate: 0.5,
            free_weight_kg: 5.0,
            peak_surcharge: Adjustment::Percent(20.0),
            peak_windows: vec![
                PeakWindow {
                    start_hour: 7,
                    end_hour: 10,
                },
                PeakWindow {
                    start_hour: 17,
                    end_hour: 20,
                },
            ],
            peak_utc_offset: Utc.fix(),
            average_speed_kmh: 30.0,
            promo_codes: HashMap::from([
                ("WELCOME10".to_string(), Adjustment::Percent(10.0)),
                ("SAVE5".to_string(), Adjustment::Flat(5.0)),
            ]),
            minimum_total: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn quote_route(
        &self,
        pickup: &GeoPoint,
        delivery: &GeoPoint,
        weight_kg: f64,
        promo_code: Option<&str>,
        request_time: DateTime<Utc>,
    ) -> Result<Quote, AppError> {
        pickup.validate()?;
        delivery.validate()?;
        self.quote(haversine_km(pickup, delivery), weight_kg, promo_code, request_time)
    }

    /// Fare for a trip: base, distance, excess weight, peak surcharge, minus promo.
    pub fn quote(
        &self,
        distance_km: f64,
        weight_kg: f64,
        promo_code: Option<&str>,
        request_time: DateTime<Utc>,
    ) -> Result<Quote, AppError> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(AppError::InvalidInput(format!(
                "distance must be a non-negative number, got {distance_km}"
            )));
        }
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(AppError::InvalidInput(format!(
                "package weight must be positive, got {weight_kg}"
            )));
        }

        let cfg = &self.config;

        // Every line item is rounded before it feeds the next one, so the
        // breakdown adds up to the total to the cent.
        let base_fare = round_cents(cfg.base_fare);
        let distance_charge = round_cents(distance_km * cfg.per_km_rate);
        let weight_charge =
            round_cents((weight_kg - cfg.free_weight_kg).max(0.0) * cfg.per_kg_rate);
        let subtotal = round_cents(base_fare + distance_charge + weight_charge);

        let peak_hour_surcharge = if self.is_peak(request_time) {
            round_cents(cfg.peak_surcharge.amount_on(subtotal))
        } else {
            0.0
        };
        let gross = round_cents(subtotal + peak_hour_surcharge);

        let minimum_total = round_cents(cfg.minimum_total);
        let discount = self
            .promo(promo_code)
            .map(|adjustment| {
                round_cents(adjustment.amount_on(gross).min(gross - minimum_total).max(0.0))
            })
            .unwrap_or(0.0);

        let total_amount = round_cents(gross - discount).max(minimum_total);

        Ok(Quote {
            distance_km: round_cents(distance_km),
            base_fare,
            distance_charge,
            weight_charge,
            peak_hour_surcharge,
            discount,
            total_amount,
            estimated_minutes: self.estimated_minutes(distance_km),
        })
    }

    fn is_peak(&self, request_time: DateTime<Utc>) -> bool {
        let hour = request_time
            .with_timezone(&self.config.peak_utc_offset)
            .hour();
        self.config
            .peak_windows
            .iter()
            .any(|window| window.contains(hour))
    }

    fn promo(&self, promo_code: Option<&str>) -> Option<&Adjustment> {
        let code = promo_code?.trim();
        if code.is_empty() {
            return None;
        }
        self.config.promo_codes.get(&code.to_ascii_uppercase())
    }

    fn estimated_minutes(&self, distance_km: f64) -> u32 {
        if self.config.average_speed_kmh <= 0.0 {
            return 0;
        }
        (distance_km * 60.0 / self.config.average_speed_kmh).ceil() as u32
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
