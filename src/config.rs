use std::collections::HashMap;
use std::env;
use std::time::Duration;

use chrono::FixedOffset;

use crate::engine::pricing::{Adjustment, PeakWindow, PricingConfig};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct AutoDispatchConfig {
    pub enabled: bool,
    pub radius_km: f64,
    pub retry_delay: Duration,
}

impl Default for AutoDispatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            radius_km: 10.0,
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub dispatch_queue_size: usize,
    pub event_buffer_size: usize,
    pub auto_dispatch: AutoDispatchConfig,
    pub pricing: PricingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            dispatch_queue_size: 1024,
            event_buffer_size: 1024,
            auto_dispatch: AutoDispatchConfig::default(),
            pricing: PricingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = PricingConfig::default();
        let pricing = PricingConfig {
            base_fare: parse_or_default("BASE_FARE", defaults.base_fare)?,
            per_km_rate: parse_or_default("PER_KM_RATE", defaults.per_km_rate)?,
            per_kg_rate: parse_or_default("PER_KG_RATE", defaults.per_kg_rate)?,
            free_weight_kg: parse_or_default("FREE_WEIGHT_KG", defaults.free_weight_kg)?,
            peak_surcharge: Adjustment::Percent(parse_or_default(
                "PEAK_SURCHARGE_PERCENT",
                20.0,
            )?),
            peak_windows: match env::var("PEAK_WINDOWS") {
                Ok(raw) => parse_peak_windows(&raw)?,
                Err(_) => defaults.peak_windows,
            },
            peak_utc_offset: utc_offset(parse_or_default("PEAK_UTC_OFFSET_MINUTES", 0)?)?,
            average_speed_kmh: parse_or_default("AVERAGE_SPEED_KMH", defaults.average_speed_kmh)?,
            promo_codes: match env::var("PROMO_CODES") {
                Ok(raw) => parse_promo_codes(&raw)?,
                Err(_) => defaults.promo_codes,
            },
            minimum_total: parse_or_default("MINIMUM_TOTAL", defaults.minimum_total)?,
        };

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                Ok("compact") | Err(_) => LogFormat::Compact,
                Ok(other) => {
                    return Err(AppError::Internal(format!(
                        "invalid LOG_FORMAT: {other} (expected compact or json)"
                    )));
                }
            },
            dispatch_queue_size: parse_or_default("DISPATCH_QUEUE_SIZE", 1024)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            auto_dispatch: AutoDispatchConfig {
                enabled: parse_or_default("AUTO_DISPATCH", false)?,
                radius_km: parse_or_default("AUTO_DISPATCH_RADIUS_KM", 10.0)?,
                retry_delay: Duration::from_millis(parse_or_default(
                    "AUTO_DISPATCH_RETRY_MS",
                    500,
                )?),
            },
            pricing,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would panic at startup or yield nonsense fares.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.dispatch_queue_size == 0 {
            return Err(invalid_setting("DISPATCH_QUEUE_SIZE", "must be at least 1"));
        }
        if self.event_buffer_size == 0 {
            return Err(invalid_setting("EVENT_BUFFER_SIZE", "must be at least 1"));
        }
        if !self.auto_dispatch.radius_km.is_finite() || self.auto_dispatch.radius_km <= 0.0 {
            return Err(invalid_setting("AUTO_DISPATCH_RADIUS_KM", "must be positive"));
        }

        let pricing = &self.pricing;
        for (key, value) in [
            ("BASE_FARE", pricing.base_fare),
            ("PER_KM_RATE", pricing.per_km_rate),
            ("PER_KG_RATE", pricing.per_kg_rate),
            ("FREE_WEIGHT_KG", pricing.free_weight_kg),
            ("MINIMUM_TOTAL", pricing.minimum_total),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid_setting(key, "must be zero or positive"));
            }
        }
        if !pricing.average_speed_kmh.is_finite() || pricing.average_speed_kmh <= 0.0 {
            return Err(invalid_setting("AVERAGE_SPEED_KMH", "must be positive"));
        }
        validate_adjustment("PEAK_SURCHARGE_PERCENT", pricing.peak_surcharge)?;
        for adjustment in pricing.promo_codes.values() {
            validate_adjustment("PROMO_CODES", *adjustment)?;
        }

        Ok(())
    }
}

fn invalid_setting(key: &str, problem: &str) -> AppError {
    AppError::Internal(format!("invalid {key}: {problem}"))
}

fn validate_adjustment(key: &str, adjustment: Adjustment) -> Result<(), AppError> {
    match adjustment {
        Adjustment::Flat(amount) if !amount.is_finite() || amount < 0.0 => {
            Err(invalid_setting(key, "flat amounts must be zero or positive"))
        }
        Adjustment::Percent(pct) if !(0.0..=100.0).contains(&pct) => {
            Err(invalid_setting(key, "percentages must be within 0..=100"))
        }
        _ => Ok(()),
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

fn utc_offset(minutes: i32) -> Result<FixedOffset, AppError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| AppError::Internal(format!("invalid PEAK_UTC_OFFSET_MINUTES: {minutes}")))
}

/// `"7-10,17-20"` into hour windows. An empty string disables peak pricing.
pub fn parse_peak_windows(raw: &str) -> Result<Vec<PeakWindow>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let invalid = || AppError::Internal(format!("invalid PEAK_WINDOWS entry: {part}"));
            let (start, end) = part.split_once('-').ok_or_else(invalid)?;
            let start_hour: u32 = start.trim().parse().map_err(|_| invalid())?;
            let end_hour: u32 = end.trim().parse().map_err(|_| invalid())?;
            if start_hour > 23 || end_hour > 24 {
                return Err(invalid());
            }
            Ok(PeakWindow {
                start_hour,
                end_hour,
            })
        })
        .collect()
}

/// `"WELCOME10=10%,SAVE5=5"`: a trailing `%` marks a percentage, anything
/// else is a flat amount.
pub fn parse_promo_codes(raw: &str) -> Result<HashMap<String, Adjustment>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let invalid = || AppError::Internal(format!("invalid PROMO_CODES entry: {part}"));
            let (code, value) = part.split_once('=').ok_or_else(invalid)?;
            let code = code.trim().to_ascii_uppercase();
            if code.is_empty() {
                return Err(invalid());
            }

            let value = value.trim();
            let adjustment = match value.strip_suffix('%') {
                Some(pct) => Adjustment::Percent(pct.trim().parse().map_err(|_| invalid())?),
                None => Adjustment::Flat(value.parse().map_err(|_| invalid())?),
            };
            Ok((code, adjustment))
        })
        .collect()
}
