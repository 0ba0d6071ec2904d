use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub fanout_concurrency: usize,
    pub merchant_verification_threshold: usize,
    pub shipping_fee: u64,
    pub geocoder_url: String,
    pub routing_url: String,
    pub push_url: Option<String>,
    pub push_api_key: Option<String>,
    pub http_timeout_secs: u64,
    pub admin_phone: Option<String>,
    pub admin_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            fanout_concurrency: 8,
            merchant_verification_threshold: 5,
            shipping_fee: 0,
            geocoder_url: "https://nominatim.openstreetmap.org".to_string(),
            routing_url: "https://router.project-osrm.org".to_string(),
            push_url: None,
            push_api_key: None,
            http_timeout_secs: 10,
            admin_phone: None,
            admin_name: "Administrator".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let fanout_concurrency = parse_or_default("FANOUT_CONCURRENCY", defaults.fanout_concurrency)?;
        if fanout_concurrency == 0 {
            return Err(AppError::Internal(
                "invalid FANOUT_CONCURRENCY: must be > 0".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            fanout_concurrency,
            merchant_verification_threshold: parse_or_default(
                "MERCHANT_VERIFICATION_THRESHOLD",
                defaults.merchant_verification_threshold,
            )?,
            shipping_fee: parse_or_default("SHIPPING_FEE", defaults.shipping_fee)?,
            geocoder_url: env::var("GEOCODER_URL").unwrap_or(defaults.geocoder_url),
            routing_url: env::var("ROUTING_URL").unwrap_or(defaults.routing_url),
            push_url: optional("PUSH_URL"),
            push_api_key: optional("PUSH_API_KEY"),
            http_timeout_secs: parse_or_default("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
            admin_phone: optional("ADMIN_PHONE"),
            admin_name: env::var("ADMIN_NAME").unwrap_or(defaults.admin_name),
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
