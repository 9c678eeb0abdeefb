use std::env;
use std::time::Duration;

use crate::engine::classify::TieBreak;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub orders_api_url: String,
    pub orders_api_token: Option<String>,
    pub http_timeout_secs: u64,
    pub start_online: bool,
    pub tracker: TrackerConfig,
}

/// Knobs for the offer tracker loop.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    pub offer_window_secs: u64,
    pub page_size: u32,
    pub tie_break: TieBreak,
    pub command_queue_size: usize,
    pub event_buffer_size: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            offer_window_secs: 30,
            page_size: 20,
            tie_break: TieBreak::ListOrder,
            command_queue_size: 64,
            event_buffer_size: 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let poll_interval_secs: u64 = parse_or_default("POLL_INTERVAL_SECS", 5)?;
        let offer_window_secs: u64 = parse_or_default("OFFER_WINDOW_SECS", 30)?;
        if poll_interval_secs == 0 || offer_window_secs == 0 {
            return Err(AppError::Internal(
                "POLL_INTERVAL_SECS and OFFER_WINDOW_SECS must be > 0".to_string(),
            ));
        }

        let command_queue_size: usize = parse_or_default("COMMAND_QUEUE_SIZE", 64)?;
        let event_buffer_size: usize = parse_or_default("EVENT_BUFFER_SIZE", 1024)?;
        if command_queue_size == 0 || event_buffer_size == 0 {
            return Err(AppError::Internal(
                "COMMAND_QUEUE_SIZE and EVENT_BUFFER_SIZE must be > 0".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            orders_api_url: env::var("ORDERS_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080/api".to_string()),
            orders_api_token: env::var("ORDERS_API_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            http_timeout_secs: parse_or_default("HTTP_TIMEOUT_SECS", 10)?,
            start_online: parse_or_default("START_ONLINE", false)?,
            tracker: TrackerConfig {
                poll_interval: Duration::from_secs(poll_interval_secs),
                offer_window_secs,
                page_size: parse_or_default("ORDER_PAGE_SIZE", 20)?,
                tie_break: parse_or_default("OFFER_TIE_BREAK", TieBreak::ListOrder)?,
                command_queue_size,
                event_buffer_size,
            },
        })
    }
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
