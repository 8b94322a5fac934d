//! Service configuration read from the process environment.

use std::{env, str::FromStr, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub jwt_secret: String,
    pub identity_cache_ttl: Duration,
    pub payments: PaymentConfig,
    pub storefront_url: String,
}

#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub api_key: String,
    pub api_base: String,
    pub webhook_secret: String,
    pub webhook_tolerance: Duration,
    /// Upper bound on every gateway call.
    pub timeout: Duration,
    pub currency: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: parse_or("PORT", 8083)?,
            database_url: optional("DATABASE_URL"),
            nats_url: optional("NATS_URL"),
            jwt_secret: required("JWT_SECRET")?,
            identity_cache_ttl: Duration::from_secs(parse_or("IDENTITY_CACHE_TTL_SECS", 60)?),
            payments: PaymentConfig {
                api_key: required("PAYMENT_API_KEY")?,
                api_base: optional("PAYMENT_API_BASE").unwrap_or_else(|| "https://api.stripe.com".to_string()),
                webhook_secret: required("PAYMENT_WEBHOOK_SECRET")?,
                webhook_tolerance: Duration::from_secs(parse_or("PAYMENT_WEBHOOK_TOLERANCE_SECS", 300)?),
                timeout: Duration::from_millis(parse_or("PAYMENT_TIMEOUT_MS", 10_000)?),
                currency: optional("CURRENCY").unwrap_or_else(|| "usd".to_string()).to_lowercase(),
            },
            storefront_url: optional("STOREFRONT_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}
