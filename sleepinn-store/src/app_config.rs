use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    #[serde(default = "default_hold_minutes")]
    pub hold_minutes: i64,
    #[serde(default = "default_sweeper_interval")]
    pub sweeper_interval_seconds: u64,
    #[serde(default = "default_fee_rate")]
    pub service_fee_rate: Decimal,
    #[serde(default = "default_retries")]
    pub transaction_retries: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            hold_minutes: default_hold_minutes(),
            sweeper_interval_seconds: default_sweeper_interval(),
            service_fee_rate: default_fee_rate(),
            transaction_retries: default_retries(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    /// Payments run in local mode when unset.
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: Option<String>,
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_seconds: i64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: None,
            public_url: default_public_url(),
            webhook_tolerance_seconds: default_webhook_tolerance(),
        }
    }
}

fn default_max_connections() -> u32 { 10 }
fn default_hold_minutes() -> i64 { 15 }
fn default_sweeper_interval() -> u64 { 60 }
fn default_fee_rate() -> Decimal { Decimal::new(8, 2) }
fn default_retries() -> u32 { 3 }
fn default_public_url() -> String { "http://localhost:5173".to_string() }
fn default_webhook_tolerance() -> i64 { 300 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `SLEEPINN__BOOKING__HOLD_MINUTES=30`
            .add_source(config::Environment::with_prefix("SLEEPINN").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let invalid = |msg: &str| Err(config::ConfigError::Message(msg.to_string()));

        if self.booking.hold_minutes < 1 {
            return invalid("booking.hold_minutes must be at least 1");
        }
        if self.booking.sweeper_interval_seconds < 1 {
            return invalid("booking.sweeper_interval_seconds must be at least 1");
        }
        if self.booking.service_fee_rate < Decimal::ZERO || self.booking.service_fee_rate >= Decimal::ONE {
            return invalid("booking.service_fee_rate must be in [0, 1)");
        }
        if self.payments.webhook_tolerance_seconds < 1 {
            return invalid("payments.webhook_tolerance_seconds must be positive");
        }
        if self.auth.jwt_secret.is_empty() {
            return invalid("auth.jwt_secret must be set");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    const MINIMAL: &str = r#"
        [server]
        port = 3000
        [database]
        url = "postgres://localhost/sleepinn"
        [auth]
        jwt_secret = "secret"
    "#;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config = parse(MINIMAL);

        assert_eq!(config.booking.hold_minutes, 15);
        assert_eq!(config.booking.sweeper_interval_seconds, 60);
        assert_eq!(config.booking.service_fee_rate, Decimal::new(8, 2));
        assert_eq!(config.database.max_connections, 10);
        assert!(config.payments.stripe_secret_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_hold_and_full_fee() {
        let mut config = parse(MINIMAL);
        config.booking.hold_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = parse(MINIMAL);
        config.booking.service_fee_rate = Decimal::ONE;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fee_rate_from_file() {
        let config = parse(&format!("{MINIMAL}\n[booking]\nservice_fee_rate = 0.1\n"));
        assert_eq!(config.booking.service_fee_rate, Decimal::new(1, 1));
    }
}
