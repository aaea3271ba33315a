//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use crate::error::AppError;
use crate::pricing::Tariff;
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use uuid::Uuid;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub settlement: SettlementConfig,
    pub payments: PaymentsConfig,
    pub payouts: PayoutsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Comma separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_cors_origins() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Run embedded migrations at startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_run_migrations() -> bool {
    true
}

/// Redis configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// TTL for cached earnings snapshots in seconds
    #[serde(default = "default_earnings_ttl")]
    pub earnings_ttl_secs: u64,
}

fn default_earnings_ttl() -> u64 {
    60
}

/// Authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,

    /// JWT token expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: i64,
}

fn default_jwt_expiration() -> i64 {
    1800
}

/// Call pricing and revenue split configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SettlementConfig {
    /// Price of one minute of consultation, in balance units
    pub rate_per_minute: Decimal,

    /// Counselor share of the call cost
    pub counselor_share: Decimal,

    /// Referrer share when the call carries an active referral
    pub referrer_share: Decimal,

    /// Company share when the call carries an active referral
    pub company_share_with_referrer: Decimal,

    /// Company share when there is no referral
    pub company_share: Decimal,

    /// User that receives the COMPANY settlement rows
    pub company_account_id: Uuid,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            rate_per_minute: Decimal::new(14, 2),
            counselor_share: Decimal::new(60, 2),
            referrer_share: Decimal::new(10, 2),
            company_share_with_referrer: Decimal::new(30, 2),
            company_share: Decimal::new(40, 2),
            company_account_id: Uuid::nil(),
        }
    }
}

/// Inbound payment configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    /// Shared secret for webhook HMAC signatures
    pub webhook_secret: String,

    /// Balance units credited per unit of paid currency
    pub credits_per_unit: Decimal,
}

/// Withdrawal configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PayoutsConfig {
    /// Smallest balance amount that can be withdrawn
    pub min_withdrawal: Decimal,

    /// Balance units per unit of payout currency
    pub credits_per_unit: Decimal,
}

impl Default for PayoutsConfig {
    fn default() -> Self {
        Self {
            min_withdrawal: Decimal::from(10),
            credits_per_unit: Decimal::ONE,
        }
    }
}

/// Storage retry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    50
}

fn default_max_delay() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

/// Voice transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct VoiceConfig {
    /// Prefix of allocated channel names
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
}

fn default_channel_prefix() -> String {
    "consult".to_string()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            channel_prefix: default_channel_prefix(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 10)?
            .set_default("redis.earnings_ttl_secs", 60)?
            .set_default("auth.jwt_expiration_secs", 1800)?
            .set_default("settlement.rate_per_minute", "0.14")?
            .set_default("settlement.counselor_share", "0.60")?
            .set_default("settlement.referrer_share", "0.10")?
            .set_default("settlement.company_share_with_referrer", "0.30")?
            .set_default("settlement.company_share", "0.40")?
            .set_default("payments.credits_per_unit", "1")?
            .set_default("payouts.min_withdrawal", "10")?
            .set_default("payouts.credits_per_unit", "1")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with CONSULTA_ prefix
            .add_source(
                Environment::with_prefix("CONSULTA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject configurations the settlement core cannot run with
    pub fn validate(&self) -> Result<(), AppError> {
        Tariff::from_config(&self.settlement)?;

        if self.settlement.company_account_id.is_nil() {
            return Err(AppError::Config(
                "settlement.company_account_id must be set".to_string(),
            ));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(AppError::Config("auth.jwt_secret must be set".to_string()));
        }
        if self.payments.webhook_secret.trim().is_empty() {
            return Err(AppError::Config(
                "payments.webhook_secret must be set".to_string(),
            ));
        }
        if self.payments.credits_per_unit <= Decimal::ZERO
            || self.payouts.credits_per_unit <= Decimal::ZERO
        {
            return Err(AppError::Config(
                "credits_per_unit must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
