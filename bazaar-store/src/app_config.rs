use std::env;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub shipping: ShippingConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShippingConfig {
    /// When false (or credentials are missing) every shipment gets a
    /// manual AWB instead of a live courier call
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_courier_base_url")]
    pub base_url: String,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_call_timeout_seconds")]
    pub call_timeout_seconds: u64,
}

impl ShippingConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }
}

fn default_courier_base_url() -> String {
    "https://apiv2.shiprocket.in".to_string()
}

fn default_call_timeout_seconds() -> u64 {
    10
}

/// Fee constants for seller settlement. These are the LIVE rates; orders
/// freeze a copy at delivery time, so edits here only affect orders
/// delivered afterwards.
#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_processor_fee_pct")]
    pub processor_fee_pct: f64,
    #[serde(default = "default_commission_pct")]
    pub commission_pct: f64,
    #[serde(default = "default_payout_hold_days")]
    pub payout_hold_days: i64,
}

fn default_processor_fee_pct() -> f64 {
    2.36
}

fn default_commission_pct() -> f64 {
    5.0
}

fn default_payout_hold_days() -> i64 {
    7
}

impl BusinessRules {
    pub fn fee_schedule(&self) -> bazaar_order::FeeSchedule {
        bazaar_order::FeeSchedule {
            processor_fee_pct: self.processor_fee_pct,
            commission_pct: self.commission_pct,
            payout_hold_days: self.payout_hold_days,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            // Eg. `APP_SERVER__PORT=9000` would set the server port
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
