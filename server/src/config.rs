use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,

  /// Shared secret for verifying inbound payment webhook signatures.
  pub payment_webhook_secret: String,
  /// Maximum age, in seconds, of a signed webhook timestamp.
  pub payment_webhook_tolerance_secs: i64,
  pub payment_currency: String,

  /// API key required by admin-only routes (product/event/offer creation).
  pub admin_api_key: String,

  pub run_migrations: bool,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|_| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = get_env("DATABASE_URL")?;

    let payment_webhook_secret = get_env("PAYMENT_WEBHOOK_SECRET").unwrap_or_else(|_| "whsec_dev_only".to_string());
    let payment_webhook_tolerance_secs = get_env("PAYMENT_WEBHOOK_TOLERANCE_SECS")
      .unwrap_or_else(|_| "300".to_string())
      .parse::<i64>()
      .map_err(|e| AppError::Config(format!("Invalid PAYMENT_WEBHOOK_TOLERANCE_SECS: {}", e)))?;
    let payment_currency = get_env("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".to_string());

    let admin_api_key = get_env("ADMIN_API_KEY").unwrap_or_else(|_| "admin_dev_key".to_string());

    let run_migrations = get_env("RUN_MIGRATIONS")
      .unwrap_or_else(|_| "true".to_string())
      .parse::<bool>()
      .map_err(|e| AppError::Config(format!("Invalid RUN_MIGRATIONS value: {}", e)))?;

    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      payment_webhook_secret,
      payment_webhook_tolerance_secs,
      payment_currency,
      admin_api_key,
      run_migrations,
    })
  }
}
