//! Application configuration loaded from environment variables.

use crate::errors::{Result, ServerError};

#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the Bakong open API
    pub bakong_token: String,
    /// Bakong API base URL
    pub bakong_api_url: String,
    /// Beneficiary Bakong account for donation QRs (e.g. khnhom@devb)
    pub bakong_account_id: String,
    /// Beneficiary display name embedded in donation QRs
    pub merchant_name: String,
    /// Beneficiary city embedded in donation QRs
    pub merchant_city: String,
    /// Path to the SQLite profile database
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// How often (in seconds) to poll the gateway for settlement
    pub poll_interval_secs: u64,
    /// Hard wall-clock deadline for a poll session
    pub session_timeout_secs: u64,
    /// Countdown advertised to the browser client in the donation response
    pub countdown_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            bakong_token: env_var("BAKONG_TOKEN").map_err(|_| {
                ServerError::Config("BAKONG_TOKEN environment variable is required".to_string())
            })?,
            bakong_api_url: env_var("BAKONG_API_URL")
                .unwrap_or_else(|_| "https://api-bakong.nbc.gov.kh".to_string()),
            bakong_account_id: env_var("BAKONG_ACCOUNT_ID").map_err(|_| {
                ServerError::Config(
                    "BAKONG_ACCOUNT_ID environment variable is required".to_string(),
                )
            })?,
            merchant_name: env_var("MERCHANT_NAME").unwrap_or_else(|_| "Khnhom".to_string()),
            merchant_city: env_var("MERCHANT_CITY").unwrap_or_else(|_| "Phnom Penh".to_string()),
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./khnhom.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| ServerError::Config("Invalid API_PORT".to_string()))?,
            poll_interval_secs: env_var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ServerError::Config("Invalid POLL_INTERVAL_SECS".to_string()))?,
            session_timeout_secs: env_var("SESSION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| ServerError::Config("Invalid SESSION_TIMEOUT_SECS".to_string()))?,
            countdown_secs: env_var("COUNTDOWN_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ServerError::Config("Invalid COUNTDOWN_SECS".to_string()))?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ServerError::Config(format!("Missing env var: {key}")))
}
