use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub email: EmailConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Absent → the runner falls back to the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub resend_api_key: Option<String>,
    pub resend_from_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub reminder_interval_secs: u64,
    pub reconcile_interval_secs: u64,
    pub retention_interval_secs: u64,
    pub retention_days: i64,
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();

        Config {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").ok(),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("API_PORT")
                    .or_else(|_| env::var("PORT"))
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
            },
            email: EmailConfig {
                resend_api_key: env::var("RESEND_API_KEY").ok(),
                resend_from_email: env::var("RESEND_FROM_EMAIL").ok(),
            },
            jobs: JobsConfig {
                reminder_interval_secs: env_u64("REMINDER_INTERVAL_SECS", 300),
                reconcile_interval_secs: env_u64("RECONCILE_INTERVAL_SECS", 600),
                retention_interval_secs: env_u64("RETENTION_INTERVAL_SECS", 3600),
                retention_days: env_u64("NOTIFICATION_RETENTION_DAYS", 30) as i64,
            },
        }
    }
}
