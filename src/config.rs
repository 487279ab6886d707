//! Process configuration, read once from the environment at startup.
//!
//! `main` calls `dotenv` before `Config::from_env`, so a local `.env` file works too.
//! Only `DATABASE_URL` and the two key paths are mandatory.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has invalid value {:?}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

/// Where the signing keys live and how tokens are stamped.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub algorithm: Algorithm,
    pub issuer: String,
    pub audience: String,
    pub access_token_lifetime: chrono::Duration,
    pub refresh_token_lifetime: chrono::Duration,
    pub leeway_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub server_workers: usize,
    pub bcrypt_cost: u32,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn or_default(key: &'static str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = or_default(key, default);
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let algorithm_name = or_default("JWT_ALGORITHM", "RS256");
        let algorithm = Algorithm::from_str(&algorithm_name).map_err(|_| ConfigError::Invalid {
            key: "JWT_ALGORITHM",
            value: algorithm_name.clone(),
        })?;

        let bcrypt_cost: u32 = parsed("BCRYPT_COST", "12")?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        Ok(Self {
            server_host: or_default("SERVER_HOST", "127.0.0.1"),
            server_port: parsed("SERVER_PORT", "8080")?,
            server_workers: parsed("SERVER_WORKERS", "1")?,
            bcrypt_cost,
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parsed("DB_MAX_CONNECTIONS", "10")?,
                min_connections: parsed("DB_MIN_CONNECTIONS", "0")?,
                acquire_timeout: Duration::from_secs(parsed("DB_ACQUIRE_TIMEOUT_SECS", "30")?),
            },
            jwt: JwtConfig {
                private_key_path: PathBuf::from(required("JWT_PRIVATE_KEY_PATH")?),
                public_key_path: PathBuf::from(required("JWT_PUBLIC_KEY_PATH")?),
                algorithm,
                issuer: or_default("JWT_ISSUER", "boardforge"),
                audience: or_default("JWT_AUDIENCE", "boardforge-api"),
                access_token_lifetime: chrono::Duration::minutes(parsed(
                    "JWT_ACCESS_TOKEN_MINUTES",
                    "15",
                )?),
                refresh_token_lifetime: chrono::Duration::days(parsed(
                    "JWT_REFRESH_TOKEN_DAYS",
                    "7",
                )?),
                leeway_secs: parsed("JWT_LEEWAY_SECS", "0")?,
            },
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}
