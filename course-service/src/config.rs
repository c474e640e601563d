use std::env;
use std::net::IpAddr;

use anyhow::{anyhow, Context, Result};
use common_auth::{JwtConfig, DEFAULT_TOKEN_TTL_SECONDS};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_PAYMENT_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Clone)]
pub struct PaymentConfig {
    pub secret_key: Option<String>,
    pub api_base: String,
    pub currency: String,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: IpAddr,
    pub port: u16,
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    pub cors: CorsOrigins,
    pub payment: PaymentConfig,
}

pub fn load_service_config() -> Result<ServiceConfig> {
    ServiceConfig::from_lookup(|key| env::var(key).ok())
}

impl ServiceConfig {
    /// Builds the configuration from any key lookup; `load_service_config`
    /// passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

        let host = get("HOST")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse::<IpAddr>()
            .context("Failed to parse HOST")?;
        let port = get("PORT")
            .map(|value| value.parse::<u16>())
            .transpose()
            .context("Failed to parse PORT")?
            .unwrap_or(DEFAULT_PORT);

        let backend = get("STORE_BACKEND")
            .map(|value| parse_backend(&value))
            .transpose()?
            .unwrap_or(StoreBackend::Postgres);
        let database_url = get("DATABASE_URL");
        if backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL must be set when STORE_BACKEND=postgres"));
        }
        let max_connections = get("DATABASE_MAX_CONNECTIONS")
            .map(|value| value.parse::<u32>())
            .transpose()
            .context("Failed to parse DATABASE_MAX_CONNECTIONS")?
            .unwrap_or(10);

        let secret = get("ACCESS_TOKEN_SECRET").context("ACCESS_TOKEN_SECRET must be set")?;
        let ttl_seconds = get("JWT_TTL_SECONDS")
            .map(|value| value.parse::<i64>())
            .transpose()
            .context("Failed to parse JWT_TTL_SECONDS")?
            .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS);
        if ttl_seconds <= 0 {
            return Err(anyhow!("JWT_TTL_SECONDS must be positive"));
        }
        let leeway_seconds = get("JWT_LEEWAY_SECONDS")
            .map(|value| value.parse::<u32>())
            .transpose()
            .context("Failed to parse JWT_LEEWAY_SECONDS")?
            .unwrap_or(0);
        let jwt = JwtConfig::new(secret)
            .with_ttl(ttl_seconds)
            .with_leeway(leeway_seconds);

        let cors = get("CORS_ALLOWED_ORIGINS")
            .map(|value| parse_origins(&value))
            .unwrap_or(CorsOrigins::Any);

        let payment = PaymentConfig {
            secret_key: get("PAYMENT_SECRET_KEY"),
            api_base: get("PAYMENT_API_BASE")
                .unwrap_or_else(|| DEFAULT_PAYMENT_API_BASE.to_string()),
            currency: get("PAYMENT_CURRENCY")
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or_else(|| "usd".to_string()),
        };

        Ok(Self {
            host,
            port,
            store: StoreConfig {
                backend,
                database_url,
                max_connections,
            },
            jwt,
            cors,
            payment,
        })
    }
}

fn parse_backend(value: &str) -> Result<StoreBackend> {
    match value.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
        "memory" => Ok(StoreBackend::Memory),
        other => Err(anyhow!(
            "Unsupported STORE_BACKEND '{other}'. Use postgres or memory."
        )),
    }
}

fn parse_origins(value: &str) -> CorsOrigins {
    let origins: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        CorsOrigins::Any
    } else {
        CorsOrigins::List(origins)
    }
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
