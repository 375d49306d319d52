//! Settings for the HTTP server process, read once at startup.
//!
//! The comparison pipeline has its own variables (see
//! [`PipelineConfig`](kiosk_pipeline::PipelineConfig)); this covers only the
//! listener, browser access from the admin dashboard and token checks.
//!
//! | Variable                   | Default                 |
//! |----------------------------|-------------------------|
//! | `HOST`                     | `0.0.0.0`               |
//! | `PORT`                     | `3000`                  |
//! | `CORS_ORIGINS`             | `http://localhost:5173` |
//! | `REQUEST_TIMEOUT_SECS`     | `30`                    |
//! | `DATABASE_MAX_CONNECTIONS` | `10`                    |
//! | `JWT_SECRET`               | required                |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;

use crate::auth::jwt::JwtConfig;

const DEFAULT_DASHBOARD_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Dashboard origins allowed to call the admin endpoints from a browser.
    pub allowed_origins: Vec<HeaderValue>,
    /// Upper bound for one request, inline comparisons included.
    pub request_timeout: Duration,
    pub db_pool_size: u32,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = parse_or(get("HOST"), "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port = parse_or(get("PORT"), "PORT", 3000u16)?;

        let allowed_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_DASHBOARD_ORIGIN.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|_| ConfigError::Invalid {
                    key: "CORS_ORIGINS",
                    value: origin.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let timeout_secs = parse_or(get("REQUEST_TIMEOUT_SECS"), "REQUEST_TIMEOUT_SECS", 30u64)?;
        let db_pool_size = parse_or(
            get("DATABASE_MAX_CONNECTIONS"),
            "DATABASE_MAX_CONNECTIONS",
            10u32,
        )?;
        let secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        Ok(Self {
            listen_addr: SocketAddr::new(host, port),
            allowed_origins,
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
            db_pool_size: db_pool_size.max(1),
            jwt: JwtConfig { secret },
        })
    }
}

fn parse_or<T: FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
