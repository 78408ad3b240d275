//! Configuration loaded from the environment (and `.env`, via `dotenv`).
//!
//! | Variable | Default |
//! |---|---|
//! | `DATABASE_URL` | `sqlite://tasks.db` |
//! | `APP_HOST` / `APP_PORT` | `127.0.0.1` / `3000` |
//! | `CORS_ORIGIN` | `http://localhost:3000` |
//! | `STORE_MAX_WRITE_ATTEMPTS` | `5` |
//! | `AUTH_MODE` | `cognito` (or `shared-secret`) |
//!
//! Cognito mode needs `USER_POOL_REGION`, `USER_POOL_ID`, `CLIENT_ID` and
//! `CLIENT_SECRET`; shared-secret mode needs `JWT_SECRET`.

use std::str::FromStr;

use crate::store::DEFAULT_MAX_WRITE_ATTEMPTS;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Clone, PartialEq, Eq)]
pub enum AuthConfig {
    Cognito {
        region: String,
        user_pool_id: String,
        client_id: String,
        client_secret: String,
    },
    SharedSecret {
        secret: String,
    },
}

// Secrets stay out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cognito {
                region,
                user_pool_id,
                client_id,
                ..
            } => f
                .debug_struct("Cognito")
                .field("region", region)
                .field("user_pool_id", user_pool_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::SharedSecret { .. } => f.debug_struct("SharedSecret").finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub max_write_attempts: u32,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str, default: &str| {
            lookup(key).unwrap_or_else(|| default.to_owned())
        };
        let require = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let auth = match get("AUTH_MODE", "cognito").as_str() {
            "cognito" => AuthConfig::Cognito {
                region: require("USER_POOL_REGION")?,
                user_pool_id: require("USER_POOL_ID")?,
                client_id: require("CLIENT_ID")?,
                client_secret: require("CLIENT_SECRET")?,
            },
            "shared-secret" => AuthConfig::SharedSecret {
                secret: require("JWT_SECRET")?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "AUTH_MODE",
                    message: format!("expected `cognito` or `shared-secret`, got `{other}`"),
                })
            }
        };

        let max_write_attempts: u32 = parse(
            "STORE_MAX_WRITE_ATTEMPTS",
            &get(
                "STORE_MAX_WRITE_ATTEMPTS",
                &DEFAULT_MAX_WRITE_ATTEMPTS.to_string(),
            ),
        )?;
        if max_write_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "STORE_MAX_WRITE_ATTEMPTS",
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            database_url: get("DATABASE_URL", "sqlite://tasks.db"),
            host: get("APP_HOST", "127.0.0.1"),
            port: parse("APP_PORT", &get("APP_PORT", "3000"))?,
            cors_origin: get("CORS_ORIGIN", "http://localhost:3000"),
            max_write_attempts,
            auth,
        })
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}
