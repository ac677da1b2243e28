use std::{str::FromStr, time::Duration};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub duration_minutes: i64,
}

/// Argon2 work factor. Defaults match `argon2::Params::default()`.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "task-manager".into()),
            duration_minutes: env_or("JWT_DURATION_MINUTES", 15)?,
        };
        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_or("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: env_or("PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
        };
        Ok(Self {
            database_url,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            jwt,
            password,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080)?,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30)?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Config for tests and local runs against the in-memory store.
    pub fn for_memory(secret: &str) -> Self {
        Self {
            database_url: "memory://".into(),
            database_max_connections: 1,
            jwt: JwtConfig {
                secret: secret.into(),
                issuer: "task-manager".into(),
                duration_minutes: 15,
            },
            // minimum argon2 cost keeps tests fast
            password: PasswordConfig {
                memory_kib: argon2::Params::MIN_M_COST,
                iterations: argon2::Params::MIN_T_COST,
            },
            host: "127.0.0.1".into(),
            port: 0,
            request_timeout_secs: 30,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_to_default_when_unset() {
        let v: u16 = env_or("TASK_MANAGER_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(v, 8080);
    }

    #[test]
    fn env_or_rejects_malformed_number() {
        std::env::set_var("TASK_MANAGER_TEST_BAD_MINUTES", "fifteen");
        let err = env_or::<i64>("TASK_MANAGER_TEST_BAD_MINUTES", 15).unwrap_err();
        assert!(err.to_string().contains("TASK_MANAGER_TEST_BAD_MINUTES"));
    }

    #[test]
    fn memory_config_uses_cheapest_hash_params() {
        let cfg = AppConfig::for_memory("s3cret");
        assert_eq!(cfg.password.memory_kib, argon2::Params::MIN_M_COST);
        assert_eq!(cfg.jwt.duration_minutes, 15);
    }
}
