use anyhow::{anyhow, Context, Result};
use common_auth::JwtConfig;
use std::env;
use std::net::{IpAddr, SocketAddr};

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// One year.
const MAX_ACCESS_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Postgres { url: String, max_connections: u32 },
    Memory,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub store: StoreConfig,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
    pub bootstrap_admin_email: Option<String>,
}

impl ServiceConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid HOST '{}'", self.host))?;
        Ok(SocketAddr::from((ip, self.port)))
    }

    /// Build the configuration from an arbitrary key lookup so tests do not
    /// have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

        let host = read("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or("PORT", read("PORT"), DEFAULT_PORT)?;

        let secret = read("ACCESS_TOKEN_SECRET")
            .ok_or_else(|| anyhow!("ACCESS_TOKEN_SECRET must be set"))?;
        let ttl = parse_or("ACCESS_TOKEN_TTL_SECONDS", read("ACCESS_TOKEN_TTL_SECONDS"), 3600i64)?;
        if ttl <= 0 {
            return Err(anyhow!("ACCESS_TOKEN_TTL_SECONDS must be positive, got {ttl}"));
        }
        if ttl > MAX_ACCESS_TTL_SECONDS {
            return Err(anyhow!(
                "ACCESS_TOKEN_TTL_SECONDS must be at most {MAX_ACCESS_TTL_SECONDS}, got {ttl}"
            ));
        }
        let leeway = parse_or("JWT_LEEWAY_SECONDS", read("JWT_LEEWAY_SECONDS"), 0u32)?;
        let jwt = JwtConfig::new(secret).with_access_ttl(ttl).with_leeway(leeway);

        let store = match read("BISTRO_STORE")
            .map(|value| value.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("postgres") => {
                let url = read("DATABASE_URL")
                    .ok_or_else(|| anyhow!("DATABASE_URL must be set when BISTRO_STORE=postgres"))?;
                let max_connections = parse_or(
                    "DATABASE_MAX_CONNECTIONS",
                    read("DATABASE_MAX_CONNECTIONS"),
                    DEFAULT_MAX_CONNECTIONS,
                )?;
                StoreConfig::Postgres {
                    url,
                    max_connections,
                }
            }
            Some("memory") => StoreConfig::Memory,
            Some(other) => {
                return Err(anyhow!(
                    "Unsupported BISTRO_STORE '{other}'. Use postgres or memory."
                ))
            }
        };

        let cors_allowed_origins = read("CORS_ALLOWED_ORIGINS")
            .map(|value| parse_list(&value))
            .unwrap_or_default();

        let bootstrap_admin_email = read("BOOTSTRAP_ADMIN_EMAIL");

        Ok(Self {
            host,
            port,
            jwt,
            store,
            cors_allowed_origins,
            bootstrap_admin_email,
        })
    }
}

pub fn load_service_config() -> Result<ServiceConfig> {
    ServiceConfig::from_lookup(|key| env::var(key).ok())
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|err| anyhow!("Failed to parse {key} '{raw}': {err}")),
        None => Ok(default),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .map(str::trim)
        .filter(|item| !item.is_empty() && *item != "*")
        .map(str::to_string)
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<ServiceConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_for_memory_store() {
        let cfg = config(&[("ACCESS_TOKEN_SECRET", "s3cret"), ("BISTRO_STORE", "memory")])
            .expect("config");
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.store, StoreConfig::Memory);
        assert_eq!(cfg.jwt.access_ttl_seconds, 3600);
        assert_eq!(cfg.jwt.leeway_seconds, 0);
        assert!(cfg.cors_allowed_origins.is_empty());
        assert!(cfg.bootstrap_admin_email.is_none());
        assert_eq!(cfg.socket_addr().unwrap().to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn secret_is_required() {
        let err = config(&[("BISTRO_STORE", "memory"), ("ACCESS_TOKEN_SECRET", "  ")])
            .expect_err("blank secret");
        assert!(err.to_string().contains("ACCESS_TOKEN_SECRET"));
    }

    #[test]
    fn postgres_requires_database_url() {
        let err = config(&[("ACCESS_TOKEN_SECRET", "s")]).expect_err("no url");
        assert!(err.to_string().contains("DATABASE_URL"));

        let cfg = config(&[
            ("ACCESS_TOKEN_SECRET", "s"),
            ("DATABASE_URL", "postgres://localhost/bistro"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ])
        .expect("config");
        assert_eq!(
            cfg.store,
            StoreConfig::Postgres {
                url: "postgres://localhost/bistro".into(),
                max_connections: 12
            }
        );
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let err = config(&[
            ("ACCESS_TOKEN_SECRET", "s"),
            ("BISTRO_STORE", "memory"),
            ("PORT", "eighty"),
        ])
        .expect_err("bad port");
        assert!(err.to_string().contains("PORT"));

        let err = config(&[
            ("ACCESS_TOKEN_SECRET", "s"),
            ("BISTRO_STORE", "memory"),
            ("ACCESS_TOKEN_TTL_SECONDS", "0"),
        ])
        .expect_err("zero ttl");
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn oversized_ttl_is_rejected() {
        let err = config(&[
            ("ACCESS_TOKEN_SECRET", "s"),
            ("BISTRO_STORE", "memory"),
            ("ACCESS_TOKEN_TTL_SECONDS", "922337203685477580"),
        ])
        .expect_err("huge ttl");
        assert!(err.to_string().contains("at most"));

        let cfg = config(&[
            ("ACCESS_TOKEN_SECRET", "s"),
            ("BISTRO_STORE", "memory"),
            ("ACCESS_TOKEN_TTL_SECONDS", "31536000"),
        ])
        .expect("one year ttl");
        assert_eq!(cfg.jwt.access_ttl_seconds, 31_536_000);
    }

    #[test]
    fn cors_origins_and_bootstrap_admin_parse() {
        let cfg = config(&[
            ("ACCESS_TOKEN_SECRET", "s"),
            ("BISTRO_STORE", "Memory"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:5173, https://bistro.example;*"),
            ("BOOTSTRAP_ADMIN_EMAIL", " owner@bistro.example "),
        ])
        .expect("config");
        assert_eq!(
            cfg.cors_allowed_origins,
            vec!["http://localhost:5173".to_string(), "https://bistro.example".to_string()]
        );
        assert_eq!(cfg.bootstrap_admin_email.as_deref(), Some("owner@bistro.example"));
    }

    #[test]
    fn unknown_store_is_rejected() {
        let err = config(&[("ACCESS_TOKEN_SECRET", "s"), ("BISTRO_STORE", "mongo")])
            .expect_err("unknown store");
        assert!(err.to_string().contains("mongo"));
    }
}
