//! Process-wide configuration, loaded once at startup from the environment
//! variables listed in the service's operator docs. No config-file parsing,
//! no `.env` loading — deliberately out of scope.

use std::time::Duration;

use ipnet::IpNet;
use secrecy::Secret;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Immutable process-wide record. Cloned by value into every component that
/// needs a field; there are no other process-wide globals.
#[derive(Clone)]
pub struct FaucetConfig {
    pub port: u16,
    pub environment: Environment,
    pub node_rpc_url: String,
    pub chain_id: String,
    pub address_prefix: String,
    pub hot_mnemonic: Secret<String>,
    pub hot_address: String,
    pub amount_per_request: u64,
    pub denom: String,
    pub rate_limit_per_ip: u32,
    pub rate_limit_per_address: u32,
    pub rate_limit_window: Duration,
    pub captcha_secret: Secret<String>,
    pub database_url: String,
    pub redis_url: String,
    pub trusted_proxies: Vec<IpNet>,
}

impl FaucetConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env_opt("ENVIRONMENT").as_deref() {
            Some("production") => Environment::Production,
            Some("development") | None => Environment::Development,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    field: "ENVIRONMENT",
                    reason: format!("unknown value '{other}', expected development|production"),
                })
            }
        };

        let hot_address = env_required("FAUCET_ADDRESS")?;
        let address_prefix = bech32_prefix(&hot_address).ok_or_else(|| ConfigError::Invalid {
            field: "FAUCET_ADDRESS",
            reason: "could not parse a bech32 human-readable prefix from FAUCET_ADDRESS".into(),
        })?;

        Ok(FaucetConfig {
            port: parse_env("PORT", "8000")?,
            environment,
            node_rpc_url: env_required("NODE_RPC")?,
            chain_id: env_required("CHAIN_ID")?,
            address_prefix,
            hot_mnemonic: Secret::new(env_required("FAUCET_MNEMONIC")?),
            hot_address,
            amount_per_request: parse_env("AMOUNT_PER_REQUEST", "100000000")?,
            denom: env_opt("DENOM").unwrap_or_else(|| "upaw".to_string()),
            rate_limit_per_ip: parse_env("RATE_LIMIT_PER_IP", "10")?,
            rate_limit_per_address: parse_env("RATE_LIMIT_PER_ADDRESS", "1")?,
            rate_limit_window: Duration::from_secs(
                3600 * parse_env::<u64>("RATE_LIMIT_WINDOW_HOURS", "24")?,
            ),
            captcha_secret: Secret::new(env_opt("CAPTCHA_SECRET").unwrap_or_default()),
            database_url: env_required("DATABASE_URL")?,
            redis_url: env_required("REDIS_URL")?,
            trusted_proxies: parse_trusted_proxies(env_opt("TRUSTED_PROXIES"))?,
        })
    }
}

fn bech32_prefix(address: &str) -> Option<String> {
    let (hrp, _, _) = bech32::decode(address).ok()?;
    Some(hrp)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_required(key: &'static str) -> Result<String, ConfigError> {
    env_opt(key).ok_or(ConfigError::Missing(key))
}

fn parse_env<T>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_opt(key).unwrap_or_else(|| default.to_string());
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        field: key,
        reason: e.to_string(),
    })
}

fn parse_trusted_proxies(raw: Option<String>) -> Result<Vec<IpNet>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpNet>().map_err(|e| ConfigError::Invalid {
                field: "TRUSTED_PROXIES",
                reason: format!("'{s}': {e}"),
            })
        })
        .collect()
}
