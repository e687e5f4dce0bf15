//! Application configuration loaded from environment variables.

use common::{Actor, Money, Role, UserId};
use domain::{CommissionSettings, DEFAULT_PAGE_SIZE, PricingRules};
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store if unset
/// - `FREE_SHIPPING_THRESHOLD`, `FLAT_SHIPPING_FEE`, `TAX_RATE_BPS`: cart pricing
/// - `TRANSITION_MAX_ATTEMPTS`: commission compare-and-swap attempts
/// - `EARNINGS_PAGE_SIZE`: transactions listed per earnings summary
/// - `API_TOKENS`: comma-separated `token=ROLE:user-uuid` entries
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub pricing: PricingRules,
    pub commissions: CommissionSettings,
    pub earnings_page_size: usize,
    pub tokens: Vec<(String, Actor)>,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(invalid("LOG_FORMAT", other, "expected text or json"));
            }
        };

        let pricing = PricingRules {
            free_shipping_threshold: Money::new(parse_or(
                &lookup,
                "FREE_SHIPPING_THRESHOLD",
                defaults.pricing.free_shipping_threshold.amount(),
            )?),
            flat_shipping: Money::new(parse_or(
                &lookup,
                "FLAT_SHIPPING_FEE",
                defaults.pricing.flat_shipping.amount(),
            )?),
            tax_rate_bps: parse_or(&lookup, "TAX_RATE_BPS", defaults.pricing.tax_rate_bps)?,
        };
        if pricing.tax_rate_bps > 10_000 {
            return Err(invalid(
                "TAX_RATE_BPS",
                &pricing.tax_rate_bps.to_string(),
                "must be at most 10000",
            ));
        }

        let max_attempts = parse_or(
            &lookup,
            "TRANSITION_MAX_ATTEMPTS",
            defaults.commissions.max_attempts,
        )?;
        if max_attempts == 0 {
            return Err(invalid("TRANSITION_MAX_ATTEMPTS", "0", "must be at least 1"));
        }

        let tokens = match lookup("API_TOKENS") {
            Some(raw) => parse_tokens(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            pricing,
            commissions: CommissionSettings { max_attempts },
            earnings_page_size: parse_or(
                &lookup,
                "EARNINGS_PAGE_SIZE",
                defaults.earnings_page_size,
            )?,
            tokens,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            pricing: PricingRules::default(),
            commissions: CommissionSettings::default(),
            earnings_page_size: DEFAULT_PAGE_SIZE,
            tokens: Vec::new(),
        }
    }
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|e| invalid(var, &raw, e)),
        None => Ok(default),
    }
}

/// Parses `token=ROLE:user-uuid` entries separated by commas.
fn parse_tokens(raw: &str) -> Result<Vec<(String, Actor)>, ConfigError> {
    const SHAPE: &str = "expected token=ROLE:user-id";

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let bad = |reason: &dyn std::fmt::Display| invalid("API_TOKENS", entry, reason);
            let (token, identity) = entry.split_once('=').ok_or_else(|| bad(&SHAPE))?;
            let (role, user_id) = identity.split_once(':').ok_or_else(|| bad(&SHAPE))?;
            let role: Role = role.trim().parse().map_err(|e| bad(&e))?;
            let user_id: UserId = user_id.trim().parse().map_err(|e| bad(&e))?;
            Ok((token.trim().to_string(), Actor::new(user_id, role)))
        })
        .collect()
}
