use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub http_addr: String,
    pub max_connections: u32,
    /// Overrides the fallback per-unit rate for categories without an
    /// active rate row.
    pub default_rate_per_unit: Option<Decimal>,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        Self::from_lookup(default_http_addr, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(default_http_addr: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is required")?;
        let http_addr = lookup("HTTP_ADDR").unwrap_or_else(|| default_http_addr.to_string());
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {raw}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let default_rate_per_unit = lookup("DEFAULT_RATE_PER_UNIT")
            .map(|raw| {
                Decimal::from_str(raw.trim())
                    .with_context(|| format!("DEFAULT_RATE_PER_UNIT is not a decimal: {raw}"))
            })
            .transpose()?;
        if let Some(rate) = default_rate_per_unit
            && rate < Decimal::ZERO
        {
            anyhow::bail!("DEFAULT_RATE_PER_UNIT must not be negative");
        }

        Ok(Self {
            database_url,
            http_addr,
            max_connections,
            default_rate_per_unit,
        })
    }
}
