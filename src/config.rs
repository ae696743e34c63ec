// Configuration management module
// This file handles loading and parsing of configuration settings
// from environment variables and an optional config file
//
// Numan Thabit 2025 Nov

use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP API listen address, e.g. 0.0.0.0:8080
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Address the route processor holds funds under
    pub router_address: String,
    /// Owner allowed to grant privileges and set router approvals
    pub owner: String,
    /// Genesis YAML describing tokens, balances and venues (optional; empty world otherwise)
    pub genesis_path: Option<String>,
    /// Clock used for permit deadlines; overrides the genesis timestamp when set
    pub timestamp: Option<u64>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl AppConfig {
    /// `APP__*` environment variables, layered over the YAML file named by
    /// `APP_CONFIG_FILE` when present.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }
        let cfg = builder
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("invalid listen address: {}", self.listen_addr))
    }

    pub fn router_address(&self) -> Result<Address> {
        Address::from_str(&self.router_address)
            .with_context(|| format!("invalid router address: {}", self.router_address))
    }

    pub fn owner_address(&self) -> Result<Address> {
        Address::from_str(&self.owner).with_context(|| format!("invalid owner address: {}", self.owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_validated() {
        let cfg = AppConfig {
            listen_addr: default_listen_addr(),
            router_address: "0x5555555555555555555555555555555555555555".into(),
            owner: "not-an-address".into(),
            genesis_path: None,
            timestamp: None,
        };
        assert_eq!(cfg.router_address().unwrap(), Address::repeat_byte(0x55));
        assert!(cfg.owner_address().is_err());
        assert_eq!(cfg.listen_addr().unwrap().port(), 8080);
    }
}
