//! Runtime configuration for the portal.
//!
//! Everything has a default so the demo binary starts with no environment at
//! all; the bundled descriptor under `config/` is used when
//! `WAVEPORTAL_CONTRACT` is not set.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use waveportal_core::ContractAddress;
use waveportal_ledger::{LedgerClientConfig, ResourceLimit};

pub const CONTRACT_ENV: &str = "WAVEPORTAL_CONTRACT";
pub const RESOURCE_LIMIT_ENV: &str = "WAVEPORTAL_RESOURCE_LIMIT";
pub const CONFIRMATION_TIMEOUT_ENV: &str = "WAVEPORTAL_CONFIRMATION_TIMEOUT_SECS";
pub const NOTICE_TTL_ENV: &str = "WAVEPORTAL_NOTICE_TTL_SECS";

/// Functions the client calls on the contract.
pub const REQUIRED_FUNCTIONS: [&str; 3] = ["getTotalWaves", "getAllWaves", "wave"];

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(5);

const BUNDLED_DESCRIPTOR: &str = include_str!("../config/WavePortal.json");

/// Address plus interface description of the deployed wave contract.
///
/// The interface is kept as an opaque JSON value; only the function names are
/// ever inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDescriptor {
    pub address: ContractAddress,
    #[serde(rename = "abi")]
    pub interface: serde_json::Value,
}

impl ContractDescriptor {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let descriptor: ContractDescriptor =
            serde_json::from_str(raw).context("invalid contract descriptor")?;
        descriptor.require_functions(&REQUIRED_FUNCTIONS)?;
        Ok(descriptor)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read contract descriptor at {:?}", path))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("failed to load contract descriptor at {:?}", path))
    }

    /// The descriptor shipped with the crate.
    pub fn bundled() -> anyhow::Result<Self> {
        Self::from_json_str(BUNDLED_DESCRIPTOR).context("bundled contract descriptor is invalid")
    }

    /// Names of every `"type": "function"` item in the interface.
    pub fn function_names(&self) -> Vec<&str> {
        let Some(items) = self.interface.as_array() else {
            return Vec::new();
        };
        items
            .iter()
            .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("function"))
            .filter_map(|item| item.get("name").and_then(|n| n.as_str()))
            .collect()
    }

    pub fn require_functions(&self, names: &[&str]) -> anyhow::Result<()> {
        if !self.interface.is_array() {
            bail!("contract interface must be a JSON array");
        }
        let declared = self.function_names();
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| !declared.contains(name))
            .collect();
        if !missing.is_empty() {
            bail!("contract interface is missing functions: {}", missing.join(", "));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortalConfig {
    pub contract: ContractDescriptor,
    /// Explicit limit sent with every write.
    pub resource_limit: ResourceLimit,
    /// `None` waits for confirmation forever.
    pub confirmation_timeout: Option<Duration>,
    /// How long a failure notice stays visible.
    pub notice_ttl: Duration,
}

impl PortalConfig {
    pub fn new(contract: ContractDescriptor) -> Self {
        Self {
            contract,
            resource_limit: ResourceLimit::DEFAULT,
            confirmation_timeout: Some(DEFAULT_CONFIRMATION_TIMEOUT),
            notice_ttl: DEFAULT_NOTICE_TTL,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let contract = match lookup(CONTRACT_ENV) {
            Some(path) => ContractDescriptor::from_file(&path)?,
            None => {
                warn!("{CONTRACT_ENV} not set, using the bundled contract descriptor");
                ContractDescriptor::bundled()?
            }
        };

        let mut config = Self::new(contract);

        if let Some(raw) = lookup(RESOURCE_LIMIT_ENV) {
            let limit = parse_u64(RESOURCE_LIMIT_ENV, &raw)?;
            if limit == 0 {
                bail!("{RESOURCE_LIMIT_ENV} must be greater than zero");
            }
            config.resource_limit = ResourceLimit::new(limit);
        }

        if let Some(raw) = lookup(CONFIRMATION_TIMEOUT_ENV) {
            config.confirmation_timeout = match parse_u64(CONFIRMATION_TIMEOUT_ENV, &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            };
        }

        if let Some(raw) = lookup(NOTICE_TTL_ENV) {
            config.notice_ttl = Duration::from_secs(parse_u64(NOTICE_TTL_ENV, &raw)?);
        }

        Ok(config)
    }

    pub fn ledger_client_config(&self) -> LedgerClientConfig {
        LedgerClientConfig {
            resource_limit: self.resource_limit,
            confirmation_timeout: self.confirmation_timeout,
        }
    }
}

fn parse_u64(key: &str, raw: &str) -> anyhow::Result<u64> {
    raw.trim()
        .parse()
        .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const ADDRESS: &str = "0xd1b7c7faf9e9e01b5c7287dd0d8013f88e1b7681";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn bundled_descriptor_declares_required_functions() {
        let descriptor = ContractDescriptor::bundled().unwrap();
        assert_eq!(descriptor.address.as_str(), ADDRESS);
        let names = descriptor.function_names();
        for required in REQUIRED_FUNCTIONS {
            assert!(names.contains(&required), "missing {required}");
        }
    }

    #[test]
    fn descriptor_missing_a_function_is_rejected() {
        let raw = format!(
            r#"{{"address":"{ADDRESS}","abi":[{{"type":"function","name":"getTotalWaves"}}]}}"#
        );
        let err = ContractDescriptor::from_json_str(&raw).unwrap_err();
        assert!(err.to_string().contains("getAllWaves, wave"));
    }

    #[test]
    fn events_do_not_count_as_functions() {
        let raw = format!(
            r#"{{"address":"{ADDRESS}","abi":[
                {{"type":"event","name":"wave"}},
                {{"type":"function","name":"getTotalWaves"}},
                {{"type":"function","name":"getAllWaves"}}
            ]}}"#
        );
        assert!(ContractDescriptor::from_json_str(&raw).is_err());
    }

    #[test]
    fn malformed_address_is_rejected() {
        let raw = r#"{"address":"0x1234","abi":[]}"#;
        assert!(ContractDescriptor::from_json_str(raw).is_err());
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = PortalConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.resource_limit, ResourceLimit::DEFAULT);
        assert_eq!(config.confirmation_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.notice_ttl, Duration::from_secs(5));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = PortalConfig::from_lookup(lookup(&[
            (RESOURCE_LIMIT_ENV, "500000"),
            (CONFIRMATION_TIMEOUT_ENV, "30"),
            (NOTICE_TTL_ENV, " 10 "),
        ]))
        .unwrap();
        assert_eq!(config.resource_limit.get(), 500_000);
        assert_eq!(config.confirmation_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.notice_ttl, Duration::from_secs(10));

        let ledger = config.ledger_client_config();
        assert_eq!(ledger.resource_limit.get(), 500_000);
    }

    #[test]
    fn zero_timeout_disables_the_confirmation_timeout() {
        let config =
            PortalConfig::from_lookup(lookup(&[(CONFIRMATION_TIMEOUT_ENV, "0")])).unwrap();
        assert_eq!(config.confirmation_timeout, None);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(PortalConfig::from_lookup(lookup(&[(RESOURCE_LIMIT_ENV, "lots")])).is_err());
        assert!(PortalConfig::from_lookup(lookup(&[(RESOURCE_LIMIT_ENV, "0")])).is_err());
        assert!(PortalConfig::from_lookup(lookup(&[(NOTICE_TTL_ENV, "-1")])).is_err());
    }

    #[test]
    fn missing_descriptor_file_is_reported() {
        let err = PortalConfig::from_lookup(lookup(&[(CONTRACT_ENV, "/nonexistent/wave.json")]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to read contract descriptor"));
    }
}
