//! Strongly-typed identifiers used across the client.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PortalError;

/// Authorized signing identity, as reported by the wallet provider.
///
/// Opaque: compared exactly as the provider returned it, never normalised.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account(String);

impl Account {
    /// Wrap a provider-supplied identifier. Rejects blank identifiers.
    pub fn new(value: impl Into<String>) -> Result<Self, PortalError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(PortalError::invalid_input("account identifier is empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Account {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Account {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Account {
    type Error = PortalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Account> for String {
    fn from(value: Account) -> Self {
        value.0
    }
}

/// Network address of the ledger contract (`0x` followed by 40 hex digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractAddress(String);

impl ContractAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContractAddress {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| PortalError::invalid_input(format!("ContractAddress: missing 0x prefix in '{s}'")))?;

        if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PortalError::invalid_input(format!(
                "ContractAddress: expected 40 hex digits in '{s}'"
            )));
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ContractAddress {
    type Error = PortalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContractAddress> for String {
    fn from(value: ContractAddress) -> Self {
        value.0
    }
}

/// Client-side identifier of one submission attempt (used for log correlation).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(Uuid);

impl SubmissionId {
    /// Uses UUIDv7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SubmissionId {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| PortalError::invalid_input(format!("SubmissionId: {e}")))?;
        Ok(Self(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_is_opaque_and_non_empty() {
        let a: Account = "0xAbC".parse().unwrap();
        let b: Account = "0xabc".parse().unwrap();
        assert_ne!(a, b);
        assert!(Account::new("   ").is_err());
    }

    #[test]
    fn contract_address_requires_hex_body() {
        let ok = "0xd1b7c7faf9e9e01b5c7287dd0d8013f88e1b7681";
        assert_eq!(ok.parse::<ContractAddress>().unwrap().as_str(), ok);
        assert!("d1b7c7faf9e9e01b5c7287dd0d8013f88e1b7681".parse::<ContractAddress>().is_err());
        assert!("0x1234".parse::<ContractAddress>().is_err());
        assert!("0xz1b7c7faf9e9e01b5c7287dd0d8013f88e1b7681".parse::<ContractAddress>().is_err());
    }

    #[test]
    fn account_deserialization_validates() {
        let ok: Account = serde_json::from_str("\"0x01\"").unwrap();
        assert_eq!(ok.as_str(), "0x01");
        assert!(serde_json::from_str::<Account>("\"\"").is_err());
    }
}
