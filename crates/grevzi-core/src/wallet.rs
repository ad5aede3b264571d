//! Wallet sessions
//!
//! The storefront does not sign anything itself. It only needs to know
//! whether a wallet is connected and which address to claim to. A session
//! is injected into each claim controller so tests can substitute their own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::{Error, Result};

/// EVM account address (`0x` + 40 hex digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let digits = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .ok_or_else(|| Error::InvalidAddress(raw.to_string()))?;

        if digits.len() != 40 || hex::decode(digits).is_err() {
            return Err(Error::InvalidAddress(raw.to_string()));
        }

        Ok(Self(format!("0x{}", digits)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First and last five characters, e.g. `0x8ba...DBA72`
    pub fn short(&self) -> String {
        let len = self.0.len();
        format!("{}...{}", &self.0[..5], &self.0[len - 5..])
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.0
    }
}

/// Connectivity of one wallet
pub trait WalletSession: Send + Sync {
    /// Connected account, if any
    fn address(&self) -> Option<WalletAddress>;

    fn connect(&self, address: WalletAddress);

    fn disconnect(&self);

    fn is_connected(&self) -> bool {
        self.address().is_some()
    }
}

/// Session held in memory
#[derive(Debug, Default)]
pub struct LocalWallet {
    address: RwLock<Option<WalletAddress>>,
}

impl LocalWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(address: WalletAddress) -> Self {
        Self {
            address: RwLock::new(Some(address)),
        }
    }
}

impl WalletSession for LocalWallet {
    fn address(&self) -> Option<WalletAddress> {
        self.address.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn connect(&self, address: WalletAddress) {
        tracing::debug!("Wallet connected: {}", address.short());
        *self.address.write().unwrap_or_else(PoisonError::into_inner) = Some(address);
    }

    fn disconnect(&self) {
        tracing::debug!("Wallet disconnected");
        *self.address.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "0x8ba1f109551bD432803012645Ac136ddd64DBA72";

    #[test]
    fn test_parse_address() {
        let address = WalletAddress::parse(ADDRESS).unwrap();
        assert_eq!(address.as_str(), ADDRESS);
        assert_eq!(address.short(), "0x8ba...DBA72");

        let padded = WalletAddress::parse(&format!("  {}\n", ADDRESS)).unwrap();
        assert_eq!(padded, address);
    }

    #[test]
    fn test_reject_bad_addresses() {
        for bad in [
            "",
            "8ba1f109551bD432803012645Ac136ddd64DBA72",
            "0x8ba1f109551bD432803012645Ac136ddd64DBA7",
            "0x8ba1f109551bD432803012645Ac136ddd64DBAZZ",
        ] {
            assert!(WalletAddress::parse(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_address_serde() {
        let address = WalletAddress::parse(ADDRESS).unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", ADDRESS));

        assert!(serde_json::from_str::<WalletAddress>("\"0x1234\"").is_err());
    }

    #[test]
    fn test_local_wallet_connect_disconnect() {
        let wallet = LocalWallet::new();
        assert!(!wallet.is_connected());

        wallet.connect(WalletAddress::parse(ADDRESS).unwrap());
        assert_eq!(wallet.address().unwrap().as_str(), ADDRESS);

        wallet.disconnect();
        assert!(wallet.address().is_none());
    }
}
