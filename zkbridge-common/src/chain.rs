//! Ledger identifiers and addresses.

use serde::{Deserialize, Serialize};

/// Identifier for a ledger participating in the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainId {
    /// Stellar mainnet (reference source ledger).
    Stellar,
    /// Stellar testnet.
    StellarTestnet,
    /// Polkadot mainnet (reference destination ledger).
    Polkadot,
    /// Polkadot testnet.
    PolkadotTestnet,
    /// Any other ledger, by numeric id.
    Custom(u64),
}

impl ChainId {
    /// Numeric chain id used in proofs and wire formats.
    pub fn as_u64(&self) -> u64 {
        match self {
            Self::Stellar => 0,
            Self::Polkadot => 1,
            Self::StellarTestnet => 100,
            Self::PolkadotTestnet => 101,
            Self::Custom(id) => *id,
        }
    }

    /// Human-readable chain name.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Stellar => "Stellar",
            Self::StellarTestnet => "Stellar Testnet",
            Self::Polkadot => "Polkadot",
            Self::PolkadotTestnet => "Polkadot Testnet",
            Self::Custom(_) => "Custom Chain",
        }
    }

    /// Whether this is a test network.
    pub fn is_testnet(&self) -> bool {
        matches!(self, Self::StellarTestnet | Self::PolkadotTestnet)
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// An account address on one of the bridged ledgers.
///
/// Kept opaque: the protocol only ever hashes addresses (see
/// [`crate::commitment::RecipientHash`]) or uses them as balance-map keys,
/// so per-ledger address formats stay out of the core.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerAddress(String);

impl LedgerAddress {
    /// Wrap an address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LedgerAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
