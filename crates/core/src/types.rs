//! Common types

use alloy_primitives::{Address, B256, U256};
use std::fmt;

/// Transaction hash type
pub type TxHash = B256;

/// Account reported by the wallet for the active session.
///
/// Kept as the wallet's own string so that comparisons against on-chain
/// addresses stay case-insensitive regardless of checksum casing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Account(String);

impl Account {
    /// Wrap a wallet-reported address. Returns `None` for an empty string,
    /// which wallets use to mean "not connected".
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        let trimmed = address.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Raw address string as reported by the wallet
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison with an on-chain address
    pub fn matches(&self, address: &Address) -> bool {
        self.0.eq_ignore_ascii_case(&address.to_string())
    }

    /// Parse into a typed address
    pub fn to_address(&self) -> Option<Address> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Write-capable credential for the connected account.
///
/// Only wallet providers hand these out, and only after the user granted
/// account access, so holding one means transactions can be signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signer {
    address: Address,
}

impl Signer {
    /// Create a signer for `address`
    pub const fn new(address: Address) -> Self {
        Self { address }
    }

    /// Address that signs and pays for submitted transactions
    pub const fn address(&self) -> Address {
        self.address
    }
}

/// Contract-visible lottery state read in one refresh.
///
/// Replaced wholesale by every refresh and never patched in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractSnapshot {
    manager: Address,
    balance_wei: U256,
    participants: Vec<Address>,
}

impl ContractSnapshot {
    /// Build a snapshot from the values of one refresh
    pub const fn new(manager: Address, balance_wei: U256, participants: Vec<Address>) -> Self {
        Self { manager, balance_wei, participants }
    }

    /// Contract manager
    pub const fn manager(&self) -> Address {
        self.manager
    }

    /// Pot balance in wei
    pub const fn balance_wei(&self) -> U256 {
        self.balance_wei
    }

    /// Participants in entry order
    pub fn participants(&self) -> &[Address] {
        &self.participants
    }

    /// Number of participants
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Participant by 1-based ordinal, as shown to users
    pub fn participant_by_ordinal(&self, ordinal: usize) -> Option<Address> {
        ordinal.checked_sub(1).and_then(|i| self.participants.get(i).copied())
    }
}

/// The single mutating action currently in flight
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PendingAction {
    /// Nothing in flight
    #[default]
    None,
    /// Entry transaction submitted or awaiting confirmation
    Entering,
    /// Winner selection submitted or awaiting confirmation
    SelectingWinner,
}

impl PendingAction {
    /// Returns the string representation of the action
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Entering => "entering",
            Self::SelectingWinner => "selecting winner",
        }
    }

    /// True when no action holds the slot
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Winner reported to the user after a successful selection.
///
/// Computed locally from the pre-selection participant list rather than read
/// from the contract, so it can differ from the address the contract paid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WinnerAnnouncement {
    /// 1-based position in the participant list
    pub participant_ordinal: usize,
    /// Announced address
    pub address: Address,
}

impl fmt::Display for WinnerAnnouncement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Participant {}: {}", self.participant_ordinal, self.address)
    }
}

/// Handle to a broadcast transaction that has not been confirmed yet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingTx {
    /// Transaction hash returned by the node
    pub hash: TxHash,
}

/// Receipt of a transaction that was mined successfully
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Block the transaction was included in
    pub block_number: u64,
}
