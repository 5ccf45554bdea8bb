//! Configuration

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use lottery_core::{parse_ether, ENTRY_FEE_ETHER, ENTRY_FEE_WEI};

/// Deployed lottery contract
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x3D6de8B870E5725B30bfBf86A918907b85905676";

/// Where chain and wallet calls go
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChainMode {
    /// JSON-RPC node (default)
    #[default]
    Rpc,
    /// In-memory contract and wallet, for demos and tests
    Mock,
}

impl ChainMode {
    /// Check if using the in-memory chain
    pub const fn is_mock(&self) -> bool {
        matches!(self, Self::Mock)
    }
}

impl From<&str> for ChainMode {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "mock" => Self::Mock,
            _ => Self::Rpc,
        }
    }
}

/// Action the driver binary performs after the initial refresh
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DappAction {
    /// Only report the current state
    #[default]
    None,
    /// Enter the lottery with the fixed fee
    Enter,
    /// Close the round (manager only)
    SelectWinner,
}

impl From<&str> for DappAction {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "enter" => Self::Enter,
            "select-winner" | "select_winner" | "pick-winner" => Self::SelectWinner,
            _ => Self::None,
        }
    }
}

/// Client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// JSON-RPC endpoint. Empty means no wallet provider is available.
    pub rpc_url: String,
    /// Lottery contract address
    pub contract_address: Address,
    /// Entry fee sent with every entry, in wei
    pub entry_fee_wei: U256,
    /// Receipt polling interval in milliseconds
    pub receipt_poll_interval_ms: u64,
    /// Account-change polling interval in milliseconds
    pub account_poll_interval_ms: u64,
    /// Chain backend
    pub chain_mode: ChainMode,
    /// Driver action
    pub action: DappAction,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            contract_address: DEFAULT_CONTRACT_ADDRESS.parse().unwrap_or_default(),
            entry_fee_wei: parse_ether(ENTRY_FEE_ETHER).unwrap_or(U256::from(ENTRY_FEE_WEI)),
            receipt_poll_interval_ms: 2000,
            account_poll_interval_ms: 1000,
            chain_mode: ChainMode::default(),
            action: DappAction::default(),
        }
    }
}

impl Config {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            rpc_url: env::var("RPC_URL").unwrap_or(defaults.rpc_url),
            contract_address: env::var("LOTTERY_CONTRACT_ADDRESS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.contract_address),
            entry_fee_wei: env::var("ENTRY_FEE_WEI")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.entry_fee_wei),
            receipt_poll_interval_ms: env::var("RECEIPT_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.receipt_poll_interval_ms),
            account_poll_interval_ms: env::var("ACCOUNT_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.account_poll_interval_ms),
            chain_mode: env::var("CHAIN_MODE")
                .map(|s| ChainMode::from(s.as_str()))
                .unwrap_or_default(),
            action: env::var("DAPP_ACTION")
                .map(|s| DappAction::from(s.as_str()))
                .unwrap_or_default(),
        }
    }

    /// Receipt polling interval
    pub const fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    /// Account-change polling interval
    pub const fn account_poll_interval(&self) -> Duration {
        Duration::from_millis(self.account_poll_interval_ms)
    }

    /// Whether a wallet provider is configured
    pub fn has_wallet(&self) -> bool {
        self.chain_mode.is_mock() || !self.rpc_url.trim().is_empty()
    }
}
