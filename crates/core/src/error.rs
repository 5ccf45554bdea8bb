//! Error taxonomy for client operations

use crate::types::{PendingAction, TxHash};

/// Result alias used across the client crates
pub type Result<T, E = LotteryError> = std::result::Result<T, E>;

/// Errors surfaced by wallet, chain and action operations
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LotteryError {
    /// No wallet provider is available
    #[error("no wallet found, install a wallet to continue")]
    NoWalletFound,
    /// The user declined the request in the wallet
    #[error("request rejected in wallet")]
    UserRejected,
    /// A mutating action was attempted without a connected account
    #[error("connect wallet first")]
    NotConnected,
    /// Another mutating action holds the pending slot
    #[error("{0} already in progress")]
    AlreadyInProgress(PendingAction),
    /// Node unreachable or read call failed. Safe to retry.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// The contract rejected the call
    #[error("execution reverted: {0}")]
    Revert(String),
    /// The transaction was included but reverted
    #[error("transaction {0} failed")]
    TransactionFailed(TxHash),
    /// Client-side manager check failed
    #[error("only the manager can select a winner")]
    NotAuthorized,
}

impl LotteryError {
    /// Shorthand for [`LotteryError::Rpc`]
    pub fn rpc(msg: impl std::fmt::Display) -> Self {
        Self::Rpc(msg.to_string())
    }

    /// Transient failures that the user may retry by re-invoking the call
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}

/// Failure to parse a decimal ether amount
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseEtherError {
    /// Input was empty
    #[error("empty amount")]
    Empty,
    /// Input contained something other than digits and one dot
    #[error("invalid ether amount: {0}")]
    Invalid(String),
    /// More than 18 fractional digits
    #[error("too many decimals in {0}")]
    TooPrecise(String),
    /// Value does not fit in 256 bits
    #[error("amount overflows uint256: {0}")]
    Overflow(String),
}
