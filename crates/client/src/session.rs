//! Wallet connection lifecycle

use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use lottery_core::{Account, LotteryError, Result, Signer};

use crate::wallet::{AccountsChanged, WalletProvider};

/// Connection state of the session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No account yet
    #[default]
    Disconnected,
    /// Waiting for the user to grant account access
    Connecting,
    /// Account access granted
    Connected(Account),
}

impl SessionState {
    /// Connected account, if any
    pub const fn account(&self) -> Option<&Account> {
        match self {
            Self::Connected(account) => Some(account),
            Self::Disconnected | Self::Connecting => None,
        }
    }
}

/// Owns the wallet connection and the connected account.
///
/// The account never changes in place. A wallet account switch is handled by
/// rebuilding the whole client (see [`crate::Dapp::reload`]), so a session
/// only ever moves towards `Connected` with a single account.
#[derive(Debug)]
pub struct SessionManager {
    wallet: Option<Arc<dyn WalletProvider>>,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    /// Create a disconnected session. `None` means no wallet is injected.
    pub fn new(wallet: Option<Arc<dyn WalletProvider>>) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self { wallet, state }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Connected account, if any
    pub fn account(&self) -> Option<Account> {
        self.state.borrow().account().cloned()
    }

    /// Observe state transitions
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Request account access from the wallet.
    ///
    /// On failure the session falls back to where it was before the request.
    pub async fn connect(&self) -> Result<Account> {
        let wallet = self.wallet.as_ref().ok_or(LotteryError::NoWalletFound)?;
        let previous = self.state.send_replace(SessionState::Connecting);

        let result = match wallet.request_accounts().await {
            Ok(accounts) => accounts
                .into_iter()
                .find_map(Account::new)
                .ok_or(LotteryError::UserRejected),
            Err(e) => Err(e),
        };

        match result {
            Ok(account) => {
                info!(%account, "wallet connected");
                self.state.send_replace(SessionState::Connected(account.clone()));
                Ok(account)
            }
            Err(e) => {
                warn!(error = %e, "wallet connection failed");
                let restored = match previous {
                    SessionState::Connected(account) => SessionState::Connected(account),
                    SessionState::Disconnected | SessionState::Connecting => SessionState::Disconnected,
                };
                self.state.send_replace(restored);
                Err(e)
            }
        }
    }

    /// Signer for the connected account.
    ///
    /// Fails with `NotConnected` when the session has no account or the
    /// wallet's active account is no longer the one this session connected.
    pub async fn signer(&self) -> Result<Signer> {
        let account = self.account().ok_or(LotteryError::NotConnected)?;
        let wallet = self.wallet.as_ref().ok_or(LotteryError::NoWalletFound)?;

        let signer = wallet.signer().await?;
        if !account.matches(&signer.address()) {
            warn!(%account, signer = %signer.address(), "wallet account differs from session");
            return Err(LotteryError::NotConnected);
        }
        Ok(signer)
    }

    /// Subscribe to wallet account changes
    pub fn account_changes(&self) -> Option<broadcast::Receiver<AccountsChanged>> {
        self.wallet.as_ref().map(|wallet| wallet.subscribe())
    }
}
