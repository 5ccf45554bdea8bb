//! Client wiring and reload

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use lottery_core::{Account, LotteryError, Receipt, Result};

use crate::chain::ChainClient;
use crate::config::Config;
use crate::coordinator::ActionCoordinator;
use crate::session::SessionManager;
use crate::store::ContractStateStore;
use crate::view::{ViewModel, ViewWatcher};
use crate::wallet::{AccountsChanged, WalletProvider};

/// Per-account client state, rebuilt from scratch on every reload
#[derive(Debug)]
struct Components {
    session: Arc<SessionManager>,
    store: Arc<ContractStateStore>,
    coordinator: Arc<ActionCoordinator>,
}

impl Components {
    fn build(chain: &Arc<dyn ChainClient>, wallet: Option<&Arc<dyn WalletProvider>>) -> Self {
        let session = Arc::new(SessionManager::new(wallet.cloned()));
        let store = Arc::new(ContractStateStore::new(chain.clone()));
        let coordinator = Arc::new(ActionCoordinator::new(chain.clone(), session.clone(), store.clone()));
        Self { session, store, coordinator }
    }
}

/// The lottery client: chain and wallet in, [`ViewModel`] out.
///
/// Only the chain client, the wallet and the configuration survive a
/// [`Dapp::reload`]. Session, snapshot, pending slot and winner announcement
/// are dropped and rebuilt, which is how an account switch is handled.
#[derive(Debug)]
pub struct Dapp {
    config: Config,
    chain: Arc<dyn ChainClient>,
    wallet: Option<Arc<dyn WalletProvider>>,
    components: Components,
}

impl Dapp {
    /// Create a client. `wallet` is `None` when no wallet is injected.
    pub fn new(config: Config, chain: Arc<dyn ChainClient>, wallet: Option<Arc<dyn WalletProvider>>) -> Self {
        let components = Components::build(&chain, wallet.as_ref());
        Self { config, chain, wallet, components }
    }

    /// Configuration in use
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Session of the current load
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.components.session
    }

    /// Snapshot store of the current load
    pub fn store(&self) -> &Arc<ContractStateStore> {
        &self.components.store
    }

    /// Action coordinator of the current load
    pub fn coordinator(&self) -> &Arc<ActionCoordinator> {
        &self.components.coordinator
    }

    /// Connect to the wallet if there is one, then refresh.
    ///
    /// Returns `Ok(None)` without a wallet. A refresh failure after a
    /// successful connect is logged and leaves the snapshot empty.
    pub async fn start(&self) -> Result<Option<Account>> {
        if self.wallet.is_none() {
            warn!("no wallet found, staying disconnected");
            return Ok(None);
        }

        let account = self.components.session.connect().await?;
        if let Err(e) = self.components.store.refresh().await {
            warn!(error = %e, "initial refresh failed");
        }
        Ok(Some(account))
    }

    /// Drop all per-account state and start over, like a page reload
    pub fn reload(&mut self) {
        info!("reloading client state");
        self.components = Components::build(&self.chain, self.wallet.as_ref());
    }

    /// Account-change notifications from the wallet
    pub fn account_changes(&self) -> Option<broadcast::Receiver<AccountsChanged>> {
        self.wallet.as_ref().map(|wallet| wallet.subscribe())
    }

    /// React to an account change: reload, then reconnect and refresh
    pub async fn handle_account_change(&mut self, event: AccountsChanged) -> Result<Option<Account>> {
        info!(accounts = ?event.0, "wallet account changed");
        self.reload();
        self.start().await
    }

    /// Enter the lottery with the configured entry fee
    pub async fn enter_lottery(&self) -> Result<Receipt> {
        self.components.coordinator.enter_lottery(self.config.entry_fee_wei).await
    }

    /// Close the round (manager only)
    pub async fn select_winner(&self) -> Result<Receipt> {
        self.components.coordinator.select_winner().await
    }

    /// Explicit refresh. Errors are returned, the cached snapshot is kept.
    pub async fn refresh(&self) -> Result<()> {
        self.components.store.refresh().await.map(|_| ())
    }

    /// Current view
    pub fn view(&self) -> ViewModel {
        let c = &self.components;
        ViewModel::derive(
            c.session.account().as_ref(),
            c.store.current().as_ref(),
            c.coordinator.pending(),
            c.coordinator.winner(),
        )
    }

    /// Follow view changes until the next reload
    pub fn watch_view(&self) -> ViewWatcher {
        let c = &self.components;
        ViewWatcher::new(
            c.session.watch(),
            c.store.watch(),
            c.coordinator.watch_pending(),
            c.coordinator.watch_winner(),
        )
    }

    /// Whether an error needs the user to connect first
    pub const fn needs_connect(error: &LotteryError) -> bool {
        matches!(error, LotteryError::NotConnected | LotteryError::NoWalletFound)
    }
}
