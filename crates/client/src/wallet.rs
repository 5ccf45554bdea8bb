//! Wallet provider boundary

use alloy_primitives::Address;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lottery_core::{LotteryError, Result, Signer};

use crate::rpc::RpcTransport;

/// Capacity of the account-change channel
const EVENT_CAPACITY: usize = 16;

/// Accounts reported by the wallet after a change
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountsChanged(pub Vec<String>);

/// Injected wallet: account access, signing, and change notifications
#[async_trait]
pub trait WalletProvider: Send + Sync + fmt::Debug {
    /// Ask the user for account access. The first account is the active one.
    async fn request_accounts(&self) -> Result<Vec<String>>;

    /// Signer for the active account
    async fn signer(&self) -> Result<Signer>;

    /// Subscribe to account-change notifications
    fn subscribe(&self) -> broadcast::Receiver<AccountsChanged>;
}

/// Wallet behind a JSON-RPC endpoint.
///
/// HTTP has no push channel, so account changes are detected by polling
/// `eth_accounts` from [`RpcWallet::watch_accounts`].
#[derive(Debug)]
pub struct RpcWallet {
    transport: RpcTransport,
    events: broadcast::Sender<AccountsChanged>,
}

impl RpcWallet {
    /// Create a wallet on top of `transport`
    pub fn new(transport: RpcTransport) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { transport, events }
    }

    async fn accounts(transport: &RpcTransport) -> Result<Vec<String>> {
        let result = transport.call("eth_accounts", json!([])).await?;
        parse_accounts(&result)
    }

    /// Poll `eth_accounts` every `interval` and publish changes.
    ///
    /// The first successful poll only records the baseline.
    pub fn watch_accounts(&self, interval: Duration) -> JoinHandle<()> {
        let transport = self.transport.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut last: Option<Vec<String>> = None;
            loop {
                match Self::accounts(&transport).await {
                    Ok(accounts) => {
                        let changed = last
                            .as_ref()
                            .is_some_and(|prev| !same_accounts(prev, &accounts));
                        if changed {
                            info!(accounts = ?accounts, "wallet accounts changed");
                            // No receivers is fine: nobody is connected yet.
                            let _ = events.send(AccountsChanged(accounts.clone()));
                        }
                        last = Some(accounts);
                    }
                    Err(e) => {
                        debug!(error = %e, "account poll failed");
                    }
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        match self.transport.call_if_supported("eth_requestAccounts", json!([])).await? {
            Some(result) => parse_accounts(&result),
            None => {
                // Dev nodes expose unlocked accounts without a permission prompt.
                warn!("eth_requestAccounts unsupported, falling back to eth_accounts");
                Self::accounts(&self.transport).await
            }
        }
    }

    async fn signer(&self) -> Result<Signer> {
        let accounts = Self::accounts(&self.transport).await?;
        let first = accounts.first().ok_or(LotteryError::NotConnected)?;
        let address = first.parse::<Address>().map_err(LotteryError::rpc)?;
        Ok(Signer::new(address))
    }

    fn subscribe(&self) -> broadcast::Receiver<AccountsChanged> {
        self.events.subscribe()
    }
}

fn parse_accounts(result: &Value) -> Result<Vec<String>> {
    let accounts = result
        .as_array()
        .ok_or_else(|| LotteryError::rpc("accounts result is not an array"))?;

    Ok(accounts
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

fn same_accounts(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}
