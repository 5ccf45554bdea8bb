//! In-memory lottery contract and wallet for demos and tests

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock, RwLockWriteGuard};
use tracing::info;

use lottery_bindings::keccak256;
use lottery_core::{LotteryError, PendingTx, Receipt, Result, Signer};

use crate::chain::ChainClient;
use crate::wallet::{AccountsChanged, WalletProvider};

/// Effect of a broadcast transaction, applied when it is mined
#[derive(Clone, Copy, Debug)]
enum MockTx {
    Entry { from: Address, value: U256 },
    SelectWinner,
}

#[derive(Debug)]
struct MockContract {
    manager: Address,
    entry_fee: U256,
    participants: Vec<Address>,
    balance: U256,
    block_number: u64,
    nonce: u64,
    pending: HashMap<B256, MockTx>,
    last_paid: Option<Address>,
    /// Reads left before every read fails
    reads_until_failure: Option<usize>,
    reject_next_signature: bool,
    fail_next_receipt: bool,
}

impl MockContract {
    fn read(&mut self) -> Result<()> {
        match self.reads_until_failure.as_mut() {
            Some(0) => Err(LotteryError::rpc("mock node unreachable")),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn broadcast(&mut self, tx: MockTx) -> Result<PendingTx> {
        if std::mem::take(&mut self.reject_next_signature) {
            return Err(LotteryError::UserRejected);
        }

        self.nonce += 1;
        let hash = B256::from(keccak256(&self.nonce.to_be_bytes()));
        self.pending.insert(hash, tx);
        Ok(PendingTx { hash })
    }

    fn mine(&mut self, hash: B256) -> Result<Receipt> {
        let tx = self
            .pending
            .remove(&hash)
            .ok_or_else(|| LotteryError::rpc(format!("unknown transaction {hash}")))?;

        self.block_number += 1;
        if std::mem::take(&mut self.fail_next_receipt) {
            return Err(LotteryError::TransactionFailed(hash));
        }

        match tx {
            MockTx::Entry { from, value } => {
                self.participants.push(from);
                self.balance += value;
            }
            MockTx::SelectWinner if !self.participants.is_empty() => {
                // Contract-side pseudo-randomness, unrelated to what the client announces.
                let index = (self.block_number as usize) % self.participants.len();
                let winner = self.participants[index];
                info!(%winner, "mock contract paid winner");
                self.last_paid = Some(winner);
                self.participants.clear();
                self.balance = U256::ZERO;
            }
            MockTx::SelectWinner => {}
        }

        Ok(Receipt { tx_hash: hash, block_number: self.block_number })
    }
}

/// In-memory [`ChainClient`] that behaves like the deployed lottery contract.
///
/// Entries require the exact fee, `selectWinner` is manager-only and needs at
/// least one participant, and effects are applied when the receipt is awaited.
#[derive(Debug)]
pub struct MockChain {
    contract: Mutex<MockContract>,
    receipts: RwLock<()>,
    read_delay: Mutex<Option<Duration>>,
    reads: AtomicUsize,
    submissions: AtomicUsize,
}

impl MockChain {
    /// Create an empty round managed by `manager`
    pub fn new(manager: Address, entry_fee: U256) -> Self {
        Self {
            contract: Mutex::new(MockContract {
                manager,
                entry_fee,
                participants: Vec::new(),
                balance: U256::ZERO,
                block_number: 0,
                nonce: 0,
                pending: HashMap::new(),
                last_paid: None,
                reads_until_failure: None,
                reject_next_signature: false,
                fail_next_receipt: false,
            }),
            receipts: RwLock::new(()),
            read_delay: Mutex::new(None),
            reads: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
        }
    }

    fn contract(&self) -> std::sync::MutexGuard<'_, MockContract> {
        self.contract.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add entries directly, as if other users had entered
    pub fn seed_participants(&self, participants: &[Address]) {
        let mut contract = self.contract();
        let fee = contract.entry_fee;
        for participant in participants {
            contract.participants.push(*participant);
            contract.balance += fee;
        }
    }

    /// Let `reads` more reads succeed, then fail every read until [`Self::heal`]
    pub fn fail_reads_after(&self, reads: usize) {
        self.contract().reads_until_failure = Some(reads);
    }

    /// Stop failing reads
    pub fn heal(&self) {
        self.contract().reads_until_failure = None;
    }

    /// Make every read sleep first, to widen interleaving windows
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.lock().unwrap_or_else(|p| p.into_inner()) = delay;
    }

    /// The wallet declines the next signature request
    pub fn reject_next_signature(&self) {
        self.contract().reject_next_signature = true;
    }

    /// The next mined transaction reverts after inclusion
    pub fn fail_next_receipt(&self) {
        self.contract().fail_next_receipt = true;
    }

    /// Block receipts until the returned guard is dropped
    pub async fn hold_receipts(&self) -> RwLockWriteGuard<'_, ()> {
        self.receipts.write().await
    }

    /// Address the contract actually paid in the last selection
    pub fn last_paid_winner(&self) -> Option<Address> {
        self.contract().last_paid
    }

    /// Current participants, bypassing read accounting
    pub fn participants(&self) -> Vec<Address> {
        self.contract().participants.clone()
    }

    /// Number of reads served or failed so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of transactions broadcast so far
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    async fn before_read(&self) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.contract().read()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn read_manager(&self) -> Result<Address> {
        self.before_read().await?;
        Ok(self.contract().manager)
    }

    async fn read_balance(&self) -> Result<U256> {
        self.before_read().await?;
        Ok(self.contract().balance)
    }

    async fn read_participant_count(&self) -> Result<U256> {
        self.before_read().await?;
        Ok(U256::from(self.contract().participants.len()))
    }

    async fn read_participant(&self, index: U256) -> Result<Address> {
        self.before_read().await?;
        let contract = self.contract();
        u64::try_from(index)
            .ok()
            .and_then(|i| contract.participants.get(i as usize).copied())
            .ok_or_else(|| LotteryError::rpc("call reverted: index out of bounds"))
    }

    async fn submit_entry(&self, signer: &Signer, value_wei: U256) -> Result<PendingTx> {
        let mut contract = self.contract();
        if value_wei != contract.entry_fee {
            return Err(LotteryError::Revert("wrong entry fee".to_string()));
        }
        let pending = contract.broadcast(MockTx::Entry { from: signer.address(), value: value_wei })?;
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(pending)
    }

    async fn submit_select_winner(&self, signer: &Signer) -> Result<PendingTx> {
        let mut contract = self.contract();
        if signer.address() != contract.manager {
            return Err(LotteryError::Revert("only manager".to_string()));
        }
        if contract.participants.is_empty() {
            return Err(LotteryError::Revert("no participants".to_string()));
        }
        let pending = contract.broadcast(MockTx::SelectWinner)?;
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(pending)
    }

    async fn await_receipt(&self, pending: PendingTx) -> Result<Receipt> {
        let _open = self.receipts.read().await;
        self.contract().mine(pending.hash)
    }
}

/// In-memory [`WalletProvider`] with a switchable active account
#[derive(Debug)]
pub struct MockWallet {
    accounts: Mutex<Vec<String>>,
    reject_requests: Mutex<bool>,
    events: broadcast::Sender<AccountsChanged>,
}

impl MockWallet {
    /// Wallet whose active account is `account`
    pub fn new(account: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            accounts: Mutex::new(vec![account.into()]),
            reject_requests: Mutex::new(false),
            events,
        }
    }

    /// Decline (or stop declining) account access requests
    pub fn set_reject_requests(&self, reject: bool) {
        *self.reject_requests.lock().unwrap_or_else(|p| p.into_inner()) = reject;
    }

    /// Switch the active account and notify subscribers
    pub fn switch_account(&self, account: impl Into<String>) {
        let accounts = vec![account.into()];
        *self.accounts.lock().unwrap_or_else(|p| p.into_inner()) = accounts.clone();
        let _ = self.events.send(AccountsChanged(accounts));
    }

    fn accounts(&self) -> Vec<String> {
        self.accounts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        if *self.reject_requests.lock().unwrap_or_else(|p| p.into_inner()) {
            return Err(LotteryError::UserRejected);
        }
        Ok(self.accounts())
    }

    async fn signer(&self) -> Result<Signer> {
        let accounts = self.accounts();
        let first = accounts.first().ok_or(LotteryError::NotConnected)?;
        let address = first.parse::<Address>().map_err(LotteryError::rpc)?;
        Ok(Signer::new(address))
    }

    fn subscribe(&self) -> broadcast::Receiver<AccountsChanged> {
        self.events.subscribe()
    }
}
