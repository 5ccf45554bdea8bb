//! Cached contract snapshot

use alloy_primitives::U256;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use lottery_core::{ContractSnapshot, LotteryError, Result};

use crate::chain::ChainClient;

/// Latest contract snapshot, shared with readers
pub type SharedSnapshot = Option<Arc<ContractSnapshot>>;

/// Holds the last snapshot read from the contract.
///
/// Refreshes are serialized. Callers that queue behind a running fetch share
/// the next fetch instead of issuing one each, but a fetch that started before
/// a caller arrived is never handed to that caller: its reads may predate a
/// transaction the caller just confirmed.
#[derive(Debug)]
pub struct ContractStateStore {
    chain: Arc<dyn ChainClient>,
    snapshot: watch::Sender<SharedSnapshot>,
    /// Sequence number of the last fetch that started
    started: AtomicU64,
    /// Sequence number of the last fetch that succeeded; doubles as the fetch lock
    fetched: Mutex<u64>,
}

impl ContractStateStore {
    /// Create an empty store reading through `chain`
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            chain,
            snapshot,
            started: AtomicU64::new(0),
            fetched: Mutex::new(0),
        }
    }

    /// Last successfully read snapshot
    pub fn current(&self) -> SharedSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Observe snapshot replacements
    pub fn watch(&self) -> watch::Receiver<SharedSnapshot> {
        self.snapshot.subscribe()
    }

    /// Re-read the contract and replace the cached snapshot.
    ///
    /// On error the previous snapshot is kept untouched.
    pub async fn refresh(&self) -> Result<Arc<ContractSnapshot>> {
        let arrived_at = self.started.load(Ordering::SeqCst);
        let mut fetched = self.fetched.lock().await;

        if *fetched > arrived_at {
            if let Some(snapshot) = self.current() {
                debug!(seq = *fetched, "refresh coalesced with a newer fetch");
                return Ok(snapshot);
            }
        }

        let seq = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(seq, "refreshing contract snapshot");

        match self.fetch().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                info!(
                    seq,
                    manager = %snapshot.manager(),
                    balance_wei = %snapshot.balance_wei(),
                    participants = snapshot.participant_count(),
                    "contract snapshot refreshed"
                );
                self.snapshot.send_replace(Some(snapshot.clone()));
                *fetched = seq;
                Ok(snapshot)
            }
            Err(e) => {
                warn!(seq, error = %e, "refresh failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Manager, balance, count, then every participant by index
    async fn fetch(&self) -> Result<ContractSnapshot> {
        let manager = self.chain.read_manager().await?;
        let balance_wei = self.chain.read_balance().await?;
        let count = self.chain.read_participant_count().await?;

        let count = u64::try_from(count)
            .map_err(|_| LotteryError::rpc(format!("participant count out of range: {count}")))?;

        // The count comes from the node; allocate as reads succeed.
        let mut participants = Vec::new();
        for index in 0..count {
            participants.push(self.chain.read_participant(U256::from(index)).await?);
        }

        Ok(ContractSnapshot::new(manager, balance_wei, participants))
    }
}
