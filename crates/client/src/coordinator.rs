//! Mutating lottery actions

use alloy_primitives::{Address, U256};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{info, warn};

use lottery_core::{LotteryError, PendingAction, Receipt, Result, WinnerAnnouncement};

use crate::chain::ChainClient;
use crate::session::SessionManager;
use crate::store::ContractStateStore;

/// Releases the pending slot when dropped, whatever path the action took
#[derive(Debug)]
struct SlotGuard<'a> {
    slot: &'a watch::Sender<PendingAction>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slot.send_replace(PendingAction::None);
    }
}

/// Runs the two mutating actions, one at a time.
///
/// A single slot records the action in flight. Taking it is a check-and-set:
/// a second action while the slot is busy fails with `AlreadyInProgress` and
/// submits nothing. Every confirmed transaction is followed by a refresh.
#[derive(Debug)]
pub struct ActionCoordinator {
    chain: Arc<dyn ChainClient>,
    session: Arc<SessionManager>,
    store: Arc<ContractStateStore>,
    slot: watch::Sender<PendingAction>,
    winner: watch::Sender<Option<WinnerAnnouncement>>,
    rng: Mutex<StdRng>,
}

impl ActionCoordinator {
    /// Create a coordinator with an idle slot and no announcement
    pub fn new(
        chain: Arc<dyn ChainClient>,
        session: Arc<SessionManager>,
        store: Arc<ContractStateStore>,
    ) -> Self {
        Self::with_rng(chain, session, store, StdRng::from_entropy())
    }

    /// Same as [`Self::new`] with a caller-supplied announcement RNG
    pub fn with_rng(
        chain: Arc<dyn ChainClient>,
        session: Arc<SessionManager>,
        store: Arc<ContractStateStore>,
        rng: StdRng,
    ) -> Self {
        let (slot, _) = watch::channel(PendingAction::None);
        let (winner, _) = watch::channel(None);
        Self { chain, session, store, slot, winner, rng: Mutex::new(rng) }
    }

    /// Action currently holding the slot
    pub fn pending(&self) -> PendingAction {
        *self.slot.borrow()
    }

    /// Observe the slot
    pub fn watch_pending(&self) -> watch::Receiver<PendingAction> {
        self.slot.subscribe()
    }

    /// Last winner announcement
    pub fn winner(&self) -> Option<WinnerAnnouncement> {
        *self.winner.borrow()
    }

    /// Observe the winner announcement
    pub fn watch_winner(&self) -> watch::Receiver<Option<WinnerAnnouncement>> {
        self.winner.subscribe()
    }

    fn acquire(&self, action: PendingAction) -> Result<SlotGuard<'_>> {
        let mut holder = PendingAction::None;
        let acquired = self.slot.send_if_modified(|slot| {
            if slot.is_idle() {
                *slot = action;
                true
            } else {
                holder = *slot;
                false
            }
        });

        if acquired {
            Ok(SlotGuard { slot: &self.slot })
        } else {
            warn!(requested = %action, %holder, "action rejected, slot busy");
            Err(LotteryError::AlreadyInProgress(holder))
        }
    }

    /// Refresh after a confirmed transaction. Failures are logged only: the
    /// transaction itself went through.
    async fn refresh_after_settle(&self) {
        if let Err(e) = self.store.refresh().await {
            warn!(error = %e, "refresh after confirmed transaction failed");
        }
    }

    /// Enter the lottery, paying `amount` wei
    pub async fn enter_lottery(&self, amount: U256) -> Result<Receipt> {
        let account = self.session.account().ok_or(LotteryError::NotConnected)?;
        let _slot = self.acquire(PendingAction::Entering)?;

        info!(%account, amount_wei = %amount, "entering lottery");
        let result = self.submit_entry(amount).await;

        match &result {
            Ok(receipt) => {
                info!(tx_hash = %receipt.tx_hash, block = receipt.block_number, "entry confirmed");
                self.winner.send_replace(None);
                self.refresh_after_settle().await;
            }
            Err(e) => warn!(error = %e, "entry failed"),
        }
        result
    }

    async fn submit_entry(&self, amount: U256) -> Result<Receipt> {
        let signer = self.session.signer().await?;
        let pending = self.chain.submit_entry(&signer, amount).await?;
        self.chain.await_receipt(pending).await
    }

    /// Close the round. Only the manager may call this.
    ///
    /// The manager check here is a courtesy; the contract enforces it. After
    /// confirmation a winner is announced by drawing uniformly from the
    /// participants seen before the transaction. That draw is local and does
    /// not read the contract's own choice, so the announced address may not be
    /// the one that was paid.
    pub async fn select_winner(&self) -> Result<Receipt> {
        let account = self.session.account().ok_or(LotteryError::NotConnected)?;
        let snapshot = self
            .store
            .current()
            .filter(|snapshot| account.matches(&snapshot.manager()))
            .ok_or_else(|| {
                warn!(%account, "select winner refused, account is not the manager");
                LotteryError::NotAuthorized
            })?;

        let _slot = self.acquire(PendingAction::SelectingWinner)?;
        info!(%account, participants = snapshot.participant_count(), "selecting winner");

        let result = self.submit_select_winner().await;
        match &result {
            Ok(receipt) => {
                info!(tx_hash = %receipt.tx_hash, block = receipt.block_number, "winner selection confirmed");
                let announcement = self.announce_winner(snapshot.participants());
                if let Some(announcement) = &announcement {
                    info!(%announcement, "winner announced");
                }
                self.winner.send_replace(announcement);
                self.refresh_after_settle().await;
            }
            Err(e) => warn!(error = %e, "winner selection failed"),
        }
        result
    }

    async fn submit_select_winner(&self) -> Result<Receipt> {
        let signer = self.session.signer().await?;
        let pending = self.chain.submit_select_winner(&signer).await?;
        self.chain.await_receipt(pending).await
    }

    /// Uniform draw over `participants`, reported with a 1-based ordinal
    fn announce_winner(&self, participants: &[Address]) -> Option<WinnerAnnouncement> {
        if participants.is_empty() {
            return None;
        }
        let index = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .gen_range(0..participants.len());

        Some(WinnerAnnouncement { participant_ordinal: index + 1, address: participants[index] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockChain, MockWallet};
    use crate::wallet::WalletProvider;
    use async_trait::async_trait;
    use lottery_core::{PendingTx, Signer, ENTRY_FEE_WEI};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const MANAGER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
    const PLAYER: &str = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC";

    struct Fixture {
        chain: Arc<MockChain>,
        session: Arc<SessionManager>,
        store: Arc<ContractStateStore>,
        coordinator: Arc<ActionCoordinator>,
    }

    fn fee() -> U256 {
        U256::from(ENTRY_FEE_WEI)
    }

    fn participants(n: u8) -> Vec<Address> {
        (1..=n).map(Address::repeat_byte).collect()
    }

    async fn fixture(account: &str, seeded: u8, connect: bool) -> Fixture {
        let chain = Arc::new(MockChain::new(MANAGER.parse().unwrap(), fee()));
        chain.seed_participants(&participants(seeded));

        let wallet: Arc<dyn WalletProvider> = Arc::new(MockWallet::new(account));
        let session = Arc::new(SessionManager::new(Some(wallet)));
        let store = Arc::new(ContractStateStore::new(chain.clone()));
        if connect {
            session.connect().await.unwrap();
            store.refresh().await.unwrap();
        }

        let coordinator = Arc::new(ActionCoordinator::with_rng(
            chain.clone(),
            session.clone(),
            store.clone(),
            StdRng::seed_from_u64(7),
        ));
        Fixture { chain, session, store, coordinator }
    }

    #[tokio::test]
    async fn test_enter_requires_account() {
        let f = fixture(PLAYER, 0, false).await;

        let err = f.coordinator.enter_lottery(fee()).await.unwrap_err();
        assert_eq!(err, LotteryError::NotConnected);
        assert_eq!(f.coordinator.pending(), PendingAction::None);
        assert_eq!(f.chain.submissions(), 0);
    }

    #[tokio::test]
    async fn test_enter_refreshes_snapshot() {
        let f = fixture(PLAYER, 3, true).await;
        let before = f.store.current().unwrap();
        assert_eq!(before.participant_count(), 3);
        assert_eq!(before.balance_wei(), fee() * U256::from(3));

        let receipt = f.coordinator.enter_lottery(fee()).await.unwrap();
        assert_eq!(receipt.block_number, 1);

        let after = f.store.current().unwrap();
        assert_eq!(after.participant_count(), 4);
        assert_eq!(after.participant_by_ordinal(4), Some(PLAYER.parse().unwrap()));
        assert_eq!(f.coordinator.pending(), PendingAction::None);
    }

    #[tokio::test]
    async fn test_failures_always_release_slot() {
        let f = fixture(PLAYER, 1, true).await;

        for _ in 0..3 {
            f.chain.reject_next_signature();
            let err = f.coordinator.enter_lottery(fee()).await.unwrap_err();
            assert_eq!(err, LotteryError::UserRejected);
            assert_eq!(f.coordinator.pending(), PendingAction::None);

            f.chain.fail_next_receipt();
            let err = f.coordinator.enter_lottery(fee()).await.unwrap_err();
            assert!(matches!(err, LotteryError::TransactionFailed(_)));
            assert_eq!(f.coordinator.pending(), PendingAction::None);

            let err = f.coordinator.enter_lottery(U256::from(1)).await.unwrap_err();
            assert!(matches!(err, LotteryError::Revert(_)));
            assert_eq!(f.coordinator.pending(), PendingAction::None);
        }

        // No lockout: a clean attempt still goes through.
        f.coordinator.enter_lottery(fee()).await.unwrap();
        assert_eq!(f.store.current().unwrap().participant_count(), 2);
    }

    #[tokio::test]
    async fn test_second_action_rejected_while_in_flight() {
        let f = fixture(MANAGER, 2, true).await;
        let gate = f.chain.hold_receipts().await;

        let entering = tokio::spawn({
            let coordinator = f.coordinator.clone();
            async move { coordinator.enter_lottery(fee()).await }
        });

        let mut pending = f.coordinator.watch_pending();
        pending.wait_for(|p| *p == PendingAction::Entering).await.unwrap();

        assert_eq!(
            f.coordinator.enter_lottery(fee()).await,
            Err(LotteryError::AlreadyInProgress(PendingAction::Entering))
        );
        assert_eq!(
            f.coordinator.select_winner().await,
            Err(LotteryError::AlreadyInProgress(PendingAction::Entering))
        );
        assert_eq!(f.chain.submissions(), 1);

        drop(gate);
        entering.await.unwrap().unwrap();
        assert_eq!(f.coordinator.pending(), PendingAction::None);
        assert_eq!(f.store.current().unwrap().participant_count(), 3);
    }

    /// Counts mutating transactions between broadcast and settlement
    #[derive(Debug)]
    struct InFlightChain {
        inner: Arc<MockChain>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl InFlightChain {
        fn settle<T>(&self, result: Result<T>) -> Result<T> {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        fn begin(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ChainClient for InFlightChain {
        async fn read_manager(&self) -> Result<Address> {
            self.inner.read_manager().await
        }

        async fn read_balance(&self) -> Result<U256> {
            self.inner.read_balance().await
        }

        async fn read_participant_count(&self) -> Result<U256> {
            self.inner.read_participant_count().await
        }

        async fn read_participant(&self, index: U256) -> Result<Address> {
            self.inner.read_participant(index).await
        }

        async fn submit_entry(&self, signer: &Signer, value_wei: U256) -> Result<PendingTx> {
            self.begin();
            match self.inner.submit_entry(signer, value_wei).await {
                Ok(pending) => Ok(pending),
                Err(e) => self.settle(Err(e)),
            }
        }

        async fn submit_select_winner(&self, signer: &Signer) -> Result<PendingTx> {
            self.begin();
            match self.inner.submit_select_winner(signer).await {
                Ok(pending) => Ok(pending),
                Err(e) => self.settle(Err(e)),
            }
        }

        async fn await_receipt(&self, pending: PendingTx) -> Result<Receipt> {
            tokio::task::yield_now().await;
            let result = self.inner.await_receipt(pending).await;
            self.settle(result)
        }
    }

    #[tokio::test]
    async fn test_at_most_one_transaction_in_flight() {
        let mock = Arc::new(MockChain::new(MANAGER.parse().unwrap(), fee()));
        mock.seed_participants(&participants(3));
        mock.set_read_delay(Some(Duration::from_millis(1)));
        let chain = Arc::new(InFlightChain {
            inner: mock,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });

        let wallet: Arc<dyn WalletProvider> = Arc::new(MockWallet::new(MANAGER));
        let session = Arc::new(SessionManager::new(Some(wallet)));
        let store = Arc::new(ContractStateStore::new(chain.clone()));
        session.connect().await.unwrap();
        store.refresh().await.unwrap();
        let coordinator = Arc::new(ActionCoordinator::new(chain.clone(), session, store));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        coordinator.enter_lottery(fee()).await
                    } else {
                        coordinator.select_winner().await
                    }
                })
            })
            .collect();

        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => {}
                Err(LotteryError::AlreadyInProgress(_)) => rejected += 1,
                Err(LotteryError::Revert(msg)) => assert_eq!(msg, "no participants"),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert!(rejected > 0);
        assert_eq!(chain.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(chain.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.pending(), PendingAction::None);
    }

    #[tokio::test]
    async fn test_non_manager_cannot_select_winner() {
        let f = fixture(PLAYER, 3, true).await;

        let err = f.coordinator.select_winner().await.unwrap_err();
        assert_eq!(err, LotteryError::NotAuthorized);
        assert_eq!(f.chain.submissions(), 0);
        assert_eq!(f.coordinator.pending(), PendingAction::None);
        assert!(f.coordinator.winner().is_none());
    }

    #[tokio::test]
    async fn test_manager_check_ignores_case() {
        let f = fixture(&MANAGER.to_lowercase(), 3, true).await;

        f.coordinator.select_winner().await.unwrap();
        assert!(f.coordinator.winner().is_some());
        assert_eq!(f.store.current().unwrap().participant_count(), 0);
    }

    #[tokio::test]
    async fn test_select_winner_without_snapshot_is_refused() {
        let f = fixture(MANAGER, 3, false).await;
        assert_eq!(f.coordinator.select_winner().await, Err(LotteryError::NotConnected));

        // Connected but the manager is not known yet.
        f.session.connect().await.unwrap();
        assert_eq!(f.coordinator.select_winner().await, Err(LotteryError::NotAuthorized));
        assert_eq!(f.chain.submissions(), 0);
    }

    #[tokio::test]
    async fn test_announced_ordinal_is_uniform() {
        const TRIALS: usize = 2000;
        let f = fixture(MANAGER, 0, true).await;
        let seeded = participants(5);
        let mut counts = [0usize; 5];
        let mut mismatches = 0;

        for _ in 0..TRIALS {
            f.chain.seed_participants(&seeded);
            f.store.refresh().await.unwrap();

            f.coordinator.select_winner().await.unwrap();
            let announcement = f.coordinator.winner().unwrap();

            assert!((1..=5).contains(&announcement.participant_ordinal));
            assert_eq!(announcement.address, seeded[announcement.participant_ordinal - 1]);
            counts[announcement.participant_ordinal - 1] += 1;

            if f.chain.last_paid_winner() != Some(announcement.address) {
                mismatches += 1;
            }
        }

        // Expected 400 each, standard deviation about 18.
        for (ordinal, count) in counts.iter().enumerate() {
            assert!((300..=500).contains(count), "ordinal {} drawn {count} times", ordinal + 1);
        }
        // The announcement is local and does not follow the contract's payout.
        assert!(mismatches > 0);
    }

    #[tokio::test]
    async fn test_entry_clears_announcement() {
        let f = fixture(MANAGER, 2, true).await;

        f.coordinator.select_winner().await.unwrap();
        assert!(f.coordinator.winner().is_some());

        f.coordinator.enter_lottery(fee()).await.unwrap();
        assert!(f.coordinator.winner().is_none());
    }

    #[tokio::test]
    async fn test_refresh_failure_after_confirmation_is_not_surfaced() {
        let f = fixture(PLAYER, 1, true).await;
        let before = f.store.current().unwrap();

        f.chain.fail_reads_after(0);
        let receipt = f.coordinator.enter_lottery(fee()).await;
        assert!(receipt.is_ok());
        assert_eq!(f.store.current(), Some(before));
        assert_eq!(f.coordinator.pending(), PendingAction::None);

        f.chain.heal();
        assert_eq!(f.store.refresh().await.unwrap().participant_count(), 2);
    }
}
