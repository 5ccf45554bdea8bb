//! Read-only projection for the presentation layer

use std::sync::Arc;
use tokio::sync::watch;

use lottery_core::{format_ether, Account, ContractSnapshot, PendingAction, WinnerAnnouncement};

use crate::session::SessionState;
use crate::store::SharedSnapshot;

/// Everything the presentation layer shows, derived and never mutated
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewModel {
    /// Connected account
    pub account: Option<Account>,
    /// Last contract snapshot
    pub snapshot: Option<Arc<ContractSnapshot>>,
    /// Whether the connected account manages the contract
    pub is_manager: bool,
    /// An entry is in flight
    pub entry_loading: bool,
    /// A winner selection is in flight
    pub winner_loading: bool,
    /// Last locally announced winner
    pub winner_announcement: Option<WinnerAnnouncement>,
}

impl ViewModel {
    /// Derive the view from the current component state
    pub fn derive(
        account: Option<&Account>,
        snapshot: Option<&Arc<ContractSnapshot>>,
        pending: PendingAction,
        winner_announcement: Option<WinnerAnnouncement>,
    ) -> Self {
        let is_manager = match (account, snapshot) {
            (Some(account), Some(snapshot)) => account.matches(&snapshot.manager()),
            _ => false,
        };

        Self {
            account: account.cloned(),
            snapshot: snapshot.cloned(),
            is_manager,
            entry_loading: pending == PendingAction::Entering,
            winner_loading: pending == PendingAction::SelectingWinner,
            winner_announcement,
        }
    }

    /// Pot balance in ether, once known
    pub fn pot_ether(&self) -> Option<String> {
        self.snapshot.as_ref().map(|s| format_ether(s.balance_wei()))
    }

    /// Number of participants, zero until the first refresh
    pub fn participant_count(&self) -> usize {
        self.snapshot.as_ref().map_or(0, |s| s.participant_count())
    }

    /// `Participant n: address` lines for the manager panel
    pub fn participant_rows(&self) -> Vec<String> {
        self.snapshot
            .as_ref()
            .map(|s| {
                s.participants()
                    .iter()
                    .enumerate()
                    .map(|(i, address)| format!("Participant {}: {address}", i + 1))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Re-derives the [`ViewModel`] whenever one of its sources changes
#[derive(Debug)]
pub struct ViewWatcher {
    session: watch::Receiver<SessionState>,
    snapshot: watch::Receiver<SharedSnapshot>,
    pending: watch::Receiver<PendingAction>,
    winner: watch::Receiver<Option<WinnerAnnouncement>>,
}

impl ViewWatcher {
    /// Watch the given sources
    pub const fn new(
        session: watch::Receiver<SessionState>,
        snapshot: watch::Receiver<SharedSnapshot>,
        pending: watch::Receiver<PendingAction>,
        winner: watch::Receiver<Option<WinnerAnnouncement>>,
    ) -> Self {
        Self { session, snapshot, pending, winner }
    }

    /// Current view, marking every source as seen
    pub fn current(&mut self) -> ViewModel {
        let session = self.session.borrow_and_update().clone();
        let snapshot = self.snapshot.borrow_and_update().clone();
        let pending = *self.pending.borrow_and_update();
        let winner = *self.winner.borrow_and_update();
        ViewModel::derive(session.account(), snapshot.as_ref(), pending, winner)
    }

    /// Wait for the next change and return the new view.
    ///
    /// Returns `None` once the components behind the view are gone, which is
    /// what a reload looks like from here.
    pub async fn changed(&mut self) -> Option<ViewModel> {
        let alive = tokio::select! {
            r = self.session.changed() => r.is_ok(),
            r = self.snapshot.changed() => r.is_ok(),
            r = self.pending.changed() => r.is_ok(),
            r = self.winner.changed() => r.is_ok(),
        };
        alive.then(|| self.current())
    }
}
