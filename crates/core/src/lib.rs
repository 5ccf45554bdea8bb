//! Lottery client core types
//!
//! This crate holds the domain model shared by every client component:
//! - The connected [`Account`] and the write-capable [`Signer`]
//! - The immutable [`ContractSnapshot`] of on-chain lottery state
//! - The [`PendingAction`] slot values and the [`WinnerAnnouncement`]
//! - The [`LotteryError`] taxonomy and ether unit helpers

pub mod error;
pub mod types;
pub mod units;

pub use error::{LotteryError, ParseEtherError, Result};
pub use types::*;
pub use units::{format_ether, parse_ether, ENTRY_FEE_ETHER, ENTRY_FEE_WEI, WEI_PER_ETHER};

pub use alloy_primitives::{Address, B256, U256};
