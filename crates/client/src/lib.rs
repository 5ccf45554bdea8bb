//! Lottery client state-synchronization engine
//!
//! Reconciles the wallet's connected account, the contract's on-chain state
//! and in-flight transactions into one [`ViewModel`]:
//! - [`ChainClient`]: typed reads and signed submissions
//! - [`SessionManager`]: wallet connection and the connected account
//! - [`ContractStateStore`]: cached snapshot with coalesced refresh
//! - [`ActionCoordinator`]: one mutating action at a time, refresh after settle
//! - [`Dapp`]: wiring, and the full reload on account change

pub mod app;
pub mod chain;
pub mod config;
pub mod coordinator;
pub mod mock;
pub mod rpc;
#[cfg(test)]
mod rpc_stub;
pub mod session;
pub mod store;
pub mod view;
pub mod wallet;

pub use app::Dapp;
pub use chain::{ChainClient, RpcChainClient};
pub use config::{ChainMode, Config, DappAction};
pub use coordinator::ActionCoordinator;
pub use mock::{MockChain, MockWallet};
pub use rpc::RpcTransport;
pub use session::{SessionManager, SessionState};
pub use store::ContractStateStore;
pub use view::{ViewModel, ViewWatcher};
pub use wallet::{AccountsChanged, RpcWallet, WalletProvider};
