//! Headless lottery client

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lottery_client::{
    ChainClient, Config, Dapp, DappAction, MockChain, MockWallet, RpcChainClient, RpcTransport,
    RpcWallet, ViewModel, WalletProvider,
};

/// Account the mock wallet connects with; also the mock contract's manager
const MOCK_ACCOUNT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

fn build(config: &Config) -> Result<(Arc<dyn ChainClient>, Option<Arc<dyn WalletProvider>>)> {
    if config.chain_mode.is_mock() {
        let chain: Arc<dyn ChainClient> =
            Arc::new(MockChain::new(MOCK_ACCOUNT.parse()?, config.entry_fee_wei));
        let wallet: Arc<dyn WalletProvider> = Arc::new(MockWallet::new(MOCK_ACCOUNT));
        return Ok((chain, Some(wallet)));
    }

    let transport = RpcTransport::new(config.rpc_url.clone());
    let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(
        transport.clone(),
        config.contract_address,
        config.receipt_poll_interval(),
    ));

    if !config.has_wallet() {
        return Ok((chain, None));
    }

    let wallet = RpcWallet::new(transport);
    // Detached: the poller lives as long as the process.
    let _poller = wallet.watch_accounts(config.account_poll_interval());
    let wallet: Arc<dyn WalletProvider> = Arc::new(wallet);
    Ok((chain, Some(wallet)))
}

fn report(view: &ViewModel) {
    let account = view.account.as_ref().map(ToString::to_string).unwrap_or_default();
    let manager = view
        .snapshot
        .as_ref()
        .map_or_else(|| "Loading...".to_string(), |s| s.manager().to_string());

    info!("Connected:        {}", account);
    info!("Manager:          {}", manager);
    info!("Contract balance: {} ETH", view.pot_ether().unwrap_or_default());
    info!("Participants:     {}", view.participant_count());

    if view.is_manager {
        for row in view.participant_rows() {
            info!("  {}", row);
        }
        if let Some(winner) = &view.winner_announcement {
            info!("Winner: {}", winner);
        }
    }
}

async fn run_action(dapp: &Dapp) {
    let result = match dapp.config().action {
        DappAction::None => return,
        DappAction::Enter => dapp.enter_lottery().await,
        DappAction::SelectWinner => dapp.select_winner().await,
    };

    match result {
        Ok(receipt) => info!(tx_hash = %receipt.tx_hash, "action confirmed"),
        Err(e) if Dapp::needs_connect(&e) => warn!("Connect wallet first!"),
        Err(e) => error!(error = %e, "transaction failed"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("╔═══════════════════════════════════════════════╗");
    info!("║               Lottery dapp client             ║");
    info!("╚═══════════════════════════════════════════════╝");

    // Load config from environment
    let config = Config::from_env();

    info!("");
    info!("Configuration:");
    info!("  RPC:       {}", config.rpc_url);
    info!("  Contract:  {}", config.contract_address);
    info!("  Entry fee: {} wei", config.entry_fee_wei);
    info!("  Mode:      {:?}", config.chain_mode);
    info!("  Action:    {:?}", config.action);
    info!("");

    let (chain, wallet) = build(&config)?;
    let mut dapp = Dapp::new(config, chain, wallet);

    if let Err(e) = dapp.start().await {
        error!(error = %e, "could not connect wallet");
    }
    report(&dapp.view());

    run_action(&dapp).await;
    report(&dapp.view());

    let Some(mut changes) = dapp.account_changes() else {
        return Ok(());
    };

    info!("Following wallet account changes, Ctrl-C to exit");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = changes.recv() => match event {
                Ok(event) => {
                    if let Err(e) = dapp.handle_account_change(event).await {
                        error!(error = %e, "reconnect after account change failed");
                    }
                    report(&dapp.view());
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed account change notifications");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}
