//! Typed facade over the lottery contract

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use lottery_bindings as abi;
use lottery_core::{LotteryError, PendingTx, Receipt, Result, Signer};

use crate::rpc::{parse_quantity, RpcTransport};

/// Read and write access to the lottery contract.
///
/// Reads need nothing but a node. Writes take a [`Signer`], which only a
/// connected wallet can produce.
#[async_trait]
pub trait ChainClient: Send + Sync + fmt::Debug {
    /// `manager()`
    async fn read_manager(&self) -> Result<Address>;

    /// `getBalance()`
    async fn read_balance(&self) -> Result<U256>;

    /// `getParticipantsCount()`
    async fn read_participant_count(&self) -> Result<U256>;

    /// `participants(index)`. Out-of-range indices are left to the contract.
    async fn read_participant(&self, index: U256) -> Result<Address>;

    /// Send `value_wei` to the contract's payable receive path
    async fn submit_entry(&self, signer: &Signer, value_wei: U256) -> Result<PendingTx>;

    /// Call `selectWinner()`
    async fn submit_select_winner(&self, signer: &Signer) -> Result<PendingTx>;

    /// Wait until `pending` is mined. There is no timeout.
    async fn await_receipt(&self, pending: PendingTx) -> Result<Receipt>;
}

/// [`ChainClient`] backed by a JSON-RPC node.
///
/// Transactions go through `eth_sendTransaction`, so the node (or the wallet
/// behind it) holds the keys and is the one that can refuse to sign.
#[derive(Clone, Debug)]
pub struct RpcChainClient {
    transport: RpcTransport,
    contract: Address,
    poll_interval: Duration,
}

impl RpcChainClient {
    /// Create a client for the contract at `contract`
    pub const fn new(transport: RpcTransport, contract: Address, poll_interval: Duration) -> Self {
        Self { transport, contract, poll_interval }
    }

    /// `eth_call` against the contract at the latest block.
    ///
    /// A reverted read is reported as an RPC failure like any other failed read.
    async fn eth_call(&self, calldata: Vec<u8>) -> Result<Vec<u8>> {
        let result = self
            .transport
            .call(
                "eth_call",
                json!([
                    {
                        "to": self.contract,
                        "data": abi::to_hex(&calldata)
                    },
                    "latest"
                ]),
            )
            .await
            .map_err(|e| match e {
                LotteryError::Revert(msg) => LotteryError::Rpc(format!("call reverted: {msg}")),
                other => other,
            })?;

        let hex_result = result
            .as_str()
            .ok_or_else(|| LotteryError::rpc("invalid eth_call result"))?;
        abi::from_hex(hex_result).map_err(LotteryError::rpc)
    }

    async fn send_transaction(&self, tx_request: Value) -> Result<PendingTx> {
        let result = self.transport.call("eth_sendTransaction", json!([tx_request])).await?;

        let hash = result
            .as_str()
            .ok_or_else(|| LotteryError::rpc("no tx hash in response"))?
            .parse::<B256>()
            .map_err(LotteryError::rpc)?;

        info!(tx_hash = %hash, "transaction broadcast");
        Ok(PendingTx { hash })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn read_manager(&self) -> Result<Address> {
        let data = self.eth_call(abi::manager_call()).await?;
        abi::decode_address(&data).map_err(LotteryError::rpc)
    }

    async fn read_balance(&self) -> Result<U256> {
        let data = self.eth_call(abi::get_balance_call()).await?;
        abi::decode_uint(&data).map_err(LotteryError::rpc)
    }

    async fn read_participant_count(&self) -> Result<U256> {
        let data = self.eth_call(abi::get_participants_count_call()).await?;
        abi::decode_uint(&data).map_err(LotteryError::rpc)
    }

    async fn read_participant(&self, index: U256) -> Result<Address> {
        let data = self.eth_call(abi::participants_call(index)).await?;
        abi::decode_address(&data).map_err(LotteryError::rpc)
    }

    async fn submit_entry(&self, signer: &Signer, value_wei: U256) -> Result<PendingTx> {
        self.send_transaction(json!({
            "from": signer.address(),
            "to": self.contract,
            "value": format!("0x{value_wei:x}")
        }))
        .await
    }

    async fn submit_select_winner(&self, signer: &Signer) -> Result<PendingTx> {
        self.send_transaction(json!({
            "from": signer.address(),
            "to": self.contract,
            "data": abi::to_hex(&abi::select_winner_call())
        }))
        .await
    }

    async fn await_receipt(&self, pending: PendingTx) -> Result<Receipt> {
        loop {
            let receipt = self
                .transport
                .call("eth_getTransactionReceipt", json!([pending.hash]))
                .await?;

            if receipt.is_null() {
                debug!(tx_hash = %pending.hash, "receipt not available yet");
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let status = receipt.get("status").and_then(Value::as_str);
            if status != Some("0x1") {
                return Err(LotteryError::TransactionFailed(pending.hash));
            }

            let block_number = parse_quantity(&receipt["blockNumber"])?;
            info!(tx_hash = %pending.hash, block_number, "transaction confirmed");

            return Ok(Receipt { tx_hash: pending.hash, block_number });
        }
    }
}
