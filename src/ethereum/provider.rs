use alloy::{
    primitives::{Bytes, B256, U64},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{Filter, Log, TransactionReceipt},
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

use super::{RawLog, Receipt};
use crate::error::{BindingError, Result};

/// The node-facing boundary. Implementations forward requests; they never
/// interpret contract semantics.
///
/// Transactions are plain JSON objects so that provider-specific keys reach
/// the node unchanged.
#[async_trait]
pub trait RpcProvider: Send + Sync + Debug {
    /// `net_version` of the connected node.
    async fn network_id(&self) -> Result<String>;

    /// `eth_call` against the latest block.
    async fn call(&self, transaction: Value) -> Result<Bytes>;

    /// `eth_sendTransaction`, returning the transaction hash.
    async fn send_transaction(&self, transaction: Value) -> Result<B256>;

    async fn estimate_gas(&self, transaction: Value) -> Result<u64>;

    /// `None` while the transaction is not mined.
    async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>>;

    async fn logs(&self, filter: &Filter) -> Result<Vec<RawLog>>;
}

pub type SharedProvider = Arc<dyn RpcProvider>;

/// JSON-RPC over HTTP using alloy's root provider.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    inner: RootProvider<Http<Client>>,
    rpc_url: String,
}

impl HttpProvider {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| BindingError::Rpc(format!("Invalid RPC URL '{}': {}", rpc_url, e)))?;
        let inner = ProviderBuilder::new().on_http(url);

        Ok(Self {
            inner,
            rpc_url: rpc_url.to_string(),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub async fn check_connection(&self) -> bool {
        match self.inner.get_block_number().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Connection check failed for {}: {}", self.rpc_url, e);
                false
            }
        }
    }
}

#[async_trait]
impl RpcProvider for HttpProvider {
    async fn network_id(&self) -> Result<String> {
        let network_id = self
            .inner
            .get_net_version()
            .await
            .map_err(BindingError::rpc)?;
        Ok(network_id.to_string())
    }

    async fn call(&self, transaction: Value) -> Result<Bytes> {
        self.inner
            .client()
            .request::<_, Bytes>("eth_call", (transaction, "latest"))
            .await
            .map_err(BindingError::rpc)
    }

    async fn send_transaction(&self, transaction: Value) -> Result<B256> {
        self.inner
            .client()
            .request::<_, B256>("eth_sendTransaction", (transaction,))
            .await
            .map_err(BindingError::rpc)
    }

    async fn estimate_gas(&self, transaction: Value) -> Result<u64> {
        let gas = self
            .inner
            .client()
            .request::<_, U64>("eth_estimateGas", (transaction,))
            .await
            .map_err(BindingError::rpc)?;
        Ok(gas.to::<u64>())
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        let receipt = self
            .inner
            .get_transaction_receipt(hash)
            .await
            .map_err(BindingError::rpc)?;
        Ok(receipt.map(convert_receipt))
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<RawLog>> {
        let logs = self.inner.get_logs(filter).await.map_err(BindingError::rpc)?;
        Ok(logs.iter().map(convert_log).collect())
    }
}

fn convert_receipt(receipt: TransactionReceipt) -> Receipt {
    Receipt {
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        block_hash: receipt.block_hash,
        status: receipt.status(),
        gas_used: receipt.gas_used as u64,
        contract_address: receipt.contract_address,
        logs: receipt.inner.logs().iter().map(convert_log).collect(),
    }
}

fn convert_log(log: &Log) -> RawLog {
    RawLog {
        address: log.address(),
        topics: log.topics().to_vec(),
        data: log.data().data.clone(),
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
    }
}
