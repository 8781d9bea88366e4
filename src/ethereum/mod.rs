pub mod artifact;
pub mod codec;
pub mod contract;
pub mod options;
pub mod provider;
pub mod sync;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// A log entry as reported by the node, before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
    pub status: bool,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub logs: Vec<RawLog>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedLog {
    pub event: String,
    pub address: Address,
    pub args: serde_json::Map<String, serde_json::Value>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

/// Receipt plus decoded logs, returned when extended results are enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub tx: B256,
    pub receipt: Receipt,
    pub logs: Vec<DecodedLog>,
}

/// What a confirmed write resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransactionOutcome {
    Hash(B256),
    Extended(TransactionResult),
}

impl TransactionOutcome {
    pub fn tx_hash(&self) -> B256 {
        match self {
            TransactionOutcome::Hash(hash) => *hash,
            TransactionOutcome::Extended(result) => result.tx,
        }
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            TransactionOutcome::Hash(_) => None,
            TransactionOutcome::Extended(result) => Some(&result.receipt),
        }
    }

    pub fn logs(&self) -> &[DecodedLog] {
        match self {
            TransactionOutcome::Hash(_) => &[],
            TransactionOutcome::Extended(result) => &result.logs,
        }
    }
}

/// Result of the convenience invocation of a contract function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Invocation {
    Value(serde_json::Value),
    Transaction(TransactionOutcome),
}
