//! Scripted provider and virtual clock for unit tests.

use alloy::{
    primitives::{Address, Bytes, B256},
    rpc::types::Filter,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{provider::RpcProvider, sync::Clock, RawLog, Receipt};
use crate::error::Result;

pub(crate) fn receipt_for(hash: B256, logs: Vec<RawLog>) -> Receipt {
    Receipt {
        transaction_hash: hash,
        block_number: Some(1),
        block_hash: Some(B256::repeat_byte(0xbb)),
        status: true,
        gas_used: 21_000,
        contract_address: None,
        logs,
    }
}

#[derive(Debug)]
pub(crate) struct MockProvider {
    network_id: Mutex<String>,
    network_queries: AtomicUsize,
    call_results: Mutex<VecDeque<Result<Bytes>>>,
    send_results: Mutex<VecDeque<Result<B256>>>,
    receipts: Mutex<VecDeque<Result<Option<Receipt>>>>,
    receipt_polls: AtomicUsize,
    next_hash: AtomicU8,
    calls: Mutex<Vec<Value>>,
    sent: Mutex<Vec<Value>>,
    estimates: Mutex<Vec<Value>>,
    logs: Mutex<Vec<RawLog>>,
    filters: Mutex<Vec<Filter>>,
}

impl MockProvider {
    pub(crate) fn new() -> Self {
        Self::with_network("1337")
    }

    pub(crate) fn with_network(network_id: &str) -> Self {
        Self {
            network_id: Mutex::new(network_id.to_string()),
            network_queries: AtomicUsize::new(0),
            call_results: Mutex::new(VecDeque::new()),
            send_results: Mutex::new(VecDeque::new()),
            receipts: Mutex::new(VecDeque::new()),
            receipt_polls: AtomicUsize::new(0),
            next_hash: AtomicU8::new(1),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            estimates: Mutex::new(Vec::new()),
            logs: Mutex::new(Vec::new()),
            filters: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push_call_result(&self, result: Result<Bytes>) {
        self.call_results.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_send_result(&self, result: Result<B256>) {
        self.send_results.lock().unwrap().push_back(result);
    }

    /// Once the queue is drained every poll answers "not mined".
    pub(crate) fn push_receipt(&self, receipt: Result<Option<Receipt>>) {
        self.receipts.lock().unwrap().push_back(receipt);
    }

    pub(crate) fn set_logs(&self, logs: Vec<RawLog>) {
        *self.logs.lock().unwrap() = logs;
    }

    pub(crate) fn receipt_polls(&self) -> usize {
        self.receipt_polls.load(Ordering::SeqCst)
    }

    pub(crate) fn network_queries(&self) -> usize {
        self.network_queries.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn estimates(&self) -> Vec<Value> {
        self.estimates.lock().unwrap().clone()
    }

    pub(crate) fn filters(&self) -> Vec<Filter> {
        self.filters.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcProvider for MockProvider {
    async fn network_id(&self) -> Result<String> {
        self.network_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.network_id.lock().unwrap().clone())
    }

    async fn call(&self, transaction: Value) -> Result<Bytes> {
        self.calls.lock().unwrap().push(transaction);
        self.call_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Bytes::new()))
    }

    async fn send_transaction(&self, transaction: Value) -> Result<B256> {
        self.sent.lock().unwrap().push(transaction);
        let scripted = self.send_results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(B256::repeat_byte(
                self.next_hash.fetch_add(1, Ordering::SeqCst),
            ))
        })
    }

    async fn estimate_gas(&self, transaction: Value) -> Result<u64> {
        self.estimates.lock().unwrap().push(transaction);
        Ok(53_000)
    }

    async fn transaction_receipt(&self, _hash: B256) -> Result<Option<Receipt>> {
        self.receipt_polls.fetch_add(1, Ordering::SeqCst);
        self.receipts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None))
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<RawLog>> {
        self.filters.lock().unwrap().push(filter.clone());
        Ok(self.logs.lock().unwrap().clone())
    }
}

/// Virtual time: `sleep` advances `now` instantly.
#[derive(Debug, Default)]
pub(crate) struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.now.lock().unwrap() += duration;
        tokio::task::yield_now().await;
    }
}

pub(crate) fn address(byte: u8) -> Address {
    Address::repeat_byte(byte)
}
