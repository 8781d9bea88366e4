use alloy::primitives::B256;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{provider::SharedProvider, Receipt};
use crate::error::{BindingError, Result};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT_MS: i64 = 240_000;

/// Time source for the confirmation loop.
#[async_trait]
pub trait Clock: Send + Sync + Debug {
    /// Monotonic time since the clock was created.
    fn now(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Clone)]
pub struct TokioClock {
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }

    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Converts the configured millisecond budget; anything `<= 0` means no limit.
pub fn timeout_from_millis(timeout_ms: i64) -> Option<Duration> {
    (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms as u64))
}

/// A submitted transaction being watched for its receipt.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub hash: B256,
    pub started: Duration,
    pub timeout: Option<Duration>,
}

impl PendingTransaction {
    fn expired(&self, now: Duration) -> bool {
        match self.timeout {
            Some(timeout) => now.saturating_sub(self.started) >= timeout,
            None => false,
        }
    }

    fn timeout_error(&self) -> BindingError {
        BindingError::TransactionTimeout {
            hash: format!("0x{:x}", self.hash),
            timeout_ms: self
                .timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX))
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug)]
enum PollState {
    Submitted,
    Polling { attempt: u32 },
    Confirmed(Receipt),
    TimedOut,
    Failed(BindingError),
}

/// Polls for receipts of submitted transactions.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    provider: SharedProvider,
    clock: SharedClock,
    timeout: Option<Duration>,
}

impl Synchronizer {
    pub fn new(provider: SharedProvider, clock: SharedClock, timeout_ms: i64) -> Self {
        Self {
            provider,
            clock,
            timeout: timeout_from_millis(timeout_ms),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Waits until `hash` is mined. A missing receipt is retried every
    /// [`POLL_INTERVAL`]; a provider error ends the wait.
    pub async fn wait_for_receipt(&self, hash: B256) -> Result<Receipt> {
        let pending = PendingTransaction {
            hash,
            started: self.clock.now(),
            timeout: self.timeout,
        };

        let mut state = PollState::Submitted;
        loop {
            state = match state {
                PollState::Submitted => {
                    debug!("Waiting for receipt of 0x{:x}", hash);
                    PollState::Polling { attempt: 1 }
                }
                PollState::Polling { attempt } => self.poll(&pending, attempt).await,
                PollState::Confirmed(receipt) => {
                    info!(
                        "Transaction 0x{:x} mined in block {:?}",
                        hash, receipt.block_number
                    );
                    return Ok(receipt);
                }
                PollState::TimedOut => return Err(pending.timeout_error()),
                PollState::Failed(e) => return Err(e),
            };
        }
    }

    async fn poll(&self, pending: &PendingTransaction, attempt: u32) -> PollState {
        match self.provider.transaction_receipt(pending.hash).await {
            Err(e) => PollState::Failed(e),
            Ok(Some(receipt)) => PollState::Confirmed(receipt),
            Ok(None) if pending.expired(self.clock.now()) => PollState::TimedOut,
            Ok(None) => {
                debug!(
                    "Receipt for 0x{:x} not available (attempt {})",
                    pending.hash, attempt
                );
                self.clock.sleep(POLL_INTERVAL).await;
                PollState::Polling {
                    attempt: attempt + 1,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::testing::{receipt_for, ManualClock, MockProvider};

    fn synchronizer(provider: &Arc<MockProvider>, clock: &Arc<ManualClock>, timeout_ms: i64) -> Synchronizer {
        Synchronizer::new(provider.clone(), clock.clone(), timeout_ms)
    }

    #[tokio::test]
    async fn test_confirms_after_pending_polls() {
        let provider = Arc::new(MockProvider::new());
        let clock = Arc::new(ManualClock::new());
        let hash = B256::repeat_byte(1);
        provider.push_receipt(Ok(None));
        provider.push_receipt(Ok(None));
        provider.push_receipt(Ok(Some(receipt_for(hash, vec![]))));

        let receipt = synchronizer(&provider, &clock, DEFAULT_TIMEOUT_MS)
            .wait_for_receipt(hash)
            .await
            .unwrap();
        assert_eq!(receipt.transaction_hash, hash);
        assert_eq!(provider.receipt_polls(), 3);
        assert_eq!(clock.now(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_times_out_within_one_interval() {
        let provider = Arc::new(MockProvider::new());
        let clock = Arc::new(ManualClock::new());
        let hash = B256::repeat_byte(2);

        let err = synchronizer(&provider, &clock, 5_000)
            .wait_for_receipt(hash)
            .await
            .unwrap_err();
        match err {
            BindingError::TransactionTimeout { hash: reported, timeout_ms } => {
                assert_eq!(reported, format!("0x{:x}", hash));
                assert_eq!(timeout_ms, 5_000);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(clock.now() >= Duration::from_secs(5));
        assert!(clock.now() < Duration::from_secs(5) + POLL_INTERVAL);
    }

    #[tokio::test]
    async fn test_sub_second_timeout_reports_fraction() {
        let provider = Arc::new(MockProvider::new());
        let clock = Arc::new(ManualClock::new());
        let hash = B256::repeat_byte(5);

        let err = synchronizer(&provider, &clock, 500)
            .wait_for_receipt(hash)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Transaction 0x{:x} wasn't processed in 0.5 seconds!", hash)
        );
        assert_eq!(provider.receipt_polls(), 2);
    }

    #[tokio::test]
    async fn test_non_positive_timeout_polls_forever() {
        let provider = Arc::new(MockProvider::new());
        let clock = Arc::new(ManualClock::new());
        let hash = B256::repeat_byte(3);
        for _ in 0..600 {
            provider.push_receipt(Ok(None));
        }
        provider.push_receipt(Ok(Some(receipt_for(hash, vec![]))));

        for timeout_ms in [0, -1] {
            let sync = synchronizer(&provider, &clock, timeout_ms);
            assert!(sync.timeout().is_none());
        }
        let receipt = synchronizer(&provider, &clock, 0)
            .wait_for_receipt(hash)
            .await
            .unwrap();
        assert_eq!(receipt.transaction_hash, hash);
        assert_eq!(clock.now(), Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_provider_error_aborts() {
        let provider = Arc::new(MockProvider::new());
        let clock = Arc::new(ManualClock::new());
        provider.push_receipt(Ok(None));
        provider.push_receipt(Err(BindingError::Rpc("connection refused".to_string())));

        let err = synchronizer(&provider, &clock, DEFAULT_TIMEOUT_MS)
            .wait_for_receipt(B256::repeat_byte(4))
            .await
            .unwrap_err();
        assert!(matches!(err, BindingError::Rpc(_)));
        assert_eq!(provider.receipt_polls(), 2);
    }

    #[test]
    fn test_timeout_from_millis() {
        assert_eq!(timeout_from_millis(240_000), Some(Duration::from_secs(240)));
        assert_eq!(timeout_from_millis(0), None);
        assert_eq!(timeout_from_millis(-5), None);
    }
}
