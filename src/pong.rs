//! Typed binding for the Pong table game contract.
//!
//! Every game action is a state-changing transaction, so each method resolves
//! once the transaction is mined. The wrapper only names the functions and
//! types their arguments; dispatch goes through [`ContractBinding`].

use alloy::primitives::{Address, U256};
use serde_json::Value;

use crate::config::BindingConfig;
use crate::error::{BindingError, Result};
use crate::ethereum::{
    artifact::Artifact,
    contract::{ContractBinding, ContractFactory},
    options::{self, CallOptions},
    provider::SharedProvider,
    TransactionOutcome,
};

/// Compiled Pong artifact shipped with the crate.
pub const PONG_ARTIFACT: &str = include_str!("../artifacts/Pong.json");

#[derive(Debug, Clone)]
pub struct Pong {
    binding: ContractBinding,
}

impl Pong {
    pub fn artifact() -> Result<Artifact> {
        Artifact::from_json_str(PONG_ARTIFACT)
    }

    /// Factory over the embedded artifact.
    pub fn factory(provider: SharedProvider, config: BindingConfig) -> Result<ContractFactory> {
        Ok(ContractFactory::new(Self::artifact()?, config).with_provider(provider))
    }

    pub async fn deploy(factory: &mut ContractFactory, options: CallOptions) -> Result<Self> {
        let binding = factory.deploy_new(with_options(Vec::new(), options)?).await?;
        Ok(Self { binding })
    }

    pub fn at(factory: &ContractFactory, address: &str) -> Result<Self> {
        factory.at(address).map(|binding| Self { binding })
    }

    pub fn from_binding(binding: ContractBinding) -> Self {
        Self { binding }
    }

    pub fn binding(&self) -> &ContractBinding {
        &self.binding
    }

    pub fn address(&self) -> Address {
        self.binding.address()
    }

    pub async fn open_table(&self, options: CallOptions) -> Result<TransactionOutcome> {
        self.transact("openTable", Vec::new(), options).await
    }

    pub async fn join_table(&self, id: U256, options: CallOptions) -> Result<TransactionOutcome> {
        self.transact("joinTable", vec![quantity(id)], options).await
    }

    pub async fn leave_unjoined_table(&self, options: CallOptions) -> Result<TransactionOutcome> {
        self.transact("leaveUnjoinedTable", Vec::new(), options).await
    }

    pub async fn leave_zero_state_table(&self, options: CallOptions) -> Result<TransactionOutcome> {
        self.transact("leaveZeroStateTable", Vec::new(), options).await
    }

    pub async fn issue_challenge(&self, options: CallOptions) -> Result<TransactionOutcome> {
        self.transact("issueChallenge", Vec::new(), options).await
    }

    pub async fn claim_victory(&self, options: CallOptions) -> Result<TransactionOutcome> {
        self.transact("claimVictory", Vec::new(), options).await
    }

    pub async fn punish_bad_state(&self, options: CallOptions) -> Result<TransactionOutcome> {
        self.transact("punishBadState", Vec::new(), options).await
    }

    pub async fn request_forfeit(&self, options: CallOptions) -> Result<TransactionOutcome> {
        self.transact("requestForfeit", Vec::new(), options).await
    }

    pub async fn forfeit(&self, options: CallOptions) -> Result<TransactionOutcome> {
        self.transact("forfeit", Vec::new(), options).await
    }

    pub async fn force_forfeit(&self, options: CallOptions) -> Result<TransactionOutcome> {
        self.transact("forceForfeit", Vec::new(), options).await
    }

    pub async fn test(&self, a: U256, options: CallOptions) -> Result<TransactionOutcome> {
        self.transact("test", vec![quantity(a)], options).await
    }

    /// Runs `test(a)` through `eth_call` to read its return value.
    pub async fn test_result(&self, a: U256) -> Result<U256> {
        let value = self.binding.function("test")?.call(vec![quantity(a)]).await?;
        options::parse_u256(&value).map_err(BindingError::Abi)
    }

    async fn transact(&self, name: &str, args: Vec<Value>, options: CallOptions) -> Result<TransactionOutcome> {
        self.binding
            .function(name)?
            .transact(with_options(args, options)?)
            .await
    }
}

fn quantity(value: U256) -> Value {
    Value::String(value.to_string())
}

/// Appends `options` as the trailing options object unless it is empty.
fn with_options(mut args: Vec<Value>, options: CallOptions) -> Result<Vec<Value>> {
    if !options.is_empty() {
        let value = serde_json::to_value(&options).map_err(|e| {
            BindingError::InvalidArguments(format!("bad transaction options: {}", e))
        })?;
        args.push(value);
    }
    Ok(args)
}
