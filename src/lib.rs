//! Contract bindings for the Pong table game: artifact loading, deployment,
//! attachment and transaction confirmation over JSON-RPC.

pub mod config;
pub mod error;
pub mod ethereum;
pub mod pong;

pub use config::{BindingConfig, Config};
pub use error::{BindingError, Result};
pub use ethereum::{
    artifact::{Artifact, DeploymentRecord},
    contract::{ContractBinding, ContractEvent, ContractFactory, ContractFunction},
    options::CallOptions,
    provider::{HttpProvider, RpcProvider, SharedProvider},
    DecodedLog, Invocation, Receipt, TransactionOutcome,
};
pub use pong::Pong;
