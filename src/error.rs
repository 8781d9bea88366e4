use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("{contract} error: Please call set_provider() first before calling new() or at().")]
    ProviderNotConfigured { contract: String },

    #[error("{contract} error: contract binary not set. Can't deploy new instance.")]
    BinaryMissing { contract: String },

    #[error(
        "Contract contains unresolved libraries. You must deploy and link the following libraries before you can deploy a new version of {contract}: {}",
        .libraries.join(", ")
    )]
    UnresolvedLibraries {
        contract: String,
        libraries: Vec<String>,
    },

    #[error("Invalid address passed to at(): {0}")]
    InvalidAddress(String),

    #[error("{contract} error: Can't find artifacts for network id '{network_id}'")]
    NetworkNotFound {
        contract: String,
        network_id: String,
    },

    #[error("Cannot find deployed address: {contract} not deployed or address not set.")]
    NotDeployed { contract: String },

    #[error(
        "Transaction {hash} wasn't processed in {} seconds!",
        *.timeout_ms as f64 / 1000.0
    )]
    TransactionTimeout { hash: String, timeout_ms: u64 },

    #[error("{contract} has no function or event named '{name}'")]
    UnknownMember { contract: String, name: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("malformed artifact: {0}")]
    Artifact(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BindingError>;

impl BindingError {
    /// Wraps an error reported by the provider without interpreting it.
    pub fn rpc(error: impl std::fmt::Display) -> Self {
        BindingError::Rpc(error.to_string())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BindingError::TransactionTimeout { .. })
    }
}

impl From<serde_json::Error> for BindingError {
    fn from(e: serde_json::Error) -> Self {
        BindingError::Artifact(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_libraries_message() {
        let err = BindingError::UnresolvedLibraries {
            contract: "Pong".to_string(),
            libraries: vec!["ECVerify".to_string(), "Math".to_string()],
        };
        assert!(err
            .to_string()
            .ends_with("deploy a new version of Pong: ECVerify, Math"));
    }

    #[test]
    fn test_timeout_message() {
        let err = BindingError::TransactionTimeout {
            hash: "0xabc".to_string(),
            timeout_ms: 240_000,
        };
        assert_eq!(
            err.to_string(),
            "Transaction 0xabc wasn't processed in 240 seconds!"
        );
        assert!(err.is_timeout());

        let err = BindingError::TransactionTimeout {
            hash: "0xabc".to_string(),
            timeout_ms: 500,
        };
        assert_eq!(
            err.to_string(),
            "Transaction 0xabc wasn't processed in 0.5 seconds!"
        );
    }
}
