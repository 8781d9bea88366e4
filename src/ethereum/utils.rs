use alloy::primitives::Address;
use std::str::FromStr;

use crate::error::{BindingError, Result};

/// Validates an Ethereum address: `0x` followed by exactly 40 hex digits of
/// either case. Checksums are not enforced.
pub fn validate_address(address: &str) -> Result<Address> {
    if address.len() != 42 {
        return Err(BindingError::InvalidAddress(address.to_string()));
    }

    let Some(hex_part) = address.strip_prefix("0x") else {
        return Err(BindingError::InvalidAddress(address.to_string()));
    };

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(BindingError::InvalidAddress(address.to_string()));
    }

    Address::from_str(address).map_err(|_| BindingError::InvalidAddress(address.to_string()))
}

/// Creates user-friendly error messages for common RPC errors
pub fn interpret_rpc_error(error: &str) -> String {
    if error.contains("execution reverted") || error.contains("invalid opcode") {
        "Transaction failed: The contract function reverted execution. This usually means the function's requirements were not met or an assertion failed.".to_string()
    } else if error.contains("insufficient funds") {
        "Transaction failed: Insufficient funds to cover gas costs. Make sure the sending account has enough ETH for gas fees.".to_string()
    } else if error.contains("gas required exceeds allowance") || error.contains("out of gas") {
        "Transaction failed: Gas limit too low. Try increasing the gas option for this transaction."
            .to_string()
    } else if error.contains("nonce too low") {
        "Transaction failed: Nonce too low. This usually means another transaction was already mined with this nonce.".to_string()
    } else if error.contains("unknown account") || error.contains("sender account not recognized") {
        "Transaction failed: The node does not manage the 'from' account. Set a sender the node can sign for.".to_string()
    } else if error.contains("connection refused") || error.contains("network unreachable") {
        "Network error: Cannot connect to RPC endpoint. Check that the node is running and the RPC URL configuration.".to_string()
    } else if error.contains("wasn't processed in") {
        format!(
            "Timeout: {}. The node may not be mining; try a larger synchronization_timeout_ms.",
            error
        )
    } else if error.contains("method not found") {
        "RPC error: The requested method is not supported by this RPC endpoint. Try using a different endpoint.".to_string()
    } else {
        format!("RPC error: {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        // Valid addresses, any case
        assert!(validate_address("0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_ok());
        assert!(validate_address("0x742d35cc6435c9c1c72c5e7b18bab7e1db7a5d6e").is_ok());
        assert!(validate_address("0x742D35CC6435C9C1C72C5E7B18BAB7E1DB7A5D6E").is_ok());
        assert!(validate_address("0x0000000000000000000000000000000000000000").is_ok());

        // Invalid addresses
        assert!(validate_address("").is_err());
        assert!(validate_address("not_an_address").is_err());
        assert!(validate_address("0x123").is_err()); // Too short
        assert!(validate_address("742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err()); // Missing 0x
        assert!(validate_address("0xgg2d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
        assert!(validate_address("0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e00").is_err());
        assert!(validate_address(" 0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6").is_err());
    }

    #[test]
    fn test_invalid_address_names_input() {
        let err = validate_address("0x123").unwrap_err();
        assert_eq!(err.to_string(), "Invalid address passed to at(): 0x123");
    }

    #[test]
    fn test_interpret_rpc_error() {
        assert!(interpret_rpc_error("VM Exception: invalid opcode").contains("reverted"));
        assert!(interpret_rpc_error("connection refused").starts_with("Network error"));
        assert_eq!(interpret_rpc_error("boom"), "RPC error: boom");
    }
}
