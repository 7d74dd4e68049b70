use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Parses a `0x`-prefixed, 40 hex digit contract or account address.
pub fn validate_address(address: &str) -> Result<Address> {
    let trimmed = address.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| anyhow!("Invalid address '{}': expected a 0x prefix", trimmed))?;

    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!(
            "Invalid address '{}': expected 40 hexadecimal characters after 0x",
            trimmed
        ));
    }

    Address::from_str(digits).map_err(|e| anyhow!("Invalid address '{}': {}", trimmed, e))
}

/// Fills a transaction hash into an explorer URL template such as
/// `https://polygonscan.com/tx/{hash}`.
pub fn tracking_url(template: &str, hash: &str) -> String {
    if template.contains("{hash}") {
        template.replace("{hash}", hash)
    } else {
        format!("{}/{}", template.trim_end_matches('/'), hash)
    }
}

/// Creates user-friendly error messages for common RPC errors
pub fn interpret_rpc_error(error: &str) -> String {
    if error.contains("execution reverted") {
        format!(
            "Call reverted: the contract rejected the call. Check the arguments against the function's requirements. ({})",
            error
        )
    } else if error.contains("insufficient funds") {
        "Transaction failed: Insufficient funds to cover value plus gas. Fund the signing account and retry.".to_string()
    } else if error.contains("nonce too low") {
        "Transaction failed: Nonce too low. Another transaction from this signer was mined with the same nonce.".to_string()
    } else if error.contains("replacement transaction underpriced") {
        "Transaction failed: A pending transaction with this nonce pays a higher fee. Pick a faster tier.".to_string()
    } else if error.contains("max fee per gas less than block base fee") {
        "Transaction failed: Max fee is below the current base fee. Pick a faster tier.".to_string()
    } else if error.contains("connection refused") || error.contains("network unreachable") {
        "Network error: Cannot connect to RPC endpoint. Check your internet connection and RPC URL configuration.".to_string()
    } else if error.contains("timeout") {
        "Network error: Request timed out. The RPC endpoint may be overloaded or unreachable."
            .to_string()
    } else if error.contains("rate limit") {
        "Rate limit error: Too many requests to the RPC endpoint. Try again in a few moments or use a different endpoint.".to_string()
    } else {
        format!("RPC error: {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_ok());
        assert!(validate_address("0x0000000000000000000000000000000000000000").is_ok());

        assert!(validate_address("").is_err());
        assert!(validate_address("not_an_address").is_err());
        assert!(validate_address("0x123").is_err());
        assert!(validate_address("742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
        assert!(validate_address("0xgg2d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
    }

    #[test]
    fn test_tracking_url() {
        assert_eq!(
            tracking_url("https://polygonscan.com/tx/{hash}", "0xabc"),
            "https://polygonscan.com/tx/0xabc"
        );
        assert_eq!(
            tracking_url("https://etherscan.io/tx/", "0xabc"),
            "https://etherscan.io/tx/0xabc"
        );
    }

    #[test]
    fn test_interpret_rpc_error() {
        assert!(interpret_rpc_error("server returned: insufficient funds for gas * price + value")
            .starts_with("Transaction failed: Insufficient funds"));
        assert_eq!(interpret_rpc_error("boom"), "RPC error: boom");
    }
}
