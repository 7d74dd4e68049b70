pub mod abi;
pub mod contract;
pub mod encoder;
pub mod fees;
pub mod provider;
pub mod utils;

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::error::InvocationError;

/// Raw operator-entered values keyed by parameter name.
pub type InputValues = BTreeMap<String, String>;

/// Fee fields for one tier, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeQuote {
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
}

/// Transaction handed to a signer. Also the custodial service's POST body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
}

impl TransactionRequest {
    pub fn new(to: Address, payload: encoder::WritePayload, fees: FeeQuote, gas_limit: u64) -> Self {
        Self {
            to,
            value: payload.value,
            data: payload.data,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            max_fee_per_gas: fees.max_fee_per_gas,
            gas_limit,
        }
    }

    /// Response body reported after a signer broadcast this request. Fee
    /// fields are hex quantities since wei amounts can exceed `u64`.
    pub fn submission_receipt(&self, hash: impl Into<Value>, from: impl Into<Value>) -> Value {
        json!({
            "hash": hash.into(),
            "from": from.into(),
            "to": self.to,
            "value": self.value,
            "data": self.data,
            "gasLimit": self.gas_limit,
            "maxFeePerGas": format!("{:#x}", self.max_fee_per_gas),
            "maxPriorityFeePerGas": format!("{:#x}", self.max_priority_fee_per_gas),
        })
    }
}

/// Outcome of one submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationResult {
    Read { function: String, value: Value },
    Submitted { hash: Option<String>, raw: Value },
    Failed { error: InvocationError },
}

impl InvocationResult {
    /// Wraps a signer's response, lifting out the transaction hash if present.
    pub fn submitted(raw: Value) -> Self {
        let hash = raw
            .get("hash")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self::Submitted { hash, raw }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn hash(&self) -> Option<&str> {
        match self {
            Self::Submitted { hash, .. } => hash.as_deref(),
            _ => None,
        }
    }

    /// Text shown to the operator.
    pub fn display_text(&self) -> String {
        match self {
            Self::Read { value, .. } => match value {
                Value::String(s) => s.clone(),
                other => pretty_json(other),
            },
            Self::Submitted { raw, .. } => pretty_json(raw),
            Self::Failed { error } => error.to_string(),
        }
    }
}

fn pretty_json(value: &Value) -> String {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    if value.serialize(&mut ser).is_err() {
        return value.to_string();
    }
    String::from_utf8(out).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitted_display_round_trip() {
        let raw = json!({
            "hash": "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060",
            "nonce": 7,
            "gasLimit": "0xf4240",
            "to": "0x0000000000000000000000000000000000000001"
        });
        let result = InvocationResult::submitted(raw.clone());
        let text = result.display_text();

        assert!(text.contains("\n    \"hash\""));
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, raw);
        assert_eq!(
            result.hash(),
            Some("0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060")
        );
    }

    #[test]
    fn test_submitted_without_hash() {
        let result = InvocationResult::submitted(json!("accepted"));
        assert_eq!(result.hash(), None);
        assert!(!result.is_failed());
    }

    #[test]
    fn test_transaction_request_wire_format() {
        let tx = TransactionRequest {
            to: Address::ZERO,
            value: U256::from(1_000_000_000_000_000u64),
            data: Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb]),
            max_priority_fee_per_gas: 1_200_000_000,
            max_fee_per_gas: 40_500_000_000,
            gas_limit: 1_000_000,
        };
        let value = serde_json::to_value(&tx).unwrap();

        assert_eq!(value["value"], "0x38d7ea4c68000");
        assert_eq!(value["data"], "0xa9059cbb");
        assert_eq!(value["maxFeePerGas"], 40_500_000_000u64);
        assert_eq!(value["maxPriorityFeePerGas"], 1_200_000_000u64);
        assert_eq!(value["gasLimit"], 1_000_000);

        let back: TransactionRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn test_submission_receipt_with_fee_above_u64() {
        let tx = TransactionRequest {
            to: Address::ZERO,
            value: U256::ZERO,
            data: Bytes::new(),
            max_priority_fee_per_gas: 1_200_000_000,
            max_fee_per_gas: 20_000_000_000_000_000_000,
            gas_limit: 1_000_000,
        };
        let receipt = tx.submission_receipt("0xabc", "0x2222222222222222222222222222222222222222");

        assert_eq!(receipt["hash"], "0xabc");
        assert_eq!(receipt["maxFeePerGas"], "0x1158e460913d00000");
        assert_eq!(receipt["maxPriorityFeePerGas"], "0x47868c00");
        assert_eq!(receipt["gasLimit"], 1_000_000);
    }
}
