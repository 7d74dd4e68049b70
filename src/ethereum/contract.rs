use alloy::{
    dyn_abi::{DynSolValue, FunctionExt},
    primitives::{Address, Bytes},
    providers::Provider,
    rpc::types::TransactionRequest as CallRequest,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{
    abi::FunctionDescriptor,
    encoder::{self, ReadInvocation},
    provider::HttpProvider,
    utils,
};
use crate::error::InvocationError;

/// Performs a read-only contract call and returns the decoded outputs.
#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn read(
        &self,
        contract: Address,
        descriptor: &FunctionDescriptor,
        invocation: &ReadInvocation,
    ) -> Result<Value, InvocationError>;
}

/// `eth_call` against a JSON-RPC node.
#[derive(Debug)]
pub struct RpcContractReader {
    provider: HttpProvider,
}

impl RpcContractReader {
    pub fn new(provider: HttpProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ContractReader for RpcContractReader {
    async fn read(
        &self,
        contract: Address,
        descriptor: &FunctionDescriptor,
        invocation: &ReadInvocation,
    ) -> Result<Value, InvocationError> {
        let calldata = encoder::encode_calldata(descriptor, &invocation.args)?;

        let call_request = CallRequest::default().to(contract).input(calldata.into());

        debug!("eth_call {} on {:?}", descriptor.signature(), contract);
        let result_bytes = self.provider.call(&call_request).await.map_err(|e| {
            InvocationError::CallFailure(utils::interpret_rpc_error(&e.to_string()))
        })?;

        decode_function_result(descriptor, &result_bytes).map_err(|e| {
            InvocationError::CallFailure(format!(
                "{} (raw result 0x{})",
                e,
                hex::encode(&result_bytes)
            ))
        })
    }
}

/// Decode function call result
pub fn decode_function_result(descriptor: &FunctionDescriptor, result_bytes: &Bytes) -> Result<Value> {
    if result_bytes.is_empty() {
        return Ok(Value::Null);
    }

    let decoded = descriptor
        .function
        .abi_decode_output(result_bytes, false)
        .map_err(|e| anyhow!("Failed to decode output: {}", e))?;

    dyn_sol_values_to_json(&decoded)
}

fn dyn_sol_values_to_json(values: &[DynSolValue]) -> Result<Value> {
    if values.len() == 1 {
        dyn_sol_value_to_json(&values[0])
    } else {
        values
            .iter()
            .map(dyn_sol_value_to_json)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }
}

fn dyn_sol_value_to_json(value: &DynSolValue) -> Result<Value> {
    match value {
        DynSolValue::Address(addr) => Ok(Value::String(addr.to_checksum(None))),
        DynSolValue::Uint(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Int(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Bool(b) => Ok(Value::Bool(*b)),
        DynSolValue::String(s) => Ok(Value::String(s.clone())),
        DynSolValue::Bytes(bytes) => Ok(Value::String(format!("0x{}", hex::encode(bytes)))),
        DynSolValue::FixedBytes(word, size) => {
            Ok(Value::String(format!("0x{}", hex::encode(&word[..*size]))))
        }
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            items
                .iter()
                .map(dyn_sol_value_to_json)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        _ => Err(anyhow!("Unsupported return value: {:?}", value)),
    }
}
