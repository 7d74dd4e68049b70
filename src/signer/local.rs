use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{SignerCapability, SignerKind};
use crate::error::InvocationError;
use crate::ethereum::TransactionRequest;

/// A wallet running beside the operator (for example a desktop wallet exposing
/// an EIP-1193 JSON-RPC endpoint). Account access and every transaction are
/// confirmed by the user inside the wallet.
#[derive(Debug)]
pub struct LocalInjectedSigner {
    client: Client,
    provider_url: String,
    account: OnceCell<String>,
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl LocalInjectedSigner {
    /// `None` when no wallet provider is configured.
    pub fn detect(provider_url: Option<&str>) -> Option<Self> {
        let url = provider_url.map(str::trim).filter(|u| !u.is_empty())?;
        Some(Self {
            client: Client::new(),
            provider_url: url.to_string(),
            account: OnceCell::new(),
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, String> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .client
            .post(&self.provider_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("wallet provider unreachable: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("wallet provider returned {}", response.status()));
        }

        let rpc: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| format!("invalid wallet provider response: {}", e))?;

        match (rpc.result, rpc.error) {
            (_, Some(error)) => Err(format!("wallet error {}: {}", error.code, error.message)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(format!("wallet returned no result for {}", method)),
        }
    }

    async fn request_account(&self) -> Result<String, String> {
        let accounts = self.request("eth_requestAccounts", json!([])).await?;
        accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| "wallet authorized no accounts".to_string())
    }
}

#[async_trait]
impl SignerCapability for LocalInjectedSigner {
    fn kind(&self) -> SignerKind {
        SignerKind::Local
    }

    async fn get_address(&self) -> String {
        match self
            .account
            .get_or_try_init(|| self.request_account())
            .await
        {
            Ok(account) => account.clone(),
            Err(e) => {
                warn!("Injected wallet account request failed: {}", e);
                String::new()
            }
        }
    }

    async fn submit(&self, tx: &TransactionRequest) -> Result<Value, InvocationError> {
        let from = self.get_address().await;
        if from.is_empty() {
            return Err(InvocationError::SignerUnavailable(
                "injected wallet has no authorized account".to_string(),
            ));
        }

        let params = json!([{
            "from": from,
            "to": tx.to,
            "value": tx.value,
            "data": tx.data,
            "gas": format!("{:#x}", tx.gas_limit),
            "maxFeePerGas": format!("{:#x}", tx.max_fee_per_gas),
            "maxPriorityFeePerGas": format!("{:#x}", tx.max_priority_fee_per_gas),
        }]);
        debug!("eth_sendTransaction {}", params);

        let hash = self
            .request("eth_sendTransaction", params)
            .await
            .map_err(InvocationError::SubmissionFailure)?;

        info!("Injected wallet submitted transaction {}", hash);
        Ok(tx.submission_receipt(hash, from))
    }
}
