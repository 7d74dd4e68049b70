use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{SignerCapability, SignerKind, NOT_CONNECTED};
use crate::error::InvocationError;
use crate::ethereum::TransactionRequest;

/// Relays transactions to the custodial signer service, which signs them with
/// the one key it holds.
#[derive(Debug, Clone)]
pub struct RemoteCustodialSigner {
    client: Client,
    service_url: String,
}

impl RemoteCustodialSigner {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), service_url)
    }

    pub fn with_client(client: Client, service_url: impl Into<String>) -> Self {
        Self {
            client,
            service_url: service_url.into(),
        }
    }
}

#[async_trait]
impl SignerCapability for RemoteCustodialSigner {
    fn kind(&self) -> SignerKind {
        SignerKind::Remote
    }

    async fn get_address(&self) -> String {
        let response = match self.client.get(&self.service_url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Custodial signer unreachable at {}: {}", self.service_url, e);
                return NOT_CONNECTED.to_string();
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            warn!("Custodial signer returned {}", response.status());
            return NOT_CONNECTED.to_string();
        }

        match response.text().await {
            Ok(body) => body.trim().to_string(),
            Err(e) => {
                warn!("Failed to read custodial signer address: {}", e);
                NOT_CONNECTED.to_string()
            }
        }
    }

    async fn submit(&self, tx: &TransactionRequest) -> Result<Value, InvocationError> {
        info!("Relaying transaction to {:?} via custodial signer", tx.to);

        let response = self
            .client
            .post(&self.service_url)
            .json(tx)
            .send()
            .await
            .map_err(|e| InvocationError::SubmissionFailure(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InvocationError::SubmissionFailure(e.to_string()))?;

        if !status.is_success() {
            return Err(InvocationError::SubmissionFailure(format!(
                "custodial signer returned {}: {}",
                status, body
            )));
        }

        debug!("Custodial signer response: {}", body);
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, Bytes, U256};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET: &str = "0x9999999999999999999999999999999999999999";

    fn sample_tx() -> TransactionRequest {
        TransactionRequest {
            to: Address::repeat_byte(0x11),
            value: U256::ZERO,
            data: Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb]),
            max_priority_fee_per_gas: 1_200_000_000,
            max_fee_per_gas: 40_500_000_000,
            gas_limit: 1_000_000,
        }
    }

    #[tokio::test]
    async fn test_get_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(WALLET))
            .expect(1)
            .mount(&server)
            .await;

        let signer = RemoteCustodialSigner::new(format!("{}/", server.uri()));
        assert_eq!(signer.get_address().await, WALLET);
    }

    #[tokio::test]
    async fn test_unreachable_service_reports_not_connected() {
        let signer = RemoteCustodialSigner::new("http://127.0.0.1:1/");
        assert_eq!(signer.get_address().await, NOT_CONNECTED);
    }

    #[tokio::test]
    async fn test_non_ok_status_reports_not_connected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string(WALLET))
            .mount(&server)
            .await;

        let signer = RemoteCustodialSigner::new(server.uri());
        assert_eq!(signer.get_address().await, NOT_CONNECTED);
    }

    #[tokio::test]
    async fn test_submit_returns_body_verbatim() {
        let server = MockServer::start().await;
        let receipt = json!({"hash": "0xfeed", "nonce": 3, "from": WALLET});
        let tx = sample_tx();

        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_json(serde_json::to_value(&tx).unwrap()))
            .respond_with(ResponseTemplate::new(200).set_body_json(receipt.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let signer = RemoteCustodialSigner::new(format!("{}/", server.uri()));
        assert_eq!(signer.submit(&tx).await.unwrap(), receipt);
    }

    #[tokio::test]
    async fn test_submit_error_status_is_submission_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("nonce too low"))
            .mount(&server)
            .await;

        let signer = RemoteCustodialSigner::new(server.uri());
        let err = signer.submit(&sample_tx()).await.unwrap_err();
        assert_eq!(
            err,
            InvocationError::SubmissionFailure(
                "custodial signer returned 500 Internal Server Error: nonce too low".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_submit_transport_error_is_submission_failure() {
        let signer = RemoteCustodialSigner::new("http://127.0.0.1:1/");
        let err = signer.submit(&sample_tx()).await.unwrap_err();
        assert!(matches!(err, InvocationError::SubmissionFailure(_)));
    }
}
