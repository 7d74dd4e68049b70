//! Custodial signer service.
//!
//! Holds exactly one signing key for the life of the process and exposes it
//! over two routes:
//! - `GET /` returns the wallet address as plain text
//! - `POST /` signs and broadcasts a [`TransactionRequest`] and returns the
//!   submission as JSON
//!
//! The key is resolved before the listener is bound, so neither route is
//! reachable without a wallet. Submissions are handled one at a time.

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::Address,
    providers::{Provider, ProviderBuilder},
    rpc::types::TransactionRequest as RpcTransactionRequest,
    signers::local::PrivateKeySigner,
    transports::http::{Client, Http},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::ethereum::{utils, TransactionRequest};

/// The one key this service signs with.
#[async_trait]
pub trait CustodialWallet: Send + Sync {
    fn address(&self) -> Address;

    async fn send(&self, tx: TransactionRequest) -> Result<Value>;
}

/// Wallet-backed provider that fills nonce and chain id, signs, and broadcasts.
pub struct ProviderWallet<P> {
    provider: P,
    address: Address,
}

#[async_trait]
impl<P> CustodialWallet for ProviderWallet<P>
where
    P: Provider<Http<Client>> + 'static,
{
    fn address(&self) -> Address {
        self.address
    }

    async fn send(&self, tx: TransactionRequest) -> Result<Value> {
        let request = RpcTransactionRequest::default()
            .with_from(self.address)
            .with_to(tx.to)
            .with_value(tx.value)
            .with_input(tx.data.clone())
            .with_gas_limit(tx.gas_limit)
            .with_max_fee_per_gas(tx.max_fee_per_gas)
            .with_max_priority_fee_per_gas(tx.max_priority_fee_per_gas);

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| anyhow!(utils::interpret_rpc_error(&e.to_string())))?;
        let hash = *pending.tx_hash();

        Ok(tx.submission_receipt(format!("0x{:x}", hash), self.address.to_checksum(None)))
    }
}

/// Resolve the signing identity from the configured secret.
pub fn init_wallet(config: &Config) -> Result<Arc<dyn CustodialWallet>> {
    let service = &config.service;

    match service.wallet_type.as_str() {
        "private_key" | "pvt_key" => {}
        other => {
            return Err(anyhow!(
                "Unsupported wallet type '{}'. Supported: private_key",
                other
            ))
        }
    }

    let secret = std::env::var(&service.wallet_secret_env).map_err(|_| {
        anyhow!(
            "Wallet secret not set. Export {} with the custodial private key",
            service.wallet_secret_env
        )
    })?;
    let secret = secret.trim();
    let secret = secret.strip_prefix("0x").unwrap_or(secret);

    let signer =
        PrivateKeySigner::from_str(secret).map_err(|e| anyhow!("Invalid private key: {}", e))?;
    let address = signer.address();

    let url: reqwest::Url = config
        .network
        .rpc_url
        .parse()
        .map_err(|e| anyhow!("Invalid RPC URL '{}': {}", config.network.rpc_url, e))?;

    let provider = ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(EthereumWallet::from(signer))
        .on_http(url);

    Ok(Arc::new(ProviderWallet { provider, address }))
}

struct ServiceState {
    wallet: Arc<dyn CustodialWallet>,
    // one submission at a time through the single key
    submissions: Mutex<()>,
}

pub fn router(wallet: Arc<dyn CustodialWallet>, cors_origin: Option<&str>) -> Result<Router> {
    let state = Arc::new(ServiceState {
        wallet,
        submissions: Mutex::new(()),
    });

    let mut app = Router::new()
        .route("/", get(wallet_address).post(relay_transaction))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = cors_origin {
        let origin = HeaderValue::from_str(origin)
            .map_err(|e| anyhow!("Invalid CORS origin '{}': {}", origin, e))?;
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        );
    }

    Ok(app)
}

async fn wallet_address(State(state): State<Arc<ServiceState>>) -> String {
    state.wallet.address().to_checksum(None)
}

async fn relay_transaction(
    State(state): State<Arc<ServiceState>>,
    Json(tx): Json<TransactionRequest>,
) -> impl IntoResponse {
    let _guard = state.submissions.lock().await;

    info!("Relaying transaction to {:?} (gas limit {})", tx.to, tx.gas_limit);
    match state.wallet.send(tx).await {
        Ok(result) => {
            info!("Broadcast {}", result["hash"]);
            (StatusCode::OK, Json(result))
        }
        Err(e) => {
            error!("Transaction relay failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

/// Resolve the wallet, then serve until the process is stopped.
pub async fn run(config: &Config) -> Result<()> {
    let wallet = init_wallet(config)?;
    info!("Custodial signer ready for {}", wallet.address().to_checksum(None));

    let app = router(wallet, config.service.cors_origin.as_deref())?;

    let listener = tokio::net::TcpListener::bind(&config.service.bind)
        .await
        .map_err(|e| anyhow!("Failed to bind {}: {}", config.service.bind, e))?;
    info!("Custodial signer listening on {}", config.service.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, U256};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ANVIL_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[derive(Default)]
    struct StubWallet {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        sent: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CustodialWallet for StubWallet {
        fn address(&self) -> Address {
            ANVIL_ADDRESS.parse().unwrap()
        }

        async fn send(&self, tx: TransactionRequest) -> Result<Value> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(anyhow!("insufficient funds for gas * price + value"));
            }
            let n = self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"hash": format!("0x{:064x}", n), "gasLimit": tx.gas_limit}))
        }
    }

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

    fn post(tx: &TransactionRequest) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(tx).unwrap()))
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_get_returns_address() {
        let app = router(Arc::new(StubWallet::default()), None).unwrap();
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, ANVIL_ADDRESS.as_bytes());
    }

    #[tokio::test]
    async fn test_post_relays_transaction() {
        let app = router(Arc::new(StubWallet::default()), Some("http://localhost:3000")).unwrap();
        let response = app.oneshot(post(&sample_tx())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["hash"], format!("0x{:064x}", 0));
        assert_eq!(body["gasLimit"], 1_000_000);
    }

    #[tokio::test]
    async fn test_relay_failure_is_500_with_message() {
        let wallet = StubWallet {
            fail: true,
            ..Default::default()
        };
        let app = router(Arc::new(wallet), None).unwrap();
        let response = app.oneshot(post(&sample_tx())).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"], "insufficient funds for gas * price + value");
    }

    #[tokio::test]
    async fn test_submissions_are_serialized() {
        let wallet = Arc::new(StubWallet::default());
        let app = router(wallet.clone(), None).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move { app.oneshot(post(&sample_tx())).await.unwrap() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().status(), StatusCode::OK);
        }

        assert_eq!(wallet.sent.load(Ordering::SeqCst), 4);
        assert_eq!(wallet.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_init_wallet_from_secret() {
        let mut config = Config::default();
        config.service.wallet_secret_env = "CONTRACT_INVOKER_TEST_SECRET_OK".to_string();
        std::env::set_var("CONTRACT_INVOKER_TEST_SECRET_OK", ANVIL_KEY);

        let wallet = init_wallet(&config).unwrap();
        assert_eq!(wallet.address(), ANVIL_ADDRESS.parse::<Address>().unwrap());
    }

    #[test]
    fn test_init_wallet_requires_secret() {
        let mut config = Config::default();
        config.service.wallet_secret_env = "CONTRACT_INVOKER_TEST_SECRET_UNSET".to_string();
        std::env::remove_var("CONTRACT_INVOKER_TEST_SECRET_UNSET");

        assert!(init_wallet(&config).is_err());
    }

    #[test]
    fn test_init_wallet_rejects_unknown_type() {
        let mut config = Config::default();
        config.service.wallet_type = "metamask".to_string();

        let err = init_wallet(&config).err().unwrap();
        assert!(err.to_string().contains("Unsupported wallet type"));
    }
}
