//! Who can turn a [`TransactionRequest`] into a submitted transaction.
//!
//! Two backends sit behind [`SignerCapability`]: a key held by the custodial
//! signer service ([`remote::RemoteCustodialSigner`]) and a wallet running in
//! the operator's environment that confirms each transaction itself
//! ([`local::LocalInjectedSigner`]). The [`SignerRegistry`] owns both and
//! tracks which one is active.

pub mod local;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::InvocationError;
use crate::ethereum::TransactionRequest;

/// Address shown for the custodial signer when its service cannot be reached.
pub const NOT_CONNECTED: &str = "Backend not connected!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerKind {
    #[default]
    Remote,
    Local,
}

impl fmt::Display for SignerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerKind::Remote => f.pad("remote"),
            SignerKind::Local => f.pad("local"),
        }
    }
}

impl FromStr for SignerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "remote" | "backend" => Ok(SignerKind::Remote),
            "local" | "injected" => Ok(SignerKind::Local),
            other => Err(anyhow::anyhow!(
                "Unknown signer kind '{}'. Expected 'remote' or 'local'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignerIdentity {
    pub kind: SignerKind,
    pub address: String,
}

impl SignerIdentity {
    pub fn is_connected(&self) -> bool {
        !self.address.is_empty() && self.address != NOT_CONNECTED
    }
}

#[async_trait]
pub trait SignerCapability: Send + Sync {
    fn kind(&self) -> SignerKind;

    /// Best-effort address lookup. Empty or [`NOT_CONNECTED`] when unresolved.
    async fn get_address(&self) -> String;

    /// Sign and broadcast, returning the backend's response as-is.
    async fn submit(&self, tx: &TransactionRequest) -> Result<Value, InvocationError>;
}

/// The signers available to one operator session and which of them is active.
pub struct SignerRegistry {
    signers: HashMap<SignerKind, Arc<dyn SignerCapability>>,
    identities: HashMap<SignerKind, SignerIdentity>,
    active: SignerKind,
}

impl SignerRegistry {
    /// The custodial signer is always present; the injected one only when a
    /// compatible wallet provider was found.
    pub fn new(remote: Arc<dyn SignerCapability>, local: Option<Arc<dyn SignerCapability>>) -> Self {
        let mut signers = HashMap::new();
        signers.insert(remote.kind(), remote);
        if let Some(local) = local {
            signers.insert(local.kind(), local);
        }

        Self {
            signers,
            identities: HashMap::new(),
            active: SignerKind::Remote,
        }
    }

    pub fn active_kind(&self) -> SignerKind {
        self.active
    }

    /// Last identity resolved for `kind`, connected or not.
    pub fn identity(&self, kind: SignerKind) -> Option<&SignerIdentity> {
        self.identities.get(&kind)
    }

    /// Make `kind` the active signer, resolving its address unless already known.
    ///
    /// When the requested signer is missing or cannot produce an address the
    /// custodial signer stays active and the error is returned as a notice.
    pub async fn select(&mut self, kind: SignerKind) -> Result<SignerIdentity, InvocationError> {
        if !self.signers.contains_key(&kind) {
            warn!("No {} signer available, keeping custodial signer", kind);
            self.active = SignerKind::Remote;
            return Err(InvocationError::SignerUnavailable(format!(
                "no {} wallet provider detected",
                kind
            )));
        }

        let identity = self.resolve(kind).await;
        if kind != SignerKind::Remote && !identity.is_connected() {
            self.active = SignerKind::Remote;
            return Err(InvocationError::SignerUnavailable(format!(
                "{} wallet did not authorize an account",
                kind
            )));
        }

        info!("Active signer: {} ({})", kind, identity.address);
        self.active = kind;
        Ok(identity)
    }

    /// The active signer together with its connected identity.
    pub async fn active(
        &mut self,
    ) -> Result<(Arc<dyn SignerCapability>, SignerIdentity), InvocationError> {
        let kind = self.active;
        let signer = self
            .signers
            .get(&kind)
            .cloned()
            .ok_or_else(|| InvocationError::SignerUnavailable(format!("no {} signer", kind)))?;

        let identity = self.resolve(kind).await;
        if !identity.is_connected() {
            return Err(InvocationError::SignerUnavailable(format!(
                "{} signer has no resolved address ({})",
                kind, identity.address
            )));
        }
        Ok((signer, identity))
    }

    async fn resolve(&mut self, kind: SignerKind) -> SignerIdentity {
        if let Some(known) = self.identities.get(&kind) {
            if known.is_connected() {
                return known.clone();
            }
        }

        let address = match self.signers.get(&kind) {
            Some(signer) => signer.get_address().await,
            None => String::new(),
        };
        let identity = SignerIdentity { kind, address };
        self.identities.insert(kind, identity.clone());
        identity
    }
}
