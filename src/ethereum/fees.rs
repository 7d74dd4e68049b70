use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use super::FeeQuote;
use crate::error::InvocationError;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Inclusion-speed profile published by the gas station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeeTier {
    #[default]
    #[serde(rename = "fast")]
    Fast,
    #[serde(rename = "standard")]
    Standard,
    #[serde(rename = "safeLow")]
    SafeLow,
}

impl FeeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeTier::Fast => "fast",
            FeeTier::Standard => "standard",
            FeeTier::SafeLow => "safeLow",
        }
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeeTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fast" => Ok(FeeTier::Fast),
            "standard" => Ok(FeeTier::Standard),
            "safeLow" | "safelow" | "safe-low" => Ok(FeeTier::SafeLow),
            other => Err(anyhow!(
                "Unknown fee tier '{}'. Expected one of: fast, standard, safeLow",
                other
            )),
        }
    }
}

#[async_trait]
pub trait FeeOracle: Send + Sync {
    async fn quote(&self, tier: FeeTier) -> Result<FeeQuote, InvocationError>;
}

/// Client for a gas-station style endpoint returning
/// `{"fast": {"maxFee": 40.5, "maxPriorityFee": 1.2}, ...}` in gwei.
#[derive(Debug, Clone)]
pub struct FeeOracleClient {
    client: Client,
    endpoint: String,
}

impl FeeOracleClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl FeeOracle for FeeOracleClient {
    async fn quote(&self, tier: FeeTier) -> Result<FeeQuote, InvocationError> {
        debug!("Fetching {} fee estimate from {}", tier, self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| InvocationError::FeeUnavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Fee endpoint returned {}", status);
            return Err(InvocationError::FeeUnavailable(format!(
                "fee endpoint returned {}",
                status
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            InvocationError::FeeUnavailable(format!("invalid fee response: {}", e))
        })?;

        quote_from_response(&body, tier)
    }
}

fn quote_from_response(body: &Value, tier: FeeTier) -> Result<FeeQuote, InvocationError> {
    let entry = body
        .get(tier.as_str())
        .ok_or_else(|| InvocationError::FeeUnavailable(format!("no '{}' tier in response", tier)))?;

    let field = |name: &str| -> Result<u128, InvocationError> {
        let gwei = entry.get(name).and_then(Value::as_f64).ok_or_else(|| {
            InvocationError::FeeUnavailable(format!("'{}' tier is missing {}", tier, name))
        })?;
        gwei_to_wei(gwei).ok_or_else(|| {
            InvocationError::FeeUnavailable(format!("'{}' {} is not a valid fee: {}", tier, name, gwei))
        })
    };

    Ok(FeeQuote {
        max_priority_fee_per_gas: field("maxPriorityFee")?,
        max_fee_per_gas: field("maxFee")?,
    })
}

/// Gwei to wei, rounding up any fraction of a wei.
///
/// Works on the shortest decimal text of the float so that `12.0` stays
/// exactly `12_000_000_000` instead of picking up binary error.
pub fn gwei_to_wei(gwei: f64) -> Option<u128> {
    if !gwei.is_finite() || gwei < 0.0 {
        return None;
    }

    // f64's Display never uses exponent notation
    let text = gwei.to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let (head, tail) = if fraction.len() > 9 {
        fraction.split_at(9)
    } else {
        (fraction, "")
    };

    let whole: u128 = whole.parse().ok()?;
    let head: u128 = format!("{:0<9}", head).parse().ok()?;

    let mut wei = whole.checked_mul(WEI_PER_GWEI)?.checked_add(head)?;
    if tail.bytes().any(|b| b != b'0') {
        wei = wei.checked_add(1)?;
    }
    Some(wei)
}
