use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::ethereum::fees::FeeTier;
use crate::signer::SignerKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub fees: FeeConfig,
    pub contract: ContractConfig,
    pub signer: SignerConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    /// Explorer link template; `{hash}` is replaced by the transaction hash.
    pub explorer_tx_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    pub endpoint: String,
    pub tier: FeeTier,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    pub address: Option<String>,
    /// Inline ABI JSON. Takes precedence over `abi_path`.
    pub abi: Option<String>,
    pub abi_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    pub kind: SignerKind,
    pub service_url: String,
    /// EIP-1193 JSON-RPC endpoint of a wallet running beside the operator.
    pub injected_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind: String,
    pub wallet_type: String,
    /// Name of the environment variable holding the wallet secret.
    pub wallet_secret_env: String,
    pub cors_origin: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "polygon".to_string(),
            chain_id: 137,
            rpc_url: "https://polygon-mainnet.g.alchemy.com/v2/demo".to_string(),
            explorer_tx_url: "https://polygonscan.com/tx/{hash}".to_string(),
        }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://gasstation.polygon.technology/v2".to_string(),
            tier: FeeTier::Fast,
        }
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            kind: SignerKind::Remote,
            service_url: "http://localhost:3354".to_string(),
            injected_url: None,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3354".to_string(),
            wallet_type: "private_key".to_string(),
            wallet_secret_env: "WALLET_SECRET".to_string(),
            cors_origin: Some("http://localhost:3000".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => match Self::default_config_path() {
                Ok(path) if path.exists() => Self::load_from_file(&path).await.unwrap_or_else(|e| {
                    tracing::warn!("Failed to load {:?}, using defaults: {}", path, e);
                    Self::default()
                }),
                _ => Self::default(),
            },
        };

        config.apply_env_vars();
        config
    }

    /// Apply environment variable substitutions to configuration
    fn apply_env_vars(&mut self) {
        let rpc_url = &mut self.network.rpc_url;

        if let Ok(api_key) = std::env::var("ALCHEMY_API_KEY") {
            if rpc_url.contains("alchemy.com/v2/demo") {
                *rpc_url = rpc_url.replace("/demo", &format!("/{}", api_key));
                tracing::debug!("Updated {} RPC URL with API key", self.network.name);
            } else if rpc_url.contains("YOUR_API_KEY_HERE") {
                *rpc_url = rpc_url.replace("YOUR_API_KEY_HERE", &api_key);
                tracing::debug!("Updated {} RPC URL with API key", self.network.name);
            }
        } else if rpc_url.contains("/demo") {
            tracing::warn!(
                "Using demo RPC endpoint for {}, set ALCHEMY_API_KEY environment variable for better reliability",
                self.network.name
            );
        }

        if let Ok(url) = std::env::var("SIGNER_SERVICE_URL") {
            tracing::debug!("Custodial signer URL overridden from environment");
            self.signer.service_url = url;
        }
    }

    /// ABI text, inline or read from `abi_path`.
    pub async fn abi_text(&self) -> Result<String> {
        if let Some(abi) = &self.contract.abi {
            return Ok(abi.clone());
        }
        let path = self
            .contract
            .abi_path
            .as_ref()
            .ok_or_else(|| anyhow!("No ABI configured. Set contract.abi, contract.abi_path or pass --abi"))?;

        fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read ABI file {:?}: {}", path, e))
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("contract-invoker").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# Contract Invoker Configuration File

[network]
name = "polygon"
chain_id = 137
rpc_url = "https://polygon-mainnet.g.alchemy.com/v2/YOUR_API_KEY_HERE"
explorer_tx_url = "https://polygonscan.com/tx/{hash}"

# Gas station returning gwei-scale maxFee / maxPriorityFee per tier
[fees]
endpoint = "https://gasstation.polygon.technology/v2"
tier = "fast"            # fast | standard | safeLow
# Every write carries a fixed 1,000,000 gas limit; it is not estimated

[contract]
address = "0x0000000000000000000000000000000000000000"
abi_path = "abi.json"
# abi = '[{"type":"function", ...}]'

[signer]
kind = "remote"          # remote | local
service_url = "http://localhost:3354"
# EIP-1193 JSON-RPC endpoint of a local wallet (e.g. Frame)
# injected_url = "http://127.0.0.1:1248"

# Custodial signer service (serve-signer)
[service]
bind = "127.0.0.1:3354"
wallet_type = "private_key"
wallet_secret_env = "WALLET_SECRET"
cors_origin = "http://localhost:3000"

# Environment variables that can be used:
# ALCHEMY_API_KEY - Your Alchemy API key (replace YOUR_API_KEY_HERE above)
# WALLET_SECRET - Private key of the custodial wallet (name set by wallet_secret_env)
# SIGNER_SERVICE_URL - Overrides signer.service_url
"#;
        sample_config.to_string()
    }
}
