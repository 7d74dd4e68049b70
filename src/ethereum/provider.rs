use crate::config::NetworkConfig;
use alloy::{
    providers::{Provider, ProviderBuilder, RootProvider},
    transports::http::{Client, Http},
};
use anyhow::{anyhow, Result};

pub type HttpProvider = RootProvider<Http<Client>>;

/// Read-only JSON-RPC provider for the configured network.
pub fn connect(network: &NetworkConfig) -> Result<HttpProvider> {
    let url: reqwest::Url = network
        .rpc_url
        .parse()
        .map_err(|e| anyhow!("Invalid RPC URL '{}': {}", network.rpc_url, e))?;

    Ok(ProviderBuilder::new().on_http(url))
}

/// Validates network connectivity and that the endpoint serves the expected chain.
pub async fn validate_network_connection(
    provider: &HttpProvider,
    network: &NetworkConfig,
) -> Result<()> {
    let chain_id = provider.get_chain_id().await.map_err(|e| {
        anyhow!(
            "Cannot connect to network '{}': {}. Please check your RPC endpoint configuration and network connectivity.",
            network.name,
            crate::ethereum::utils::interpret_rpc_error(&e.to_string())
        )
    })?;

    if chain_id != network.chain_id {
        return Err(anyhow!(
            "RPC endpoint for '{}' reports chain id {}, expected {}",
            network.name,
            chain_id,
            network.chain_id
        ));
    }

    Ok(())
}
