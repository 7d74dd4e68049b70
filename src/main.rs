mod config;
mod controller;
mod error;
mod ethereum;
mod server;
mod signer;

use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use config::Config;
use controller::{ControllerSettings, InvocationController};
use ethereum::{
    abi::AbiCatalog,
    contract::RpcContractReader,
    fees::{FeeOracleClient, FeeTier},
    provider, InvocationResult,
};
use signer::{
    local::LocalInjectedSigner, remote::RemoteCustodialSigner, SignerCapability, SignerKind,
    SignerRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn cli() -> Command {
    Command::new("contract-invoker")
        .version("0.1.0")
        .about("Invoke functions of a deployed contract from its ABI")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("contract")
                .long("contract")
                .value_name("ADDR")
                .global(true)
                .help("Target contract address"),
        )
        .arg(
            Arg::new("abi")
                .long("abi")
                .value_name("FILE")
                .global(true)
                .help("Path to the contract ABI JSON"),
        )
        .arg(
            Arg::new("rpc-url")
                .short('r')
                .long("rpc-url")
                .value_name("URL")
                .global(true)
                .help("RPC endpoint URL"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(ArgAction::SetTrue),
        )
        .subcommand(Command::new("functions").about("List readable and writable functions"))
        .subcommand(
            Command::new("describe")
                .about("Show the inputs of one function")
                .arg(Arg::new("function").required(true)),
        )
        .subcommand(
            Command::new("invoke")
                .about("Call or transact with one function")
                .arg(Arg::new("function").required(true))
                .arg(
                    Arg::new("arg")
                        .short('a')
                        .long("arg")
                        .value_name("NAME=VALUE")
                        .action(ArgAction::Append)
                        .help("Input value, repeatable"),
                )
                .arg(
                    Arg::new("value")
                        .long("value")
                        .value_name("ETH")
                        .help("Native value to attach, in ether"),
                )
                .arg(
                    Arg::new("tier")
                        .long("tier")
                        .value_name("TIER")
                        .help("Fee tier (fast, standard, safeLow)"),
                )
                .arg(
                    Arg::new("signer")
                        .long("signer")
                        .value_name("KIND")
                        .help("Signer to use (remote, local)"),
                ),
        )
        .subcommand(Command::new("signers").about("Show the custodial and injected signer identities"))
        .subcommand(Command::new("serve-signer").about("Run the custodial signer service"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, results to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = cli().get_matches();

    if matches.get_flag("generate-config") {
        println!("{}", Config::generate_sample());
        return Ok(());
    }

    if matches.get_flag("config-path") {
        match Config::default_config_path() {
            Ok(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            Err(e) => {
                error!("Could not determine default config path: {}", e);
                return Err(e);
            }
        }
    }

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let mut config = Config::load_or_default(config_path).await;

    if let Some(abi_path) = matches.get_one::<String>("abi") {
        config.contract.abi = None;
        config.contract.abi_path = Some(PathBuf::from(abi_path));
    }
    if let Some(rpc_url) = matches.get_one::<String>("rpc-url") {
        config.network.rpc_url = rpc_url.clone();
    }

    match matches.subcommand() {
        Some(("functions", _)) => list_functions(&config).await,
        Some(("describe", sub)) => describe_function(&config, sub).await,
        Some(("signers", _)) => list_signers(&config).await,
        Some(("invoke", sub)) => {
            let contract = matches.get_one::<String>("contract").map(|s| s.as_str());
            invoke(config, contract, sub).await
        }
        Some(("serve-signer", _)) => {
            if let Err(e) = server::run(&config).await {
                error!("Signer service error: {}", e);
                return Err(e);
            }
            Ok(())
        }
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}

async fn load_catalog(config: &Config) -> Result<AbiCatalog> {
    let abi_text = config.abi_text().await?;
    Ok(AbiCatalog::parse(&abi_text)?)
}

async fn list_functions(config: &Config) -> Result<()> {
    let catalog = load_catalog(config).await?;
    if catalog.is_empty() {
        println!("(no callable functions in ABI)");
        return Ok(());
    }

    println!("Read functions:");
    for function in catalog.list_readable() {
        println!("  {}", function.signature());
    }
    println!("Write functions:");
    for function in catalog.list_writable() {
        println!("  {}", function.signature());
    }
    Ok(())
}

async fn describe_function(config: &Config, sub: &ArgMatches) -> Result<()> {
    let catalog = load_catalog(config).await?;
    let name = sub
        .get_one::<String>("function")
        .ok_or_else(|| anyhow!("function name is required"))?;
    let function = catalog.describe(name)?;

    let kind = if function.is_read() { "read" } else { "write" };
    println!("{} [{}]", function.signature(), kind);
    if function.inputs.is_empty() {
        println!("  (no inputs)");
    }
    for input in &function.inputs {
        println!("  {}: {}", input.name, input.ty);
    }
    if !function.is_read() {
        println!("  --value <ETH> may attach native value");
    }
    Ok(())
}

/// Controller wired to the configured network, gas station and signers. The
/// contract address is set separately by the caller.
async fn build_controller(config: &Config) -> Result<InvocationController> {
    let provider = provider::connect(&config.network)?;
    if let Err(e) = provider::validate_network_connection(&provider, &config.network).await {
        warn!("{}", e);
    }
    let reader = Arc::new(RpcContractReader::new(provider));
    let fees = Arc::new(FeeOracleClient::new(config.fees.endpoint.clone()));

    let remote: Arc<dyn SignerCapability> =
        Arc::new(RemoteCustodialSigner::new(config.signer.service_url.clone()));
    let local = LocalInjectedSigner::detect(config.signer.injected_url.as_deref())
        .map(|signer| Arc::new(signer) as Arc<dyn SignerCapability>);
    if local.is_none() {
        info!("No injected wallet configured, custodial signer only");
    }

    let settings = ControllerSettings {
        tier: config.fees.tier,
        explorer_tx_url: config.network.explorer_tx_url.clone(),
    };

    Ok(InvocationController::new(
        Address::ZERO,
        reader,
        fees,
        SignerRegistry::new(remote, local),
        settings,
    ))
}

/// Resolve every signer and show which one would sign.
async fn list_signers(config: &Config) -> Result<()> {
    let mut controller = build_controller(config).await?;

    for kind in [SignerKind::Local, SignerKind::Remote, config.signer.kind] {
        if let Err(notice) = controller.select_signer(kind).await {
            warn!("{}", notice);
        }
    }

    let signers = controller.signers();
    for kind in [SignerKind::Remote, SignerKind::Local] {
        let marker = if signers.active_kind() == kind { "*" } else { " " };
        match signers.identity(kind) {
            Some(identity) if identity.is_connected() => {
                println!("{} {:<6} {}", marker, kind, identity.address)
            }
            Some(identity) if !identity.address.is_empty() => {
                println!("{} {:<6} ({})", marker, kind, identity.address)
            }
            _ => println!("{} {:<6} (unavailable)", marker, kind),
        }
    }
    Ok(())
}

async fn invoke(config: Config, contract: Option<&str>, sub: &ArgMatches) -> Result<()> {
    let mut controller = build_controller(&config).await?;

    let address = contract
        .or(config.contract.address.as_deref())
        .ok_or_else(|| anyhow!("No contract address configured. Set contract.address or pass --contract"))?;
    controller.set_contract(address)?;
    info!("Target contract {}", controller.contract());

    controller.load_abi(&config.abi_text().await?)?;

    let name = sub
        .get_one::<String>("function")
        .ok_or_else(|| anyhow!("function name is required"))?;
    let selection = controller.select_function(name).map(|_| ());
    if let Err(e) = selection {
        let known: Vec<_> = controller
            .catalog()
            .list_readable()
            .into_iter()
            .chain(controller.catalog().list_writable())
            .map(|f| f.name.as_str())
            .collect();
        warn!("Known functions: {}", known.join(", "));
        return Err(e.into());
    }

    if let Some(args) = sub.get_many::<String>("arg") {
        for arg in args {
            let (key, value) = arg
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid --arg '{}', expected name=value", arg))?;
            controller.set_input(key.trim(), value)?;
        }
    }

    if let Some(ether) = sub.get_one::<String>("value") {
        controller.set_ether_value(ether.as_str())?;
    }
    if let Some(tier) = sub.get_one::<String>("tier") {
        controller.set_tier(tier.parse::<FeeTier>()?);
    }

    let (signature, is_read) = match controller.selected() {
        Some(function) => {
            for input in &function.inputs {
                if !controller.inputs().contains_key(&input.name) {
                    warn!("No value for '{}', sending it empty", input.name);
                }
            }
            (function.signature(), function.is_read())
        }
        None => return Err(anyhow!("No function selected")),
    };

    if !is_read {
        let kind = match sub.get_one::<String>("signer") {
            Some(kind) => kind.parse::<SignerKind>()?,
            None => config.signer.kind,
        };
        match controller.select_signer(kind).await {
            Ok(identity) => info!("Signing as {} via {} signer", identity.address, identity.kind),
            Err(notice) => warn!("{}", notice),
        }
        info!("Fee tier {}", controller.tier());
    }

    info!("Invoking {}", signature);
    controller.submit().await;
    debug!("Invocation finished in state {:?}", controller.state());

    let result = controller
        .result()
        .ok_or_else(|| anyhow!("No result recorded for '{}'", name))?;
    println!("{}", result.display_text());
    if let Some(url) = controller.tracking_url() {
        println!("Track: {}", url);
    }

    if let InvocationResult::Failed { error } = result {
        return Err(anyhow!("Invocation of '{}' failed ({})", name, error.kind()));
    }
    Ok(())
}
