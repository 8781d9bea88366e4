use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use pong_pudding::{
    ethereum::utils::interpret_rpc_error, Artifact, BindingError, Config, ContractBinding,
    ContractFactory, HttpProvider, Pong,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only JSON results
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = Command::new("pong-pudding")
        .version("0.1.0")
        .about("Deploy and drive contracts from compiled artifacts over JSON-RPC")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("rpc-url")
                .short('r')
                .long("rpc-url")
                .value_name("URL")
                .help("RPC endpoint URL"),
        )
        .arg(
            Arg::new("network")
                .short('n')
                .long("network")
                .value_name("ID")
                .help("Artifact network id to use instead of asking the node"),
        )
        .arg(
            Arg::new("artifact")
                .short('a')
                .long("artifact")
                .value_name("FILE")
                .help("Compiled contract artifact (defaults to the embedded Pong artifact)"),
        )
        .arg(
            Arg::new("deploy")
                .long("deploy")
                .help("Deploy a new instance before invoking")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("deploy-args")
                .long("deploy-args")
                .value_name("JSON")
                .help("Constructor arguments as a JSON array"),
        )
        .arg(
            Arg::new("at")
                .long("at")
                .value_name("ADDRESS")
                .conflicts_with("deploy")
                .help("Attach to an existing deployment"),
        )
        .arg(
            Arg::new("invoke")
                .short('i')
                .long("invoke")
                .value_name("FUNCTION")
                .help("Invoke a function: reads return a value, writes wait for the receipt"),
        )
        .arg(
            Arg::new("call")
                .long("call")
                .value_name("FUNCTION")
                .conflicts_with("invoke")
                .help("Run a function through eth_call without sending a transaction"),
        )
        .arg(
            Arg::new("args")
                .long("args")
                .value_name("JSON")
                .help("Function arguments as a JSON array; a trailing object is taken as options"),
        )
        .arg(
            Arg::new("extended")
                .long("extended")
                .help("Resolve writes with the receipt and decoded logs")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_name("MILLIS")
                .value_parser(clap::value_parser!(i64))
                .allow_negative_numbers(true)
                .help("Receipt wait budget in milliseconds; 0 or less waits forever"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Handle special commands first
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
    apply_cli_overrides(&mut config, &matches);

    match run(config, &matches).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(e)
        }
    }
}

fn apply_cli_overrides(config: &mut Config, matches: &ArgMatches) {
    if let Some(rpc_url) = matches.get_one::<String>("rpc-url") {
        config.rpc_url = rpc_url.clone();
    }
    if let Some(network) = matches.get_one::<String>("network") {
        config.network = Some(network.clone());
    }
    if let Some(artifact) = matches.get_one::<String>("artifact") {
        config.artifact = Some(artifact.into());
    }
    if let Some(timeout_ms) = matches.get_one::<i64>("timeout-ms") {
        config.binding.synchronization_timeout_ms = *timeout_ms;
    }
    if matches.get_flag("extended") {
        config.binding.extended_results = true;
    }
}

async fn run(config: Config, matches: &ArgMatches) -> Result<Value> {
    let artifact = match &config.artifact {
        Some(path) => Artifact::load_from_file(path).await.map_err(explain)?,
        None => Pong::artifact().map_err(explain)?,
    };

    let provider = HttpProvider::new(&config.rpc_url).map_err(explain)?;
    if !provider.check_connection().await {
        warn!("RPC endpoint {} did not answer eth_blockNumber", config.rpc_url);
    }
    info!("Using RPC endpoint {}", provider.rpc_url());

    let mut factory =
        ContractFactory::new(artifact, config.binding.clone()).with_provider(Arc::new(provider));
    if let Some(network) = &config.network {
        factory.set_network(network).map_err(explain)?;
    }

    let binding = bind(&mut factory, matches).await.map_err(explain)?;
    let args = json_args(matches.get_one::<String>("args"))?;

    if let Some(name) = matches.get_one::<String>("invoke") {
        let result = binding.invoke(name, args).await.map_err(explain)?;
        return Ok(serde_json::to_value(result)?);
    }

    if let Some(name) = matches.get_one::<String>("call") {
        let function = binding.function(name).map_err(explain)?;
        return function.call(args).await.map_err(explain);
    }

    Ok(json!({
        "contract": binding.contract_name(),
        "address": binding.address(),
        "network": binding.network_id(),
        "transactionHash": binding.transaction_hash(),
        "members": binding.member_names(),
    }))
}

async fn bind(factory: &mut ContractFactory, matches: &ArgMatches) -> pong_pudding::Result<ContractBinding> {
    if matches.get_flag("deploy") {
        let args = json_args(matches.get_one::<String>("deploy-args"))
            .map_err(|e| BindingError::InvalidArguments(e.to_string()))?;
        return factory.deploy_new(args).await;
    }

    match matches.get_one::<String>("at") {
        Some(address) => factory.at(address),
        None => factory.deployed().await,
    }
}

fn json_args(raw: Option<&String>) -> Result<Vec<Value>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(raw)? {
        Value::Array(values) => Ok(values),
        other => Err(anyhow!("Arguments must be a JSON array, got {}", other)),
    }
}

fn explain(e: BindingError) -> anyhow::Error {
    match e {
        BindingError::Rpc(message) => anyhow!(interpret_rpc_error(&message)),
        timeout @ BindingError::TransactionTimeout { .. } => {
            anyhow!(interpret_rpc_error(&timeout.to_string()))
        }
        other => other.into(),
    }
}
