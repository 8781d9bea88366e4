use alloy::{
    json_abi::{Event, Function},
    primitives::{Address, Bytes, B256},
    rpc::types::Filter,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    artifact::{self, Artifact, DeploymentRecord, EventTable, InterfaceDescriptor, InterfaceEntry},
    codec,
    options::{self, CallOptions},
    provider::SharedProvider,
    sync::{SharedClock, Synchronizer, TokioClock},
    utils, DecodedLog, Invocation, TransactionOutcome, TransactionResult,
};
use crate::config::BindingConfig;
use crate::error::{BindingError, Result};

/// Ids tried, in order, when the node reports the main network.
const MAIN_NETWORK_ALIASES: [&str; 3] = ["1", "live", "default"];

/// Creates bindings for one compiled contract.
///
/// A factory starts out with the artifact's `default` record active so its
/// interface is usable straight away; [`ContractFactory::resolve_network`]
/// swaps in the record matching the connected node.
#[derive(Debug, Clone)]
pub struct ContractFactory {
    artifact: Arc<Artifact>,
    provider: Option<SharedProvider>,
    clock: SharedClock,
    config: BindingConfig,
    network_id: Option<String>,
    record: Option<DeploymentRecord>,
}

impl ContractFactory {
    pub fn new(artifact: Artifact, config: BindingConfig) -> Self {
        let record = artifact.record("default").map(activate);
        Self {
            artifact: Arc::new(artifact),
            provider: None,
            clock: TokioClock::shared(),
            config,
            network_id: None,
            record,
        }
    }

    pub fn with_provider(mut self, provider: SharedProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_provider(&mut self, provider: SharedProvider) {
        self.provider = Some(provider);
    }

    pub fn contract_name(&self) -> &str {
        &self.artifact.contract_name
    }

    pub fn generated_with(&self) -> Option<&str> {
        self.artifact.generated_with.as_deref()
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Every network id the artifact has a record for.
    pub fn networks(&self) -> Vec<String> {
        self.artifact.network_ids()
    }

    /// The selected network, `None` until one is set or resolved.
    pub fn network_id(&self) -> Option<&str> {
        self.network_id.as_deref()
    }

    pub fn record(&self) -> Option<&DeploymentRecord> {
        self.record.as_ref()
    }

    /// Merges `options` into the defaults applied to every call.
    pub fn defaults(&mut self, options: &CallOptions) -> &CallOptions {
        self.config.defaults = self.config.defaults.merge(options);
        &self.config.defaults
    }

    /// A copy of this factory pinned to `network_id`.
    pub fn for_network(&self, network_id: &str) -> Result<Self> {
        let mut variant = self.clone();
        variant.set_network(network_id)?;
        Ok(variant)
    }

    pub fn set_network(&mut self, network_id: &str) -> Result<()> {
        let record = self
            .artifact
            .record(network_id)
            .ok_or_else(|| self.network_not_found(network_id))?;
        self.record = Some(activate(record));
        self.network_id = Some(network_id.to_string());
        debug!("{} using network '{}'", self.contract_name(), network_id);
        Ok(())
    }

    /// Detects the node's network and activates the matching record. A
    /// network already selected is kept as is.
    pub async fn resolve_network(&mut self) -> Result<String> {
        if let Some(network_id) = &self.network_id {
            return Ok(network_id.clone());
        }

        let detected = self.provider()?.network_id().await?;
        let network_id = self.match_network(&detected);
        if self.artifact.record(&network_id).is_none() {
            return Err(self.network_not_found(&network_id));
        }

        info!(
            "{} resolved network id {} to artifacts '{}'",
            self.contract_name(),
            detected,
            network_id
        );
        self.set_network(&network_id)?;
        Ok(network_id)
    }

    fn match_network(&self, detected: &str) -> String {
        if detected == "1" {
            if let Some(alias) = MAIN_NETWORK_ALIASES
                .iter()
                .find(|alias| self.artifact.record(alias).is_some())
            {
                return alias.to_string();
            }
        }
        detected.to_string()
    }

    /// Records `address` for library `name`.
    pub fn link(&mut self, name: &str, address: Address) -> Result<()> {
        let record = self.active_record_mut()?;
        record.links.insert(name.to_string(), address);
        Ok(())
    }

    pub fn link_all(&mut self, links: &BTreeMap<String, Address>) -> Result<()> {
        for (name, address) in links {
            self.link(name, *address)?;
        }
        Ok(())
    }

    /// Links a deployed library and learns its events, so that logs emitted
    /// through the library decode too.
    pub fn link_library(&mut self, library: &ContractBinding) -> Result<()> {
        let record = self.active_record_mut()?;
        record
            .links
            .insert(library.contract_name().to_string(), library.address());
        record.events.merge(library.events());
        Ok(())
    }

    /// Bytecode of the active record with linked libraries substituted.
    pub fn binary(&self) -> Option<String> {
        self.record.as_ref().and_then(DeploymentRecord::binary)
    }

    pub fn unresolved_libraries(&self) -> Vec<String> {
        self.binary()
            .map(|binary| artifact::unresolved_libraries(&binary))
            .unwrap_or_default()
    }

    /// Deploys a new instance and waits until the creation transaction is
    /// mined. A trailing options object is honored as for any write.
    pub async fn deploy_new(&mut self, args: Vec<Value>) -> Result<ContractBinding> {
        let provider = self.provider()?.clone();
        if self.record.is_none() {
            self.resolve_network().await?;
        }

        let binary = self.binary().ok_or_else(|| BindingError::BinaryMissing {
            contract: self.contract_name().to_string(),
        })?;

        let unresolved = artifact::unresolved_libraries(&binary);
        if !unresolved.is_empty() {
            return Err(BindingError::UnresolvedLibraries {
                contract: self.contract_name().to_string(),
                libraries: unresolved,
            });
        }

        let record = self.active_record()?;
        let (args, call_options) = options::split_trailing_options(args)?;
        let mut tx_options = self.config.defaults.merge(&call_options);
        // caller-supplied data is sent as is
        let code = match tx_options.data.take() {
            Some(data) => data,
            None => {
                let mut code = artifact::decode_bytecode(&binary)?.to_vec();
                code.extend(codec::encode_constructor_args(record.abi.constructor(), &args)?);
                Bytes::from(code)
            }
        };

        let transaction = tx_options.to_transaction_json(None, &code);
        let hash = provider.send_transaction(transaction).await?;
        info!("{} creation transaction sent: 0x{:x}", self.contract_name(), hash);

        let receipt = self.synchronizer(provider)?.wait_for_receipt(hash).await?;
        let address = receipt.contract_address.ok_or_else(|| {
            BindingError::Rpc(format!(
                "receipt for 0x{:x} carries no contract address",
                hash
            ))
        })?;

        info!("{} deployed at {}", self.contract_name(), address);
        self.instantiate(address, Some(hash))
    }

    /// Attaches to an existing deployment without contacting the node.
    pub fn at(&self, address: &str) -> Result<ContractBinding> {
        self.provider()?;
        let address = utils::validate_address(address)?;
        debug!("{} attached at {}", self.contract_name(), address);
        self.instantiate(address, None)
    }

    /// Attaches to the address recorded for the connected network.
    pub async fn deployed(&mut self) -> Result<ContractBinding> {
        self.resolve_network().await?;
        let address = self
            .active_record()?
            .address
            .ok_or_else(|| BindingError::NotDeployed {
                contract: self.contract_name().to_string(),
            })?;
        self.instantiate(address, None)
    }

    fn instantiate(&self, address: Address, transaction_hash: Option<B256>) -> Result<ContractBinding> {
        let provider = self.provider()?.clone();
        let record = self.active_record()?;
        Ok(ContractBinding::new(BindingContext {
            contract_name: self.contract_name().to_string(),
            address,
            transaction_hash,
            network_id: self.network_id.clone(),
            abi: record.abi.clone(),
            events: record.events.clone(),
            synchronizer: self.synchronizer(provider.clone())?,
            provider,
            config: self.config.clone(),
        }))
    }

    fn synchronizer(&self, provider: SharedProvider) -> Result<Synchronizer> {
        Ok(Synchronizer::new(
            provider,
            self.clock.clone(),
            self.config.synchronization_timeout_ms,
        ))
    }

    fn provider(&self) -> Result<&SharedProvider> {
        self.provider
            .as_ref()
            .ok_or_else(|| BindingError::ProviderNotConfigured {
                contract: self.contract_name().to_string(),
            })
    }

    fn active_record(&self) -> Result<&DeploymentRecord> {
        let missing = self.missing_record();
        self.record.as_ref().ok_or(missing)
    }

    fn active_record_mut(&mut self) -> Result<&mut DeploymentRecord> {
        let missing = self.missing_record();
        self.record.as_mut().ok_or(missing)
    }

    fn missing_record(&self) -> BindingError {
        self.network_not_found(self.network_id.as_deref().unwrap_or("default"))
    }

    fn network_not_found(&self, network_id: &str) -> BindingError {
        BindingError::NetworkNotFound {
            contract: self.contract_name().to_string(),
            network_id: network_id.to_string(),
        }
    }
}

/// Copies a record for use. The event table is completed from the interface,
/// with entries shipped in the artifact taking precedence.
fn activate(record: &DeploymentRecord) -> DeploymentRecord {
    let mut record = record.clone();
    let mut events = EventTable::from_interface(&record.abi);
    events.merge(&record.events);
    record.events = events;
    record
}

#[derive(Debug)]
struct BindingContext {
    contract_name: String,
    address: Address,
    transaction_hash: Option<B256>,
    network_id: Option<String>,
    abi: InterfaceDescriptor,
    events: EventTable,
    provider: SharedProvider,
    synchronizer: Synchronizer,
    config: BindingConfig,
}

#[derive(Debug, Clone)]
enum Member {
    Function { function: Function, constant: bool },
    Event(Event),
}

/// A contract at a fixed address with one member per interface entry.
#[derive(Debug, Clone)]
pub struct ContractBinding {
    context: Arc<BindingContext>,
    members: Arc<HashMap<String, Member>>,
}

impl ContractBinding {
    fn new(context: BindingContext) -> Self {
        let mut members = HashMap::new();
        for entry in context.abi.entries() {
            match entry {
                InterfaceEntry::Function { function, constant } => {
                    members.insert(
                        function.name.clone(),
                        Member::Function {
                            function: function.clone(),
                            constant: *constant,
                        },
                    );
                }
                InterfaceEntry::Event(event) => {
                    members.insert(event.name.clone(), Member::Event(event.clone()));
                }
                InterfaceEntry::Constructor(_) | InterfaceEntry::Other(_) => {}
            }
        }

        Self {
            context: Arc::new(context),
            members: Arc::new(members),
        }
    }

    pub fn address(&self) -> Address {
        self.context.address
    }

    /// Hash of the creation transaction when this binding came from a deploy.
    pub fn transaction_hash(&self) -> Option<B256> {
        self.context.transaction_hash
    }

    pub fn contract_name(&self) -> &str {
        &self.context.contract_name
    }

    pub fn network_id(&self) -> Option<&str> {
        self.context.network_id.as_deref()
    }

    pub fn abi(&self) -> &InterfaceDescriptor {
        &self.context.abi
    }

    pub fn events(&self) -> &EventTable {
        &self.context.events
    }

    pub fn config(&self) -> &BindingConfig {
        &self.context.config
    }

    pub fn member_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.members.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn function(&self, name: &str) -> Result<ContractFunction<'_>> {
        match self.members.get(name) {
            Some(Member::Function { function, constant }) => Ok(ContractFunction {
                binding: self,
                function,
                constant: *constant,
            }),
            _ => Err(self.unknown_member(name)),
        }
    }

    pub fn event(&self, name: &str) -> Result<ContractEvent<'_>> {
        match self.members.get(name) {
            Some(Member::Event(event)) => Ok(ContractEvent {
                binding: self,
                event,
            }),
            _ => Err(self.unknown_member(name)),
        }
    }

    /// Shorthand for `function(name)?.invoke(args)`.
    pub async fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Invocation> {
        self.function(name)?.invoke(args).await
    }

    /// Filter matching every log emitted by this contract.
    pub fn all_events(&self) -> Filter {
        Filter::new().address(self.address())
    }

    /// Fetches and decodes this contract's logs in a block range. Logs with
    /// unknown signatures are skipped.
    pub async fn all_event_logs(&self, from_block: u64, to_block: Option<u64>) -> Result<Vec<DecodedLog>> {
        let filter = with_range(self.all_events(), from_block, to_block);
        let logs = self.context.provider.logs(&filter).await?;
        Ok(codec::decode_logs(self.events(), &logs))
    }

    fn unknown_member(&self, name: &str) -> BindingError {
        BindingError::UnknownMember {
            contract: self.contract_name().to_string(),
            name: name.to_string(),
        }
    }
}

fn with_range(filter: Filter, from_block: u64, to_block: Option<u64>) -> Filter {
    let filter = filter.from_block(from_block);
    match to_block {
        Some(to_block) => filter.to_block(to_block),
        None => filter,
    }
}

/// A JSON-RPC request prepared but not sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    pub params: Vec<Value>,
}

/// One function of a bound contract.
#[derive(Debug, Clone, Copy)]
pub struct ContractFunction<'a> {
    binding: &'a ContractBinding,
    function: &'a Function,
    constant: bool,
}

impl<'a> ContractFunction<'a> {
    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn abi(&self) -> &Function {
        self.function
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// Reads resolve to the decoded return value; writes resolve once the
    /// transaction is mined.
    pub async fn invoke(&self, args: Vec<Value>) -> Result<Invocation> {
        if self.constant {
            self.call(args).await.map(Invocation::Value)
        } else {
            self.transact(args).await.map(Invocation::Transaction)
        }
    }

    /// `eth_call`, whatever the function's mutability.
    pub async fn call(&self, args: Vec<Value>) -> Result<Value> {
        let transaction = self.prepare(args)?;
        debug!("eth_call {}.{}", self.binding.contract_name(), self.name());
        let output = self.binding.context.provider.call(transaction).await?;
        codec::decode_function_result(self.function, &output)
    }

    /// Submits the transaction and returns its hash without waiting.
    pub async fn send_transaction(&self, args: Vec<Value>) -> Result<B256> {
        let transaction = self.prepare(args)?;
        let hash = self
            .binding
            .context
            .provider
            .send_transaction(transaction)
            .await?;
        debug!(
            "{}.{} submitted as 0x{:x}",
            self.binding.contract_name(),
            self.name(),
            hash
        );
        Ok(hash)
    }

    /// Submits the transaction and waits for its receipt.
    pub async fn transact(&self, args: Vec<Value>) -> Result<TransactionOutcome> {
        let hash = self.send_transaction(args).await?;
        let context = &self.binding.context;
        let receipt = context.synchronizer.wait_for_receipt(hash).await?;

        if !context.config.extended_results {
            return Ok(TransactionOutcome::Hash(hash));
        }

        let logs = codec::decode_logs(&context.events, &receipt.logs);
        Ok(TransactionOutcome::Extended(TransactionResult {
            tx: hash,
            receipt,
            logs,
        }))
    }

    pub async fn estimate_gas(&self, args: Vec<Value>) -> Result<u64> {
        let transaction = self.prepare(args)?;
        self.binding.context.provider.estimate_gas(transaction).await
    }

    /// The request `invoke` would dispatch first, for batching by the caller.
    pub fn request(&self, args: Vec<Value>) -> Result<RpcRequest> {
        let transaction = self.prepare(args)?;
        let (method, params) = if self.constant {
            ("eth_call", vec![transaction, Value::String("latest".to_string())])
        } else {
            ("eth_sendTransaction", vec![transaction])
        };
        Ok(RpcRequest {
            method: method.to_string(),
            params,
        })
    }

    fn prepare(&self, args: Vec<Value>) -> Result<Value> {
        let (args, call_options) = options::split_trailing_options(args)?;
        let tx_options = self.binding.config().defaults.merge(&call_options);
        let calldata = codec::encode_function_call(self.function, &args)?;
        Ok(tx_options.to_transaction_json(Some(self.binding.address()), &calldata))
    }
}

/// One event of a bound contract.
#[derive(Debug, Clone, Copy)]
pub struct ContractEvent<'a> {
    binding: &'a ContractBinding,
    event: &'a Event,
}

impl<'a> ContractEvent<'a> {
    pub fn name(&self) -> &str {
        &self.event.name
    }

    pub fn abi(&self) -> &Event {
        self.event
    }

    pub fn topic(&self) -> B256 {
        self.event.selector()
    }

    /// Filter for this event at the binding's address, ready for
    /// `eth_getLogs` or a subscription.
    pub fn filter(&self) -> Filter {
        Filter::new()
            .address(self.binding.address())
            .event_signature(self.topic())
    }

    pub async fn logs(&self, from_block: u64, to_block: Option<u64>) -> Result<Vec<DecodedLog>> {
        let filter = with_range(self.filter(), from_block, to_block);
        let logs = self.binding.context.provider.logs(&filter).await?;

        let mut table = EventTable::default();
        table.insert(self.topic(), self.event.clone());
        Ok(codec::decode_logs(&table, &logs))
    }
}
