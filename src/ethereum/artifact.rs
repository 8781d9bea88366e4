use alloy::{
    json_abi::{Constructor, Event, Function, StateMutability},
    primitives::{Address, Bytes, B256},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{BindingError, Result};

/// One entry of the compiled interface.
#[derive(Debug, Clone)]
pub enum InterfaceEntry {
    Function { function: Function, constant: bool },
    Event(Event),
    Constructor(Constructor),
    Other(Value),
}

impl InterfaceEntry {
    fn from_json(value: &Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("function");

        match kind {
            "function" => {
                let function: Function = serde_json::from_value(value.clone())
                    .map_err(|e| BindingError::Artifact(format!("bad function entry: {}", e)))?;
                let legacy_constant = value.get("constant").and_then(Value::as_bool);
                let constant = legacy_constant.unwrap_or(matches!(
                    function.state_mutability,
                    StateMutability::Pure | StateMutability::View
                ));
                Ok(InterfaceEntry::Function { function, constant })
            }
            "event" => serde_json::from_value(value.clone())
                .map(InterfaceEntry::Event)
                .map_err(|e| BindingError::Artifact(format!("bad event entry: {}", e))),
            "constructor" => serde_json::from_value(value.clone())
                .map(InterfaceEntry::Constructor)
                .map_err(|e| BindingError::Artifact(format!("bad constructor entry: {}", e))),
            _ => Ok(InterfaceEntry::Other(value.clone())),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            InterfaceEntry::Function { function, .. } => Some(&function.name),
            InterfaceEntry::Event(event) => Some(&event.name),
            InterfaceEntry::Constructor(_) => None,
            InterfaceEntry::Other(value) => value.get("name").and_then(Value::as_str),
        }
    }
}

/// The contract ABI in declaration order.
#[derive(Debug, Clone, Default)]
pub struct InterfaceDescriptor {
    raw: Vec<Value>,
    entries: Vec<InterfaceEntry>,
}

impl InterfaceDescriptor {
    pub fn from_json(value: &Value) -> Result<Self> {
        let raw = value
            .as_array()
            .ok_or_else(|| BindingError::Artifact("abi must be a JSON array".to_string()))?
            .clone();
        let entries = raw
            .iter()
            .map(InterfaceEntry::from_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { raw, entries })
    }

    pub fn entries(&self) -> &[InterfaceEntry] {
        &self.entries
    }

    pub fn functions(&self) -> impl Iterator<Item = (&Function, bool)> {
        self.entries.iter().filter_map(|entry| match entry {
            InterfaceEntry::Function { function, constant } => Some((function, *constant)),
            _ => None,
        })
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter().filter_map(|entry| match entry {
            InterfaceEntry::Event(event) => Some(event),
            _ => None,
        })
    }

    pub fn constructor(&self) -> Option<&Constructor> {
        self.entries.iter().find_map(|entry| match entry {
            InterfaceEntry::Constructor(constructor) => Some(constructor),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for InterfaceDescriptor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InterfaceDescriptor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// Event ABIs keyed by their topic hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTable(BTreeMap<B256, Event>);

impl EventTable {
    /// Builds a table from every non-anonymous event in the interface.
    pub fn from_interface(interface: &InterfaceDescriptor) -> Self {
        Self(
            interface
                .events()
                .filter(|event| !event.anonymous)
                .map(|event| (event.selector(), event.clone()))
                .collect(),
        )
    }

    pub fn get(&self, topic: &B256) -> Option<&Event> {
        self.0.get(topic)
    }

    pub fn insert(&mut self, topic: B256, event: Event) {
        self.0.insert(topic, event);
    }

    pub fn merge(&mut self, other: &EventTable) {
        self.0
            .extend(other.0.iter().map(|(topic, event)| (*topic, event.clone())));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for EventTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let keyed: BTreeMap<String, &Event> = self
            .0
            .iter()
            .map(|(topic, event)| (format!("0x{:x}", topic), event))
            .collect();
        keyed.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EventTable {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let keyed = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let mut table = BTreeMap::new();
        for (topic, mut entry) in keyed {
            let topic = topic
                .parse::<B256>()
                .map_err(|e| serde::de::Error::custom(format!("bad topic '{}': {}", topic, e)))?;

            // older generators omit the flag
            if let Value::Object(fields) = &mut entry {
                fields
                    .entry("anonymous")
                    .or_insert(Value::Bool(false));
            }
            match serde_json::from_value::<Event>(entry) {
                Ok(event) => {
                    table.insert(topic, event);
                }
                Err(e) => warn!("Skipping event table entry 0x{:x}: {}", topic, e),
            }
        }
        Ok(Self(table))
    }
}

/// Everything known about the contract on one network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub abi: InterfaceDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlinked_binary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
    #[serde(default)]
    pub links: BTreeMap<String, Address>,
    #[serde(default)]
    pub events: EventTable,
}

impl DeploymentRecord {
    pub fn new(abi: InterfaceDescriptor) -> Self {
        let events = EventTable::from_interface(&abi);
        Self {
            abi,
            unlinked_binary: None,
            address: None,
            updated_at: None,
            links: BTreeMap::new(),
            events,
        }
    }

    pub fn with_binary(mut self, unlinked_binary: impl Into<String>) -> Self {
        self.unlinked_binary = Some(unlinked_binary.into());
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// The bytecode with every linked library substituted.
    pub fn binary(&self) -> Option<String> {
        self.unlinked_binary
            .as_deref()
            .map(|unlinked| link_bytecode(unlinked, &self.links))
    }
}

/// A compiled contract: its name plus one record per network id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub contract_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_with: Option<String>,
    pub networks: BTreeMap<String, DeploymentRecord>,
}

impl Artifact {
    pub fn new(contract_name: impl Into<String>) -> Self {
        Self {
            contract_name: contract_name.into(),
            generated_with: None,
            networks: BTreeMap::new(),
        }
    }

    pub fn with_network(mut self, network_id: impl Into<String>, record: DeploymentRecord) -> Self {
        self.networks.insert(network_id.into(), record);
        self
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let artifact: Artifact = serde_json::from_str(content)?;
        Ok(artifact)
    }

    /// Load an artifact from a JSON file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let artifact = Self::from_json_str(&content)
            .map_err(|e| BindingError::Artifact(format!("{:?}: {}", path, e)))?;
        debug!(
            "Loaded {} artifact from {:?} ({} networks)",
            artifact.contract_name,
            path,
            artifact.networks.len()
        );
        Ok(artifact)
    }

    /// Save the artifact as pretty-printed JSON
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    pub fn network_ids(&self) -> Vec<String> {
        self.networks.keys().cloned().collect()
    }

    pub fn record(&self, network_id: &str) -> Option<&DeploymentRecord> {
        self.networks.get(network_id)
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"__[^_]+_+").expect("placeholder pattern is valid"))
}

/// Names of the libraries still referenced by `__Name____` placeholders,
/// sorted and deduplicated.
pub fn unresolved_libraries(binary: &str) -> Vec<String> {
    placeholder_regex()
        .find_iter(binary)
        .map(|placeholder| placeholder.as_str().replace('_', ""))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Replaces each `__Name_*` placeholder with the linked address.
pub fn link_bytecode(unlinked: &str, links: &BTreeMap<String, Address>) -> String {
    links.iter().fold(unlinked.to_string(), |binary, (name, address)| {
        match Regex::new(&format!("__{}_*", regex::escape(name))) {
            Ok(pattern) => pattern
                .replace_all(&binary, hex::encode(address).as_str())
                .into_owned(),
            Err(_) => binary,
        }
    })
}

/// Decodes a fully linked hex bytecode string.
pub fn decode_bytecode(binary: &str) -> Result<Bytes> {
    let trimmed = binary.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(hex_part)
        .map(Bytes::from)
        .map_err(|e| BindingError::Artifact(format!("bytecode is not valid hex: {}", e)))
}
