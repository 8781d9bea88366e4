use alloy::{
    dyn_abi::{DynSolType, DynSolValue, EventExt, FunctionExt, JsonAbiExt, Specifier, Word},
    json_abi::{Constructor, Event, Function},
    primitives::{Address, Bytes},
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{artifact::EventTable, options, DecodedLog, RawLog};
use crate::error::{BindingError, Result};

/// ABI-encodes `args` as a call to `function`, selector included.
pub fn encode_function_call(function: &Function, args: &[Value]) -> Result<Bytes> {
    let values = arguments_to_values(&function.name, &function.inputs, args)?;
    let encoded = function
        .abi_encode_input(&values)
        .map_err(|e| BindingError::Abi(format!("Failed to encode function inputs: {}", e)))?;
    Ok(encoded.into())
}

/// ABI-encodes constructor arguments, to be appended to the creation bytecode.
pub fn encode_constructor_args(constructor: Option<&Constructor>, args: &[Value]) -> Result<Vec<u8>> {
    match constructor {
        Some(constructor) => {
            let values = arguments_to_values("constructor", &constructor.inputs, args)?;
            constructor
                .abi_encode_input(&values)
                .map_err(|e| BindingError::Abi(format!("Failed to encode constructor inputs: {}", e)))
        }
        None if args.is_empty() => Ok(Vec::new()),
        None => Err(BindingError::InvalidArguments(format!(
            "contract has no constructor but {} arguments were given",
            args.len()
        ))),
    }
}

fn arguments_to_values(
    name: &str,
    inputs: &[alloy::json_abi::Param],
    args: &[Value],
) -> Result<Vec<DynSolValue>> {
    if args.len() != inputs.len() {
        let expected_params: Vec<String> = inputs
            .iter()
            .map(|input| format!("{} {}", input.ty, input.name))
            .collect();

        return Err(BindingError::InvalidArguments(format!(
            "Parameter count mismatch for '{}': expected {} parameters, got {}. Expected parameters: [{}]",
            name,
            inputs.len(),
            args.len(),
            expected_params.join(", ")
        )));
    }

    inputs
        .iter()
        .zip(args)
        .enumerate()
        .map(|(i, (input, arg))| {
            let ty = input
                .resolve()
                .map_err(|e| BindingError::Abi(format!("Unsupported parameter type '{}': {}", input.ty, e)))?;
            json_to_dyn_sol_value(arg, &ty).map_err(|e| {
                BindingError::InvalidArguments(format!(
                    "Invalid parameter #{} ('{}' of type '{}'): {}",
                    i + 1,
                    input.name,
                    input.ty,
                    e
                ))
            })
        })
        .collect()
}

/// Decodes the return data of `function`. One output decodes to a scalar,
/// several to an array, none to `null`.
pub fn decode_function_result(function: &Function, result_bytes: &Bytes) -> Result<Value> {
    if result_bytes.is_empty() {
        return Ok(Value::Null);
    }

    let decoded = function
        .abi_decode_output(result_bytes, false)
        .map_err(|e| BindingError::Abi(format!("Failed to decode output: {}", e)))?;

    dyn_sol_values_to_json(&decoded)
}

/// Convert JSON value to DynSolValue based on expected Solidity type
pub fn json_to_dyn_sol_value(value: &Value, sol_type: &DynSolType) -> std::result::Result<DynSolValue, String> {
    match sol_type {
        DynSolType::Address => {
            let addr_str = value.as_str().ok_or("Address must be a string")?;
            let address: Address = addr_str
                .parse()
                .map_err(|e| format!("Invalid address '{}': {}", addr_str, e))?;
            Ok(DynSolValue::Address(address))
        }
        DynSolType::Uint(bits) => Ok(DynSolValue::Uint(options::parse_u256(value)?, *bits)),
        DynSolType::Int(bits) => Ok(DynSolValue::Int(options::parse_i256(value)?, *bits)),
        DynSolType::Bool => value
            .as_bool()
            .map(DynSolValue::Bool)
            .ok_or_else(|| "Bool parameter must be a boolean".to_string()),
        DynSolType::String => value
            .as_str()
            .map(|s| DynSolValue::String(s.to_string()))
            .ok_or_else(|| "String parameter must be a string".to_string()),
        DynSolType::FixedBytes(size) => {
            let bytes = hex_argument(value)?;
            if bytes.len() > *size {
                return Err(format!("expected at most {} bytes, got {}", size, bytes.len()));
            }
            let mut word_bytes = [0u8; 32];
            word_bytes[..bytes.len()].copy_from_slice(&bytes);
            Ok(DynSolValue::FixedBytes(Word::from(word_bytes), *size))
        }
        DynSolType::Bytes => Ok(DynSolValue::Bytes(hex_argument(value)?)),
        DynSolType::Array(element_type) => {
            let array = value.as_array().ok_or("Array parameter must be an array")?;
            array
                .iter()
                .map(|element| json_to_dyn_sol_value(element, element_type))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(DynSolValue::Array)
        }
        DynSolType::FixedArray(element_type, len) => {
            let array = value.as_array().ok_or("Array parameter must be an array")?;
            if array.len() != *len {
                return Err(format!("expected {} elements, got {}", len, array.len()));
            }
            array
                .iter()
                .map(|element| json_to_dyn_sol_value(element, element_type))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(DynSolValue::FixedArray)
        }
        DynSolType::Tuple(types) => {
            let array = value.as_array().ok_or("Tuple parameter must be an array")?;
            if array.len() != types.len() {
                return Err(format!("expected {} tuple fields, got {}", types.len(), array.len()));
            }
            array
                .iter()
                .zip(types)
                .map(|(element, ty)| json_to_dyn_sol_value(element, ty))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(DynSolValue::Tuple)
        }
        other => Err(format!("Unsupported Solidity type: {}", other)),
    }
}

fn hex_argument(value: &Value) -> std::result::Result<Vec<u8>, String> {
    let hex_str = value.as_str().ok_or("Bytes must be a hex string")?;
    hex::decode(hex_str.trim_start_matches("0x")).map_err(|_| format!("Invalid hex string: {}", hex_str))
}

/// Convert DynSolValue array to JSON
fn dyn_sol_values_to_json(values: &[DynSolValue]) -> Result<Value> {
    if values.len() == 1 {
        dyn_sol_value_to_json(&values[0])
    } else {
        values
            .iter()
            .map(dyn_sol_value_to_json)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }
}

/// Convert single DynSolValue to JSON
pub fn dyn_sol_value_to_json(value: &DynSolValue) -> Result<Value> {
    match value {
        DynSolValue::Address(addr) => Ok(Value::String(format!("0x{:x}", addr))),
        DynSolValue::Uint(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Int(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Bool(b) => Ok(Value::Bool(*b)),
        DynSolValue::String(s) => Ok(Value::String(s.clone())),
        DynSolValue::Bytes(bytes) => Ok(Value::String(format!("0x{}", hex::encode(bytes)))),
        DynSolValue::FixedBytes(bytes, size) => Ok(Value::String(format!(
            "0x{}",
            hex::encode(&bytes[..*size])
        ))),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => items
            .iter()
            .map(dyn_sol_value_to_json)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        _ => Err(BindingError::Abi(format!("Unsupported DynSolValue type: {:?}", value))),
    }
}

/// Decodes one log against a known event into named arguments.
pub fn decode_log(event: &Event, log: &RawLog) -> Result<DecodedLog> {
    let decoded = event
        .decode_log_parts(log.topics.iter().copied(), &log.data, false)
        .map_err(|e| BindingError::Abi(format!("Failed to decode {} log: {}", event.name, e)))?;

    let mut indexed = decoded.indexed.iter();
    let mut body = decoded.body.iter();
    let mut args = Map::new();
    for (position, input) in event.inputs.iter().enumerate() {
        let value = if input.indexed { indexed.next() } else { body.next() };
        let value = value.ok_or_else(|| {
            BindingError::Abi(format!("{} log is missing argument '{}'", event.name, input.name))
        })?;
        let key = if input.name.is_empty() {
            position.to_string()
        } else {
            input.name.clone()
        };
        args.insert(key, dyn_sol_value_to_json(value)?);
    }

    Ok(DecodedLog {
        event: event.name.clone(),
        address: log.address,
        args,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
    })
}

/// Decodes every log whose first topic is in `events`. Logs without a known
/// signature are dropped; the rest keep their receipt order.
pub fn decode_logs(events: &EventTable, logs: &[RawLog]) -> Vec<DecodedLog> {
    logs.iter()
        .filter_map(|log| {
            let Some(event) = log.topics.first().and_then(|topic| events.get(topic)) else {
                debug!("Skipping log from {} with unknown signature", log.address);
                return None;
            };
            match decode_log(event, log) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!("Dropping undecodable log: {}", e);
                    None
                }
            }
        })
        .collect()
}
