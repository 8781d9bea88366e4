use alloy::primitives::{Address, Bytes, I256, U256};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{BindingError, Result};

/// Transaction parameters accepted by every contract call.
///
/// Numeric fields accept JSON numbers, decimal strings, `0x` hex strings and
/// serialized big-number objects. Unknown keys are kept in `extra` and handed
/// to the provider untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_quantity"
    )]
    pub gas: Option<U256>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_quantity"
    )]
    pub gas_price: Option<U256>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_quantity"
    )]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(U256::from(gas));
        self
    }

    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Per-key overwrite: keys set in `overrides` win, everything else keeps
    /// the value from `self`.
    pub fn merge(&self, overrides: &CallOptions) -> CallOptions {
        let mut extra = self.extra.clone();
        extra.extend(
            overrides
                .extra
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        CallOptions {
            from: overrides.from.or(self.from),
            gas: overrides.gas.or(self.gas),
            gas_price: overrides.gas_price.or(self.gas_price),
            value: overrides.value.or(self.value),
            data: overrides.data.clone().or_else(|| self.data.clone()),
            extra,
        }
    }

    /// Parses an options object taken from the argument list.
    pub fn from_json(object: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(object))
            .map_err(|e| BindingError::InvalidArguments(format!("bad transaction options: {}", e)))
    }

    /// Builds the JSON transaction object sent to the node. `data` replaces
    /// any `data` key from the options.
    pub fn to_transaction_json(&self, to: Option<Address>, data: &Bytes) -> Value {
        let mut object = match serde_json::to_value(self) {
            Ok(Value::Object(object)) => object,
            _ => Map::new(),
        };
        if let Some(to) = to {
            object.insert("to".to_string(), Value::String(to.to_string()));
        }
        object.insert(
            "data".to_string(),
            Value::String(format!("0x{}", hex::encode(data))),
        );
        Value::Object(object)
    }
}

fn deserialize_quantity<'de, D>(deserializer: D) -> std::result::Result<Option<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    parse_u256(&value).map(Some).map_err(serde::de::Error::custom)
}

/// Splits a trailing options object off the positional arguments.
///
/// The last argument counts as options only when it is a JSON object that
/// does not construct a big number.
pub fn split_trailing_options(mut args: Vec<Value>) -> Result<(Vec<Value>, CallOptions)> {
    let is_options = matches!(args.last(), Some(last @ Value::Object(_)) if !is_big_number(last));
    if is_options {
        if let Some(Value::Object(object)) = args.pop() {
            return Ok((args, CallOptions::from_json(object)?));
        }
    }
    Ok((args, CallOptions::default()))
}

/// True for objects that a big-number library would accept: ethers-style
/// `{"_hex": ..}` / `{"type": "BigNumber", "hex": ..}` and the bignumber.js
/// `{"s", "e", "c"}` layout.
pub fn is_big_number(value: &Value) -> bool {
    let Value::Object(map) = value else {
        return false;
    };
    if hex_field(map).is_some() {
        return true;
    }
    bignumber_js_parts(map).is_some()
}

fn hex_field(map: &Map<String, Value>) -> Option<&str> {
    if let Some(Value::String(hex)) = map.get("_hex") {
        return Some(hex);
    }
    match (map.get("type"), map.get("hex")) {
        (Some(Value::String(ty)), Some(Value::String(hex))) if ty == "BigNumber" => Some(hex),
        _ => None,
    }
}

fn bignumber_js_parts(map: &Map<String, Value>) -> Option<(i64, i64, &[Value])> {
    if map.len() != 3 {
        return None;
    }
    let sign = map.get("s")?.as_i64().filter(|s| *s == 1 || *s == -1)?;
    let exponent = map.get("e")?.as_i64()?;
    let limbs = map.get("c")?.as_array()?;
    let valid = !limbs.is_empty()
        && limbs
            .iter()
            .all(|limb| limb.as_u64().is_some_and(|l| l < 100_000_000_000_000));
    valid.then_some((sign, exponent, limbs.as_slice()))
}

/// Decimal digits in `U256::MAX`.
const MAX_DECIMAL_DIGITS: usize = 78;

/// Rebuilds the integer held by a bignumber.js object.
fn bignumber_js_decimal(sign: i64, exponent: i64, limbs: &[Value]) -> std::result::Result<String, String> {
    let mut digits = String::new();
    for (i, limb) in limbs.iter().enumerate() {
        let limb = limb
            .as_u64()
            .ok_or_else(|| format!("invalid bignumber limb {}", limb))?;
        if i == 0 {
            digits.push_str(&limb.to_string());
        } else {
            digits.push_str(&format!("{:014}", limb));
        }
    }

    let significant = digits.trim_end_matches('0');
    if significant.is_empty() {
        return Ok("0".to_string());
    }

    let shift = exponent
        .checked_add(1)
        .and_then(|e| e.checked_sub(significant.len() as i64))
        .ok_or_else(|| format!("bignumber exponent {} out of range", exponent))?;
    if shift < 0 {
        return Err(format!("bignumber with exponent {} is not an integer", exponent));
    }

    let shift = usize::try_from(shift)
        .ok()
        .filter(|shift| significant.len().saturating_add(*shift) <= MAX_DECIMAL_DIGITS)
        .ok_or_else(|| format!("bignumber exponent {} out of range", exponent))?;

    let mut decimal = String::with_capacity(significant.len() + shift + 1);
    if sign < 0 {
        decimal.push('-');
    }
    decimal.push_str(significant);
    decimal.extend(std::iter::repeat('0').take(shift));
    Ok(decimal)
}

/// Normalizes any numeric JSON representation into a decimal or hex string.
fn numeral(value: &Value) -> std::result::Result<String, String> {
    match value {
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Ok(n.to_string())
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.is_finite() => Ok(format!("{:.0}", f)),
                    _ => Err(format!("{} is not an integer", n)),
                }
            }
        }
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Object(map) => {
            if let Some(hex) = hex_field(map) {
                return Ok(hex.to_string());
            }
            let (sign, exponent, limbs) = bignumber_js_parts(map)
                .ok_or_else(|| format!("{} is not a number", value))?;
            bignumber_js_decimal(sign, exponent, limbs)
        }
        other => Err(format!("{} is not a number", other)),
    }
}

pub fn parse_u256(value: &Value) -> std::result::Result<U256, String> {
    let text = numeral(value)?;
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(&text, 10),
    };
    parsed.map_err(|_| format!("invalid unsigned integer: '{}'", text))
}

pub fn parse_i256(value: &Value) -> std::result::Result<I256, String> {
    let text = numeral(value)?;
    let unsigned = text.trim_start_matches('-');
    let parsed = if unsigned.starts_with("0x") || unsigned.starts_with("0X") {
        I256::from_hex_str(&text)
    } else {
        I256::from_dec_str(&text)
    };
    parsed.map_err(|_| format!("invalid signed integer: '{}'", text))
}
