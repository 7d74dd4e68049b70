use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier, Word},
    primitives::{utils::parse_ether, Address, Bytes, U256},
};
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

use super::{abi::FunctionDescriptor, InputValues};
use crate::error::InvocationError;

/// A read call: the function name plus positional arguments, still raw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadInvocation {
    pub function: String,
    pub args: Vec<String>,
}

/// Call data and attached value for a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePayload {
    pub data: Bytes,
    pub value: U256,
}

/// Arguments in declaration order. A field the operator never touched
/// becomes an empty string.
pub fn ordered_args(descriptor: &FunctionDescriptor, inputs: &InputValues) -> Vec<String> {
    descriptor
        .inputs
        .iter()
        .map(|input| inputs.get(&input.name).cloned().unwrap_or_default())
        .collect()
}

pub fn encode_read(descriptor: &FunctionDescriptor, inputs: &InputValues) -> ReadInvocation {
    ReadInvocation {
        function: descriptor.name.clone(),
        args: ordered_args(descriptor, inputs),
    }
}

pub fn encode_write(
    descriptor: &FunctionDescriptor,
    args: &[String],
    ether_value: Option<&str>,
) -> Result<WritePayload, InvocationError> {
    let data = encode_calldata(descriptor, args)?;
    let value = parse_ether_value(ether_value.unwrap_or("0"))?;
    Ok(WritePayload { data, value })
}

/// Selector plus ABI-encoded arguments.
pub fn encode_calldata(
    descriptor: &FunctionDescriptor,
    args: &[String],
) -> Result<Bytes, InvocationError> {
    let function = &descriptor.function;

    if args.len() != function.inputs.len() {
        return Err(InvocationError::EncodingError(format!(
            "'{}' expects {} arguments, got {}",
            descriptor.signature(),
            function.inputs.len(),
            args.len()
        )));
    }

    let mut values = Vec::with_capacity(args.len());
    for (i, (param, raw)) in function.inputs.iter().zip(args).enumerate() {
        let ty = param.resolve().map_err(|e| {
            InvocationError::EncodingError(format!("unsupported type '{}': {}", param.ty, e))
        })?;
        let value = coerce(&ty, raw).map_err(|e| {
            InvocationError::EncodingError(format!(
                "argument #{} ('{}' of type '{}'): {}",
                i + 1,
                descriptor.inputs[i].name,
                param.selector_type(),
                e
            ))
        })?;
        values.push(value);
    }

    let encoded = function
        .abi_encode_input(&values)
        .map_err(|e| InvocationError::EncodingError(e.to_string()))?;

    Ok(encoded.into())
}

/// Decimal ether amount to wei. Blank means zero.
pub fn parse_ether_value(ether: &str) -> Result<U256, InvocationError> {
    let ether = ether.trim();
    if ether.is_empty() {
        return Ok(U256::ZERO);
    }
    parse_ether(ether)
        .map_err(|e| InvocationError::EncodingError(format!("invalid ether value '{}': {}", ether, e)))
}

fn coerce(ty: &DynSolType, raw: &str) -> Result<DynSolValue, String> {
    let trimmed = raw.trim();
    match ty {
        DynSolType::Address => Address::from_str(trimmed)
            .map(DynSolValue::Address)
            .map_err(|e| format!("invalid address '{}': {}", trimmed, e)),
        DynSolType::Uint(bits) => {
            let num = parse_uint(trimmed)?;
            if num.bit_len() > *bits {
                return Err(format!("{} does not fit in uint{}", trimmed, bits));
            }
            Ok(DynSolValue::Uint(num, *bits))
        }
        DynSolType::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(DynSolValue::Bool(true)),
            "false" | "0" => Ok(DynSolValue::Bool(false)),
            _ => Err(format!("invalid bool '{}'", trimmed)),
        },
        DynSolType::String => Ok(DynSolValue::String(raw.to_string())),
        DynSolType::Bytes => decode_hex(trimmed).map(DynSolValue::Bytes),
        DynSolType::FixedBytes(size) => {
            let bytes = decode_hex(trimmed)?;
            if bytes.len() != *size {
                return Err(format!("expected {} bytes, got {}", size, bytes.len()));
            }
            let mut word = [0u8; 32];
            word[..*size].copy_from_slice(&bytes);
            Ok(DynSolValue::FixedBytes(Word::from(word), *size))
        }
        DynSolType::Array(inner) => {
            let items = split_array(trimmed)?;
            items
                .iter()
                .map(|item| coerce(inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::Array)
        }
        DynSolType::FixedArray(inner, len) => {
            let items = split_array(trimmed)?;
            if items.len() != *len {
                return Err(format!("expected {} elements, got {}", len, items.len()));
            }
            items
                .iter()
                .map(|item| coerce(inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::FixedArray)
        }
        // signed integers, tuples
        other => other.coerce_str(trimmed).map_err(|e| e.to_string()),
    }
}

fn parse_uint(s: &str) -> Result<U256, String> {
    if s.is_empty() {
        return Err("value is empty".to_string());
    }
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(s, 10),
    };
    parsed.map_err(|_| format!("invalid unsigned integer '{}'", s))
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|_| format!("invalid hex string '{}'", s))
}

/// Array fields are entered as JSON arrays; elements are handed back as raw
/// strings so they go through the element type's coercion.
fn split_array(s: &str) -> Result<Vec<String>, String> {
    let parsed: Value =
        serde_json::from_str(s).map_err(|_| format!("expected a JSON array, got '{}'", s))?;
    let items = parsed
        .as_array()
        .ok_or_else(|| format!("expected a JSON array, got '{}'", s))?;
    Ok(items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::abi::AbiCatalog;

    const ABI: &str = r#"[
        {"type":"function","name":"balanceOf","stateMutability":"view",
         "inputs":[{"name":"who","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
        {"type":"function","name":"transfer","stateMutability":"nonpayable",
         "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
         "outputs":[{"name":"","type":"bool"}]},
        {"type":"function","name":"configure","stateMutability":"nonpayable",
         "inputs":[{"name":"small","type":"uint8"},{"name":"flag","type":"bool"},
                   {"name":"tag","type":"bytes4"},{"name":"ids","type":"uint256[]"},
                   {"name":"delta","type":"int256"}],"outputs":[]}
    ]"#;

    const RECIPIENT: &str = "0x1111111111111111111111111111111111111111";

    fn catalog() -> AbiCatalog {
        AbiCatalog::parse(ABI).unwrap()
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_encode_read_orders_by_declaration_and_defaults_missing() {
        let catalog = catalog();
        let transfer = catalog.describe("transfer").unwrap();

        let mut inputs = InputValues::new();
        inputs.insert("amount".into(), "5".into());
        inputs.insert("stale".into(), "ignored".into());

        let invocation = encode_read(transfer, &inputs);
        assert_eq!(invocation.function, "transfer");
        assert_eq!(invocation.args, vec!["".to_string(), "5".to_string()]);
    }

    #[test]
    fn test_encode_write_transfer() {
        let catalog = catalog();
        let transfer = catalog.describe("transfer").unwrap();

        let payload = encode_write(transfer, &args(&[RECIPIENT, "1000"]), None).unwrap();

        let expected = format!(
            "a9059cbb{}{}{:0>64}",
            "000000000000000000000000",
            &RECIPIENT[2..],
            "3e8"
        );
        assert_eq!(hex::encode(&payload.data), expected);
        assert_eq!(payload.value, U256::ZERO);
    }

    #[test]
    fn test_encode_write_is_deterministic() {
        let catalog = catalog();
        let transfer = catalog.describe("transfer").unwrap();
        let call_args = args(&[RECIPIENT, "0x10"]);

        let first = encode_write(transfer, &call_args, Some("0.5")).unwrap();
        let second = encode_write(transfer, &call_args, Some("0.5")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ether_value_scaling() {
        assert_eq!(
            parse_ether_value("0.001").unwrap(),
            U256::from(1_000_000_000_000_000u64)
        );
        assert_eq!(
            parse_ether_value("2").unwrap(),
            U256::from(2_000_000_000_000_000_000u128)
        );
        assert_eq!(parse_ether_value("").unwrap(), U256::ZERO);
        assert!(matches!(
            parse_ether_value("lots"),
            Err(InvocationError::EncodingError(_))
        ));
    }

    #[test]
    fn test_argument_count_mismatch() {
        let catalog = catalog();
        let transfer = catalog.describe("transfer").unwrap();

        let err = encode_write(transfer, &args(&[RECIPIENT]), None).unwrap_err();
        assert_eq!(
            err,
            InvocationError::EncodingError(
                "'transfer(address,uint256)' expects 2 arguments, got 1".to_string()
            )
        );
    }

    #[test]
    fn test_rejects_uncoercible_values() {
        let catalog = catalog();
        let transfer = catalog.describe("transfer").unwrap();
        let configure = catalog.describe("configure").unwrap();

        let cases = [
            (transfer, args(&["0xABC", "1"])),
            (transfer, args(&[RECIPIENT, "ten"])),
            (transfer, args(&[RECIPIENT, ""])),
            (configure, args(&["256", "true", "0x01020304", "[]", "0"])),
            (configure, args(&["1", "maybe", "0x01020304", "[]", "0"])),
            (configure, args(&["1", "true", "0x0102", "[]", "0"])),
            (configure, args(&["1", "true", "0x01020304", "1,2", "0"])),
        ];

        for (descriptor, call_args) in cases {
            let result = encode_calldata(descriptor, &call_args);
            assert!(
                matches!(result, Err(InvocationError::EncodingError(_))),
                "expected encoding error for {:?}",
                call_args
            );
        }
    }

    #[test]
    fn test_mixed_types() {
        let catalog = catalog();
        let configure = catalog.describe("configure").unwrap();

        let data = encode_calldata(
            configure,
            &args(&["255", "TRUE", "0xdeadbeef", r#"[1, "0x02", "3"]"#, "-7"]),
        )
        .unwrap();

        // selector + 5 head words + array length + 3 elements
        assert_eq!(data.len(), 4 + 32 * 5 + 32 + 32 * 3);
        let word = |i: usize| &data[4 + 32 * i..4 + 32 * (i + 1)];
        assert_eq!(word(0)[31], 255);
        assert_eq!(word(1)[31], 1);
        assert_eq!(&word(2)[..4], &[0xde, 0xad, 0xbe, 0xef]);
        assert!(word(4).iter().take(31).all(|b| *b == 0xff));
    }
}
