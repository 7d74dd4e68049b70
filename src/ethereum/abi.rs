use alloy::json_abi::{Function, StateMutability};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

use crate::error::InvocationError;

/// Whether calling a function needs a signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    Read,
    Write,
}

impl From<StateMutability> for Mutability {
    fn from(state: StateMutability) -> Self {
        match state {
            StateMutability::View | StateMutability::Pure => Mutability::Read,
            StateMutability::NonPayable | StateMutability::Payable => Mutability::Write,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputDescriptor {
    /// Key under which the operator's value is stored.
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// One callable entry of the ABI.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub mutability: Mutability,
    pub inputs: Vec<InputDescriptor>,
    pub(crate) function: Function,
}

impl FunctionDescriptor {
    fn from_function(function: Function) -> Self {
        let inputs = function
            .inputs
            .iter()
            .enumerate()
            .map(|(i, param)| InputDescriptor {
                name: if param.name.is_empty() {
                    format!("arg{}", i)
                } else {
                    param.name.clone()
                },
                ty: param.selector_type().into_owned(),
            })
            .collect();

        Self {
            name: function.name.clone(),
            mutability: function.state_mutability.into(),
            inputs,
            function,
        }
    }

    pub fn is_read(&self) -> bool {
        self.mutability == Mutability::Read
    }

    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        self.function.signature()
    }
}

/// The callable functions of one ABI, in source order.
#[derive(Debug, Clone, Default)]
pub struct AbiCatalog {
    functions: Vec<FunctionDescriptor>,
}

impl AbiCatalog {
    /// Parse ABI JSON text. Non-function entries are skipped; duplicate
    /// function names are rejected.
    pub fn parse(abi_text: &str) -> Result<Self, InvocationError> {
        let parsed: Value = serde_json::from_str(abi_text)
            .map_err(|e| InvocationError::MalformedAbi(format!("invalid JSON: {}", e)))?;

        let entries = parsed
            .as_array()
            .ok_or_else(|| InvocationError::MalformedAbi("ABI must be a JSON array".to_string()))?;

        let mut functions = Vec::new();
        let mut seen = HashSet::new();

        for (index, entry) in entries.iter().enumerate() {
            let Some(fields) = entry.as_object() else {
                return Err(InvocationError::MalformedAbi(format!(
                    "entry #{} is not an object",
                    index
                )));
            };
            if fields.get("type").and_then(Value::as_str) != Some("function") {
                continue;
            }

            let function: Function = serde_json::from_value(with_defaults(fields)).map_err(|e| {
                InvocationError::MalformedAbi(format!("entry #{}: {}", index, e))
            })?;

            if !seen.insert(function.name.clone()) {
                return Err(InvocationError::MalformedAbi(format!(
                    "duplicate function name '{}'",
                    function.name
                )));
            }

            functions.push(FunctionDescriptor::from_function(function));
        }

        debug!("Parsed ABI with {} callable functions", functions.len());
        Ok(Self { functions })
    }

    pub fn list_readable(&self) -> Vec<&FunctionDescriptor> {
        self.functions.iter().filter(|f| f.is_read()).collect()
    }

    pub fn list_writable(&self) -> Vec<&FunctionDescriptor> {
        self.functions.iter().filter(|f| !f.is_read()).collect()
    }

    pub fn describe(&self, name: &str) -> Result<&FunctionDescriptor, InvocationError> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| InvocationError::UnknownFunction(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Hand-written ABIs often leave out `outputs`, `inputs` or the mutability.
/// Absent lists are empty and an absent mutability means a write.
fn with_defaults(fields: &Map<String, Value>) -> Value {
    let mut fields = fields.clone();
    fields.entry("inputs").or_insert_with(|| Value::Array(Vec::new()));
    fields.entry("outputs").or_insert_with(|| Value::Array(Vec::new()));
    let legacy = fields.contains_key("constant") || fields.contains_key("payable");
    if !legacy {
        fields
            .entry("stateMutability")
            .or_insert_with(|| Value::String("nonpayable".to_string()));
    }
    Value::Object(fields)
}
