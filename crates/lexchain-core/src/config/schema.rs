//! Structural checks for chain configs.
//!
//! The YAML document is converted to JSON and checked against
//! schema/chain-config.schema.json before serde sees it, so a typo in a key
//! is reported with its path instead of being silently defaulted.

use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

const CHAIN_CONFIG_SCHEMA: &str = include_str!("../../schema/chain-config.schema.json");

static VALIDATOR: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Chain config schema unusable: {0}")]
    LoadError(String),
}

fn compile() -> Result<jsonschema::Validator, String> {
    let schema: Value = serde_json::from_str(CHAIN_CONFIG_SCHEMA)
        .map_err(|e| format!("schema is not JSON: {}", e))?;
    jsonschema::options()
        .build(&schema)
        .map_err(|e| format!("schema does not compile: {}", e))
}

fn validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    VALIDATOR
        .get_or_init(compile)
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

/// Every schema violation in `config`, as `"<message> at <path>"`.
pub fn validate_config_schema(config: &Value) -> Result<(), Vec<String>> {
    let validator = validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(config)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
