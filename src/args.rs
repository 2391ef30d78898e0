//! `key=value` command arguments
//!
//! Values are read as JSON first (`power=-40`, `persistent=true`,
//! `ports=[1,2]`, `text="hi there"`); anything that does not parse is taken
//! as a plain string (`file=./logo.rgf`).

use cwc_robots::Params;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ArgError {
    #[error("Expected key=value, got '{0}'")]
    MissingSeparator(String),

    #[error("Empty parameter name in '{0}'")]
    EmptyKey(String),
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Build command parameters from `key=value` pairs; later keys win
pub fn parse_params<S: AsRef<str>>(pairs: &[S]) -> Result<Params, ArgError> {
    let mut params = Params::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ArgError::MissingSeparator(pair.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ArgError::EmptyKey(pair.to_string()));
        }
        params.insert(key, parse_value(value.trim()));
    }
    Ok(params)
}
