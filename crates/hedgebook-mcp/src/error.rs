//! Error types for the MCP server

use chrono::NaiveDate;
use hedgebook_core::HedgebookError;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HedgebookMcpError {
    #[error(transparent)]
    Core(#[from] HedgebookError),

    #[error("No price table loaded; call hedgebook_load_prices first")]
    NoPriceTable,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HedgebookMcpError>;

/// Read a required `YYYY-MM-DD` date argument
pub fn require_date(args: &Value, key: &str) -> Result<NaiveDate> {
    let raw = args[key]
        .as_str()
        .ok_or_else(|| HedgebookMcpError::InvalidParameter(format!("Missing {} parameter", key)))?;
    parse_date(key, raw)
}

/// Read an optional `YYYY-MM-DD` date argument; blank counts as absent
pub fn optional_date(args: &Value, key: &str) -> Result<Option<NaiveDate>> {
    match args[key].as_str().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_date(key, raw).map(Some),
    }
}

/// Read a required non-blank string argument
pub fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    match args[key].as_str().map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(HedgebookMcpError::InvalidParameter(format!(
            "Missing {} parameter",
            key
        ))),
    }
}

fn parse_date(key: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        HedgebookMcpError::InvalidParameter(format!(
            "Invalid {} '{}'. Expected YYYY-MM-DD",
            key, raw
        ))
    })
}
