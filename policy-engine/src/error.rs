//! Error types for policy loading and evaluation

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Duplicate rule index {index} in device group {device_group}: {first} and {second}")]
    DuplicateIndex {
        device_group: String,
        index: u32,
        first: String,
        second: String,
    },

    #[error("Device group not found: {device_group}")]
    UnknownDeviceGroup { device_group: String },

    #[error("Failed to load {path}: {source}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to parse CSV: {0}")]
    CsvParse(#[from] csv::Error),

    #[error("Unsupported policy file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid policy data: {0}")]
    Invalid(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Data-quality findings. The engine tolerates all of these; the validator
/// reports them so the operator can fix the export.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Cycle detected in group references: {path}")]
    CycleDetected { path: String },

    #[error("Unknown member reference: {reference}")]
    UnknownMember { reference: String },

    #[error("Invalid address value for {name}: {value}")]
    InvalidAddress { name: String, value: String },

    #[error("Dynamic group {group} cannot be expanded")]
    DynamicGroup { group: String },

    #[error("Invalid value for {option}: {value}")]
    InvalidOption { option: &'static str, value: String },

    #[error("Rule {rule} has an empty {field} list, read as any")]
    EmptyMembers { rule: String, field: &'static str },

    #[error("Rule {rule} in {device_group} reuses index {index}")]
    DuplicateIndex {
        device_group: String,
        rule: String,
        index: u32,
    },
}
