//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid resource key '{value}': expected apiVersion:kind:namespace:name")]
    InvalidResourceKey { value: String },

    #[error("Field {path} is not a string map")]
    NotAStringMap { path: String },

    #[error("Unknown stage: {name}")]
    UnknownStage { name: String },

    #[error("Unknown variant: {name}")]
    UnknownVariant { name: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
