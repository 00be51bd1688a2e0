//! CLI error types with exit code handling

use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Invalid arguments that clap cannot catch
    #[error("{message}")]
    #[diagnostic(code(stagehand::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Deployment configuration could not be read
    #[error("Configuration error: {message}")]
    #[diagnostic(code(stagehand::cli::config))]
    Config { message: String },

    /// Manifests could not be loaded or generated
    #[error("Manifest error: {message}")]
    #[diagnostic(code(stagehand::cli::manifest))]
    Manifest { message: String },

    /// Cluster connection failed
    #[error("Cluster error: {message}")]
    #[diagnostic(
        code(stagehand::cli::cluster),
        help("check your kubeconfig, or pass --dry-run to run against an in-memory cluster")
    )]
    Cluster { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(stagehand::cli::io))]
    Io { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            _ => exit_codes::ERROR,
        }
    }

    pub fn usage(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn config(err: impl std::fmt::Display) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }

    pub fn manifest(err: impl std::fmt::Display) -> Self {
        Self::Manifest {
            message: err.to_string(),
        }
    }

    pub fn cluster(err: impl std::fmt::Display) -> Self {
        Self::Cluster {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::usage("bad", "fix it").exit_code(), exit_codes::USAGE_ERROR);
        assert_eq!(CliError::config("bad").exit_code(), exit_codes::ERROR);
        assert_eq!(CliError::cluster("down").exit_code(), exit_codes::ERROR);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            CliError::manifest("no workloads").to_string(),
            "Manifest error: no workloads"
        );
    }
}
