//! CLI commands

pub mod render;
pub mod run;

use std::path::Path;

use stagehand_core::DeploymentSpec;
use stagehand_kube::DirectorySource;

use crate::error::{CliError, Result};

fn load_config(path: &Path) -> Result<DeploymentSpec> {
    DeploymentSpec::from_file(path)
        .map_err(|e| CliError::config(format!("{}: {}", path.display(), e)))
}

/// Manifest source for `app_dir`, skipping the config file when it lives there
fn directory_source(config: &DeploymentSpec, config_path: &Path, app_dir: &Path) -> DirectorySource {
    let source = DirectorySource::new(config.input.clone());
    match config_path.strip_prefix(app_dir) {
        Ok(relative) => source.exclude(relative),
        Err(_) => source,
    }
}
