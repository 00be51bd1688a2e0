//! Run command - execute one pipeline stage

use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use stagehand_core::{DeploymentSpec, StageConfig, StageKind};
use stagehand_kube::{
    ClusterClient, ConsoleLog, DeploymentInfo, Executor, KubeCluster, ManifestCache, MockCluster,
    RevisionCheckout, StageInput, StageStatus, stop_signal,
};

use super::{directory_source, load_config};
use super::render::to_documents;
use crate::error::{CliError, Result};

pub struct RunArgs {
    pub config: PathBuf,
    pub stage: String,
    pub stage_index: Option<usize>,
    pub app_dir: PathBuf,
    pub running_dir: Option<PathBuf>,
    pub app_id: String,
    pub commit: String,
    pub running_commit: Option<String>,
    pub agent_id: String,
    pub dry_run: bool,
}

pub async fn run(args: RunArgs) -> Result<StageStatus> {
    let config = load_config(&args.config)?;
    let source = directory_source(&config, &args.config, &args.app_dir);
    let stage_config = match args.stage_index {
        Some(index) => Some(pipeline_stage(&config, &args.stage, index)?),
        None => None,
    };

    let running_commit = args.running_commit.unwrap_or_default();
    let running_checkout = match (&args.running_dir, running_commit.is_empty()) {
        (_, true) => None,
        (Some(dir), false) => Some(RevisionCheckout::new(running_commit.clone(), dir)),
        (None, false) => {
            return Err(CliError::usage(
                "--running-commit needs a checkout of that commit",
                "pass --running-dir <dir>",
            ));
        }
    };

    let mock = MockCluster::new();
    let cluster: Arc<dyn ClusterClient> = if args.dry_run {
        Arc::new(mock.clone())
    } else {
        Arc::new(KubeCluster::try_default().await.map_err(CliError::cluster)?)
    };

    eprintln!(
        "{} Running stage {} for {} at {}{}",
        style("→").blue().bold(),
        style(&args.stage).cyan(),
        style(&args.app_id).cyan(),
        style(&args.commit).yellow(),
        if args.dry_run { " (dry run)" } else { "" }
    );

    let input = StageInput {
        stage_name: args.stage,
        stage_status: StageStatus::NotStartedYet,
        deployment: DeploymentInfo {
            application_name: args.app_id.clone(),
            application_id: args.app_id,
            trigger_commit: args.commit.clone(),
            running_commit,
        },
        agent_id: args.agent_id,
        config,
        stage_config,
        checkout: RevisionCheckout::new(args.commit, &args.app_dir),
        running_checkout,
    };
    let executor = Executor::new(
        input,
        Arc::new(source),
        cluster,
        Arc::new(ConsoleLog),
        ManifestCache::default(),
    );

    let (handle, signal) = stop_signal();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling stage");
            handle.cancel();
        }
    });

    let status = executor.execute(&signal).await;
    interrupt.abort();

    if args.dry_run {
        print!("{}", to_documents(&mock.objects())?);
    }

    let styled = match status {
        StageStatus::Success => style(status.as_str()).green(),
        StageStatus::Cancelled => style(status.as_str()).yellow(),
        _ => style(status.as_str()).red(),
    };
    eprintln!("{} Stage finished: {}", style("→").blue().bold(), styled.bold());

    Ok(status)
}

/// The pipeline entry at `index`, which must be a `stage` stage
fn pipeline_stage(config: &DeploymentSpec, stage: &str, index: usize) -> Result<StageConfig> {
    let entry = config.stages.get(index).ok_or_else(|| {
        CliError::usage(
            format!(
                "--stage-index {} is out of range ({} stages configured)",
                index,
                config.stages.len()
            ),
            "stage indexes start at 0",
        )
    })?;

    let expected = stage.parse::<StageKind>().ok();
    if expected.is_none() || entry.name.parse::<StageKind>().ok() != expected {
        return Err(CliError::usage(
            format!("stage {} is {}, not {}", index, entry.name, stage),
            "pass the name of the stage at that index",
        ));
    }
    Ok(entry.clone())
}
