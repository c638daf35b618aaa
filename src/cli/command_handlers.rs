use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::bail;
use log::{debug, info, warn};

use crate::{
    config::{ClonekitConfig, StatusStyle},
    destination::unique_destination,
    display::{DisplaySink, LogDisplay, TerminalStatusLine},
    model::{CloneOutcome, CloneRequest},
    orchestrator::{CloneHandle, CloneOrchestrator},
    service::CloneService,
};

/// How long an interrupted clone gets to wind down.
const CANCEL_GRACE: Duration = Duration::from_secs(10);

/// Handler to clone command
/// Clones `config.url` into a new directory and returns its path
pub async fn do_clone(
    config: &ClonekitConfig,
    service: Arc<dyn CloneService>,
) -> anyhow::Result<PathBuf> {
    let base = config.directory.clone().unwrap_or_else(std::env::temp_dir);
    if !base.exists() {
        debug!("Creating clone directory {}", base.display());
        std::fs::create_dir_all(&base)?;
    }
    let destination = unique_destination(&base, &config.url);
    let request =
        CloneRequest::new(config.url.as_str(), &destination).recursive_submodules(config.submodules);

    let terminal = Arc::new(TerminalStatusLine::new());
    let display: Arc<dyn DisplaySink> = match config.status {
        StatusStyle::Terminal => terminal.clone(),
        StatusStyle::Log => Arc::new(LogDisplay),
    };

    let orchestrator = CloneOrchestrator::builder()
        .service(service)
        .display(display)
        .try_build()?;
    let handle = orchestrator.start_clone(request)?;

    let outcome = wait_for_outcome(&handle, config.timeout).await;
    terminal.finish();

    match outcome {
        Some(outcome) => outcome.into_result()?,
        None => match config.timeout {
            Some(timeout) => bail!(
                "Clone of {} did not finish within {:?}",
                config.url,
                timeout
            ),
            None => bail!("Clone of {} did not stop after cancellation", config.url),
        },
    }

    info!("Cloned {} into {}", config.url, destination.display());
    Ok(destination)
}

async fn wait_for_outcome(handle: &CloneHandle, timeout: Option<Duration>) -> Option<CloneOutcome> {
    let wait = async {
        match timeout {
            Some(timeout) => handle.wait_timeout(timeout).await,
            None => Some(handle.wait().await),
        }
    };
    tokio::select! {
        outcome = wait => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling the clone. Interrupt again to stop waiting");
            handle.cancel();
            tokio::select! {
                outcome = handle.wait_timeout(CANCEL_GRACE) => outcome,
                _ = tokio::signal::ctrl_c() => None,
            }
        }
    }
}
