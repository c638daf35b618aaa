use std::path::PathBuf;

use async_trait::async_trait;
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    Config, FetchOptions, Progress, Repository, SubmoduleUpdateOptions,
};
use log::{debug, trace};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    model::{CloneOutcome, CloneRequest, ProgressUpdate},
    service::{CloneService, ProgressSender},
};

use super::remote::authenticated_callbacks;

const GLOBAL_KNOWN_HOSTS: &str = "/etc/ssh/ssh_known_hosts";

const RECEIVING_OBJECTS: &str = "Receiving objects";
const RESOLVING_DELTAS: &str = "Resolving deltas";
const REMOTE: &str = "Remote";
const CHECKING_OUT: &str = "Checking out files";

/// Clones with libgit2 on Tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct GitCloneService {
    known_hosts: PathBuf,
}

impl Default for GitCloneService {
    fn default() -> Self {
        GitCloneService {
            known_hosts: PathBuf::from(GLOBAL_KNOWN_HOSTS),
        }
    }
}

impl GitCloneService {
    pub fn new() -> Self {
        Self::default()
    }

    /// `known_hosts` file SSH host keys are verified against.
    pub fn known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts = path.into();
        self
    }
}

#[async_trait]
impl CloneService for GitCloneService {
    async fn clone_repository(
        &self,
        request: CloneRequest,
        progress: ProgressSender,
        cancellation: CancellationToken,
    ) -> CloneOutcome {
        let job = CloneJob {
            request,
            progress,
            cancellation,
            known_hosts: self.known_hosts.clone(),
        };
        match tokio::task::spawn_blocking(move || job.run()).await {
            Ok(outcome) => outcome,
            Err(error) => CloneOutcome::Failed(format!("clone worker stopped: {error}")),
        }
    }
}

#[derive(Error, Debug)]
enum GitCloneError {
    #[error("{}", .0.message())]
    Git(#[from] git2::Error),
    #[error("cancelled")]
    Cancelled,
}

struct CloneJob {
    request: CloneRequest,
    progress: ProgressSender,
    cancellation: CancellationToken,
    known_hosts: PathBuf,
}

impl CloneJob {
    fn run(self) -> CloneOutcome {
        if self.cancellation.is_cancelled() {
            return CloneOutcome::Cancelled;
        }
        let result = self.clone_repository();
        self.outcome(result)
    }

    fn outcome(&self, result: Result<(), GitCloneError>) -> CloneOutcome {
        match result {
            Ok(()) => {
                debug!("Cloned {}", self.request);
                CloneOutcome::Success
            }
            Err(GitCloneError::Cancelled) => CloneOutcome::Cancelled,
            // An aborted callback fails libgit2 with a callback error, not a
            // dedicated code; the token tells the two apart.
            Err(GitCloneError::Git(error)) if self.cancellation.is_cancelled() => {
                debug!("Clone of {} aborted on request: {}", self.request, error);
                CloneOutcome::Cancelled
            }
            Err(error) => {
                debug!("Clone of {} failed: {}", self.request, error);
                CloneOutcome::Failed(error.to_string())
            }
        }
    }

    fn clone_repository(&self) -> Result<(), GitCloneError> {
        let git_config = Config::open_default()?;

        debug!("Cloning {}", self.request);
        let repo = RepoBuilder::new()
            .fetch_options(self.fetch_options(&git_config))
            .with_checkout(self.checkout())
            .clone(self.request.source_url(), self.request.destination())?;

        if self.request.is_recursive() {
            self.update_submodules(&repo, &git_config)?;
        }
        Ok(())
    }

    fn update_submodules(
        &self,
        repo: &Repository,
        git_config: &Config,
    ) -> Result<(), GitCloneError> {
        let submodules = repo.submodules()?;
        let total = submodules.len() as u64;
        for (index, mut submodule) in submodules.into_iter().enumerate() {
            if self.cancellation.is_cancelled() {
                return Err(GitCloneError::Cancelled);
            }
            let name = submodule.name().unwrap_or("<unnamed>").to_owned();
            debug!("Updating submodule {} of {}", name, self.request);
            self.progress.send(ProgressUpdate::new(
                format!("Updating submodule {name}"),
                submodule.url().unwrap_or_default(),
                index as u64 + 1,
                total,
            ));

            let mut options = SubmoduleUpdateOptions::new();
            options
                .fetch(self.fetch_options(git_config))
                .checkout(self.checkout());
            submodule.update(true, Some(&mut options))?;

            let nested = submodule.open()?;
            self.update_submodules(&nested, git_config)?;
        }
        Ok(())
    }

    fn fetch_options<'a>(&'a self, git_config: &'a Config) -> FetchOptions<'a> {
        let mut callbacks = authenticated_callbacks(git_config, &self.known_hosts);

        let mut reporter = TransferReporter::default();
        callbacks.transfer_progress(move |stats| {
            if let Some(update) = reporter.report(TransferStats::from(&stats)) {
                self.progress.send(update);
            }
            !self.cancellation.is_cancelled()
        });
        callbacks.sideband_progress(move |data| {
            let text = String::from_utf8_lossy(data);
            for line in text.split(['\r', '\n']).map(str::trim).filter(|l| !l.is_empty()) {
                trace!("remote: {}", line);
                self.progress.send(ProgressUpdate::new(REMOTE, line, 0, 0));
            }
            !self.cancellation.is_cancelled()
        });

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);
        fetch_options
    }

    fn checkout(&self) -> CheckoutBuilder<'_> {
        let mut checkout = CheckoutBuilder::new();
        checkout.progress(move |_path, current, total| {
            self.progress.send(ProgressUpdate::new(
                CHECKING_OUT,
                "",
                current as u64,
                total as u64,
            ));
        });
        checkout
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TransferStats {
    received_objects: usize,
    total_objects: usize,
    indexed_deltas: usize,
    total_deltas: usize,
    received_bytes: usize,
}

impl From<&Progress<'_>> for TransferStats {
    fn from(stats: &Progress<'_>) -> Self {
        TransferStats {
            received_objects: stats.received_objects(),
            total_objects: stats.total_objects(),
            indexed_deltas: stats.indexed_deltas(),
            total_deltas: stats.total_deltas(),
            received_bytes: stats.received_bytes(),
        }
    }
}

/// Turns transfer statistics into updates, skipping those that do not
/// advance the step of the current phase.
#[derive(Debug, Default)]
struct TransferReporter {
    last: Option<(&'static str, u64)>,
}

impl TransferReporter {
    fn report(&mut self, stats: TransferStats) -> Option<ProgressUpdate> {
        let (phase, update) = transfer_update(stats);
        let key = (phase, update.current_step);
        if self.last == Some(key) {
            return None;
        }
        self.last = Some(key);
        Some(update)
    }
}

fn transfer_update(stats: TransferStats) -> (&'static str, ProgressUpdate) {
    if stats.received_objects < stats.total_objects || stats.total_deltas == 0 {
        (
            RECEIVING_OBJECTS,
            ProgressUpdate::new(
                RECEIVING_OBJECTS,
                human_bytes(stats.received_bytes),
                stats.received_objects as u64,
                stats.total_objects as u64,
            ),
        )
    } else {
        (
            RESOLVING_DELTAS,
            ProgressUpdate::new(
                RESOLVING_DELTAS,
                "",
                stats.indexed_deltas as u64,
                stats.total_deltas as u64,
            ),
        )
    }
}

fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
