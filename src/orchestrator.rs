use std::{collections::VecDeque, path::Path, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    runtime::Handle,
    sync::{mpsc::UnboundedReceiver, oneshot, watch},
    task::{JoinError, JoinHandle},
};
use tokio_util::sync::CancellationToken;

use crate::{
    display::{DisplaySink, NoopDisplay},
    model::{CloneOutcome, CloneRequest, ProgressUpdate},
    service::{CloneService, ProgressSender},
};

/// Updates kept for a handle nobody has subscribed to yet. Oldest go first.
const BACKLOG_LIMIT: usize = 1024;

pub type ProgressCallback = Box<dyn FnMut(&ProgressUpdate) + Send + 'static>;

#[derive(Error, Debug)]
pub enum CloneError {
    #[error("Invalid clone request: {0}")]
    InvalidRequest(String),
    #[error("Clone was cancelled")]
    Cancelled,
    #[error("Clone failed: {0}")]
    Failed(String),
    #[error("No clone service is available")]
    ServiceUnavailable,
    #[error("No Tokio runtime is available to drive the clone")]
    NoRuntime,
    #[error("A progress callback is already registered for this clone")]
    AlreadySubscribed,
}

/// Drives clones through a [`CloneService`] and relays their progress.
///
/// Holds no per-clone state; every [`CloneOrchestrator::start_clone`] call
/// is independent.
#[derive(Clone)]
pub struct CloneOrchestrator {
    service: Arc<dyn CloneService>,
    display: Arc<dyn DisplaySink>,
    runtime: Handle,
}

#[derive(Default)]
pub struct CloneOrchestratorBuilder {
    service: Option<Arc<dyn CloneService>>,
    display: Option<Arc<dyn DisplaySink>>,
    runtime: Option<Handle>,
}

impl CloneOrchestratorBuilder {
    pub fn service(mut self, service: Arc<dyn CloneService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Where progress and terminal states are rendered.
    ///
    /// Defaults to discarding them.
    pub fn display(mut self, display: Arc<dyn DisplaySink>) -> Self {
        self.display = Some(display);
        self
    }

    /// Runtime the clone tasks are spawned on.
    ///
    /// Defaults to the runtime `try_build` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn try_build(self) -> Result<CloneOrchestrator, CloneError> {
        let Self {
            service,
            display,
            runtime,
        } = self;
        let service = service.ok_or(CloneError::ServiceUnavailable)?;
        let runtime = match runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| CloneError::NoRuntime)?,
        };
        let display = display.unwrap_or_else(|| Arc::new(NoopDisplay));

        Ok(CloneOrchestrator {
            service,
            display,
            runtime,
        })
    }
}

impl CloneOrchestrator {
    pub fn builder() -> CloneOrchestratorBuilder {
        CloneOrchestratorBuilder::default()
    }

    /// Validates `request` and starts cloning it in the background.
    ///
    /// Updates produced before [`CloneHandle::on_progress`] is called are
    /// buffered for the subscriber.
    pub fn start_clone(&self, request: CloneRequest) -> Result<CloneHandle, CloneError> {
        self.start(request, None)
    }

    /// Like [`CloneOrchestrator::start_clone`], with `callback` subscribed
    /// before the service is invoked.
    pub fn start_clone_with<F>(
        &self,
        request: CloneRequest,
        callback: F,
    ) -> Result<CloneHandle, CloneError>
    where
        F: FnMut(&ProgressUpdate) + Send + 'static,
    {
        self.start(request, Some(Box::new(callback)))
    }

    fn start(
        &self,
        request: CloneRequest,
        callback: Option<ProgressCallback>,
    ) -> Result<CloneHandle, CloneError> {
        validate(&request)?;

        let destination = request.destination().to_path_buf();
        let cancellation = CancellationToken::new();
        let (progress, updates) = ProgressSender::channel();
        let (completion_tx, completion_rx) = watch::channel(None);
        let (subscription, subscription_rx) = match callback {
            Some(_) => (None, None),
            None => {
                let (tx, rx) = oneshot::channel();
                (Some(tx), Some(rx))
            }
        };

        let relay = Relay {
            display: Arc::clone(&self.display),
            cancellation: cancellation.clone(),
            buffering: callback.is_none(),
            callback,
            backlog: VecDeque::new(),
        };

        // The relay owns the receiver before the service can send anything.
        let service = Arc::clone(&self.service);
        let token = cancellation.clone();
        let clone = self
            .runtime
            .spawn(async move { service.clone_repository(request, progress, token).await });
        self.runtime
            .spawn(relay.run(clone, updates, subscription_rx, completion_tx));

        Ok(CloneHandle {
            destination,
            cancellation,
            subscription,
            completion: completion_rx,
        })
    }
}

fn validate(request: &CloneRequest) -> Result<(), CloneError> {
    if request.source_url().trim().is_empty() {
        return Err(CloneError::InvalidRequest(
            "source url must not be empty".to_owned(),
        ));
    }
    let destination = request.destination();
    if destination.as_os_str().is_empty() {
        return Err(CloneError::InvalidRequest(
            "destination path must not be empty".to_owned(),
        ));
    }
    // symlink_metadata so that a dangling link still counts as taken
    match std::fs::symlink_metadata(destination) {
        Ok(_) => Err(CloneError::InvalidRequest(format!(
            "destination {} already exists",
            destination.display()
        ))),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(CloneError::InvalidRequest(format!(
            "cannot inspect destination {}: {}",
            destination.display(),
            error
        ))),
    }
}

/// An in-flight clone.
pub struct CloneHandle {
    destination: std::path::PathBuf,
    cancellation: CancellationToken,
    subscription: Option<oneshot::Sender<ProgressCallback>>,
    completion: watch::Receiver<Option<CloneOutcome>>,
}

impl CloneHandle {
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Registers the progress callback for this clone.
    ///
    /// Only one callback may be registered per handle. It is never invoked
    /// once the clone's terminal state has been published.
    pub fn on_progress<F>(&mut self, callback: F) -> Result<(), CloneError>
    where
        F: FnMut(&ProgressUpdate) + Send + 'static,
    {
        let subscription = self
            .subscription
            .take()
            .ok_or(CloneError::AlreadySubscribed)?;
        // A closed relay means the clone is already over; nothing to deliver.
        let _ = subscription.send(Box::new(callback));
        Ok(())
    }

    /// Requests cooperative cancellation. A no-op once the clone finished.
    pub fn cancel(&self) {
        if !self.is_finished() {
            self.cancellation.cancel();
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.completion.borrow().is_some()
    }

    /// Terminal state, if already reached.
    pub fn outcome(&self) -> Option<CloneOutcome> {
        self.completion.borrow().clone()
    }

    pub async fn wait(&self) -> CloneOutcome {
        let mut completion = self.completion.clone();
        let outcome = match completion.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            CloneOutcome::Failed("clone stopped before reporting a result".to_owned())
        })
    }

    /// Waits at most `timeout`, then requests cancellation and gives up.
    ///
    /// Returns `None` when it gave up.
    pub async fn wait_timeout(&self, timeout: Duration) -> Option<CloneOutcome> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                self.cancel();
                None
            }
        }
    }
}

struct Relay {
    display: Arc<dyn DisplaySink>,
    cancellation: CancellationToken,
    callback: Option<ProgressCallback>,
    buffering: bool,
    backlog: VecDeque<ProgressUpdate>,
}

impl Relay {
    async fn run(
        mut self,
        mut clone: JoinHandle<CloneOutcome>,
        mut updates: UnboundedReceiver<ProgressUpdate>,
        mut subscription: Option<oneshot::Receiver<ProgressCallback>>,
        completion: watch::Sender<Option<CloneOutcome>>,
    ) {
        let outcome = loop {
            tokio::select! {
                biased;
                callback = next_subscription(&mut subscription) => match callback {
                    Some(callback) => self.subscribe(callback),
                    None => self.stop_buffering(),
                },
                Some(update) = updates.recv() => self.deliver(update),
                result = &mut clone => break outcome_of(result),
            }
        };

        // Whatever is sent from now on is dropped by the channel.
        updates.close();
        if let Some(callback) = subscription.as_mut().and_then(|rx| rx.try_recv().ok()) {
            self.subscribe(callback);
        }
        while let Ok(update) = updates.try_recv() {
            self.deliver(update);
        }

        self.display.set_text(&outcome.to_string());
        completion.send_replace(Some(outcome));
    }

    fn deliver(&mut self, update: ProgressUpdate) {
        if self.cancellation.is_cancelled() {
            return;
        }
        self.display.set_text(&update.to_string());
        match self.callback.as_mut() {
            Some(callback) => callback(&update),
            None if self.buffering => {
                if self.backlog.len() == BACKLOG_LIMIT {
                    self.backlog.pop_front();
                }
                self.backlog.push_back(update);
            }
            None => {}
        }
    }

    fn subscribe(&mut self, mut callback: ProgressCallback) {
        for update in self.backlog.drain(..) {
            callback(&update);
        }
        self.buffering = false;
        self.callback = Some(callback);
    }

    fn stop_buffering(&mut self) {
        self.buffering = false;
        self.backlog.clear();
    }
}

async fn next_subscription(
    subscription: &mut Option<oneshot::Receiver<ProgressCallback>>,
) -> Option<ProgressCallback> {
    match subscription {
        Some(rx) => {
            let callback = rx.await.ok();
            *subscription = None;
            callback
        }
        None => std::future::pending().await,
    }
}

fn outcome_of(result: Result<CloneOutcome, JoinError>) -> CloneOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(error) if error.is_panic() => {
            CloneOutcome::Failed("clone service panicked".to_owned())
        }
        Err(error) => CloneOutcome::Failed(format!("clone service stopped: {error}")),
    }
}
