use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::model::{CloneOutcome, CloneRequest, ProgressUpdate};

/// Something able to clone a repository.
///
/// Implementations must not send progress after returning, and should stop
/// as soon as practical once `cancellation` is cancelled.
#[async_trait]
pub trait CloneService: Send + Sync {
    async fn clone_repository(
        &self,
        request: CloneRequest,
        progress: ProgressSender,
        cancellation: CancellationToken,
    ) -> CloneOutcome;
}

/// Sending half of a clone's progress channel.
///
/// Cheap to clone and usable from blocking threads.
#[derive(Clone, Debug)]
pub struct ProgressSender {
    tx: UnboundedSender<ProgressUpdate>,
}

impl ProgressSender {
    pub(crate) fn channel() -> (ProgressSender, UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ProgressSender { tx }, rx)
    }

    /// Returns `false` once nobody listens anymore.
    pub fn send(&self, update: ProgressUpdate) -> bool {
        self.tx.send(update).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
