use std::{future::Future, time::Duration};

use tokio::runtime::Builder;

/// How long abandoned clone work may hold up the exit.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Runs `future` to completion on a fresh multi-threaded runtime.
///
/// A clone given up on can still sit in a libgit2 call that never looks at
/// its cancellation token, so the runtime is not waited on for longer than
/// [`SHUTDOWN_GRACE`].
pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = Builder::new_multi_thread().enable_all().build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(output)
}
