//! Generic reconnect-with-backoff supervision.
//!
//! Every hardware connection is driven by the same lifecycle loop: open,
//! start, and on any exit close / back off / reopen. Adapters carry no
//! retry logic of their own; they only implement [`Retryable`].

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::core::error::{GatewayError, Result};

/// Fixed delay between reconnection attempts.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// A supervised hardware connection.
#[async_trait]
pub trait Retryable: Send {
    /// Connection identity used in log records.
    fn name(&self) -> &'static str;

    /// Establish the underlying connection.
    async fn open(&mut self) -> Result<()>;

    /// Tear the connection down. Must tolerate never having been opened.
    async fn close(&mut self) -> Result<()>;

    /// Run the connection until it fails, finishes, or shutdown fires.
    async fn start(&mut self, shutdown: watch::Receiver<bool>) -> Result<()>;
}

/// Why the previous cycle ended.
enum Cycle {
    /// First pass: nothing to tear down yet.
    Starting,
    /// `start` returned cleanly. Still recycled through close/backoff/open,
    /// since a returned connection is a stopped connection either way.
    Clean,
    /// `start` or `open` failed.
    Failed(GatewayError),
}

/// Drive `retryable` until shutdown is requested.
///
/// The loop is: open, start, and on any exit of `start` close the
/// connection, sleep `backoff`, reopen. A failed open routes back through
/// the same close-and-backoff branch, so every failed attempt pays the
/// backoff before the next one. Close failures are logged and never abort
/// the loop. There is no retry cap; the only way out is shutdown, at which
/// point the connection is closed before returning [`GatewayError::Cancelled`].
pub async fn supervise<R>(
    retryable: &mut R,
    mut shutdown: watch::Receiver<bool>,
    backoff: Duration,
) -> GatewayError
where
    R: Retryable + ?Sized,
{
    let mut cycle = Cycle::Starting;
    loop {
        if *shutdown.borrow() {
            if let Err(err) = retryable.close().await {
                warn!(source = retryable.name(), %err, "unable to close on shutdown");
            }
            return GatewayError::Cancelled;
        }

        let opened = match cycle {
            Cycle::Starting => retryable.open().await,
            exited => {
                if let Cycle::Failed(ref err) = exited {
                    error!(source = retryable.name(), %err, "reconnecting due to error");
                } else {
                    info!(source = retryable.name(), "connection returned, reconnecting");
                }
                if let Err(err) = retryable.close().await {
                    warn!(source = retryable.name(), %err, "unable to close");
                }
                tokio::select! {
                    _ = shutdown.changed() => {
                        cycle = exited;
                        continue;
                    }
                    _ = tokio::time::sleep(backoff) => {}
                }
                retryable.open().await
            }
        };
        if let Err(err) = opened {
            cycle = Cycle::Failed(err);
            continue;
        }

        cycle = match retryable.start(shutdown.clone()).await {
            Ok(()) => Cycle::Clean,
            Err(err) => Cycle::Failed(err),
        };
    }
}
