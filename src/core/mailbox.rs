//! Single-slot sample mailboxes.
//!
//! Every sensor adapter hands samples to the collector through a capacity-1
//! channel. Producers never block: when the slot is occupied the NEW value
//! is discarded, so the consumer always observes the oldest undrained
//! sample. This keeps hardware callback paths latency-free at the cost of
//! dropping samples under load, which the pipeline accepts everywhere.

use tokio::sync::mpsc;

/// Create a connected mailbox pair.
pub fn mailbox<T>() -> (MailboxSender<T>, MailboxReceiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (MailboxSender { tx }, MailboxReceiver { rx })
}

/// Producer half of a mailbox.
#[derive(Debug)]
pub struct MailboxSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for MailboxSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> MailboxSender<T> {
    /// Best-effort send.
    ///
    /// Returns `true` if the value was accepted, `false` if the slot still
    /// held an unconsumed sample (or the receiver is gone) and the value was
    /// dropped.
    pub fn offer(&self, value: T) -> bool {
        self.tx.try_send(value).is_ok()
    }
}

/// Consumer half of a mailbox.
#[derive(Debug)]
pub struct MailboxReceiver<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> MailboxReceiver<T> {
    /// Wait for the next sample. Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Non-blocking drain, used by rate-limited consumers.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
