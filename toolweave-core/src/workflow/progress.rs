//! Progress events emitted while a chain runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One progress update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub chain_id: String,
    pub run_id: String,
    /// Active step, `None` for chain-level events
    pub step_id: Option<String>,
    pub message: String,
    /// 0 to 100
    pub percentage: u8,
    pub timestamp: DateTime<Utc>,
}

/// Sender half of a progress channel
pub type ProgressSender = mpsc::Sender<ProgressEvent>;

/// Receiver half of a progress channel
pub type ProgressReceiver = mpsc::Receiver<ProgressEvent>;

/// Create a bounded progress channel
///
/// The engine never waits on subscribers: when the buffer is full, further
/// events are dropped until the receiver catches up.
pub fn progress_channel(buffer_size: usize) -> (ProgressSender, ProgressReceiver) {
    mpsc::channel(buffer_size.max(1))
}

/// Non-blocking emitter bound to one run
#[derive(Debug, Clone)]
pub(crate) struct ProgressEmitter {
    sender: Option<ProgressSender>,
    chain_id: String,
    run_id: String,
}

impl ProgressEmitter {
    pub(crate) fn new(sender: Option<ProgressSender>, chain_id: &str, run_id: &str) -> Self {
        Self {
            sender,
            chain_id: chain_id.to_string(),
            run_id: run_id.to_string(),
        }
    }

    pub(crate) fn emit(&self, step_id: Option<&str>, message: impl Into<String>, percentage: u8) {
        let Some(sender) = &self.sender else {
            return;
        };
        let event = ProgressEvent {
            chain_id: self.chain_id.clone(),
            run_id: self.run_id.clone(),
            step_id: step_id.map(str::to_string),
            message: message.into(),
            percentage: percentage.min(100),
            timestamp: Utc::now(),
        };
        if let Err(e) = sender.try_send(event) {
            tracing::trace!(error = %e, "progress event dropped");
        }
    }
}

/// Integer percentage of `done` out of `total`
pub(crate) fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        100
    } else {
        ((done.min(total) * 100) / total) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_delivers_event() {
        let (tx, mut rx) = progress_channel(4);
        let emitter = ProgressEmitter::new(Some(tx), "chain", "run");
        emitter.emit(Some("fetch"), "Running fetch", 50);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.chain_id, "chain");
        assert_eq!(event.step_id.as_deref(), Some("fetch"));
        assert_eq!(event.percentage, 50);
    }

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_blocking() {
        let (tx, mut rx) = progress_channel(1);
        let emitter = ProgressEmitter::new(Some(tx), "chain", "run");
        emitter.emit(None, "first", 0);
        emitter.emit(None, "second", 10);

        assert_eq!(rx.recv().await.unwrap().message, "first");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 4), 0);
        assert_eq!(percent(1, 4), 25);
        assert_eq!(percent(4, 4), 100);
        assert_eq!(percent(0, 0), 100);
    }
}
