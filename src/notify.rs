// src/notify.rs

//! Post-publish notification handoff
//!
//! Called only after a publish transaction has committed. Implementations
//! hand the notice to some queue and return; they never block on delivery
//! and their failure never undoes the publish.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

/// Identity of a freshly published cookbook version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishNotice {
    pub cookbook_id: i64,
    pub cookbook: String,
    pub version: String,
}

/// Fire-and-forget signal to the notification queue
pub trait NotificationTrigger: Send + Sync {
    fn cookbook_published(&self, notice: &PublishNotice) -> Result<()>;
}

/// Hands notices to an in-process consumer
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<PublishNotice>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end for the consumer task
    pub fn channel() -> (Self, UnboundedReceiver<PublishNotice>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationTrigger for ChannelNotifier {
    fn cookbook_published(&self, notice: &PublishNotice) -> Result<()> {
        self.tx
            .send(notice.clone())
            .map_err(|_| Error::NotifyFailed("notification consumer has shut down".to_string()))
    }
}

/// Appends notices as JSON lines to a spool file drained by a separate worker
#[derive(Debug)]
pub struct SpoolNotifier {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SpoolNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotificationTrigger for SpoolNotifier {
    fn cookbook_published(&self, notice: &PublishNotice) -> Result<()> {
        let mut line = serde_json::to_string(notice)
            .map_err(|e| Error::NotifyFailed(format!("Failed to encode notice: {e}")))?;
        line.push('\n');

        // One writer at a time keeps lines whole
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::NotifyFailed("spool lock poisoned".to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                Error::NotifyFailed(format!("Failed to open spool {}: {}", self.path.display(), e))
            })?;
        file.write_all(line.as_bytes()).map_err(|e| {
            Error::NotifyFailed(format!("Failed to write spool {}: {}", self.path.display(), e))
        })?;

        debug!(
            "Spooled notice for {} {} to {}",
            notice.cookbook,
            notice.version,
            self.path.display()
        );
        Ok(())
    }
}

/// Drops every notice
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl NotificationTrigger for NoopNotifier {
    fn cookbook_published(&self, _notice: &PublishNotice) -> Result<()> {
        Ok(())
    }
}
