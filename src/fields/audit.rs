//! Append-only audit trail for verification attempts and admin actions.
//!
//! The file sink never blocks the request path: entries go through an
//! unbounded channel to a writer task that appends one JSON object per line.

use super::error::{FieldError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::VecDeque,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Mutex, PoisonError},
};
use tokio::{
    fs,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    Verify,
    AdminSet,
    AdminReset,
    AdminClear,
    AdminClearAll,
    AdminTest,
}

/// Network identity of whoever made the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Whether submitted candidate values are written to the audit trail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValuePolicy {
    #[default]
    Redacted,
    Raw,
}

impl ValuePolicy {
    #[must_use]
    pub fn apply(self, value: &str) -> Option<String> {
        match self {
            Self::Redacted => None,
            Self::Raw => Some(value.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Redacted => "redacted",
            Self::Raw => "raw",
        }
    }
}

impl FromStr for ValuePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "redacted" | "redact" => Ok(Self::Redacted),
            "raw" => Ok(Self::Raw),
            _ => Err(format!("invalid audit value policy: {value}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub event: AuditEvent,
    pub field: String,
    pub outcome: &'static str,
    pub value: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(event: AuditEvent, field: impl ToString, outcome: &'static str, caller: &Caller) -> Self {
        Self {
            ts: Utc::now(),
            event,
            field: field.to_string(),
            outcome,
            value: None,
            ip: caller.ip.clone(),
            user_agent: caller.user_agent.clone(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: Option<String>) -> Self {
        self.value = value;
        self
    }
}

/// Destination for audit entries. Implementations must not block.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

enum Message {
    Entry(AuditEntry),
    Flush(oneshot::Sender<()>),
}

/// JSON-lines audit file fed by a background writer task.
#[derive(Debug)]
pub struct FileAuditSink {
    path: PathBuf,
    tx: mpsc::UnboundedSender<Message>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry(entry) => f.debug_tuple("Entry").field(&entry.event).finish(),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl FileAuditSink {
    /// Start the writer task. It runs until every sink handle is dropped.
    #[must_use]
    pub fn spawn(path: impl Into<PathBuf>) -> (Self, JoinHandle<()>) {
        let path = path.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(path.clone(), rx));
        (Self { path, tx }, handle)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until everything recorded so far has been written.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Message::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// The last `limit` lines of the audit file, oldest first.
    ///
    /// # Errors
    /// Returns `Persistence` if the file exists but cannot be read.
    pub async fn tail(&self, limit: usize) -> Result<Vec<String>> {
        self.flush().await;
        let read_error =
            |err: std::io::Error| FieldError::persistence(format!("failed to read {}", self.path.display()), err);

        let file = match fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(read_error(err)),
        };

        // Only the newest `limit` lines are ever held.
        let mut window = VecDeque::with_capacity(limit.min(1024));
        let mut lines = BufReader::new(file).lines();
        while let Some(line) = lines.next_line().await.map_err(read_error)? {
            if limit == 0 || line.trim().is_empty() {
                continue;
            }
            if window.len() == limit {
                window.pop_front();
            }
            window.push_back(line);
        }
        Ok(window.into())
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, entry: AuditEntry) {
        if self.tx.send(Message::Entry(entry)).is_err() {
            error!("Audit writer is gone, dropping entry");
        }
    }
}

async fn run_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Entry(entry) => {
                if let Err(err) = append(&path, &entry).await {
                    error!("Failed to write audit entry to {}: {err}", path.display());
                }
            }
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Audit writer stopped");
}

async fn append(path: &Path, entry: &AuditEntry) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await
}
