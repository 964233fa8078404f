//! On-disk transcripts of every message a session exchanges.
//!
//! Layout: `<root>/<batch>/<session-id>/<NNNN>-<sent|received>.txt`. The
//! counter is shared by both directions so file order is exchange order.
//! A sent message takes its number before the frame leaves, so a reply can
//! never be numbered ahead of the message that caused it. A send that fails
//! leaves a gap.
//! JSON messages are pretty-printed, anything else is written verbatim.

use crate::shared::logging::Direction;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Root of a campaign's transcripts.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    root: PathBuf,
}

impl TranscriptStore {
    /// Store transcripts below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Transcript for one session of one tokenization batch.
    pub fn session(&self, batch: &str, session_id: &str) -> SessionTranscript {
        SessionTranscript {
            dir: self.root.join(sanitize(batch)).join(sanitize(session_id)),
            counter: AtomicUsize::new(0),
        }
    }
}

/// Transcript of a single session.
#[derive(Debug)]
pub struct SessionTranscript {
    dir: PathBuf,
    counter: AtomicUsize,
}

impl SessionTranscript {
    /// Directory holding this session's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Take the next sequence number without writing anything yet.
    pub fn reserve(&self) -> usize {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Number and write one message.
    pub async fn record(&self, direction: Direction, message: &str) {
        self.write(self.reserve(), direction, message).await;
    }

    /// Write one message under a number taken with [`reserve`](Self::reserve).
    /// Failures are logged, never returned: a full disk must not stop the
    /// campaign.
    pub async fn write(&self, sequence: usize, direction: Direction, message: &str) {
        let path = self
            .dir
            .join(format!("{:04}-{}.txt", sequence, direction.label()));

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!("Failed to create transcript dir {}: {}", self.dir.display(), e);
            return;
        }
        if let Err(e) = tokio::fs::write(&path, render(message)).await {
            warn!("Failed to write transcript {}: {}", path.display(), e);
        }
    }
}

/// Pretty-print JSON, pass anything else through.
pub fn render(message: &str) -> String {
    serde_json::from_str::<serde_json::Value>(message)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| message.to_string())
}

/// Keep path components to a safe character set.
fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
