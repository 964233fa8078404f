//! Payload corpus loading.

use crate::error::{Error, Result};
use std::path::Path;
use tracing::info;

/// A flat list of attack strings, one per line of the source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadCorpus {
    payloads: Vec<String>,
}

impl PayloadCorpus {
    /// Build a corpus from in-memory payloads.
    pub fn new<I, S>(payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            payloads: payloads.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse corpus text. Every line is a payload, including blank ones;
    /// a trailing newline does not add an extra empty payload.
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines())
    }

    /// Read the whole corpus file.
    ///
    /// A missing or unreadable file is fatal for the campaign, so the error
    /// carries the path for the operator.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Corpus {
            path: path.to_path_buf(),
            source,
        })?;
        let corpus = Self::parse(&text);
        info!("Loaded {} payloads from {}", corpus.len(), path.display());
        Ok(corpus)
    }

    /// Number of payloads.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// Whether the corpus has no payloads.
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Iterate over payloads in file order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.payloads.iter().map(String::as_str)
    }
}
