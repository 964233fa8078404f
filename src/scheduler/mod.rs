//! Campaign fan-out.
//!
//! A campaign walks `seeds x tokenizers x templates x candidates` and turns
//! every candidate into one [`ConnectionSession`] running on a
//! [`WorkerPool`]. Candidates are pulled lazily; the bounded queue of the
//! pool keeps generation at most `queue_capacity` sessions ahead of the
//! workers.

mod pool;

pub use pool::WorkerPool;

use crate::config::FuzzConfig;
use crate::error::Result;
use crate::generator::{
    CandidateGenerator, PayloadCorpus, PayloadSubstitution, QuotedStringTokenizer,
    StructuralBloatTokenizer, Tokenizer,
};
use crate::session::{ConnectionSession, SessionPlan, SessionReport, SessionSettings};
use crate::shared::{Connector, TranscriptStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One relevant response found during a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Session that received the response
    pub session_id: String,
    /// Tokenization batch of that session
    pub batch: String,
    /// Raw response text
    pub response: String,
}

/// Totals of a finished campaign.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignReport {
    /// Sessions submitted to the pool
    pub submitted: usize,
    /// Sessions that ran to completion
    pub completed: usize,
    /// Sessions whose task panicked
    pub panicked: usize,
    /// Sessions that could not connect or lost the connection early
    pub failed: usize,
    /// Messages sent across all sessions
    pub sent: usize,
    /// Messages received across all sessions
    pub received: usize,
    /// Waits that hit the ceiling across all sessions
    pub timeouts: usize,
    /// Relevant responses
    pub findings: Vec<Finding>,
    /// Wall-clock start of the campaign
    pub started_at: Option<DateTime<Utc>>,
    /// Wall-clock end of the campaign
    pub finished_at: Option<DateTime<Utc>>,
}

impl CampaignReport {
    /// Add one finished session to the totals.
    pub fn record(&mut self, session: SessionReport) {
        self.completed += 1;
        self.sent += session.sent;
        self.received += session.received;
        self.timeouts += session.timeouts;
        if session.error.is_some() {
            self.failed += 1;
        }
        let session_id = session.id.to_string();
        self.findings
            .extend(session.relevant.into_iter().map(|response| Finding {
                session_id: session_id.clone(),
                batch: session.batch.clone(),
                response,
            }));
    }
}

/// Drives a fuzz campaign.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use wsfuzz::generator::PayloadCorpus;
/// use wsfuzz::scheduler::CampaignScheduler;
/// use wsfuzz::shared::MemoryConnector;
/// use wsfuzz::FuzzConfig;
///
/// # async fn example() -> wsfuzz::Result<()> {
/// let corpus = Arc::new(PayloadCorpus::new(["<script>", "' OR 1=1"]));
/// let scheduler = CampaignScheduler::new(
///     FuzzConfig::default(),
///     Arc::new(MemoryConnector::echo()),
///     corpus,
/// )?;
///
/// let report = scheduler.run(&[r#"{"a": "x", "b": "y"}"#.to_string()]).await?;
/// assert_eq!(report.submitted, 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CampaignScheduler {
    config: FuzzConfig,
    connector: Arc<dyn Connector>,
    tokenizers: Vec<Box<dyn Tokenizer>>,
    generator: Arc<dyn CandidateGenerator>,
    login: Vec<String>,
    ignore_tokens: Vec<String>,
    ignored_errors: Vec<String>,
}

impl CampaignScheduler {
    /// Create a scheduler with the quoted-string tokenizer and payload
    /// substitution over `corpus`.
    pub fn new(
        config: FuzzConfig,
        connector: Arc<dyn Connector>,
        corpus: Arc<PayloadCorpus>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector,
            tokenizers: vec![Box::new(QuotedStringTokenizer)],
            generator: Arc::new(PayloadSubstitution::new(corpus)),
            login: Vec::new(),
            ignore_tokens: Vec::new(),
            ignored_errors: Vec::new(),
        })
    }

    /// Also run the structural bloat tokenizer with the configured rounds.
    pub fn with_bloat(mut self) -> Self {
        let rounds = self.config.bloat_rounds;
        self.tokenizers
            .push(Box::new(StructuralBloatTokenizer::new(rounds)));
        self
    }

    /// Replace the tokenizer list.
    pub fn with_tokenizers(mut self, tokenizers: Vec<Box<dyn Tokenizer>>) -> Self {
        self.tokenizers = tokenizers;
        self
    }

    /// Replace the candidate generator.
    pub fn with_generator(mut self, generator: Arc<dyn CandidateGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Messages every session sends before its candidate.
    pub fn with_login(mut self, login: Vec<String>) -> Self {
        self.login = login;
        self
    }

    /// Seed values never marked for substitution.
    pub fn with_ignore_tokens(mut self, tokens: Vec<String>) -> Self {
        self.ignore_tokens = tokens;
        self
    }

    /// Response substrings that suppress a finding.
    pub fn with_ignored_errors(mut self, substrings: Vec<String>) -> Self {
        self.ignored_errors = substrings;
        self
    }

    /// The campaign configuration.
    pub fn config(&self) -> &FuzzConfig {
        &self.config
    }

    fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            wait: self.config.wait,
            close_grace: self.config.close_grace,
            case_sensitive: self.config.case_sensitive,
            ignored_errors: Arc::from(self.ignored_errors.clone()),
            transcripts: self.config.transcript_dir.clone().map(TranscriptStore::new),
        }
    }

    /// Run one session per candidate and wait for all of them.
    ///
    /// Fails only if the pool cannot be built or stops accepting work;
    /// individual session failures are reported, never returned.
    pub async fn run(&self, seeds: &[String]) -> Result<CampaignReport> {
        let started = Instant::now();
        let started_at = Utc::now();
        let settings = Arc::new(self.session_settings());
        let pool = WorkerPool::new(
            self.config.max_workers,
            self.config.queue_capacity,
            CampaignReport::record,
        )?;
        info!(
            "Starting campaign: {} seeds, {} tokenizers, {} workers over {}",
            seeds.len(),
            self.tokenizers.len(),
            pool.workers(),
            self.connector.transport_type()
        );

        let mut submitted = 0usize;
        for (seed_index, seed) in seeds.iter().enumerate() {
            for tokenizer in &self.tokenizers {
                let templates = tokenizer.tokenize(seed, &self.ignore_tokens);
                debug!(
                    "Seed {} produced {} templates with {}",
                    seed_index,
                    templates.len(),
                    tokenizer.name()
                );

                for (template_index, template) in templates.iter().enumerate() {
                    let batch = format!("seed{}-{}-{}", seed_index, tokenizer.name(), template_index);
                    for candidate in self.generator.candidates(template) {
                        let session = ConnectionSession::new(
                            self.connector.clone(),
                            settings.clone(),
                            SessionPlan::single(&self.login, candidate),
                            batch.clone(),
                        );
                        pool.submit(session.run()).await?;
                        submitted += 1;
                    }
                }
            }
        }

        let mut report = pool.drain().await;
        report.submitted = submitted;
        report.panicked = submitted.saturating_sub(report.completed);
        report.started_at = Some(started_at);
        report.finished_at = Some(Utc::now());
        if report.panicked > 0 {
            warn!("{} sessions panicked", report.panicked);
        }
        info!(
            "Campaign finished in {:.1}s: {} sessions, {} findings",
            started.elapsed().as_secs_f64(),
            report.completed,
            report.findings.len()
        );
        Ok(report)
    }
}
