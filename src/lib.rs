//! # wsfuzz
//!
//! A protocol fuzzing harness for WebSocket services.
//!
//! Seed request messages are tokenized into templates, each template is
//! expanded into concrete fuzz candidates, and every candidate is sent on a
//! fresh connection after the configured login messages. Responses to
//! candidates are scanned for leaked server errors (stack traces, SQL and
//! LDAP driver messages, certificates) and reported.
//!
//! The crate provides:
//! - [`classifier`]: substring heuristics deciding whether a response is relevant
//! - [`generator`]: tokenizers and the payload substitution generator
//! - [`session`]: the per-connection exchange state machine
//! - [`scheduler`]: campaign fan-out over a bounded worker pool
//! - [`shared`]: transports, logging and transcripts
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use wsfuzz::{CampaignScheduler, FuzzConfig, PayloadCorpus};
//! use wsfuzz::shared::MemoryConnector;
//!
//! # async fn example() -> wsfuzz::Result<()> {
//! let corpus = Arc::new(PayloadCorpus::parse("<script>\n' OR 1=1\n"));
//! let connector = Arc::new(MemoryConnector::echo());
//!
//! let report = CampaignScheduler::new(FuzzConfig::default(), connector, corpus)?
//!     .with_login(vec![r#"{"op":"login"}"#.to_string()])
//!     .with_bloat()
//!     .run(&[r#"{"op":"query","table":"users"}"#.to_string()])
//!     .await?;
//!
//! println!("{} findings", report.findings.len());
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
// Allow certain clippy lints that are too pedantic for this codebase
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::result_large_err)]

pub mod classifier;
pub mod config;
pub mod error;
pub mod generator;
pub mod scheduler;
pub mod session;
pub mod shared;

// Re-export commonly used types
pub use classifier::{classify, is_relevant, Category, RelevanceMatch};
pub use config::{FuzzConfig, ProxyConfig};
pub use error::{Error, Result, TransportError};
pub use generator::{
    CandidateGenerator, PayloadCorpus, PayloadSubstitution, QuotedStringTokenizer,
    StructuralBloatTokenizer, Tokenizer,
};
pub use scheduler::{CampaignReport, CampaignScheduler, Finding, WorkerPool};
pub use session::{
    ConnectionSession, SessionId, SessionPlan, SessionReport, SessionSettings, SessionState,
    WaitOutcome, WaitPolicy,
};

#[cfg(feature = "websocket")]
pub use shared::{WebSocketConfig, WebSocketConnector};
