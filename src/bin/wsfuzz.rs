//! Command-line entry point.
//!
//! ```text
//! wsfuzz --payloads payloads.txt --seeds seeds.txt --login '{"op":"login"}' \
//!        --endpoint node.test:443 --tls --path /ws --transcripts out/
//! ```

use anyhow::{bail, Context, Result};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use wsfuzz::config::{DEFAULT_MAX_WORKERS, DEFAULT_QUEUE_CAPACITY, DEFAULT_SERVER_ENDPOINT};
use wsfuzz::shared::{init_logging, Connector, LogConfig, LogFormat, LogLevel, MemoryConnector};
use wsfuzz::{
    CampaignReport, CampaignScheduler, FuzzConfig, PayloadCorpus, ProxyConfig, WaitPolicy,
    WebSocketConnector,
};

/// Concurrent WebSocket protocol fuzzer.
#[derive(Debug, Parser)]
#[command(name = "wsfuzz", version, about)]
struct Cli {
    /// Payload corpus, one payload per line
    #[arg(long, short = 'p')]
    payloads: PathBuf,

    /// File of seed messages, one per line
    #[arg(long, short = 's')]
    seeds: Option<PathBuf>,

    /// Inline seed message; may be repeated
    #[arg(long = "seed")]
    seed: Vec<String>,

    /// Message sent before each candidate; may be repeated
    #[arg(long)]
    login: Vec<String>,

    /// Seed value never substituted; may be repeated
    #[arg(long = "ignore-token")]
    ignore_tokens: Vec<String>,

    /// Response substring that suppresses a finding; may be repeated
    #[arg(long = "ignore-error")]
    ignore_errors: Vec<String>,

    /// Target host:port
    #[arg(long, env = "WSFUZZ_SERVER_ENDPOINT", default_value = DEFAULT_SERVER_ENDPOINT)]
    endpoint: String,

    /// Connect with wss://
    #[arg(long)]
    tls: bool,

    /// WebSocket request path
    #[arg(long, default_value = "/")]
    path: String,

    /// Concurrent sessions
    #[arg(long, env = "WSFUZZ_MAX_WORKERS", default_value_t = DEFAULT_MAX_WORKERS)]
    max_workers: usize,

    /// Sessions queued ahead of the workers
    #[arg(long, env = "WSFUZZ_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Route connections through an HTTP proxy
    #[arg(
        long,
        env = "HTTP_PROXY_ENABLED",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    proxy: bool,

    /// Proxy host
    #[arg(long, env = "HTTP_PROXY_HOST", default_value = "127.0.0.1")]
    proxy_host: String,

    /// Proxy port
    #[arg(long, env = "HTTP_PROXY_PORT", default_value_t = 8080)]
    proxy_port: u16,

    /// Also send structurally bloated seeds
    #[arg(long)]
    bloat: bool,

    /// Doubling rounds for bloated seeds (at most 20)
    #[arg(long, default_value_t = wsfuzz::generator::DEFAULT_BLOAT_ROUNDS)]
    bloat_rounds: u32,

    /// Match error keywords case-sensitively
    #[arg(long)]
    case_sensitive: bool,

    /// Write per-session transcripts below this directory
    #[arg(long)]
    transcripts: Option<PathBuf>,

    /// Wait ceiling per message, in milliseconds
    #[arg(long, default_value_t = 5_000)]
    wait_ceiling_ms: u64,

    /// Quiet period after a send, in milliseconds
    #[arg(long, default_value_t = 2_000)]
    quiescence_ms: u64,

    /// Run against an in-process echo peer instead of the network
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

impl Cli {
    fn fuzz_config(&self) -> FuzzConfig {
        FuzzConfig {
            server_endpoint: self.endpoint.clone(),
            use_tls: self.tls,
            path: self.path.clone(),
            max_workers: self.max_workers,
            queue_capacity: self.queue_capacity,
            proxy: self.proxy.then(|| ProxyConfig {
                host: self.proxy_host.clone(),
                port: self.proxy_port,
            }),
            wait: WaitPolicy {
                ceiling: Duration::from_millis(self.wait_ceiling_ms),
                quiescence: Duration::from_millis(self.quiescence_ms),
                ..WaitPolicy::default()
            },
            case_sensitive: self.case_sensitive,
            transcript_dir: self.transcripts.clone(),
            bloat_rounds: self.bloat_rounds,
            ..FuzzConfig::default()
        }
    }

    fn load_seeds(&self) -> Result<Vec<String>> {
        let mut seeds = self.seed.clone();
        if let Some(path) = &self.seeds {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading seeds from {}", path.display()))?;
            seeds.extend(
                text.lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(str::to_string),
            );
        }
        if seeds.is_empty() {
            bail!("no seed messages given; use --seeds or --seed");
        }
        Ok(seeds)
    }
}

fn print_summary(report: &CampaignReport) {
    println!("sessions:  {} completed of {} submitted", report.completed, report.submitted);
    println!("failed:    {}", report.failed);
    println!("panicked:  {}", report.panicked);
    println!("messages:  {} sent, {} received", report.sent, report.received);
    println!("timeouts:  {}", report.timeouts);
    println!("findings:  {}", report.findings.len());
    for finding in &report.findings {
        println!("  [{}] ({}) {}", finding.batch, finding.session_id, finding.response);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogConfig {
        level: cli.log_level,
        format: cli.log_format,
        ..LogConfig::default()
    })?;

    let config = cli.fuzz_config();
    config.validate().context("invalid configuration")?;

    // A missing corpus aborts before any session starts.
    let corpus = Arc::new(PayloadCorpus::load(&cli.payloads)?);
    let seeds = cli.load_seeds()?;

    let connector: Arc<dyn Connector> = if cli.dry_run {
        Arc::new(MemoryConnector::echo())
    } else {
        Arc::new(WebSocketConnector::new(config.websocket_config()?))
    };
    info!(
        "Fuzzing {} with {} payloads",
        config.endpoint_url()?,
        corpus.len()
    );

    let mut scheduler = CampaignScheduler::new(config, connector, corpus)?
        .with_login(cli.login.clone())
        .with_ignore_tokens(cli.ignore_tokens.clone())
        .with_ignored_errors(cli.ignore_errors.clone());
    if cli.bloat {
        scheduler = scheduler.with_bloat();
    }

    let report = scheduler.run(&seeds).await?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}
