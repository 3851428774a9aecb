//! Command-line interface for the capture core.
//!
//! Provides commands for ingesting raw capture payloads, issuing
//! licenses, replaying the outbox and showing the resolved configuration.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use uuid::Uuid;

use crate::config;
use crate::core::{CaptureService, Outbox};
use crate::domain::{Aggregate, AggregateType, ContentId, DomainEvent, OwnerId};
use crate::platforms::{self, Captured, License, RevenueModel, UsageTerms};

/// capture - content capture lifecycle and event core
#[derive(Parser, Debug)]
#[command(name = "capture")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture aggregates from a raw JSON payload (object or array)
    Ingest {
        /// Kind of content in the payload
        #[arg(short, long, value_enum)]
        platform: CaptureKind,

        /// Payload file (reads from stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Also request a download for every captured aggregate
        #[arg(long)]
        download: bool,
    },

    /// Replay published events from the outbox
    Events {
        /// Only events of this aggregate
        #[arg(short, long)]
        aggregate: Option<String>,

        /// Only events of this kind (e.g. post.downloaded)
        #[arg(short, long)]
        kind: Option<String>,

        /// Maximum number of events to show (most recent)
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Print raw JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Manage content licenses
    License {
        #[command(subcommand)]
        command: LicenseCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum LicenseCommands {
    /// Issue a license for a piece of content
    Issue {
        /// Licensed content id
        content_id: String,

        /// License holder
        owner_id: String,

        /// Maximum number of uses (config default if omitted)
        #[arg(long)]
        limit: Option<u32>,

        /// Days until the license expires
        #[arg(long)]
        expires_in_days: Option<i64>,

        /// Revenue split as author,platform,affiliate,charity
        #[arg(long, default_value = "100,0,0,0")]
        split: String,

        /// Commercial use allowed
        #[arg(long)]
        commercial: bool,
    },
}

/// Capturable content kinds (maps to AggregateType)
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CaptureKind {
    Post,
    Reel,
    Story,
    User,
    Pin,
    Board,
    Collection,
    Tweet,
    Thread,
    Photo,
    Video,
    Playlist,
    Artist,
}

impl From<CaptureKind> for AggregateType {
    fn from(kind: CaptureKind) -> Self {
        match kind {
            CaptureKind::Post => AggregateType::Post,
            CaptureKind::Reel => AggregateType::Reel,
            CaptureKind::Story => AggregateType::Story,
            CaptureKind::User => AggregateType::User,
            CaptureKind::Pin => AggregateType::Pin,
            CaptureKind::Board => AggregateType::Board,
            CaptureKind::Collection => AggregateType::Collection,
            CaptureKind::Tweet => AggregateType::Tweet,
            CaptureKind::Thread => AggregateType::Thread,
            CaptureKind::Photo => AggregateType::Photo,
            CaptureKind::Video => AggregateType::Video,
            CaptureKind::Playlist => AggregateType::Playlist,
            CaptureKind::Artist => AggregateType::Artist,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Ingest {
                platform,
                file,
                download,
            } => ingest_payload(platform, file, download).await,
            Commands::Events {
                aggregate,
                kind,
                limit,
                json,
            } => list_events(aggregate, kind, limit, json).await,
            Commands::License { command } => match command {
                LicenseCommands::Issue {
                    content_id,
                    owner_id,
                    limit,
                    expires_in_days,
                    split,
                    commercial,
                } => {
                    issue_license(&content_id, &owner_id, limit, expires_in_days, &split, commercial)
                        .await
                }
            },
            Commands::Config => show_config().await,
        }
    }
}

/// Read the payload from a file, or from stdin when it is piped
fn read_input(file: Option<PathBuf>) -> Result<String> {
    let input = if let Some(path) = file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read payload file: {}", path.display()))?
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No payload provided. Use --file <path> or pipe JSON to stdin");
    };

    if input.trim().is_empty() {
        anyhow::bail!("Payload is empty");
    }
    Ok(input)
}

/// Split a payload into individual records; a top-level array holds several
fn payload_records(input: &str) -> Result<Vec<Value>> {
    let payload: Value = serde_json::from_str(input).context("Payload is not valid JSON")?;
    Ok(match payload {
        Value::Array(items) => items,
        single => vec![single],
    })
}

fn print_event(event: &DomainEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event).context("Failed to serialize event")?);
    } else {
        println!(
            "{}  {:<28} {}",
            event.occurred_at().format("%Y-%m-%d %H:%M:%S"),
            event.event_kind(),
            event.aggregate_id()
        );
    }
    Ok(())
}

/// Capture every record in the payload and publish the resulting events
async fn ingest_payload(kind: CaptureKind, file: Option<PathBuf>, download: bool) -> Result<()> {
    let cfg = config::config()?;
    let records = payload_records(&read_input(file)?)?;

    let outbox = Outbox::open(&cfg.outbox).await?;
    let service: CaptureService<Captured> = CaptureService::new(Arc::new(outbox));

    let mut published = 0;
    for (index, record) in records.into_iter().enumerate() {
        let captured = platforms::ingest_with_policy(kind.into(), record, cfg.expiration_policy())
            .with_context(|| format!("Record {} rejected", index))?;
        let id = captured.id().to_string();

        let mut events = service.capture(captured).await?;
        if download {
            events.extend(service.request_download(&id).await?);
        }
        for event in &events {
            print_event(event, true)?;
        }
        published += events.len();
    }

    eprintln!(
        "Captured {} aggregate(s), {} event(s) written to {}",
        service.len().await,
        published,
        cfg.outbox.display()
    );
    Ok(())
}

/// Replay the outbox with optional filters
async fn list_events(
    aggregate: Option<String>,
    kind: Option<String>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let outbox = Outbox::open_default().await?;
    let events = outbox
        .find_events(|e| {
            aggregate.as_deref().map_or(true, |id| e.aggregate_id() == id)
                && kind.as_deref().map_or(true, |k| e.event_kind() == k)
        })
        .await?;

    if events.is_empty() {
        println!("No events found. Use 'capture ingest' to capture content.");
        return Ok(());
    }

    let skip = events.len().saturating_sub(limit);
    for event in &events[skip..] {
        print_event(event, json)?;
    }
    Ok(())
}

/// Parse `author,platform,affiliate,charity`
fn parse_split(split: &str) -> Result<RevenueModel> {
    let shares = split
        .split(',')
        .map(|s| {
            s.trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid share: {}", s))
        })
        .collect::<Result<Vec<_>>>()?;

    let [author, platform, affiliate, charity] = shares[..] else {
        anyhow::bail!("Expected four shares (author,platform,affiliate,charity), got {}", shares.len());
    };
    Ok(RevenueModel::new(author, platform, affiliate, charity)?)
}

/// `now + days`, rejecting spans chrono cannot represent
fn expiry_after_days(days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|span| Utc::now().checked_add_signed(span))
        .with_context(|| format!("--expires-in-days {} is out of range", days))
}

/// Issue a license and publish `license.issued`
async fn issue_license(
    content_id: &str,
    owner_id: &str,
    limit: Option<u32>,
    expires_in_days: Option<i64>,
    split: &str,
    commercial: bool,
) -> Result<()> {
    let cfg = config::config()?;

    let expires_at = expires_in_days.map(expiry_after_days).transpose()?;
    let mut terms = UsageTerms::new(limit.or(cfg.default_usage_limit), expires_at)?;
    if commercial {
        terms = terms.commercial();
    }

    let license = License::issue(
        ContentId::new(format!("lic-{}", Uuid::new_v4().simple()))?,
        ContentId::new(content_id)?,
        OwnerId::new(owner_id)?,
        terms,
        parse_split(split)?,
    )?;
    let license_id = license.id().to_string();

    let outbox = Outbox::open(&cfg.outbox).await?;
    let service: CaptureService<License> = CaptureService::new(Arc::new(outbox));
    for event in service.capture(license).await? {
        print_event(&event, true)?;
    }

    eprintln!("Issued license {}", license_id);
    Ok(())
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("Capture configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:   {}", cfg.home.display());
    println!("  Outbox: {}", cfg.outbox.display());
    println!();
    println!("Stories:");
    println!("  TTL: {}h", cfg.story_ttl_hours);
    println!();
    println!("Licensing:");
    match cfg.default_usage_limit {
        Some(limit) => println!("  Default usage limit: {}", limit),
        None => println!("  Default usage limit: unlimited"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingest_command() {
        let cli = Cli::try_parse_from(["capture", "ingest", "--platform", "pin", "--download"]).unwrap();
        match cli.command {
            Commands::Ingest {
                platform,
                file,
                download,
            } => {
                assert_eq!(AggregateType::from(platform), AggregateType::Pin);
                assert!(download);
                assert!(file.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_license_is_not_a_capture_kind() {
        assert!(Cli::try_parse_from(["capture", "ingest", "--platform", "license"]).is_err());
    }

    #[test]
    fn test_payload_records_accepts_arrays() {
        assert_eq!(payload_records(r#"{"id":"1"}"#).unwrap().len(), 1);
        assert_eq!(payload_records(r#"[{"id":"1"},{"id":"2"}]"#).unwrap().len(), 2);
        assert!(payload_records("not json").is_err());
    }

    #[test]
    fn test_parse_split() {
        let model = parse_split("70, 20, 5, 5").unwrap();
        assert_eq!(model.author_share(), 70);

        assert!(parse_split("70,20,5").is_err());
        assert!(parse_split("70,20,5,6").is_err());
        assert!(parse_split("70,x,5,5").is_err());
    }

    #[test]
    fn test_expiry_after_days_out_of_range() {
        assert!(expiry_after_days(30).unwrap() > Utc::now());
        assert!(expiry_after_days(i64::MAX).is_err());
        assert!(expiry_after_days(365 * 1_000_000).is_err());
    }
}
