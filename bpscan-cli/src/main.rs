//! bpscan CLI - Command-line scanner for BPv7 bundle files
//!
//! This binary provides command-line interfaces for:
//! - scan: decode every bundle in a file and report diagnostics
//! - blocks: list the block graph of each bundle

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use bpscan_bundle::block::{
    BLOCK_TYPE_BUNDLE_AGE, BLOCK_TYPE_CONFIDENTIALITY, BLOCK_TYPE_HOP_COUNT,
    BLOCK_TYPE_INTEGRITY, BLOCK_TYPE_PAYLOAD, BLOCK_TYPE_PREVIOUS_NODE,
};
use bpscan_cbor::Severity;
use bpscan_session::{Observation, Session, SessionConfig};

#[derive(Parser)]
#[command(name = "bpscan")]
#[command(about = "Bundle Protocol v7 file scanner")]
#[command(version)]
struct Cli {
    /// TOML configuration file overriding decode limits
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode every bundle in a file and report diagnostics
    ///
    /// Examples:
    ///   bpscan scan capture.bp7
    ///   bpscan scan capture.bp7 --format json
    ///   bpscan scan capture.bp7 --strict
    Scan {
        /// Input file of concatenated encoded bundles
        input: PathBuf,
        /// Output format (table, json)
        #[arg(long, value_enum, default_value_t = ScanFormat::Table)]
        format: ScanFormat,
        /// Show a progress spinner while scanning
        #[arg(long)]
        progress: bool,
        /// Exit non-zero when any error-severity diagnostic is reported
        #[arg(long)]
        strict: bool,
    },
    /// List the blocks of each bundle in a file
    Blocks {
        /// Input file of concatenated encoded bundles
        input: PathBuf,
        /// Only show the bundle at this position (0-based)
        #[arg(long)]
        bundle: Option<usize>,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ScanFormat {
    Table,
    Json,
}

/// Optional TOML configuration file contents.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    limits: LimitsSection,
    #[serde(default)]
    session: SessionSection,
}

#[derive(Debug, Default, Deserialize)]
struct LimitsSection {
    max_string_len: Option<usize>,
    max_nesting_depth: Option<usize>,
    max_tag_chain: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionSection {
    max_fragment_extent: Option<u64>,
    verify_crc: Option<bool>,
}

#[derive(Serialize)]
struct DiagnosticSummary {
    severity: String,
    category: String,
    offset: usize,
    message: String,
}

#[derive(Serialize)]
struct BundleSummary {
    frame: u64,
    offset: usize,
    identity: Option<String>,
    destination: Option<String>,
    blocks: usize,
    duplicate_of_frame: Option<u64>,
    status_report_subject: Option<String>,
    reassembled_len: Option<usize>,
    diagnostics: Vec<DiagnosticSummary>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let session_config = load_session_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan {
            input,
            format,
            progress,
            strict,
        } => handle_scan(input, format, progress, strict, session_config),
        Commands::Blocks { input, bundle } => handle_blocks(input, bundle, session_config),
    }
}

fn load_session_config(path: Option<&std::path::Path>) -> Result<SessionConfig, Box<dyn Error>> {
    let mut config = SessionConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("cannot read config {}: {err}", path.display()))?;
    let file: FileConfig = toml::from_str(&contents)
        .map_err(|err| format!("cannot parse config {}: {err}", path.display()))?;

    if let Some(value) = file.limits.max_string_len {
        config.bundle.limits.max_string_len = value;
    }
    if let Some(value) = file.limits.max_nesting_depth {
        config.bundle.limits.max_nesting_depth = value;
    }
    if let Some(value) = file.limits.max_tag_chain {
        config.bundle.limits.max_tag_chain = value;
    }
    if let Some(value) = file.session.max_fragment_extent {
        config.max_fragment_extent = value;
    }
    if let Some(value) = file.session.verify_crc {
        config.bundle.verify_crc = value;
    }
    Ok(config)
}

fn handle_scan(
    input: PathBuf,
    format: ScanFormat,
    progress: bool,
    strict: bool,
    session_config: SessionConfig,
) -> Result<(), Box<dyn Error>> {
    let buf = fs::read(&input)?;
    let mut session = Session::new(session_config);

    let spinner = if progress {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        bar.set_message("scanning");
        Some(bar)
    } else {
        None
    };

    let outcome = session.scan(&buf, 0);
    if let Some(bar) = &spinner {
        bar.finish_with_message(format!("{} bundle(s)", outcome.observations.len()));
    }

    let mut error_total = 0usize;
    match format {
        ScanFormat::Json => {
            let summaries: Vec<BundleSummary> =
                outcome.observations.iter().map(summarize).collect();
            error_total = summaries
                .iter()
                .flat_map(|s| &s.diagnostics)
                .filter(|d| d.severity == "error")
                .count();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        ScanFormat::Table => {
            for observation in &outcome.observations {
                print_observation(observation);
                error_total += observation.diagnostics.error_count();
            }
            println!(
                "{} bundle(s), {} error diagnostic(s)",
                outcome.observations.len(),
                error_total
            );
        }
    }

    if let Some(err) = outcome.error {
        eprintln!("scan stopped early: {err}");
        if strict {
            return Err(Box::new(err));
        }
    }
    if strict && error_total > 0 {
        return Err(format!("{error_total} error diagnostic(s) reported").into());
    }
    Ok(())
}

fn print_observation(observation: &Observation<'_>) {
    let identity = observation
        .identity
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "<no identity>".to_string());
    println!(
        "bundle {} @{:#010x}: {} ({} block(s))",
        observation.frame,
        observation.offset,
        identity,
        observation.bundle.blocks.len()
    );
    if let Some(first) = observation.duplicate_of {
        println!("    retransmission of frame {}", first.frame);
    }
    if let Some(report) = &observation.status_report {
        println!("    status report about {}", report.subject);
    }
    if let Some(payload) = &observation.reassembled {
        println!("    reassembled payload: {} byte(s)", payload.len());
    }
    for diag in observation.diagnostics.items() {
        println!(
            "    {} [{}] @{:#06x}: {}",
            severity_label(diag.severity),
            diag.category,
            diag.offset,
            diag.message
        );
    }
}

fn handle_blocks(
    input: PathBuf,
    only: Option<usize>,
    session_config: SessionConfig,
) -> Result<(), Box<dyn Error>> {
    let buf = fs::read(&input)?;
    let mut session = Session::new(session_config);
    let outcome = session.scan(&buf, 0);

    for (position, observation) in outcome.observations.iter().enumerate() {
        if only.is_some_and(|wanted| wanted != position) {
            continue;
        }
        let identity = observation
            .identity
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<no identity>".to_string());
        println!("bundle {position}: {identity}");
        if let Some(primary) = &observation.bundle.primary {
            println!(
                "    block 0: primary, flags {:#x}, crc {:?}, dst {}",
                primary.flags,
                primary.crc_type,
                primary
                    .destination
                    .as_ref()
                    .map(|eid| eid.uri.as_str())
                    .unwrap_or("<none>")
            );
        }
        for block in &observation.bundle.blocks {
            let mut refs = String::new();
            if !block.integrity_targeters.is_empty() {
                refs.push_str(&format!(", bib by {:?}", block.integrity_targeters));
            }
            if !block.confidentiality_targeters.is_empty() {
                refs.push_str(&format!(", bcb by {:?}", block.confidentiality_targeters));
            }
            println!(
                "    block {}: type {} ({}), flags {:#x}, crc {:?}, {} data byte(s){}",
                block.block_number,
                block.type_code,
                block_type_name(block.type_code),
                block.flags,
                block.crc_type,
                block.data.len(),
                refs
            );
        }
    }

    if let Some(err) = outcome.error {
        eprintln!("scan stopped early: {err}");
    }
    Ok(())
}

fn summarize(observation: &Observation<'_>) -> BundleSummary {
    BundleSummary {
        frame: observation.frame,
        offset: observation.offset,
        identity: observation.identity.as_ref().map(ToString::to_string),
        destination: observation
            .bundle
            .primary
            .as_ref()
            .and_then(|p| p.destination.as_ref())
            .map(|eid| eid.uri.clone()),
        blocks: observation.bundle.blocks.len(),
        duplicate_of_frame: observation.duplicate_of.map(|first| first.frame),
        status_report_subject: observation
            .status_report
            .as_ref()
            .map(|report| report.subject.to_string()),
        reassembled_len: observation.reassembled.as_ref().map(|payload| payload.len()),
        diagnostics: observation
            .diagnostics
            .items()
            .iter()
            .map(|diag| DiagnosticSummary {
                severity: severity_label(diag.severity).to_string(),
                category: diag.category.to_string(),
                offset: diag.offset,
                message: diag.message.clone(),
            })
            .collect(),
    }
}

fn block_type_name(type_code: u64) -> &'static str {
    match type_code {
        BLOCK_TYPE_PAYLOAD => "payload",
        BLOCK_TYPE_PREVIOUS_NODE => "previous node",
        BLOCK_TYPE_BUNDLE_AGE => "bundle age",
        BLOCK_TYPE_HOP_COUNT => "hop count",
        BLOCK_TYPE_INTEGRITY => "block integrity",
        BLOCK_TYPE_CONFIDENTIALITY => "block confidentiality",
        _ => "unknown",
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Note => "note",
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}
