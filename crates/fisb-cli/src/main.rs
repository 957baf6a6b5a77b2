//! Per-stage CLI surface over `fisb-core` (spec §6 "CLI surface (each
//! stage)"): stdin/stdout line protocol, stage names `frame`, `apdu`,
//! `reconstruct`, `normalize`, `dedup`, `harvest`, plus a composed
//! `pipeline` stage that is the normal deployment. Matches the teacher's
//! `jet1090::main` shape: a `tokio::main` runtime driving the ingest loop
//! and interleaved periodic maintenance.

use chrono::Utc;
use clap::{Parser, Subcommand};
use fisb_core::apdu::{self, ApduPayload};
use fisb_core::dedup::Deduplicator;
use fisb_core::frame;
use fisb_core::harvest::image::NullRenderer;
use fisb_core::harvest::MemoryStore;
use fisb_core::normalize;
use fisb_core::reconstruct::{desegmenter::Desegmenter, matcher::TwgoMatcher};
use fisb_core::{Config, Pipeline};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "fisb", version, about = "Decode the FAA FIS-B UAT uplink stream")]
struct Cli {
    #[command(subcommand)]
    stage: Option<Stage>,

    /// Pretty-print JSON output instead of one compact line per record.
    #[arg(long, global = true)]
    pp: bool,

    /// Append per-stage error diagnostics to this file (default: stderr only).
    #[arg(long, global = true)]
    error_log: Option<String>,

    /// TOML configuration file; unset fields use fisb-core's documented defaults.
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Stage {
    /// Parse ground-uplink packets, one JSON `Packet` per input line.
    Frame,
    /// Frame + decode each APDU frame, one JSON `Apdu` per APDU.
    Apdu,
    /// Frame + APDU + desegment/match, one JSON object per reassembled unit.
    Reconstruct,
    /// Frame + APDU + reconstruct + normalize, one JSON `Record` per emission.
    Normalize,
    /// Normalize + deduplicate, one JSON `Record` per admitted emission.
    Dedup,
    /// The full pipeline including store upsert and image harvesting.
    Harvest,
    /// Alias for `harvest` plus periodic maintenance; the normal deployment.
    Pipeline,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.error_log.as_deref())?;

    let config = match &cli.config {
        Some(path) => {
            let text = tokio::fs::read_to_string(path).await?;
            Config::from_toml_str(&text)?
        }
        None => Config::default(),
    };

    match cli.stage.unwrap_or(Stage::Pipeline) {
        Stage::Frame => run_frame_stage(cli.pp).await,
        Stage::Apdu => run_apdu_stage(cli.pp).await,
        Stage::Reconstruct => run_reconstruct_stage(cli.pp).await,
        Stage::Normalize => run_normalize_stage(config, cli.pp).await,
        Stage::Dedup => run_dedup_stage(config, cli.pp).await,
        Stage::Harvest | Stage::Pipeline => run_pipeline_stage(config, cli.pp).await,
    }
}

/// `tracing-subscriber`'s `EnvFilter` from `RUST_LOG`, mirroring the
/// teacher's `jet1090` initialization; `--error-log` adds a second,
/// uncoloured layer writing to the named file.
fn init_tracing(error_log: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter).with(stderr_layer);

    if let Some(path) = error_log {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        let file_layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(std::sync::Mutex::new(file));
        registry.with(file_layer).init();
    } else {
        registry.init();
    }
    Ok(())
}

async fn print_json<T: Serialize>(stdout: &mut tokio::io::Stdout, value: &T, pp: bool) -> std::io::Result<()> {
    let line = if pp {
        serde_json::to_string_pretty(value).expect("Record always serializes")
    } else {
        serde_json::to_string(value).expect("Record always serializes")
    };
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

async fn stdin_lines() -> tokio::io::Lines<BufReader<tokio::io::Stdin>> {
    BufReader::new(tokio::io::stdin()).lines()
}

async fn run_frame_stage(pp: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = stdin_lines().await;
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        let Some((bytes, epoch)) = Pipeline::parse_line(&line) else { continue };
        match frame::decode_packet(&bytes, (epoch * 1000.0) as i64) {
            Ok(packet) => print_json(&mut stdout, &packet, pp).await?,
            Err(e) => tracing::warn!(error = %e, hex = %hex::encode(&bytes), "dropping malformed packet"),
        }
    }
    Ok(())
}

async fn run_apdu_stage(pp: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = stdin_lines().await;
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        let Some((bytes, epoch)) = Pipeline::parse_line(&line) else { continue };
        let packet = match frame::decode_packet(&bytes, (epoch * 1000.0) as i64) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed packet");
                continue;
            }
        };
        for f in packet.frames {
            let frame::Frame::Apdu { payload, .. } = f else { continue };
            match apdu::decode_apdu(&payload) {
                Ok(decoded) => print_json(&mut stdout, &decoded, pp).await?,
                Err(e) => tracing::warn!(error = %e, hex = %hex::encode(&payload), "dropping malformed apdu"),
            }
        }
    }
    Ok(())
}

async fn run_reconstruct_stage(pp: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = stdin_lines().await;
    let mut stdout = tokio::io::stdout();
    let mut desegmenter = Desegmenter::new();
    let mut matcher = TwgoMatcher::new();

    while let Some(line) = lines.next_line().await? {
        let Some((bytes, epoch)) = Pipeline::parse_line(&line) else { continue };
        let reception_time = fisb_core::time::epoch_to_instant(epoch);
        let packet = match frame::decode_packet(&bytes, (epoch * 1000.0) as i64) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed packet");
                continue;
            }
        };
        for f in packet.frames {
            let frame::Frame::Apdu { payload, .. } = f else { continue };
            let apdu = match apdu::decode_apdu(&payload) {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed apdu");
                    continue;
                }
            };
            let product_id = apdu.header.product_id;
            let reassembled = match desegmenter.ingest(apdu, reception_time) {
                Ok(Some(a)) => a,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping unreassemblable apdu");
                    continue;
                }
            };
            match reassembled.payload {
                ApduPayload::Twgo(object) => {
                    let referencing_month = reassembled.header.month.unwrap_or(0);
                    if let Some(matched) = matcher.ingest(product_id, referencing_month, object, reception_time) {
                        print_json(&mut stdout, &matched, pp).await?;
                    }
                }
                other => print_json(&mut stdout, &other, pp).await?,
            }
        }
    }
    Ok(())
}

async fn run_normalize_stage(config: Config, pp: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = stdin_lines().await;
    let mut stdout = tokio::io::stdout();
    let mut desegmenter = Desegmenter::new();
    let mut matcher = TwgoMatcher::new();

    while let Some(line) = lines.next_line().await? {
        for record in normalize_one_line(&line, &mut desegmenter, &mut matcher, &config) {
            print_json(&mut stdout, &record, pp).await?;
        }
    }
    Ok(())
}

async fn run_dedup_stage(config: Config, pp: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = stdin_lines().await;
    let mut stdout = tokio::io::stdout();
    let mut desegmenter = Desegmenter::new();
    let mut matcher = TwgoMatcher::new();
    let mut dedup = Deduplicator::new();

    while let Some(line) = lines.next_line().await? {
        for record in normalize_one_line(&line, &mut desegmenter, &mut matcher, &config) {
            if dedup.admit(&record, Utc::now()) {
                print_json(&mut stdout, &record, pp).await?;
            }
        }
    }
    Ok(())
}

/// Shared by the `normalize` and `dedup` stages: runs one input line through
/// frame/apdu/reconstruct/normalize without touching a store.
fn normalize_one_line(
    line: &str,
    desegmenter: &mut Desegmenter,
    matcher: &mut TwgoMatcher,
    config: &Config,
) -> Vec<fisb_core::Record> {
    let Some((bytes, epoch)) = Pipeline::parse_line(line) else { return Vec::new() };
    let reception_time = fisb_core::time::epoch_to_instant(epoch);
    let packet = match frame::decode_packet(&bytes, (epoch * 1000.0) as i64) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed packet");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for f in packet.frames {
        let frame::Frame::Apdu { payload, .. } = f else { continue };
        let apdu = match apdu::decode_apdu(&payload) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed apdu");
                continue;
            }
        };
        let product_id = apdu.header.product_id;
        let reassembled = match desegmenter.ingest(apdu, reception_time) {
            Ok(Some(a)) => a,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "dropping unreassemblable apdu");
                continue;
            }
        };
        match reassembled.payload {
            ApduPayload::DlacText { text } => {
                if let Ok(record) = normalize::normalize_dlac_text(&text, reception_time, config) {
                    out.push(record);
                }
            }
            ApduPayload::Twgo(object) => {
                let referencing_month = reassembled.header.month.unwrap_or(0);
                if let Some(matched) = matcher.ingest(product_id, referencing_month, object.clone(), reception_time) {
                    let merged = fisb_core::apdu::twgo::TwgoObject {
                        record_format: object.record_format,
                        location: matched.key.location.clone(),
                        record_reference_point: object.record_reference_point,
                        text_records: matched.text.into_iter().collect(),
                        graphic_records: matched.graphics,
                    };
                    if let Ok(record) = normalize::normalize_twgo(product_id, &merged, reception_time, config) {
                        out.push(record);
                    }
                }
            }
            ApduPayload::GlobalBlock(_) | ApduPayload::Segment { .. } => {}
        }
    }
    out
}

/// The composed deployment (spec §5 "Implementation"): stdin ingestion and
/// the `maint_interval`-second maintenance tick interleave via
/// `tokio::select!` over a single owned [`Pipeline`], matching the teacher's
/// ingest-task-plus-expire-task split in spirit without requiring
/// `Pipeline`'s borrowed `Store`/`Renderer` to satisfy `tokio::spawn`'s
/// `'static` bound (see DESIGN.md).
async fn run_pipeline_stage(config: Config, pp: bool) -> Result<(), Box<dyn std::error::Error>> {
    let maint_interval = config.maint_interval;
    let mut store = MemoryStore::new();
    let mut renderer = NullRenderer;
    let mut pipeline = Pipeline::new(config, &mut store, &mut renderer);

    let mut lines = stdin_lines().await;
    let mut stdout = tokio::io::stdout();
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(maint_interval.max(1)));
    interval.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                for record in pipeline.ingest_line(&line) {
                    print_json(&mut stdout, &record, pp).await?;
                }
            }
            _ = interval.tick() => {
                let emitted = pipeline.run_maintenance(Utc::now());
                tracing::info!(emitted = emitted.len(), "maintenance tick complete");
            }
        }
    }
    Ok(())
}
