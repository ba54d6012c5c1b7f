//! vasset: turn a video into a queryable evidence asset.
//!
//! Thin adapter over `vasset-pipeline`: argument parsing, subscriber
//! setup, and human-readable printing. No pipeline logic lives here.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vasset_media::transcribe::{HttpTranscriber, Transcriber};
use vasset_models::{AssetId, Stage, StageStatus};
use vasset_pipeline::clean::{clean_all, clean_asset};
use vasset_pipeline::query::{gather_evidence, query_asset, DEFAULT_TOP_K};
use vasset_pipeline::stages;
use vasset_pipeline::status::{list_assets, show_status};
use vasset_pipeline::{
    run_pipeline, PipelineConfig, PipelineContext, PipelineOptions, StageOutcome,
};

#[derive(Parser)]
#[command(name = "vasset", version, about = "Video asset extraction and evidence retrieval")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check external binaries, the data directory, and the database
    Doctor,
    /// Fetch metadata for a video URL and create the asset
    Ingest {
        url: String,
        #[arg(long)]
        force: bool,
    },
    /// Materialize the source video (download or local copy)
    ExtractSource {
        asset_id: String,
        /// Copy this local file instead of downloading
        #[arg(long)]
        local_file: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
    /// Sample candidate frames and collapse duplicates
    ExtractFrames {
        asset_id: String,
        /// Seconds between uniform samples
        #[arg(long)]
        interval_sec: Option<f64>,
        /// Scene-change threshold (overrides uniform sampling)
        #[arg(long)]
        scene_thresh: Option<f64>,
        /// Cap on retained frames
        #[arg(long)]
        max_frames: Option<usize>,
        #[arg(long)]
        force: bool,
    },
    /// Score frames and build the info-density timeline
    ExtractTimeline {
        asset_id: String,
        /// Bucket width in seconds
        #[arg(long)]
        bucket_sec: Option<u32>,
        #[arg(long)]
        force: bool,
    },
    /// Select representative frames from the top buckets
    ExtractSelect {
        asset_id: String,
        #[arg(long)]
        top_buckets: Option<usize>,
        #[arg(long)]
        max_frames: Option<usize>,
        #[arg(long)]
        force: bool,
    },
    /// Run text recognition over the selected frames
    ExtractOcr {
        asset_id: String,
        #[arg(long)]
        lang: Option<String>,
        #[arg(long)]
        psm: Option<u8>,
        #[arg(long)]
        force: bool,
    },
    /// Normalize raw recognition spans into per-frame text
    OcrNormalize {
        asset_id: String,
        #[arg(long)]
        min_conf: Option<f32>,
        #[arg(long)]
        force: bool,
    },
    /// Extract audio and fetch the transcript
    ExtractTranscript {
        asset_id: String,
        #[arg(long)]
        force: bool,
    },
    /// Run the full extraction pipeline
    Pipeline {
        asset_id: String,
        /// Copy this local file instead of downloading
        #[arg(long)]
        local_file: Option<PathBuf>,
        /// Stop after this stage
        #[arg(long)]
        until: Option<Stage>,
        /// Halt at the first failed stage
        #[arg(long)]
        stop_on_error: bool,
        #[arg(long)]
        force: bool,
    },
    /// Index transcript and OCR text into the evidence database
    Index {
        asset_id: String,
        #[arg(long)]
        force: bool,
    },
    /// Ranked lexical search over an asset's evidence
    Query {
        asset_id: String,
        query: String,
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Build a time-ordered, citation-annotated evidence pack
    Evidence {
        asset_id: String,
        query: String,
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Write the pack as JSON to this path instead of printing
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show asset status (or list all assets)
    Show {
        asset_id: Option<String>,
    },
    /// Delete an asset's artifacts and database rows (destructive)
    Clean {
        /// Asset to delete; use --all for every asset
        asset_id: Option<String>,
        #[arg(long)]
        all: bool,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();
    let ctx = PipelineContext::new(config);

    match run(cli.command, &ctx).await {
        Ok(ok) => {
            if ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, ctx: &PipelineContext) -> anyhow::Result<bool> {
    match command {
        Command::Doctor => doctor(ctx),
        Command::Ingest { url, force } => {
            let report = stages::ingest::ingest(ctx, &url, force).await?;
            println!("Asset:  {}", report.asset_id);
            println!("Title:  {}", report.title);
            println!(
                "Status: {}{}",
                report.status,
                if report.cached { " (cached)" } else { "" }
            );
            for error in &report.errors {
                eprintln!("  - {}", error);
            }
            Ok(report.errors.is_empty())
        }
        Command::ExtractSource {
            asset_id,
            local_file,
            force,
        } => {
            let outcome = stages::source::run(
                ctx,
                &AssetId::new(asset_id),
                stages::source::SourceParams { local_file },
                force,
            )
            .await?;
            Ok(print_outcome(&outcome))
        }
        Command::ExtractFrames {
            asset_id,
            interval_sec,
            scene_thresh,
            max_frames,
            force,
        } => {
            let config = &ctx.config;
            let outcome = stages::frames::run(
                ctx,
                &AssetId::new(asset_id),
                stages::frames::FramesParams {
                    interval_sec: interval_sec.unwrap_or(config.interval_sec),
                    scene_thresh: scene_thresh.or(config.scene_thresh),
                    max_frames: max_frames.or(config.max_frames),
                },
                force,
            )
            .await?;
            Ok(print_outcome(&outcome))
        }
        Command::ExtractTimeline {
            asset_id,
            bucket_sec,
            force,
        } => {
            let outcome = stages::timeline::run(
                ctx,
                &AssetId::new(asset_id),
                stages::timeline::TimelineParams {
                    bucket_sec: bucket_sec.unwrap_or(ctx.config.bucket_sec),
                },
                force,
            )
            .await?;
            Ok(print_outcome(&outcome))
        }
        Command::ExtractSelect {
            asset_id,
            top_buckets,
            max_frames,
            force,
        } => {
            let outcome = stages::select::run(
                ctx,
                &AssetId::new(asset_id),
                stages::select::SelectParams {
                    top_buckets: top_buckets.unwrap_or(ctx.config.top_buckets),
                    max_frames: max_frames.unwrap_or(ctx.config.max_selected),
                },
                force,
            )
            .await?;
            Ok(print_outcome(&outcome))
        }
        Command::ExtractOcr {
            asset_id,
            lang,
            psm,
            force,
        } => {
            let outcome = stages::ocr::run(
                ctx,
                &AssetId::new(asset_id),
                stages::ocr::OcrStageParams {
                    lang: lang.unwrap_or_else(|| ctx.config.ocr_lang.clone()),
                    psm: psm.unwrap_or(ctx.config.ocr_psm),
                },
                force,
            )
            .await?;
            Ok(print_outcome(&outcome))
        }
        Command::OcrNormalize {
            asset_id,
            min_conf,
            force,
        } => {
            let outcome = stages::ocr_normalize::run(
                ctx,
                &AssetId::new(asset_id),
                stages::ocr_normalize::OcrNormalizeParams {
                    min_conf: min_conf.unwrap_or(ctx.config.ocr_min_conf),
                },
                force,
            )
            .await?;
            Ok(print_outcome(&outcome))
        }
        Command::ExtractTranscript { asset_id, force } => {
            let transcriber = build_transcriber(ctx)
                .context("transcription provider not configured (set VASSET_TRANSCRIBE_ENDPOINT)")?;
            let outcome = stages::transcript::run(
                ctx,
                &AssetId::new(asset_id),
                stages::transcript::TranscriptParams {
                    provider: transcriber.provider_name().to_string(),
                    model: ctx.config.transcribe_model.clone(),
                },
                &transcriber,
                force,
            )
            .await?;
            Ok(print_outcome(&outcome))
        }
        Command::Pipeline {
            asset_id,
            local_file,
            until,
            stop_on_error,
            force,
        } => {
            let transcriber = build_transcriber(ctx);
            let run = run_pipeline(
                ctx,
                &AssetId::new(asset_id),
                transcriber.as_ref().map(|t| t as &dyn Transcriber),
                PipelineOptions {
                    local_file,
                    until,
                    stop_on_error,
                    force,
                },
            )
            .await?;

            for outcome in &run.outcomes {
                print_outcome(outcome);
            }
            println!(
                "Pipeline {}",
                if run.completed { "completed" } else { "failed" }
            );
            if !run.failed_stages.is_empty() {
                let names: Vec<&str> = run.failed_stages.iter().map(|s| s.as_str()).collect();
                println!("Failed stages: {}", names.join(", "));
            }
            Ok(run.completed)
        }
        Command::Index { asset_id, force } => {
            let outcome = stages::index::run(
                ctx,
                &AssetId::new(asset_id),
                stages::index::IndexParams {
                    merge_max_chars: ctx.config.merge_max_chars,
                },
                force,
            )
            .await?;
            Ok(print_outcome(&outcome))
        }
        Command::Query {
            asset_id,
            query,
            top_k,
        } => {
            let pack = query_asset(ctx, &AssetId::new(asset_id), &query, top_k)?;
            if pack.is_empty() {
                println!("No evidence matched \"{}\".", pack.query);
                return Ok(true);
            }
            println!("{} hits ({} total matches)", pack.items.len(), pack.total_count);
            for item in &pack.items {
                println!("  {:>7.3}  {}  {}", item.score, item.citation, item.snippet);
            }
            Ok(true)
        }
        Command::Evidence {
            asset_id,
            query,
            top_k,
            out,
        } => {
            let pack = gather_evidence(ctx, &AssetId::new(asset_id), &query, top_k)?;
            if let Some(path) = out {
                let json = serde_json::to_string_pretty(&pack)?;
                std::fs::write(&path, json)?;
                println!("Wrote evidence pack to {}", path.display());
                return Ok(true);
            }
            if pack.is_empty() {
                println!("Insufficient evidence for \"{}\".", pack.query);
                return Ok(true);
            }
            for item in &pack.items {
                println!("{}", item.citation);
                println!("  {}", item.text);
            }
            Ok(true)
        }
        Command::Show { asset_id } => {
            match asset_id {
                Some(id) => {
                    let report = show_status(ctx, &AssetId::new(id))?;
                    println!("Asset:    {}", report.asset_id);
                    if let Some(title) = &report.title {
                        println!("Title:    {}", title);
                    }
                    if let Some(duration) = report.duration_seconds {
                        println!("Duration: {:.0}s", duration);
                    }
                    println!("Status:   {}", report.status);
                    println!("Stages:");
                    for row in &report.stages {
                        let mut line = format!("  {:<14} {}", row.stage.as_str(), row.status);
                        if let Some(error) = &row.error {
                            line.push_str(&format!("  ({})", error));
                        }
                        println!("{}", line);
                    }
                    println!("Provenance events: {}", report.provenance_events);
                }
                None => {
                    let assets = list_assets(ctx)?;
                    if assets.is_empty() {
                        println!("No assets.");
                    }
                    for id in assets {
                        println!("{}", id);
                    }
                }
            }
            Ok(true)
        }
        Command::Clean { asset_id, all, yes } => {
            let target = match (&asset_id, all) {
                (Some(id), false) => format!("asset {}", id),
                (None, true) => "ALL assets".to_string(),
                _ => anyhow::bail!("pass an asset id or --all (not both)"),
            };

            if !yes && !confirm(&format!("Delete {} permanently?", target))? {
                println!("Aborted.");
                return Ok(true);
            }

            let report = match (asset_id, all) {
                (Some(id), false) => clean_asset(ctx, &AssetId::new(id))?,
                _ => clean_all(ctx)?,
            };
            for id in &report.deleted {
                println!("Deleted {}", id);
            }
            for error in &report.errors {
                eprintln!("  - {}", error);
            }
            Ok(report.errors.is_empty())
        }
    }
}

fn build_transcriber(ctx: &PipelineContext) -> Option<HttpTranscriber> {
    ctx.config.transcribe_endpoint.as_ref().map(|endpoint| {
        HttpTranscriber::new(
            endpoint.clone(),
            ctx.config.transcribe_api_key.clone(),
            ctx.config.transcribe_model.clone(),
        )
    })
}

/// Print a stage outcome; returns true when the stage succeeded.
fn print_outcome(outcome: &StageOutcome) -> bool {
    let cached = if outcome.cached { " (cached)" } else { "" };
    println!("{:<14} {}{}", outcome.stage.as_str(), outcome.status, cached);
    if !outcome.metrics.is_null() {
        if let Some(map) = outcome.metrics.as_object() {
            for (key, value) in map {
                println!("  {}: {}", key, value);
            }
        }
    }
    if let Some(error) = &outcome.error {
        eprintln!("  error: {}", error);
    }
    outcome.status == StageStatus::Done
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn doctor(ctx: &PipelineContext) -> anyhow::Result<bool> {
    let mut ok = true;

    for (name, check) in [
        ("ffmpeg", vasset_media::check_ffmpeg()),
        ("ffprobe", vasset_media::check_ffprobe()),
        ("yt-dlp", vasset_media::check_ytdlp()),
        ("tesseract", vasset_media::check_tesseract()),
    ] {
        match check {
            Ok(path) => println!("{:<10} OK ({})", name, path.display()),
            Err(_) => {
                println!("{:<10} NOT FOUND", name);
                ok = false;
            }
        }
    }

    let data_dir = &ctx.config.data_dir;
    match std::fs::create_dir_all(ctx.config.assets_dir()) {
        Ok(()) => println!("{:<10} OK ({})", "data dir", data_dir.display()),
        Err(e) => {
            println!("{:<10} FAILED ({})", "data dir", e);
            ok = false;
        }
    }

    match vasset_store::EvidenceDb::open_or_create(&ctx.config.db_path()) {
        Ok(_) => println!("{:<10} OK ({})", "database", ctx.config.db_path().display()),
        Err(e) => {
            println!("{:<10} FAILED ({})", "database", e);
            ok = false;
        }
    }

    if ctx.config.transcribe_endpoint.is_none() {
        println!("{:<10} not configured (transcript stage unavailable)", "transcribe");
    }

    println!();
    println!("{}", if ok { "All checks passed." } else { "Some checks failed." });
    Ok(ok)
}
