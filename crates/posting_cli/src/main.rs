//! `job-extract`: turn job posting URLs into clean text, analysis and ranked keywords.
mod batch;
mod config;
mod history;
mod report;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use engine_logging::{engine_debug, engine_info, engine_warn, LogDestination};
use log::LevelFilter;
use posting_core::KeywordRanker;
use posting_engine::{
    Analyzer, ChatCompletionsAnalyzer, EngineEvent, EngineHandle, EngineServices, JobId,
    JobReport, Pipeline, RenderServiceClient, ReqwestFetcher, RunSink,
};
use serde_json::json;
use url::Url;

use crate::batch::{plan_batch, read_input_file, BatchPlan};
use crate::config::AppConfig;
use crate::history::RonHistory;
use crate::report::{render_text, report_json, BatchSummary};

#[derive(Parser, Debug)]
#[command(name = "job-extract", version)]
#[command(about = "Extract job posting text, analysis and ranked keywords from job board URLs")]
struct Args {
    /// Job posting URLs; the scheme may be omitted.
    urls: Vec<String>,

    /// Read more URLs from a file, one per line.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// RON configuration file (defaults to ./job-extract.ron when present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    /// Write the JSON results to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Include a preview of the extracted text in the terminal report.
    #[arg(long)]
    content: bool,

    /// Run the analysis step even when the config disables it.
    #[arg(long)]
    analyze: bool,

    #[arg(long, conflicts_with = "analyze")]
    no_analysis: bool,

    /// Prerender service used for script-rendered pages (`GET <endpoint>?url=<page>`).
    #[arg(long)]
    render_endpoint: Option<Url>,

    /// Show run history statistics.
    #[arg(long)]
    history: bool,

    /// Delete all run history and exit.
    #[arg(long)]
    clear_history: bool,

    /// History file, overriding the configured path.
    #[arg(long)]
    history_file: Option<PathBuf>,

    /// Do not record this run in the history.
    #[arg(long)]
    no_history: bool,

    /// Also write the log to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// More log output; repeat for more detail.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let config = AppConfig::load(args.config.as_deref())?;
    init_logging(&args, &config)?;

    let history_path = args
        .history_file
        .clone()
        .unwrap_or_else(|| config.history.path.clone());
    let history = Arc::new(RonHistory::open(history_path));

    if args.clear_history {
        history
            .clear()
            .with_context(|| format!("failed to clear history at {:?}", history.path()))?;
        println!("History cleared.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut inputs = args.urls.clone();
    if let Some(path) = &args.input {
        let listed =
            read_input_file(path).with_context(|| format!("failed to read {:?}", path))?;
        inputs.extend(listed);
    }

    if inputs.is_empty() {
        if args.history {
            print_history(&history);
            return Ok(ExitCode::SUCCESS);
        }
        bail!("no URLs given; pass them as arguments or with --input");
    }

    let plan = plan_batch(&inputs);
    for (input, err) in &plan.invalid {
        engine_warn!("Skipping invalid input {:?}: {}", input, err);
    }
    for duplicate in &plan.duplicates {
        engine_info!("Skipping duplicate {:?}", duplicate);
    }

    let sink: Option<Arc<dyn RunSink>> = if config.history.enabled && !args.no_history {
        let sink: Arc<dyn RunSink> = history.clone();
        Some(sink)
    } else {
        None
    };
    let engine = build_engine(&args, &config, sink)?;
    let reports = run_batch(&engine, &plan);

    let summary = summarize(&plan, &reports);
    if args.json || args.output.is_some() {
        write_json(&args, &plan, &reports, summary)?;
    } else {
        for (input, err) in &plan.invalid {
            println!("== {input} ==\nError:      invalid URL: {err}\n");
        }
        for report in reports.values() {
            println!("{}", render_text(report, args.content));
        }
        println!("{}", summary.line());
    }

    if args.history {
        print_history(&history);
    }

    Ok(if summary.failed == 0 && summary.invalid == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

const RECENT_RUNS: usize = 10;

fn print_history(history: &RonHistory) {
    print!("{}", history.stats());
    let entries = history.entries();
    if entries.is_empty() {
        return;
    }
    println!("Recent runs:");
    for entry in entries.iter().rev().take(RECENT_RUNS) {
        let record = &entry.record;
        let outcome = if record.success {
            "ok"
        } else {
            record.error_type.as_deref().unwrap_or("failed")
        };
        println!(
            "  {}  {:<22} {:<18} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            outcome,
            record.platform,
            record.url
        );
    }
}

fn init_logging(args: &Args, config: &AppConfig) -> Result<()> {
    let level = if args.quiet {
        LevelFilter::Error
    } else {
        match args.verbose {
            0 => config.log_level()?.unwrap_or(LevelFilter::Warn),
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    let destination = match &args.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    engine_logging::initialize(destination, level);
    Ok(())
}

fn build_engine(
    args: &Args,
    config: &AppConfig,
    sink: Option<Arc<dyn RunSink>>,
) -> Result<EngineHandle> {
    let fetcher = Arc::new(ReqwestFetcher::new(config.fetch_settings()));
    let mut pipeline = Pipeline::new(fetcher, config.pipeline_settings());
    if let Some(endpoint) = &args.render_endpoint {
        let timeout = Duration::from_secs(config.fetch.request_timeout_secs);
        let renderer = RenderServiceClient::new(endpoint.clone(), timeout)
            .context("failed to build render client")?;
        pipeline = pipeline.with_renderer(Arc::new(renderer));
        engine_info!("Rendering through {}", endpoint);
    }

    let analysis_wanted = (config.analysis.enabled || args.analyze) && !args.no_analysis;
    let analyzer: Option<Arc<dyn Analyzer>> = if analysis_wanted {
        match config.analyzer_settings(|name| std::env::var(name).ok()) {
            Ok(settings) => {
                let analyzer: Arc<dyn Analyzer> = Arc::new(
                    ChatCompletionsAnalyzer::new(settings).context("failed to build analyzer")?,
                );
                Some(analyzer)
            }
            Err(err) => {
                engine_warn!("Analysis disabled: {}", err);
                None
            }
        }
    } else {
        None
    };

    let services = EngineServices {
        analyzer,
        ranker: KeywordRanker::new(config.ranker_config()),
        seed_keywords: config.keywords.seed_keywords.clone(),
        sink,
    };
    Ok(EngineHandle::new(pipeline, services))
}

fn run_batch(engine: &EngineHandle, plan: &BatchPlan) -> BTreeMap<JobId, JobReport> {
    for job in &plan.jobs {
        engine.enqueue(job.job_id, job.input.clone());
    }

    let mut reports = BTreeMap::new();
    while reports.len() < plan.jobs.len() {
        match engine.recv() {
            Some(EngineEvent::Progress(progress)) => {
                engine_debug!("Job {} {}", progress.job_id, progress.stage);
            }
            Some(EngineEvent::JobCompleted { job_id, report }) => {
                reports.insert(job_id, *report);
            }
            None => {
                engine_warn!("Engine stopped with {} jobs outstanding", plan.jobs.len() - reports.len());
                break;
            }
        }
    }
    reports
}

fn summarize(plan: &BatchPlan, reports: &BTreeMap<JobId, JobReport>) -> BatchSummary {
    let succeeded = reports.values().filter(|report| report.succeeded()).count();
    BatchSummary {
        succeeded,
        failed: plan.jobs.len() - succeeded,
        invalid: plan.invalid.len(),
        duplicates: plan.duplicates.len(),
    }
}

fn write_json(
    args: &Args,
    plan: &BatchPlan,
    reports: &BTreeMap<JobId, JobReport>,
    summary: BatchSummary,
) -> Result<()> {
    let invalid: Vec<_> = plan
        .invalid
        .iter()
        .map(|(input, err)| {
            json!({
                "input": input,
                "success": false,
                "error": { "type": "invalid_url", "message": err.to_string() },
            })
        })
        .collect();
    let results: Vec<_> = reports.values().map(report_json).collect();
    let document = json!({
        "results": results,
        "invalid": invalid,
        "duplicates": plan.duplicates,
        "summary": summary.to_json(),
    });
    let text = serde_json::to_string_pretty(&document)?;

    match &args.output {
        Some(path) => {
            posting_engine::write_atomic(path, &text)
                .with_context(|| format!("failed to write {:?}", path))?;
            println!("Wrote {} results to {}", results.len(), path.display());
            println!("{}", summary.line());
        }
        None => println!("{text}"),
    }
    Ok(())
}
