use std::sync::{mpsc, Arc};
use std::thread;

use engine_logging::{engine_error, engine_info, engine_warn};
use posting_core::{KeywordRanker, RankedKeywords, RankerConfig};

use crate::analysis::Analyzer;
use crate::fetch::{ChannelProgressSink, ProgressSink};
use crate::history::{RunRecord, RunSink};
use crate::pipeline::Pipeline;
use crate::{EngineEvent, JobId, JobProgress, JobReport, Stage};

enum EngineCommand {
    Enqueue { job_id: JobId, input: String },
}

/// Collaborators that act on a run after extraction.
pub struct EngineServices {
    pub analyzer: Option<Arc<dyn Analyzer>>,
    pub ranker: KeywordRanker,
    /// Ranked against the content when no analysis result supplies candidates.
    pub seed_keywords: Vec<String>,
    pub sink: Option<Arc<dyn RunSink>>,
}

impl Default for EngineServices {
    fn default() -> Self {
        Self {
            analyzer: None,
            ranker: KeywordRanker::new(RankerConfig::default()),
            seed_keywords: Vec::new(),
            sink: None,
        }
    }
}

struct JobContext {
    pipeline: Pipeline,
    services: EngineServices,
}

/// Runs jobs on a background tokio runtime and reports back over a channel.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(pipeline: Pipeline, services: EngineServices) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let context = Arc::new(JobContext { pipeline, services });

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    engine_error!("Failed to start engine runtime: {}", err);
                    return;
                }
            };
            while let Ok(command) = cmd_rx.recv() {
                let context = context.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    handle_command(&context, command, event_tx).await;
                });
            }
        });

        Self { cmd_tx, event_rx }
    }

    pub fn enqueue(&self, job_id: JobId, input: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Enqueue {
            job_id,
            input: input.into(),
        });
    }

    /// Block until the next event. `None` once the engine thread is gone.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }
}

async fn handle_command(
    context: &JobContext,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    match command {
        EngineCommand::Enqueue { job_id, input } => {
            let sink = ChannelProgressSink::new(event_tx.clone());
            let report = run_job(context, job_id, input, &sink).await;
            if let Some(history) = &context.services.sink {
                history.record(&RunRecord::from_report(&report));
            }
            sink.emit(progress(job_id, Stage::Done));
            let _ = event_tx.send(EngineEvent::JobCompleted {
                job_id,
                report: Box::new(report),
            });
        }
    }
}

async fn run_job(
    context: &JobContext,
    job_id: JobId,
    input: String,
    sink: &ChannelProgressSink,
) -> JobReport {
    sink.emit(progress(job_id, Stage::Queued));
    let extraction = context.pipeline.extract_job(job_id, &input, sink).await;

    let content = match &extraction {
        Ok(result) if result.success => Some(result),
        Ok(_) => None,
        Err(err) => {
            engine_warn!("Rejected input {:?}: {}", input, err);
            None
        }
    };

    let analysis = match (content, &context.services.analyzer) {
        (Some(result), Some(analyzer)) => {
            sink.emit(progress(job_id, Stage::Analyzing));
            let outcome = analyzer
                .analyze(&result.content, &result.structured_fields)
                .await;
            match &outcome {
                Ok(analysis) => engine_info!(
                    "Analysis of {} is {:.0}% complete",
                    result.resolved_url.canonical,
                    analysis.completeness() * 100.0
                ),
                Err(err) => engine_warn!(
                    "Analysis of {} failed: {}",
                    result.resolved_url.canonical,
                    err
                ),
            }
            Some(outcome)
        }
        _ => None,
    };

    let keywords = match content {
        Some(result) => {
            let candidates = match &analysis {
                Some(Ok(analysis)) if !analysis.keyword_candidates().is_empty() => {
                    analysis.keyword_candidates()
                }
                _ => context.services.seed_keywords.clone(),
            };
            context.services.ranker.rank(&result.content, candidates.as_slice())
        }
        None => RankedKeywords::default(),
    };

    JobReport {
        input,
        extraction,
        analysis,
        keywords,
    }
}

fn progress(job_id: JobId, stage: Stage) -> EngineEvent {
    EngineEvent::Progress(JobProgress {
        job_id,
        stage,
        bytes: None,
    })
}
