use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_info, engine_warn};
use posting_core::{
    canonicalize, detect_platform, update, validate_url, AttemptOutcome, ContentValidator,
    Effect, ExtractionCandidate, ExtractionResult, ExtractionRun, FetchMetadata, Msg,
    PlatformProfile, ResolvedUrl, Stage as RunStage, StrategyKind, UrlValidationError,
    ValidatorConfig,
};
use url::Url;

use crate::clean::MarkupCleaner;
use crate::extract::{is_script_shell, Extractor};
use crate::fallback::ReadabilityExtractor;
use crate::fetch::{Fetcher, NullProgressSink, ProgressSink};
use crate::render::Renderer;
use crate::structured::StructuredDataExtractor;
use crate::{EngineEvent, JobId, JobProgress, Stage};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub validator: ValidatorConfig,
    /// Add one render attempt when every static strategy failed on a script shell.
    pub render_on_script_shell: bool,
    /// Wall-clock budget for one run, checked at the fetch and render suspend points.
    pub deadline: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            validator: ValidatorConfig::default(),
            render_on_script_shell: true,
            deadline: None,
        }
    }
}

/// Drives the extraction state machine for one URL at a time. Holds no
/// per-run state, so one instance serves any number of concurrent runs.
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    renderer: Option<Arc<dyn Renderer>>,
    settings: PipelineSettings,
    structured: StructuredDataExtractor,
    cleaner: MarkupCleaner,
    fallback: ReadabilityExtractor,
}

/// Where the markup of a run comes from.
enum Source<'a> {
    Network(&'a dyn Fetcher),
    Supplied,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: PipelineSettings) -> Self {
        Self {
            fetcher,
            renderer: None,
            settings,
            structured: StructuredDataExtractor,
            cleaner: MarkupCleaner,
            fallback: ReadabilityExtractor,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Validate, classify, fetch and extract one URL.
    pub async fn extract(&self, raw_url: &str) -> Result<ExtractionResult, UrlValidationError> {
        self.extract_job(0, raw_url, &NullProgressSink).await
    }

    pub async fn extract_job(
        &self,
        job_id: JobId,
        raw_url: &str,
        progress: &dyn ProgressSink,
    ) -> Result<ExtractionResult, UrlValidationError> {
        let (profile, resolved) = route(raw_url)?;
        let source = Source::Network(self.fetcher.as_ref());
        Ok(self.drive(job_id, profile, resolved, source, String::new(), progress).await)
    }

    /// Run the strategy chain over markup already in hand. The fetch step is
    /// reported as a synthetic 200 for `url`.
    pub async fn extract_markup(&self, url: &Url, markup: &str) -> ExtractionResult {
        let profile = detect_platform(url);
        let resolved = canonicalize(url, profile.platform);
        self.drive(
            0,
            profile,
            resolved,
            Source::Supplied,
            markup.to_string(),
            &NullProgressSink,
        )
        .await
    }

    async fn drive(
        &self,
        job_id: JobId,
        profile: PlatformProfile,
        resolved: ResolvedUrl,
        source: Source<'_>,
        mut markup: String,
        progress: &dyn ProgressSink,
    ) -> ExtractionResult {
        let started = Instant::now();
        let run = ExtractionRun::new(
            profile,
            resolved,
            ContentValidator::new(self.settings.validator.clone()),
        )
        .with_render_on_script_shell(
            self.settings.render_on_script_shell && self.renderer.is_some(),
        );

        let (mut run, effects) = update(run, Msg::Start);
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            let msg = match effect {
                Effect::Fetch { url } => match &source {
                    Source::Network(fetcher) => {
                        let (msg, fetched) =
                            self.fetch(job_id, *fetcher, &url, progress, started).await;
                        if let Some(fetched) = fetched {
                            markup = fetched;
                        }
                        msg
                    }
                    Source::Supplied => supplied_fetch(&url, &markup),
                },
                Effect::RunStrategy(StrategyKind::Render) => {
                    let url = run.resolved().canonical.clone();
                    self.render(job_id, &url, &mut markup, progress, started)
                        .await
                }
                Effect::RunStrategy(kind) => {
                    let candidate = self.extractor(kind).extract(&markup);
                    engine_debug!(
                        "{} produced {} characters",
                        kind,
                        candidate.text.chars().count()
                    );
                    Msg::CandidateProduced(candidate)
                }
                Effect::Finished => break,
            };

            let attempts_before = run.attempts().len();
            let (next, effects) = update(run, msg);
            run = next;
            if run.attempts().len() > attempts_before {
                log_attempt(&run);
            }
            queue.extend(effects);
        }

        let result = run.finish();
        match &result.failure_reason {
            None => engine_info!(
                "Extracted {} characters from {} via {}",
                result.content.chars().count(),
                result.resolved_url.canonical,
                result
                    .best_method
                    .map(|method| method.to_string())
                    .unwrap_or_default()
            ),
            Some(reason) => engine_warn!(
                "Extraction failed for {}: {}",
                result.resolved_url.canonical,
                reason
            ),
        }
        result
    }

    async fn fetch(
        &self,
        job_id: JobId,
        fetcher: &dyn Fetcher,
        url: &Url,
        progress: &dyn ProgressSink,
        started: Instant,
    ) -> (Msg, Option<String>) {
        match self.within_deadline(started, fetcher.fetch(job_id, url, progress)).await {
            None => {
                engine_warn!("Deadline passed while fetching {}", url);
                (
                    Msg::DeadlineExceeded {
                        stage: RunStage::Fetching,
                    },
                    None,
                )
            }
            Some(Ok(page)) => {
                engine_info!(
                    "Fetched {} ({} bytes, status {})",
                    page.metadata.final_url,
                    page.metadata.byte_len,
                    page.metadata.status_code
                );
                progress.emit(EngineEvent::Progress(JobProgress {
                    job_id,
                    stage: Stage::Extracting,
                    bytes: Some(page.metadata.byte_len),
                }));
                let script_shell = is_script_shell(&page.markup);
                if script_shell {
                    engine_info!("{} looks like a script-rendered shell", url);
                }
                let msg = Msg::FetchCompleted {
                    result: Ok(page.metadata),
                    script_shell,
                };
                (msg, Some(page.markup))
            }
            Some(Err(err)) => {
                engine_warn!("Fetch of {} failed: {}", url, err);
                (
                    Msg::FetchCompleted {
                        result: Err(err),
                        script_shell: false,
                    },
                    None,
                )
            }
        }
    }

    /// Render the page and make the result the working markup for the rest
    /// of the run.
    async fn render(
        &self,
        job_id: JobId,
        url: &Url,
        markup: &mut String,
        progress: &dyn ProgressSink,
        started: Instant,
    ) -> Msg {
        let Some(renderer) = self.renderer.as_ref() else {
            engine_info!("No renderer registered, skipping render strategy for {}", url);
            return Msg::StrategyUnavailable(StrategyKind::Render);
        };
        progress.emit(EngineEvent::Progress(JobProgress {
            job_id,
            stage: Stage::Rendering,
            bytes: None,
        }));

        match self.within_deadline(started, renderer.render(url)).await {
            None => {
                engine_warn!("Deadline passed while rendering {}", url);
                Msg::DeadlineExceeded {
                    stage: RunStage::Rendering,
                }
            }
            Some(Ok(rendered)) => {
                *markup = rendered;
                let mut text = self.cleaner.clean(markup);
                if text.trim().is_empty() {
                    text = self.fallback.extract_text(markup);
                }
                Msg::CandidateProduced(ExtractionCandidate::new(StrategyKind::Render, text))
            }
            Some(Err(err)) => {
                engine_warn!("Render of {} failed: {}", url, err);
                Msg::CandidateProduced(ExtractionCandidate::empty(StrategyKind::Render))
            }
        }
    }

    /// `None` when the run deadline passes before `future` completes.
    async fn within_deadline<F: Future>(&self, started: Instant, future: F) -> Option<F::Output> {
        match self.settings.deadline {
            None => Some(future.await),
            Some(deadline) => {
                let remaining = deadline.checked_sub(started.elapsed())?;
                tokio::time::timeout(remaining, future).await.ok()
            }
        }
    }

    fn extractor(&self, kind: StrategyKind) -> &dyn Extractor {
        match kind {
            StrategyKind::StructuredData => &self.structured,
            StrategyKind::HtmlCleaning => &self.cleaner,
            StrategyKind::Fallback | StrategyKind::Render => &self.fallback,
        }
    }
}

/// Validate raw input and compute its routing metadata.
fn route(raw_url: &str) -> Result<(PlatformProfile, ResolvedUrl), UrlValidationError> {
    let url = validate_url(raw_url)?;
    let profile = detect_platform(&url);
    engine_info!("Detected platform {} for {}", profile.display_name, url);
    let resolved = canonicalize(&url, profile.platform);
    if resolved.was_resolved {
        engine_info!("Resolved {} to {}", resolved.original, resolved.canonical);
    }
    Ok((profile, resolved))
}

fn supplied_fetch(url: &Url, markup: &str) -> Msg {
    Msg::FetchCompleted {
        result: Ok(FetchMetadata {
            status_code: 200,
            final_url: url.to_string(),
            encoding: "UTF-8".to_string(),
            content_type: None,
            redirect_count: 0,
            byte_len: markup.len() as u64,
        }),
        script_shell: is_script_shell(markup),
    }
}

fn log_attempt(run: &ExtractionRun) {
    let Some(attempt) = run.attempts().last() else {
        return;
    };
    match &attempt.outcome {
        AttemptOutcome::Accepted => engine_info!("{} content accepted", attempt.strategy),
        AttemptOutcome::Rejected(rejection) => {
            engine_info!("{} content rejected: {}", attempt.strategy, rejection)
        }
        AttemptOutcome::Unavailable => engine_debug!("{} unavailable", attempt.strategy),
    }
}
