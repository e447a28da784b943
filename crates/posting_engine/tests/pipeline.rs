use std::sync::{Arc, Mutex};
use std::time::Duration;

use posting_core::{
    AttemptOutcome, FailureReason, FetchError, FetchErrorKind, FetchMetadata, Platform,
    Rejection, Stage, StrategyKind, UrlValidationError,
};
use posting_engine::{
    FetchSettings, FetchedPage, Fetcher, JobId, Pipeline, PipelineSettings, ProgressSink,
    RenderError, Renderer, ReqwestFetcher,
};
use pretty_assertions::assert_eq;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POSTING_HTML: &str = r#"<html><head><title>Data Engineer</title></head><body>
<nav><a href="/">Home</a></nav>
<main>
  <h1>Data Engineer</h1>
  <p>About the role: our analytics group needs someone to build and operate batch and streaming pipelines for the whole company.</p>
  <h2>Responsibilities</h2>
  <ul><li>Design warehouse models in SQL</li><li>Maintain Airflow and Spark jobs</li></ul>
  <h2>Requirements</h2>
  <ul><li>Four years of experience with Python</li><li>Comfort with cloud storage and IAM</li></ul>
</main>
</body></html>"#;

const SHELL_HTML: &str =
    r#"<html><body><div id="root"></div><script src="/static/app.js"></script></body></html>"#;

fn init_logging() {
    engine_logging::initialize_for_tests();
}

fn json_ld_page() -> String {
    let description = "<p>Responsibilities: own the billing service, pair with product on pricing \
        experiments, and keep our invoicing pipeline reliable.</p><p>Requirements: solid Rust or \
        Go, familiarity with Postgres, and experience running services in production.</p>";
    let block = serde_json::json!({
        "@context": "https://schema.org",
        "@type": "JobPosting",
        "title": "Billing Engineer",
        "hiringOrganization": { "name": "Initech" },
        "description": description,
    });
    format!(
        "<html><head><script type=\"application/ld+json\">{block}</script></head>\
         <body><div id=\"app\"></div></body></html>"
    )
}

/// Serves fixed markup and remembers every URL it was asked for.
struct StaticFetcher {
    markup: String,
    requested: Mutex<Vec<Url>>,
}

impl StaticFetcher {
    fn new(markup: &str) -> Arc<Self> {
        Arc::new(Self {
            markup: markup.to_string(),
            requested: Mutex::new(Vec::new()),
        })
    }

    fn requested(&self) -> Vec<Url> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(
        &self,
        _job_id: JobId,
        url: &Url,
        _sink: &dyn ProgressSink,
    ) -> Result<FetchedPage, FetchError> {
        self.requested.lock().unwrap().push(url.clone());
        Ok(FetchedPage {
            markup: self.markup.clone(),
            metadata: FetchMetadata {
                status_code: 200,
                final_url: url.to_string(),
                encoding: "UTF-8".to_string(),
                content_type: Some("text/html".to_string()),
                redirect_count: 0,
                byte_len: self.markup.len() as u64,
            },
        })
    }
}

struct StaticRenderer {
    result: Result<String, RenderError>,
    calls: Mutex<usize>,
}

impl StaticRenderer {
    fn new(result: Result<String, RenderError>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Renderer for StaticRenderer {
    async fn render(&self, _url: &Url) -> Result<String, RenderError> {
        *self.calls.lock().unwrap() += 1;
        self.result.clone()
    }
}

fn outcomes(result: &posting_core::ExtractionResult) -> Vec<(StrategyKind, bool)> {
    result
        .attempts
        .iter()
        .map(|attempt| (attempt.strategy, attempt.outcome == AttemptOutcome::Accepted))
        .collect()
}

#[tokio::test]
async fn structured_data_short_circuits_the_chain() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/billing"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(json_ld_page(), "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = Pipeline::new(
        Arc::new(ReqwestFetcher::new(FetchSettings::default())),
        PipelineSettings::default(),
    );
    let result = pipeline
        .extract(&format!("{}/jobs/billing", server.uri()))
        .await
        .expect("valid url");

    assert!(result.success);
    assert_eq!(result.platform.platform, Platform::Generic);
    assert_eq!(result.best_method, Some(StrategyKind::StructuredData));
    assert_eq!(outcomes(&result), vec![(StrategyKind::StructuredData, true)]);
    assert!(result.content.contains("own the billing service"));
    assert_eq!(
        result.structured_fields.get("company").map(String::as_str),
        Some("Initech")
    );
    assert_eq!(result.fetch.as_ref().map(|fetch| fetch.status_code), Some(200));
}

#[tokio::test]
async fn cleaning_takes_over_when_structured_data_is_missing() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/careers/data-engineer"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(POSTING_HTML, "text/html"))
        .mount(&server)
        .await;

    let pipeline = Pipeline::new(
        Arc::new(ReqwestFetcher::new(FetchSettings::default())),
        PipelineSettings::default(),
    );
    let result = pipeline
        .extract(&format!("{}/careers/data-engineer", server.uri()))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.best_method, Some(StrategyKind::HtmlCleaning));
    assert_eq!(
        result.attempts[0].outcome,
        AttemptOutcome::Rejected(Rejection::TooShort {
            length: 0,
            minimum: 200
        })
    );
    assert_eq!(outcomes(&result)[1], (StrategyKind::HtmlCleaning, true));
    assert!(result.content.contains("- Maintain Airflow and Spark jobs"));
    assert!(!result.content.contains("Home"));
    assert!(result.structured_fields.is_empty());
}

#[tokio::test]
async fn nav_and_footer_only_page_fails_citing_length() {
    init_logging();
    let markup = r#"<html><body>
<nav><a href="/">Home</a> <a href="/jobs">Open roles</a> <a href="/about">About</a></nav>
<footer><p>Acme Corp, 1 Main Street, Springfield</p><p>© 2026 Acme Corp. All rights reserved.</p></footer>
</body></html>"#;
    let pipeline = Pipeline::new(StaticFetcher::new(markup), PipelineSettings::default());

    let result = pipeline
        .extract("https://www.acme-corp.example/about-us")
        .await
        .unwrap();

    assert_eq!(result.platform.platform, Platform::Generic);
    assert!(!result.success);
    assert_eq!(result.best_method, None);
    assert_eq!(
        outcomes(&result),
        vec![
            (StrategyKind::StructuredData, false),
            (StrategyKind::HtmlCleaning, false),
            (StrategyKind::Fallback, false),
        ]
    );
    assert!(matches!(
        result.attempts[1].outcome,
        AttemptOutcome::Rejected(Rejection::TooShort { .. })
    ));
    assert!(matches!(
        result.failure_reason,
        Some(FailureReason::ContentExtraction {
            strategy: StrategyKind::Fallback,
            rejection: Rejection::TooShort { minimum: 200, .. },
        })
    ));
    assert!(result.content.contains("Main Street"));
}

#[tokio::test]
async fn fetch_failure_runs_no_strategies() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let pipeline = Pipeline::new(
        Arc::new(ReqwestFetcher::new(FetchSettings::default())),
        PipelineSettings::default(),
    );
    let result = pipeline
        .extract(&format!("{}/gone", server.uri()))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.attempts.is_empty());
    assert!(result.content.is_empty());
    match result.failure_reason {
        Some(FailureReason::Fetch(err)) => assert_eq!(err.kind, FetchErrorKind::HttpStatus(404)),
        other => panic!("unexpected failure {other:?}"),
    }
}

#[tokio::test]
async fn deadline_interrupts_a_slow_fetch() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(POSTING_HTML, "text/html")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let settings = PipelineSettings {
        deadline: Some(Duration::from_millis(200)),
        ..PipelineSettings::default()
    };
    let pipeline = Pipeline::new(
        Arc::new(ReqwestFetcher::new(FetchSettings::default())),
        settings,
    );
    let result = pipeline
        .extract(&format!("{}/slow", server.uri()))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.attempts.is_empty());
    assert_eq!(
        result.failure_reason,
        Some(FailureReason::DeadlineExceeded {
            stage: Stage::Fetching
        })
    );
}

#[tokio::test]
async fn invalid_input_never_reaches_the_fetcher() {
    let fetcher = StaticFetcher::new(POSTING_HTML);
    let pipeline = Pipeline::new(fetcher.clone(), PipelineSettings::default());

    assert_eq!(
        pipeline.extract("ftp://jobs.example.com/1").await.unwrap_err(),
        UrlValidationError::UnsupportedScheme("ftp".to_string())
    );
    assert_eq!(pipeline.extract("   ").await.unwrap_err(), UrlValidationError::Empty);
    assert!(fetcher.requested().is_empty());
}

#[tokio::test]
async fn embedded_greenhouse_links_fetch_the_canonical_board() {
    init_logging();
    let fetcher = StaticFetcher::new(POSTING_HTML);
    let pipeline = Pipeline::new(fetcher.clone(), PipelineSettings::default());

    let result = pipeline
        .extract("https://careers.acme.com/open-roles?gh_jid=4012345")
        .await
        .unwrap();

    assert_eq!(
        fetcher.requested(),
        vec![Url::parse("https://boards.greenhouse.io/embed/job_app?token=4012345").unwrap()]
    );
    assert_eq!(result.platform.platform, Platform::Greenhouse);
    assert!(result.resolved_url.was_resolved);
    assert_eq!(
        result.resolved_url.original.as_str(),
        "https://careers.acme.com/open-roles?gh_jid=4012345"
    );
    assert!(result.success);
}

#[tokio::test]
async fn render_first_platform_without_renderer_falls_back() {
    init_logging();
    let fetcher = StaticFetcher::new(POSTING_HTML);
    let pipeline = Pipeline::new(fetcher, PipelineSettings::default());

    let result = pipeline
        .extract("https://acme.wd5.myworkdayjobs.com/en-US/careers/job/Remote/Data-Engineer_R123")
        .await
        .unwrap();

    assert_eq!(result.platform.platform, Platform::Workday);
    assert_eq!(result.attempts[0].strategy, StrategyKind::Render);
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::Unavailable);
    assert_eq!(result.best_method, Some(StrategyKind::Fallback));
    assert!(result.success);
}

#[tokio::test]
async fn render_first_platform_uses_the_renderer() {
    init_logging();
    let fetcher = StaticFetcher::new(SHELL_HTML);
    let renderer = StaticRenderer::new(Ok(POSTING_HTML.to_string()));
    let pipeline =
        Pipeline::new(fetcher, PipelineSettings::default()).with_renderer(renderer.clone());

    let result = pipeline
        .extract("https://acme.wd5.myworkdayjobs.com/en-US/careers/job/Remote/Data-Engineer_R123")
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(outcomes(&result), vec![(StrategyKind::Render, true)]);
    assert!(result.content.contains("Design warehouse models in SQL"));
    assert_eq!(renderer.calls(), 1);
}

#[tokio::test]
async fn script_shell_gets_one_render_after_static_strategies_fail() {
    init_logging();
    let fetcher = StaticFetcher::new(SHELL_HTML);
    let renderer = StaticRenderer::new(Ok(POSTING_HTML.to_string()));
    let pipeline =
        Pipeline::new(fetcher, PipelineSettings::default()).with_renderer(renderer.clone());

    let result = pipeline
        .extract("https://jobs.example.org/positions/77")
        .await
        .unwrap();

    assert_eq!(
        outcomes(&result),
        vec![
            (StrategyKind::StructuredData, false),
            (StrategyKind::HtmlCleaning, false),
            (StrategyKind::Fallback, false),
            (StrategyKind::Render, true),
        ]
    );
    assert_eq!(result.best_method, Some(StrategyKind::Render));
    assert_eq!(renderer.calls(), 1);
}

#[tokio::test]
async fn failed_render_is_a_rejected_attempt() {
    init_logging();
    let fetcher = StaticFetcher::new(SHELL_HTML);
    let renderer = StaticRenderer::new(Err(RenderError::Status(502)));
    let pipeline = Pipeline::new(fetcher, PipelineSettings::default()).with_renderer(renderer);

    let result = pipeline
        .extract("https://acme.wd5.myworkdayjobs.com/en-US/careers/job/Remote/Data-Engineer_R123")
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(
        outcomes(&result),
        vec![(StrategyKind::Render, false), (StrategyKind::Fallback, false)]
    );
    assert!(matches!(
        result.failure_reason,
        Some(FailureReason::ContentExtraction {
            strategy: StrategyKind::Fallback,
            ..
        })
    ));
}

#[tokio::test]
async fn supplied_markup_gives_identical_results() {
    let pipeline = Pipeline::new(StaticFetcher::new(""), PipelineSettings::default());
    let url = Url::parse("https://jobs.example.org/positions/12").unwrap();

    let first = pipeline.extract_markup(&url, POSTING_HTML).await;
    let second = pipeline.extract_markup(&url, POSTING_HTML).await;

    assert_eq!(first, second);
    assert!(first.success);
    assert_eq!(first.fetch.as_ref().map(|fetch| fetch.status_code), Some(200));
}
