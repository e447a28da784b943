use std::sync::{Arc, Mutex};
use std::time::Duration;

use posting_core::FetchErrorKind;
use posting_engine::{
    EngineEvent, FetchSettings, Fetcher, JobProgress, ProgressSink, ReqwestFetcher, Stage,
};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

#[tokio::test]
async fn fetcher_returns_decoded_markup_and_emits_progress() {
    engine_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>Café</body></html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let sink = TestSink::default();
    let target = url(&server, "/jobs/1");

    let page = fetcher.fetch(7, &target, &sink).await.expect("fetch ok");
    assert!(page.markup.contains("Café"));
    assert_eq!(page.metadata.status_code, 200);
    assert_eq!(page.metadata.final_url, target.to_string());
    assert_eq!(page.metadata.redirect_count, 0);
    assert_eq!(page.metadata.encoding, "UTF-8");
    assert!(page
        .metadata
        .content_type
        .as_deref()
        .unwrap()
        .starts_with("text/html"));

    let stages = sink
        .take()
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::Progress(JobProgress { job_id, stage, .. }) => Some((job_id, stage)),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert!(stages.contains(&(7, Stage::Fetching)));
}

#[tokio::test]
async fn fetcher_sends_browser_like_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/headers"))
        .and(header("dnt", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>ok</p>", "text/html"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let result = fetcher
        .fetch(1, &url(&server, "/headers"), &TestSink::default())
        .await;
    assert!(result.is_ok(), "{result:?}");
}

#[tokio::test]
async fn fetcher_maps_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let err = fetcher
        .fetch(1, &url(&server, "/missing"), &TestSink::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::HttpStatus(404));
    assert_eq!(err.kind.code(), "http_error");
}

#[tokio::test]
async fn fetcher_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<p>late</p>", "text/html")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(200),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let err = fetcher
        .fetch(1, &url(&server, "/slow"), &TestSink::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Timeout);
}

#[tokio::test]
async fn fetcher_rejects_oversized_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("x".repeat(4096), "text/html"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 1024,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let err = fetcher
        .fetch(1, &url(&server, "/big"), &TestSink::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err.kind,
        FetchErrorKind::TooLarge {
            max_bytes: 1024,
            ..
        }
    ));
}

#[tokio::test]
async fn fetcher_rejects_unsupported_content_types() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posting.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.7", "application/pdf"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let err = fetcher
        .fetch(1, &url(&server, "/posting.pdf"), &TestSink::default())
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FetchErrorKind::UnsupportedContentType {
            content_type: "application/pdf".to_string()
        }
    );
}

#[tokio::test]
async fn fetcher_stops_after_redirect_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let err = fetcher
        .fetch(1, &url(&server, "/loop"), &TestSink::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::RedirectLimitExceeded);
}

#[tokio::test]
async fn fetcher_rejects_non_http_schemes() {
    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let target = Url::parse("ftp://files.example.com/job.html").unwrap();
    let err = fetcher
        .fetch(1, &target, &TestSink::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::InvalidUrl);
}
