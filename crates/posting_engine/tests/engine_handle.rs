use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use posting_core::{
    FetchError, FetchErrorKind, FetchMetadata, KeywordRanker, RankerConfig, StructuredFields,
    Tier,
};
use posting_engine::{
    AnalysisError, Analyzer, EngineEvent, EngineHandle, EngineServices, FetchedPage, Fetcher,
    JobAnalysis, JobId, JobReport, Pipeline, PipelineSettings, ProgressSink, RunRecord, RunSink,
    Stage,
};
use pretty_assertions::assert_eq;
use url::Url;

const POSTING_HTML: &str = r#"<html><body><main>
  <h1>Site Reliability Engineer</h1>
  <p>About the role: keep our Kubernetes clusters healthy and make Kubernetes upgrades boring for every product team.</p>
  <h2>Requirements</h2>
  <ul><li>Hands-on Kubernetes and Terraform experience</li><li>Comfort writing Go and Python tooling</li></ul>
</main></body></html>"#;

struct RoutedFetcher;

#[async_trait::async_trait]
impl Fetcher for RoutedFetcher {
    async fn fetch(
        &self,
        _job_id: JobId,
        url: &Url,
        _sink: &dyn ProgressSink,
    ) -> Result<FetchedPage, FetchError> {
        if url.path().contains("missing") {
            return Err(FetchError::new(FetchErrorKind::HttpStatus(404), "404 Not Found"));
        }
        Ok(FetchedPage {
            markup: POSTING_HTML.to_string(),
            metadata: FetchMetadata {
                status_code: 200,
                final_url: url.to_string(),
                encoding: "UTF-8".to_string(),
                content_type: Some("text/html".to_string()),
                redirect_count: 0,
                byte_len: POSTING_HTML.len() as u64,
            },
        })
    }
}

struct KeywordAnalyzer;

#[async_trait::async_trait]
impl Analyzer for KeywordAnalyzer {
    async fn analyze(
        &self,
        _text: &str,
        _fields: &StructuredFields,
    ) -> Result<JobAnalysis, AnalysisError> {
        Ok(JobAnalysis {
            job_title: Some("Site Reliability Engineer".to_string()),
            ats_keywords: vec!["Kubernetes".to_string(), "Terraform".to_string()],
            hard_skills: vec!["Rust".to_string()],
            ..JobAnalysis::default()
        })
    }
}

#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<RunRecord>>,
}

impl RunSink for MemorySink {
    fn record(&self, record: &RunRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

fn collect_reports(engine: &EngineHandle, expected: usize) -> (HashMap<JobId, JobReport>, Vec<Stage>) {
    let mut reports = HashMap::new();
    let mut stages = Vec::new();
    while reports.len() < expected {
        match engine.recv().expect("engine alive") {
            EngineEvent::Progress(progress) => stages.push(progress.stage),
            EngineEvent::JobCompleted { job_id, report } => {
                reports.insert(job_id, *report);
            }
        }
    }
    (reports, stages)
}

#[test]
fn engine_runs_jobs_and_records_history() {
    engine_logging::initialize_for_tests();
    let sink = Arc::new(MemorySink::default());
    let services = EngineServices {
        analyzer: Some(Arc::new(KeywordAnalyzer)),
        ranker: KeywordRanker::new(RankerConfig::default()),
        seed_keywords: Vec::new(),
        sink: Some(sink.clone()),
    };
    let pipeline = Pipeline::new(Arc::new(RoutedFetcher), PipelineSettings::default());
    let engine = EngineHandle::new(pipeline, services);

    engine.enqueue(1, "https://jobs.example.com/sre");
    engine.enqueue(2, "https://jobs.example.com/missing");
    engine.enqueue(3, "not a url");

    let (reports, stages) = collect_reports(&engine, 3);

    let ok = &reports[&1];
    assert!(ok.succeeded());
    let analysis = ok.analysis.as_ref().unwrap().as_ref().unwrap();
    assert_eq!(analysis.job_title.as_deref(), Some("Site Reliability Engineer"));
    let kubernetes = ok.keywords.get("kubernetes").expect("ranked");
    assert_eq!(kubernetes.frequency, 3);
    assert_eq!(kubernetes.tier, Tier::High);
    assert_eq!(ok.keywords.get("rust").map(|entry| entry.frequency), Some(0));

    let fetch_failed = &reports[&2];
    assert!(!fetch_failed.succeeded());
    assert_eq!(fetch_failed.analysis, None);
    assert!(fetch_failed.keywords.is_empty());

    assert!(reports[&3].extraction.is_err());

    assert!(stages.contains(&Stage::Analyzing));
    assert!(stages.contains(&Stage::Done));

    let records = sink.records.lock().unwrap().clone();
    assert_eq!(records.len(), 3);
    let by_url = |url: &str| records.iter().find(|record| record.url == url).cloned();
    assert_eq!(
        by_url("https://jobs.example.com/missing").and_then(|r| r.error_type),
        Some("http_error".to_string())
    );
    assert_eq!(
        by_url("not a url").and_then(|r| r.error_type),
        Some("invalid_url".to_string())
    );
    assert!(by_url("https://jobs.example.com/sre").is_some_and(|r| r.success));
}

#[test]
fn seed_keywords_are_ranked_without_an_analyzer() {
    let services = EngineServices {
        seed_keywords: vec!["Terraform".to_string(), "Python".to_string()],
        ..EngineServices::default()
    };
    let pipeline = Pipeline::new(Arc::new(RoutedFetcher), PipelineSettings::default());
    let engine = EngineHandle::new(pipeline, services);

    engine.enqueue(9, "https://jobs.example.com/sre");
    let (reports, _) = collect_reports(&engine, 1);

    let report = &reports[&9];
    assert_eq!(report.analysis, None);
    let terms: Vec<&str> = report
        .keywords
        .entries()
        .iter()
        .map(|entry| entry.term.as_str())
        .collect();
    assert_eq!(terms, vec!["terraform", "python"]);
}
