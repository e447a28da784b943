//! Posting engine: fetch, render and extraction collaborators, and the
//! effect loop that drives the core state machine.
mod analysis;
mod clean;
mod decode;
mod engine;
mod extract;
mod fallback;
mod fetch;
mod history;
mod persist;
mod pipeline;
mod render;
mod structured;
mod text;
mod types;

pub use analysis::{
    estimate_cost, parse_analysis, AnalysisError, Analyzer, AnalyzerSettings,
    ChatCompletionsAnalyzer, JobAnalysis, TokenUsage,
};
pub use clean::MarkupCleaner;
pub use decode::{decode_markup, DecodeError, DecodedMarkup};
pub use engine::{EngineHandle, EngineServices};
pub use extract::{is_script_shell, Extractor};
pub use fallback::ReadabilityExtractor;
pub use fetch::{
    browser_headers, ChannelProgressSink, FetchSettings, FetchedPage, Fetcher,
    NullProgressSink, ProgressSink, ReqwestFetcher, DEFAULT_USER_AGENT,
};
pub use history::{RunRecord, RunSink};
pub use persist::{ensure_parent_dir, write_atomic, PersistError};
pub use pipeline::{Pipeline, PipelineSettings};
pub use render::{RenderError, RenderServiceClient, Renderer};
pub use structured::{
    classify_json_ld, find_job_posting, normalize_fields, JsonLdShape, StructuredDataExtractor,
};
pub use text::{element_text, fragment_text, link_density, visible_len};
pub use types::{EngineEvent, JobId, JobProgress, JobReport, Stage};
