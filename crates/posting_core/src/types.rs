use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::{PlatformProfile, Rejection, ResolvedUrl, StrategyKind};

/// Canonical field name to value, e.g. `title`, `company`, `salary_min`.
pub type StructuredFields = BTreeMap<String, String>;

/// Suspend points of a run; the only places a deadline can interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetching,
    Rendering,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetching => f.write_str("fetching"),
            Stage::Rendering => f.write_str("rendering"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchMetadata {
    pub status_code: u16,
    pub final_url: String,
    pub encoding: String,
    pub content_type: Option<String>,
    pub redirect_count: usize,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    InvalidUrl,
    Timeout,
    ConnectionError,
    SslError,
    HttpStatus(u16),
    DecodeError,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    RedirectLimitExceeded,
}

impl FetchErrorKind {
    /// Stable snake_case code used for grouping failures.
    pub fn code(&self) -> &'static str {
        match self {
            FetchErrorKind::InvalidUrl => "invalid_url",
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::ConnectionError => "connection_error",
            FetchErrorKind::SslError => "ssl_error",
            FetchErrorKind::HttpStatus(_) => "http_error",
            FetchErrorKind::DecodeError => "decode_error",
            FetchErrorKind::TooLarge { .. } => "too_large",
            FetchErrorKind::UnsupportedContentType { .. } => "unsupported_content_type",
            FetchErrorKind::RedirectLimitExceeded => "redirect_limit_exceeded",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::InvalidUrl => write!(f, "invalid url"),
            FetchErrorKind::Timeout => write!(f, "timeout"),
            FetchErrorKind::ConnectionError => write!(f, "connection error"),
            FetchErrorKind::SslError => write!(f, "ssl error"),
            FetchErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            FetchErrorKind::DecodeError => write!(f, "decode error"),
            FetchErrorKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FetchErrorKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FetchErrorKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
        }
    }
}

/// Output of one strategy attempt, before and after validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionCandidate {
    pub strategy: StrategyKind,
    pub text: String,
    pub structured_fields: Option<StructuredFields>,
    pub is_valid: bool,
}

impl ExtractionCandidate {
    pub fn new(strategy: StrategyKind, text: impl Into<String>) -> Self {
        Self {
            strategy,
            text: text.into(),
            structured_fields: None,
            is_valid: false,
        }
    }

    /// A candidate for a strategy that found nothing usable.
    pub fn empty(strategy: StrategyKind) -> Self {
        Self::new(strategy, String::new())
    }

    pub fn with_fields(mut self, fields: StructuredFields) -> Self {
        self.structured_fields = Some(fields);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    Rejected(Rejection),
    /// The strategy had no collaborator registered and was skipped.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub strategy: StrategyKind,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Fetch(FetchError),
    /// Every strategy was rejected; names the last one attempted.
    ContentExtraction {
        strategy: StrategyKind,
        rejection: Rejection,
    },
    NoStrategyAvailable,
    DeadlineExceeded {
        stage: Stage,
    },
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::Fetch(err) => err.kind.code(),
            FailureReason::ContentExtraction { .. } => "content_extraction",
            FailureReason::NoStrategyAvailable => "no_strategy_available",
            FailureReason::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Fetch(err) => write!(f, "fetch failed: {err}"),
            FailureReason::ContentExtraction {
                strategy,
                rejection,
            } => write!(f, "{strategy} content rejected: {rejection}"),
            FailureReason::NoStrategyAvailable => {
                write!(f, "no extraction strategy was available")
            }
            FailureReason::DeadlineExceeded { stage } => {
                write!(f, "deadline exceeded while {stage}")
            }
        }
    }
}

/// Terminal artifact of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub platform: PlatformProfile,
    pub resolved_url: ResolvedUrl,
    pub best_method: Option<StrategyKind>,
    pub content: String,
    pub structured_fields: StructuredFields,
    pub success: bool,
    pub failure_reason: Option<FailureReason>,
    pub attempts: Vec<AttemptRecord>,
    pub fetch: Option<FetchMetadata>,
}

impl ExtractionResult {
    /// Strategies that actually produced a candidate, in order.
    pub fn attempted_strategies(&self) -> Vec<StrategyKind> {
        self.attempts
            .iter()
            .filter(|attempt| attempt.outcome != AttemptOutcome::Unavailable)
            .map(|attempt| attempt.strategy)
            .collect()
    }
}
