use std::fmt;

use posting_core::{ExtractionResult, RankedKeywords, UrlValidationError};

use crate::{AnalysisError, JobAnalysis};

pub type JobId = u64;

/// Coarse progress of one job inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queued,
    Fetching,
    Rendering,
    Extracting,
    Analyzing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Queued => "queued",
            Stage::Fetching => "fetching",
            Stage::Rendering => "rendering",
            Stage::Extracting => "extracting",
            Stage::Analyzing => "analyzing",
            Stage::Done => "done",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub job_id: JobId,
    pub stage: Stage,
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Progress(JobProgress),
    JobCompleted {
        job_id: JobId,
        report: Box<JobReport>,
    },
}

/// Everything the engine learned about one submitted URL.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub input: String,
    pub extraction: Result<ExtractionResult, UrlValidationError>,
    /// `None` when no analyzer is configured or extraction failed.
    pub analysis: Option<Result<JobAnalysis, AnalysisError>>,
    pub keywords: RankedKeywords,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        matches!(&self.extraction, Ok(result) if result.success)
            && !matches!(self.analysis, Some(Err(_)))
    }
}
