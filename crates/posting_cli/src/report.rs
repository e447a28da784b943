use std::fmt::Write as _;

use posting_core::{AttemptOutcome, ExtractionResult, FailureReason, Tier, UrlValidationError};
use posting_engine::{AnalysisError, JobAnalysis, JobReport};
use serde_json::{json, Value};

/// Per-tier display caps for the terminal report.
const TIER_CAPS: [(Tier, &str, usize); 3] = [
    (Tier::High, "High priority", 15),
    (Tier::Medium, "Medium priority", 10),
    (Tier::Other, "Other", 10),
];

const PREVIEW_LINES: usize = 20;

/// Why one submitted URL did not produce a usable result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunError {
    #[error("invalid URL: {0}")]
    InvalidUrl(UrlValidationError),
    #[error("extraction failed: {0}")]
    Extraction(FailureReason),
    #[error("analysis failed: {0}")]
    Analysis(AnalysisError),
}

impl RunError {
    pub fn from_report(report: &JobReport) -> Option<Self> {
        match &report.extraction {
            Err(err) => return Some(RunError::InvalidUrl(err.clone())),
            Ok(result) => {
                if let Some(reason) = &result.failure_reason {
                    return Some(RunError::Extraction(reason.clone()));
                }
            }
        }
        match &report.analysis {
            Some(Err(err)) => Some(RunError::Analysis(err.clone())),
            _ => None,
        }
    }

    /// Stable snake_case code for grouping and JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            RunError::InvalidUrl(_) => "invalid_url",
            RunError::Extraction(reason) => reason.code(),
            RunError::Analysis(_) => "analysis_error",
        }
    }
}

pub fn render_text(report: &JobReport, show_content: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", report.input);

    let result = match &report.extraction {
        Ok(result) => result,
        Err(err) => {
            let _ = writeln!(out, "Error:      invalid URL: {err}");
            return out;
        }
    };

    write_extraction(&mut out, result);
    if let Some(analysis) = &report.analysis {
        match analysis {
            Ok(analysis) => write_analysis(&mut out, analysis),
            Err(err) => {
                let _ = writeln!(out, "Analysis:   failed: {err}");
            }
        }
    }
    write_keywords(&mut out, report);

    if show_content && !result.content.is_empty() {
        let _ = writeln!(out, "Content:");
        let lines: Vec<&str> = result.content.lines().collect();
        for line in lines.iter().take(PREVIEW_LINES) {
            let _ = writeln!(out, "  {line}");
        }
        if lines.len() > PREVIEW_LINES {
            let _ = writeln!(out, "  ... {} more lines", lines.len() - PREVIEW_LINES);
        }
    }
    out
}

fn write_extraction(out: &mut String, result: &ExtractionResult) {
    let _ = writeln!(out, "Platform:   {}", result.platform.display_name);
    if result.resolved_url.was_resolved {
        let _ = writeln!(out, "Resolved:   {}", result.resolved_url.canonical);
    }
    match (&result.failure_reason, result.best_method) {
        (None, Some(method)) => {
            let _ = writeln!(
                out,
                "Status:     extracted via {method} ({} characters)",
                result.content.chars().count()
            );
        }
        (Some(reason), _) => {
            let _ = writeln!(out, "Status:     failed: {reason}");
        }
        (None, None) => {
            let _ = writeln!(out, "Status:     no result");
        }
    }

    let attempts: Vec<String> = result
        .attempts
        .iter()
        .map(|attempt| match &attempt.outcome {
            AttemptOutcome::Accepted => format!("{} accepted", attempt.strategy),
            AttemptOutcome::Rejected(rejection) => {
                format!("{} rejected ({rejection})", attempt.strategy)
            }
            AttemptOutcome::Unavailable => format!("{} unavailable", attempt.strategy),
        })
        .collect();
    if !attempts.is_empty() {
        let _ = writeln!(out, "Attempts:   {}", attempts.join(", "));
    }

    for (label, field) in [("Title", "title"), ("Company", "company"), ("Location", "location")] {
        if let Some(value) = result.structured_fields.get(field) {
            let _ = writeln!(out, "{:<12}{value}", format!("{label}:"));
        }
    }
}

fn write_analysis(out: &mut String, analysis: &JobAnalysis) {
    let _ = writeln!(
        out,
        "Analysis:   {:.0}% complete",
        analysis.completeness() * 100.0
    );
    let rows = [
        ("Role", analysis.job_title.as_deref()),
        ("Employer", analysis.company.as_deref()),
        ("Seniority", analysis.seniority_level.as_deref()),
        ("Experience", analysis.years_of_experience.as_deref()),
        ("Summary", analysis.job_summary.as_deref()),
    ];
    for (label, value) in rows {
        if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
            let _ = writeln!(out, "  {:<12}{value}", format!("{label}:"));
        }
    }
    if !analysis.hard_skills.is_empty() {
        let _ = writeln!(out, "  Hard skills: {}", analysis.hard_skills.join(", "));
    }
    if !analysis.soft_skills.is_empty() {
        let _ = writeln!(out, "  Soft skills: {}", analysis.soft_skills.join(", "));
    }
    if let (Some(usage), Some(cost)) = (analysis.usage, analysis.cost_usd) {
        let _ = writeln!(
            out,
            "  Usage:      {} tokens, ${cost:.4}",
            usage.total_tokens
        );
    }
}

fn write_keywords(out: &mut String, report: &JobReport) {
    if report.keywords.is_empty() {
        return;
    }
    let _ = writeln!(out, "Keywords:");
    for (tier, label, cap) in TIER_CAPS {
        let entries: Vec<String> = report
            .keywords
            .in_tier(tier)
            .take(cap)
            .map(|entry| format!("{} ({})", entry.display, entry.frequency))
            .collect();
        if !entries.is_empty() {
            let _ = writeln!(out, "  {label}: {}", entries.join(", "));
        }
    }
}

pub fn report_json(report: &JobReport) -> Value {
    let error = RunError::from_report(report).map(|err| {
        json!({
            "type": err.code(),
            "message": err.to_string(),
        })
    });
    let keywords = |tier: Tier| -> Vec<Value> {
        report
            .keywords
            .in_tier(tier)
            .map(|entry| json!({ "term": entry.display, "frequency": entry.frequency }))
            .collect()
    };
    json!({
        "input": report.input,
        "success": report.succeeded(),
        "error": error,
        "extraction": report.extraction.as_ref().ok(),
        "analysis": report.analysis.as_ref().and_then(|analysis| analysis.as_ref().ok()),
        "keywords": {
            "high": keywords(Tier::High),
            "medium": keywords(Tier::Medium),
            "other": keywords(Tier::Other),
        },
    })
}

/// Totals for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub invalid: usize,
    pub duplicates: usize,
}

impl BatchSummary {
    pub fn line(&self) -> String {
        format!(
            "{} succeeded, {} failed, {} invalid, {} duplicates skipped",
            self.succeeded, self.failed, self.invalid, self.duplicates
        )
    }

    pub fn to_json(&self) -> Value {
        json!({
            "succeeded": self.succeeded,
            "failed": self.failed,
            "invalid": self.invalid,
            "duplicates": self.duplicates,
        })
    }
}
