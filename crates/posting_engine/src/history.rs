use posting_core::FailureReason;
use serde::{Deserialize, Serialize};

use crate::JobReport;

/// One line of run history: what was asked, what came back, why it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub url: String,
    pub canonical_url: Option<String>,
    pub platform: String,
    pub success: bool,
    pub best_method: Option<String>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub content_length: usize,
    pub strategies_attempted: usize,
    #[serde(default)]
    pub analysis_tokens: Option<u32>,
    #[serde(default)]
    pub analysis_cost_usd: Option<f64>,
}

impl RunRecord {
    pub fn from_report(report: &JobReport) -> Self {
        let mut record = match &report.extraction {
            Ok(result) => Self {
                url: result.resolved_url.original.to_string(),
                canonical_url: Some(result.resolved_url.canonical.to_string()),
                platform: result.platform.display_name.to_string(),
                success: result.success,
                best_method: result.best_method.map(|method| method.to_string()),
                error_type: result.failure_reason.as_ref().map(|r| r.code().to_string()),
                error_message: result.failure_reason.as_ref().map(FailureReason::to_string),
                content_length: result.content.chars().count(),
                strategies_attempted: result.attempted_strategies().len(),
                analysis_tokens: None,
                analysis_cost_usd: None,
            },
            Err(err) => Self {
                url: report.input.clone(),
                canonical_url: None,
                platform: "unknown".to_string(),
                success: false,
                best_method: None,
                error_type: Some("invalid_url".to_string()),
                error_message: Some(err.to_string()),
                content_length: 0,
                strategies_attempted: 0,
                analysis_tokens: None,
                analysis_cost_usd: None,
            },
        };

        match &report.analysis {
            Some(Ok(analysis)) => {
                record.analysis_tokens = analysis.usage.map(|usage| usage.total_tokens);
                record.analysis_cost_usd = analysis.cost_usd;
            }
            Some(Err(err)) if record.success => {
                record.success = false;
                record.error_type = Some("analysis_error".to_string());
                record.error_message = Some(err.to_string());
            }
            _ => {}
        }
        record
    }
}

/// Append-only destination for run records. Owned by the caller; the engine
/// writes exactly one record per finished job.
pub trait RunSink: Send + Sync {
    fn record(&self, record: &RunRecord);
}
