use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use posting_core::{canonicalize, dedupe_key, detect_platform, validate_url, UrlValidationError};
use posting_engine::JobId;

/// One input that will be handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedJob {
    pub job_id: JobId,
    pub input: String,
}

#[derive(Debug, Default, PartialEq)]
pub struct BatchPlan {
    pub jobs: Vec<PlannedJob>,
    /// Inputs rejected before any network call.
    pub invalid: Vec<(String, UrlValidationError)>,
    /// Inputs whose canonical URL was already queued.
    pub duplicates: Vec<String>,
}

/// Inputs listed one per line; blank lines and `#` comments are ignored.
pub fn read_input_file(path: &Path) -> io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Validate every input and keep the first one per canonical URL.
pub fn plan_batch<S: AsRef<str>>(inputs: &[S]) -> BatchPlan {
    let mut plan = BatchPlan::default();
    let mut seen = HashSet::new();

    for raw in inputs {
        let raw = raw.as_ref().trim();
        let url = match validate_url(raw) {
            Ok(url) => url,
            Err(err) => {
                plan.invalid.push((raw.to_string(), err));
                continue;
            }
        };
        let resolved = canonicalize(&url, detect_platform(&url).platform);
        if !seen.insert(dedupe_key(&resolved)) {
            plan.duplicates.push(raw.to_string());
            continue;
        }
        plan.jobs.push(PlannedJob {
            job_id: plan.jobs.len() as JobId + 1,
            input: raw.to_string(),
        });
    }
    plan
}
