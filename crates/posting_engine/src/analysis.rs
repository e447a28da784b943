use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_info};
use once_cell::sync::Lazy;
use posting_core::StructuredFields;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Longest posting text sent to the model, in characters.
const MAX_PROMPT_CHARS: usize = 15_000;

/// USD per 1K tokens as (input, output).
const MODEL_COSTS: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.00015, 0.0006),
    ("gpt-4o", 0.005, 0.015),
    ("gpt-4-turbo", 0.01, 0.03),
    ("gpt-3.5-turbo", 0.0005, 0.0015),
];

static JSON_OBJECT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").ok());

const SYSTEM_PROMPT: &str = "You analyse job postings for applicants tailoring a CV. \
Answer with a single JSON object with these keys: \
job_title (string), company (string), job_summary (string, two or three sentences), \
responsibilities (array of strings), \
required_skills (object with hard_skills and soft_skills, both arrays of strings), \
ats_keywords (array of strings, most important first), \
inferred_skills (array of strings not stated but implied), \
seniority_level (one of Intern, Junior, Mid, Senior, Lead, Principal, Executive, Unknown), \
years_of_experience (string or null). Use only information from the posting.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("no API key found in environment variable {0}")]
    MissingApiKey(String),
    #[error("analysis request timed out")]
    Timeout,
    #[error("analysis request failed: {0}")]
    Transport(String),
    #[error("analysis service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("analysis response had no content")]
    EmptyResponse,
    #[error("analysis response was not valid JSON: {0}")]
    InvalidJson(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Semantic fields derived from a posting by the analysis collaborator.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct JobAnalysis {
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub job_summary: Option<String>,
    pub responsibilities: Vec<String>,
    pub hard_skills: Vec<String>,
    pub soft_skills: Vec<String>,
    pub ats_keywords: Vec<String>,
    pub inferred_skills: Vec<String>,
    pub seniority_level: Option<String>,
    pub years_of_experience: Option<String>,
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
    pub cost_usd: Option<f64>,
    pub latency_ms: Option<u64>,
}

impl JobAnalysis {
    /// Terms to rank against the posting, most relevant first.
    pub fn keyword_candidates(&self) -> Vec<String> {
        self.ats_keywords
            .iter()
            .chain(&self.hard_skills)
            .chain(&self.soft_skills)
            .cloned()
            .collect()
    }

    /// Share of the expected fields that came back filled, in `0.0..=1.0`.
    pub fn completeness(&self) -> f64 {
        let filled = |text: &Option<String>| text.as_deref().is_some_and(|t| !t.trim().is_empty());
        let mut score = 0.0;
        if filled(&self.job_title) {
            score += 0.15;
        }
        if filled(&self.company) {
            score += 0.10;
        }
        if self.job_summary.as_deref().is_some_and(|s| s.len() > 50) {
            score += 0.10;
        }
        score += (self.responsibilities.len() as f64 * 0.03).min(0.15);
        score += (self.hard_skills.len() as f64 * 0.02).min(0.20);
        score += (self.soft_skills.len() as f64 * 0.02).min(0.10);
        score += (self.ats_keywords.len() as f64 * 0.015).min(0.15);
        if self
            .seniority_level
            .as_deref()
            .is_some_and(|level| !level.eq_ignore_ascii_case("unknown"))
        {
            score += 0.05;
        }
        (score * 100.0).round() / 100.0
    }
}

/// Opaque `analyze(text, fields)` capability consumed after extraction.
#[async_trait::async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        text: &str,
        fields: &StructuredFields,
    ) -> Result<JobAnalysis, AnalysisError>;
}

#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

/// Analyzer backed by an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsAnalyzer {
    settings: AnalyzerSettings,
    client: reqwest::Client,
}

impl ChatCompletionsAnalyzer {
    pub fn new(settings: AnalyzerSettings) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| AnalysisError::Transport(err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, text: &str, fields: &StructuredFields) -> Value {
        json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(text, fields) },
            ],
        })
    }
}

#[async_trait::async_trait]
impl Analyzer for ChatCompletionsAnalyzer {
    async fn analyze(
        &self,
        text: &str,
        fields: &StructuredFields,
    ) -> Result<JobAnalysis, AnalysisError> {
        let started = Instant::now();
        let body = self.request_body(text, fields).to_string();
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let payload = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body: payload.chars().take(500).collect(),
            });
        }

        let completion: ChatCompletion = serde_json::from_str(&payload)
            .map_err(|err| AnalysisError::InvalidJson(err.to_string()))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AnalysisError::EmptyResponse)?;

        let mut analysis = parse_analysis(&content)?;
        let model = completion.model.unwrap_or_else(|| self.settings.model.clone());
        if let Some(usage) = completion.usage {
            analysis.cost_usd = Some(estimate_cost(
                &model,
                usage.prompt_tokens,
                usage.completion_tokens,
            ));
            analysis.usage = Some(usage);
        }
        analysis.model = Some(model);
        analysis.latency_ms = Some(started.elapsed().as_millis() as u64);
        engine_info!(
            "Analysis finished in {} ms using {:?} tokens",
            analysis.latency_ms.unwrap_or_default(),
            analysis.usage.map(|usage| usage.total_tokens)
        );
        Ok(analysis)
    }
}

/// Estimated USD cost of one call. Dated model names match their family;
/// unknown models use the cheapest rate.
pub fn estimate_cost(model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
    let (input, output) = MODEL_COSTS
        .iter()
        .filter(|(name, _, _)| model.starts_with(name))
        .max_by_key(|(name, _, _)| name.len())
        .or_else(|| MODEL_COSTS.first())
        .map(|(_, input, output)| (*input, *output))
        .unwrap_or_default();
    let cost = prompt_tokens as f64 / 1000.0 * input + completion_tokens as f64 / 1000.0 * output;
    (cost * 1_000_000.0).round() / 1_000_000.0
}

/// Parse model output, salvaging a JSON object wrapped in prose or fences.
pub fn parse_analysis(content: &str) -> Result<JobAnalysis, AnalysisError> {
    let payload: AnalysisPayload = match serde_json::from_str(content) {
        Ok(payload) => payload,
        Err(first_err) => {
            engine_debug!("Analysis content was not bare JSON: {}", first_err);
            let embedded = JSON_OBJECT
                .as_ref()
                .and_then(|re| re.find(content))
                .ok_or_else(|| AnalysisError::InvalidJson(first_err.to_string()))?;
            serde_json::from_str(embedded.as_str())
                .map_err(|err| AnalysisError::InvalidJson(err.to_string()))?
        }
    };
    Ok(payload.into_analysis())
}

fn user_prompt(text: &str, fields: &StructuredFields) -> String {
    let mut prompt = String::new();
    if !fields.is_empty() {
        prompt.push_str("Structured data published with the posting:\n");
        for (name, value) in fields.iter().filter(|(name, _)| name.as_str() != "description") {
            prompt.push_str(&format!("- {name}: {value}\n"));
        }
        prompt.push('\n');
    }
    prompt.push_str("Job posting:\n");
    prompt.extend(text.chars().take(MAX_PROMPT_CHARS));
    prompt
}

fn map_transport_error(err: reqwest::Error) -> AnalysisError {
    if err.is_timeout() {
        AnalysisError::Timeout
    } else {
        AnalysisError::Transport(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalysisPayload {
    job_title: Option<String>,
    company: Option<String>,
    job_summary: Option<String>,
    responsibilities: Vec<String>,
    required_skills: RequiredSkills,
    ats_keywords: Vec<String>,
    inferred_skills: Vec<String>,
    seniority_level: Option<String>,
    years_of_experience: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RequiredSkills {
    hard_skills: Vec<String>,
    soft_skills: Vec<String>,
}

impl AnalysisPayload {
    fn into_analysis(self) -> JobAnalysis {
        let years_of_experience = match self.years_of_experience {
            Some(Value::String(text)) => Some(text),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        };
        JobAnalysis {
            job_title: self.job_title,
            company: self.company,
            job_summary: self.job_summary,
            responsibilities: self.responsibilities,
            hard_skills: self.required_skills.hard_skills,
            soft_skills: self.required_skills.soft_skills,
            ats_keywords: self.ats_keywords,
            inferred_skills: self.inferred_skills,
            seniority_level: self.seniority_level,
            years_of_experience,
            ..JobAnalysis::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{estimate_cost, parse_analysis, AnalysisError};

    #[test]
    fn cost_uses_per_thousand_rates() {
        assert_eq!(estimate_cost("gpt-4o", 1000, 1000), 0.02);
        assert_eq!(estimate_cost("unknown-model", 1000, 0), 0.00015);
        assert_eq!(
            estimate_cost("gpt-4o-2024-08-06", 1000, 1000),
            estimate_cost("gpt-4o", 1000, 1000)
        );
    }

    #[test]
    fn fenced_json_is_salvaged() {
        let content = "Here you go:\n```json\n{\"job_title\": \"Analyst\", \"years_of_experience\": 3}\n```";
        let analysis = parse_analysis(content).unwrap();
        assert_eq!(analysis.job_title.as_deref(), Some("Analyst"));
        assert_eq!(analysis.years_of_experience.as_deref(), Some("3"));
    }

    #[test]
    fn prose_without_json_is_rejected() {
        assert!(matches!(
            parse_analysis("I cannot help with that."),
            Err(AnalysisError::InvalidJson(_))
        ));
    }
}
