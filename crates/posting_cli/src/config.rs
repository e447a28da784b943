use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine_logging::engine_info;
use log::LevelFilter;
use posting_core::{RankerConfig, ValidatorConfig};
use posting_engine::{
    browser_headers, AnalysisError, AnalyzerSettings, FetchSettings, PipelineSettings,
    DEFAULT_USER_AGENT,
};
use serde::Deserialize;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "job-extract.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unknown log level {0:?}")]
    LogLevel(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub validator: ValidatorConfig,
    pub keywords: KeywordConfig,
    pub analysis: AnalysisConfig,
    pub history: HistoryConfig,
    pub render_on_script_shell: bool,
    pub deadline_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            validator: ValidatorConfig::default(),
            keywords: KeywordConfig::default(),
            analysis: AnalysisConfig::default(),
            history: HistoryConfig::default(),
            render_on_script_shell: true,
            deadline_secs: None,
            log_level: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    /// Sent in addition to the browser-like defaults; same name replaces.
    pub headers: Vec<(String, String)>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub high_threshold: usize,
    pub medium_threshold: usize,
    pub seed_keywords: Vec<String>,
    pub stop_words: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        let ranker = RankerConfig::default();
        Self {
            high_threshold: ranker.high_threshold,
            medium_threshold: ranker.medium_threshold,
            seed_keywords: Vec::new(),
            stop_words: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.1,
            max_tokens: 2000,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(".job_extract_history.ron"),
        }
    }
}

impl AppConfig {
    /// Read `path`, or the default file when it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|message| ConfigError::Parse {
            path: path.clone(),
            message,
        })?;
        engine_info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        ron::from_str(content).map_err(|err| err.to_string())
    }

    pub fn log_level(&self) -> Result<Option<LevelFilter>, ConfigError> {
        self.log_level
            .as_deref()
            .map(|level| {
                level
                    .parse::<LevelFilter>()
                    .map_err(|_| ConfigError::LogLevel(level.to_string()))
            })
            .transpose()
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        let mut headers = browser_headers();
        for (name, value) in &self.fetch.headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }
        FetchSettings {
            connect_timeout: Duration::from_secs(self.fetch.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.fetch.request_timeout_secs),
            redirect_limit: self.fetch.redirect_limit,
            max_bytes: self.fetch.max_bytes,
            user_agent: self.fetch.user_agent.clone(),
            headers,
            ..FetchSettings::default()
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            validator: self.validator.clone(),
            render_on_script_shell: self.render_on_script_shell,
            deadline: self.deadline_secs.map(Duration::from_secs),
        }
    }

    pub fn ranker_config(&self) -> RankerConfig {
        RankerConfig {
            high_threshold: self.keywords.high_threshold,
            medium_threshold: self.keywords.medium_threshold,
            stop_words: self.keywords.stop_words.clone(),
        }
    }

    /// Analyzer settings with the API key taken from the configured variable.
    pub fn analyzer_settings(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<AnalyzerSettings, AnalysisError> {
        let api_key = lookup(&self.analysis.api_key_env)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AnalysisError::MissingApiKey(self.analysis.api_key_env.clone()))?;
        Ok(AnalyzerSettings {
            base_url: self.analysis.base_url.clone(),
            model: self.analysis.model.clone(),
            api_key,
            temperature: self.analysis.temperature,
            max_tokens: self.analysis.max_tokens,
            request_timeout: Duration::from_secs(self.analysis.request_timeout_secs),
        })
    }
}
