use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_LENGTH: usize = 200;

/// Stems and phrases that show up in real postings but rarely in page chrome.
pub const DEFAULT_SIGNAL_TERMS: &[&str] = &[
    "responsibilit",
    "requirement",
    "qualificat",
    "experience",
    "skill",
    "duties",
    "job description",
    "about the role",
    "what you'll do",
    "what you will do",
    "who you are",
    "benefits",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub min_length: usize,
    pub signal_terms: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            signal_terms: DEFAULT_SIGNAL_TERMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Why a candidate text block was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    TooShort { length: usize, minimum: usize },
    NoSignalTerms,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooShort { length: 0, .. } => write!(f, "no content found"),
            Rejection::TooShort { length, minimum } => {
                write!(f, "too short ({length} of {minimum} characters)")
            }
            Rejection::NoSignalTerms => write!(f, "no job-posting signal terms"),
        }
    }
}

/// Quality gate shared by every strategy. Stateless; both the length and the
/// signal-term rule must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentValidator {
    min_length: usize,
    signal_terms: Vec<String>,
}

impl ContentValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        let mut signal_terms: Vec<String> = config
            .signal_terms
            .iter()
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect();
        if signal_terms.is_empty() {
            signal_terms = ValidatorConfig::default().signal_terms;
        }
        Self {
            min_length: config.min_length,
            signal_terms,
        }
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn validate(&self, text: &str) -> Result<(), Rejection> {
        let trimmed = text.trim();
        let length = trimmed.chars().count();
        if length < self.min_length {
            return Err(Rejection::TooShort {
                length,
                minimum: self.min_length,
            });
        }

        let lower = trimmed.to_lowercase();
        if self.signal_terms.iter().any(|term| lower.contains(term.as_str())) {
            Ok(())
        } else {
            Err(Rejection::NoSignalTerms)
        }
    }

    pub fn is_valid(&self, text: &str) -> bool {
        self.validate(text).is_ok()
    }
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentValidator, Rejection, ValidatorConfig};

    #[test]
    fn empty_signal_list_falls_back_to_defaults() {
        let validator = ContentValidator::new(ValidatorConfig {
            min_length: 10,
            signal_terms: vec!["  ".to_string()],
        });
        assert!(validator.is_valid("Key responsibilities include testing."));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let validator = ContentValidator::new(ValidatorConfig {
            min_length: 5,
            signal_terms: vec!["é".to_string()],
        });
        assert_eq!(
            validator.validate("éééé"),
            Err(Rejection::TooShort {
                length: 4,
                minimum: 5
            })
        );
    }
}
