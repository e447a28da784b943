use std::cmp::Reverse;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Whole terms that carry no screening value on their own.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "of", "on", "or",
    "our", "the", "to", "we", "will", "with", "you", "your", "ability", "experience", "job",
    "role", "skills", "strong", "team", "work", "years",
];

/// Priority tier. Ordered so that `High` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Other,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    /// Frequency at or above which a term is `High`.
    pub high_threshold: usize,
    /// Frequency at or above which a term is `Medium`.
    pub medium_threshold: usize,
    /// Extra stop words on top of [`DEFAULT_STOP_WORDS`].
    pub stop_words: Vec<String>,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            high_threshold: 3,
            medium_threshold: 2,
            stop_words: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordEntry {
    /// Case and whitespace folded term; the identity of the entry.
    pub term: String,
    /// First spelling seen in the candidate list.
    pub display: String,
    pub frequency: usize,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RankedKeywords {
    entries: Vec<KeywordEntry>,
}

impl RankedKeywords {
    /// All entries, highest tier first, candidate order within a tier.
    pub fn entries(&self) -> &[KeywordEntry] {
        &self.entries
    }

    pub fn in_tier(&self, tier: Tier) -> impl Iterator<Item = &KeywordEntry> {
        self.entries.iter().filter(move |entry| entry.tier == tier)
    }

    pub fn get(&self, term: &str) -> Option<&KeywordEntry> {
        let key = normalize_term(term);
        self.entries.iter().find(|entry| entry.term == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct KeywordRanker {
    config: RankerConfig,
    stop_words: HashSet<String>,
}

impl KeywordRanker {
    pub fn new(config: RankerConfig) -> Self {
        let stop_words = DEFAULT_STOP_WORDS
            .iter()
            .map(|word| word.to_string())
            .chain(config.stop_words.iter().map(|word| normalize_term(word)))
            .collect();
        Self { config, stop_words }
    }

    /// Count each candidate term in `text` and bucket it into a tier.
    ///
    /// Candidates that fold to the same term are merged into the first one.
    pub fn rank<S: AsRef<str>>(&self, text: &str, candidates: &[S]) -> RankedKeywords {
        let haystack = normalize_term(text);
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for candidate in candidates {
            let display = candidate.as_ref().trim();
            let term = normalize_term(display);
            if term.is_empty() || self.stop_words.contains(&term) || !seen.insert(term.clone()) {
                continue;
            }
            let frequency = count_occurrences(&haystack, &term);
            entries.push(KeywordEntry {
                display: display.to_string(),
                tier: self.tier_for(frequency),
                frequency,
                term,
            });
        }

        // Stable: equal tiers keep candidate order.
        entries.sort_by_key(|entry| Reverse(entry.tier));
        RankedKeywords { entries }
    }

    pub fn tier_for(&self, frequency: usize) -> Tier {
        if frequency >= self.config.high_threshold {
            Tier::High
        } else if frequency >= self.config.medium_threshold {
            Tier::Medium
        } else {
            Tier::Other
        }
    }
}

impl Default for KeywordRanker {
    fn default() -> Self {
        Self::new(RankerConfig::default())
    }
}

/// Lower-case and collapse runs of whitespace to a single space.
pub fn normalize_term(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-overlapping phrase matches that are not glued to a surrounding word.
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack
        .match_indices(needle)
        .filter(|(start, matched)| {
            let before = haystack[..*start].chars().next_back();
            let after = haystack[start + matched.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
        .count()
}
