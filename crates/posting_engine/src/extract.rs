use posting_core::{ExtractionCandidate, StrategyKind};
use scraper::{Html, Selector};

use crate::text::element_text;

/// Body text below this many characters marks a client-rendered shell.
const SHELL_TEXT_THRESHOLD: usize = 100;

const SCRIPT_NOTICES: &[&str] = &[
    "please enable javascript",
    "javascript is required",
    "javascript must be enabled",
    "you need to enable javascript",
    "this site requires javascript",
    "enable javascript to view",
    "javascript is disabled",
];

/// One static extraction strategy. Never fails: a strategy that finds nothing
/// returns an empty candidate and lets the validator reject it.
pub trait Extractor: Send + Sync {
    fn kind(&self) -> StrategyKind;
    fn extract(&self, markup: &str) -> ExtractionCandidate;
}

/// True when the markup carries no usable static content and needs script
/// rendering to show the posting.
pub fn is_script_shell(markup: &str) -> bool {
    let lower = markup.to_lowercase();
    if SCRIPT_NOTICES.iter().any(|notice| lower.contains(notice)) {
        return true;
    }

    let document = Html::parse_document(markup);
    let body_text = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(|body| element_text(body, |_| false))
        .unwrap_or_default();
    body_text.chars().count() < SHELL_TEXT_THRESHOLD
}
