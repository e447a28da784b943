use std::collections::HashMap;

use ego_tree::NodeId;
use once_cell::sync::Lazy;
use posting_core::{ExtractionCandidate, StrategyKind};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::extract::Extractor;
use crate::text::{element_text, is_invisible, link_density, visible_len};

static POSITIVE_WEIGHT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)article|body|content|entry|main|page|post|text|story|job|description|posting|details|requisition",
    )
    .ok()
});

static NEGATIVE_WEIGHT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)banner|combx|comment|contact|cookie|foot|footer|masthead|media|meta|modal|nav|outbrain|promo|related|scroll|share|shoutbox|sidebar|sponsor|social|tags|tool|widget|similar",
    )
    .ok()
});

const SCORED_TAGS: &str = "p, li, pre, td, dd, blockquote";

/// Paragraphs shorter than this carry no score.
const MIN_PARAGRAPH_LEN: usize = 25;

/// Readability-style extraction: score paragraphs, propagate to ancestors,
/// then keep the best container together with qualifying siblings.
#[derive(Debug, Default)]
pub struct ReadabilityExtractor;

impl ReadabilityExtractor {
    pub fn extract_text(&self, markup: &str) -> String {
        let document = Html::parse_document(markup);
        let scores = score_candidates(&document);

        // Walk in document order so ties resolve the same way every run.
        let best = document
            .tree
            .nodes()
            .filter_map(|node| {
                let score = scores.get(&node.id())?;
                let element = ElementRef::wrap(node)?;
                let adjusted = score * (1.0 - link_density(element));
                Some((adjusted, element))
            })
            .max_by(|(a, _), (b, _)| a.total_cmp(b));

        match best {
            Some((top_score, top)) => merge_siblings(top, top_score, &scores),
            None => Selector::parse("body")
                .ok()
                .and_then(|body| document.select(&body).next())
                .map(|body| element_text(body, |_| false))
                .unwrap_or_default(),
        }
    }
}

impl Extractor for ReadabilityExtractor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fallback
    }

    fn extract(&self, markup: &str) -> ExtractionCandidate {
        ExtractionCandidate::new(self.kind(), self.extract_text(markup))
    }
}

fn score_candidates(document: &Html) -> HashMap<NodeId, f64> {
    let mut scores: HashMap<NodeId, f64> = HashMap::new();
    let Ok(selector) = Selector::parse(SCORED_TAGS) else {
        return scores;
    };

    for paragraph in document.select(&selector) {
        if has_invisible_ancestor(paragraph) {
            continue;
        }
        let text = element_text(paragraph, |_| false);
        let length = text.chars().count();
        if length < MIN_PARAGRAPH_LEN {
            continue;
        }
        let commas = text.matches(',').count() as f64;
        let score = 1.0 + commas + (length / 100).min(3) as f64;

        let ancestors = paragraph.ancestors().filter_map(ElementRef::wrap).take(2);
        for (level, ancestor) in ancestors.enumerate() {
            let base = *scores
                .entry(ancestor.id())
                .or_insert_with(|| initial_score(ancestor));
            let share = if level == 0 { score } else { score / 2.0 };
            scores.insert(ancestor.id(), base + share);
        }
    }
    scores
}

fn initial_score(element: ElementRef<'_>) -> f64 {
    let base = match element.value().name() {
        "div" | "article" | "main" | "section" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    };
    base + class_weight(element)
}

/// +25 / -25 for class and id hints, as in the classic readability weighting.
fn class_weight(element: ElementRef<'_>) -> f64 {
    let mut weight = 0.0;
    for attr in ["class", "id"] {
        let Some(value) = element.value().attr(attr).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        if NEGATIVE_WEIGHT.as_ref().is_some_and(|re| re.is_match(value)) {
            weight -= 25.0;
        }
        if POSITIVE_WEIGHT.as_ref().is_some_and(|re| re.is_match(value)) {
            weight += 25.0;
        }
    }
    weight
}

fn has_invisible_ancestor(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| is_invisible(ancestor.value().name()))
}

/// Text of the top container plus siblings that look like continuation content.
fn merge_siblings(top: ElementRef<'_>, top_score: f64, scores: &HashMap<NodeId, f64>) -> String {
    let Some(parent) = top.parent() else {
        return element_text(top, |_| false);
    };
    let threshold = (top_score * 0.2).max(10.0);

    let mut parts = Vec::new();
    for sibling in parent.children().filter_map(ElementRef::wrap) {
        let keep = if sibling.id() == top.id() {
            true
        } else if scores.get(&sibling.id()).is_some_and(|score| *score >= threshold) {
            true
        } else {
            sibling.value().name() == "p"
                && visible_len(sibling) > 80
                && link_density(sibling) < 0.25
        };
        if keep {
            let text = element_text(sibling, |_| false);
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{NEGATIVE_WEIGHT, POSITIVE_WEIGHT};

    #[test]
    fn weight_patterns_compile() {
        assert!(POSITIVE_WEIGHT.is_some());
        assert!(NEGATIVE_WEIGHT.is_some());
    }
}
