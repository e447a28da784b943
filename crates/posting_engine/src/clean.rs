use once_cell::sync::Lazy;
use posting_core::{ExtractionCandidate, StrategyKind};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::extract::Extractor;
use crate::text::{element_text, is_invisible, link_density, visible_len};

/// Landmarks tried in order; job-board containers before generic page regions.
const LANDMARK_SELECTORS: &[&str] = &[
    "[data-automation-id=\"jobPostingDescription\"]",
    "[data-testid=\"job-details\"]",
    "#jobdetails-wrapper",
    "#job-details",
    ".job-description",
    "[class*=\"job-description\"]",
    "[class*=\"jobDescription\"]",
    "[class*=\"JobDescription\"]",
    "[class*=\"iCIMS_JobContent\"]",
    ".posting-page",
    "[data-test-id=\"job-description\"]",
    "main",
    "[role=\"main\"]",
    "article",
];

/// A landmark with less visible text than this is treated as a placeholder.
const MIN_LANDMARK_TEXT: usize = 80;

/// Tags that are page chrome wherever they appear.
const CHROME_TAGS: &[&str] = &["nav", "header", "footer", "aside", "form", "button", "select", "dialog"];

const CHROME_ROLES: &[&str] = &[
    "navigation",
    "banner",
    "contentinfo",
    "complementary",
    "search",
    "dialog",
    "alertdialog",
];

/// Density fallback considers these containers.
const BLOCK_CONTAINERS: &[&str] = &["div", "section", "td", "article", "main"];

/// Matched against one class name or id at a time. The marker may open the
/// token, or follow a site-level prefix such as `site-` or `global-`.
static BOILERPLATE_ATTR: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?:site|page|global|top|primary|mobile|js)[-_])?(?:cookies?|consent|gdpr|banner|advert\w*|ads?|ad-slot|adbox|promo\w*|sponsor\w*|social|share|newsletter|subscribe|breadcrumbs?|navbar|navigation|nav|menu|footer|header|sidebar|legal|modal|popup|related|similar-jobs|recommend\w*)(?:[-_]\S*)?$",
    )
    .ok()
});

static CONTENT_ATTR: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)(job|posting|description|content|article|main|body|details|requisition)").ok()
});

static BOILERPLATE_TEXT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:we use cookies|cookie (?:policy|settings|preferences)|accept (?:all )?cookies|privacy policy|terms of (?:use|service)|all rights reserved|sign in|log in|create (?:an )?account|skip to (?:main )?content|share this job|follow us)\b|©",
    )
    .ok()
});

/// A sub-tree with boilerplate markers and at most this much text is dropped.
const BOILERPLATE_TEXT_MAX: usize = 300;

static LANDMARKS: Lazy<Vec<Selector>> = Lazy::new(|| {
    LANDMARK_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .collect()
});

/// Selects the main content region, then strips chrome inside it.
#[derive(Debug, Default)]
pub struct MarkupCleaner;

impl MarkupCleaner {
    /// Most probable main-content element: first landmark with real text,
    /// otherwise the densest block of paragraph siblings, otherwise `<body>`.
    pub fn select_region<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        for selector in LANDMARKS.iter() {
            let found = document
                .select(selector)
                .find(|element| visible_len(*element) >= MIN_LANDMARK_TEXT);
            if found.is_some() {
                return found;
            }
        }
        densest_block(document).or_else(|| {
            Selector::parse("body")
                .ok()
                .and_then(|body| document.select(&body).next())
        })
    }

    /// Plain text of `region` with boilerplate sub-trees removed.
    pub fn strip(&self, region: ElementRef<'_>) -> String {
        let text = element_text(region, is_boilerplate);
        text.lines()
            .filter(|line| !is_boilerplate_line(line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clean(&self, markup: &str) -> String {
        let document = Html::parse_document(markup);
        self.select_region(&document)
            .map(|region| self.strip(region))
            .unwrap_or_default()
    }
}

impl Extractor for MarkupCleaner {
    fn kind(&self) -> StrategyKind {
        StrategyKind::HtmlCleaning
    }

    fn extract(&self, markup: &str) -> ExtractionCandidate {
        ExtractionCandidate::new(self.kind(), self.clean(markup))
    }
}

/// Container whose direct paragraph-like children hold the most text.
fn densest_block(document: &Html) -> Option<ElementRef<'_>> {
    let selector = Selector::parse(&BLOCK_CONTAINERS.join(",")).ok()?;
    document
        .select(&selector)
        .filter(|element| !is_boilerplate(*element))
        .map(|element| (sibling_text_len(element), element))
        .filter(|(len, _)| *len > 0)
        .max_by_key(|(len, _)| *len)
        .map(|(_, element)| element)
}

fn sibling_text_len(element: ElementRef<'_>) -> usize {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| {
            matches!(
                child.value().name(),
                "p" | "ul" | "ol" | "h1" | "h2" | "h3" | "h4" | "pre" | "blockquote"
            )
        })
        .map(visible_len)
        .sum()
}

/// Sub-tree is navigation, chrome, or short text dominated by legal/cookie markers.
fn is_boilerplate(element: ElementRef<'_>) -> bool {
    let value = element.value();
    let tag = value.name();
    if is_invisible(tag) || CHROME_TAGS.contains(&tag) {
        return true;
    }
    if value.attr("hidden").is_some() || value.attr("aria-hidden") == Some("true") {
        return true;
    }
    if value
        .attr("role")
        .is_some_and(|role| CHROME_ROLES.iter().any(|r| role.eq_ignore_ascii_case(r)))
    {
        return true;
    }

    let tokens: Vec<&str> = value.classes().chain(value.id()).collect();
    if tokens.iter().any(|token| matches_pattern(&BOILERPLATE_ATTR, token))
        && !tokens.iter().any(|token| matches_pattern(&CONTENT_ATTR, token))
    {
        return true;
    }

    let text_len = visible_len(element);
    if text_len > 0 && link_density(element) > 0.6 && tag != "a" {
        return true;
    }
    text_len <= BOILERPLATE_TEXT_MAX
        && matches_pattern(&BOILERPLATE_TEXT, &element.text().collect::<String>())
}

fn is_boilerplate_line(line: &str) -> bool {
    line.chars().count() <= 80 && matches_pattern(&BOILERPLATE_TEXT, line)
}

fn matches_pattern(pattern: &Lazy<Option<Regex>>, haystack: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(haystack))
}

#[cfg(test)]
mod tests {
    use super::{BOILERPLATE_ATTR, BOILERPLATE_TEXT, CONTENT_ATTR, LANDMARKS, LANDMARK_SELECTORS};

    use super::matches_pattern;

    #[test]
    fn attribute_markers_match_whole_tokens() {
        for token in ["nav", "navbar", "cookie-banner", "site-header", "footer_links", "share-buttons"] {
            assert!(matches_pattern(&BOILERPLATE_ATTR, token), "{token}");
        }
        for token in ["unavailable", "section-header", "menubar-free", "shared-benefits", "canvas"] {
            assert!(!matches_pattern(&BOILERPLATE_ATTR, token), "{token}");
        }
    }

    #[test]
    fn text_markers_need_word_boundaries() {
        assert!(matches_pattern(&BOILERPLATE_TEXT, "Sign in to apply"));
        assert!(matches_pattern(&BOILERPLATE_TEXT, "© 2026 Acme"));
        for line in ["API design in Go", "a product catalog in Elasticsearch", "log ingestion at scale"] {
            assert!(!matches_pattern(&BOILERPLATE_TEXT, line), "{line}");
        }
    }

    #[test]
    fn static_patterns_compile() {
        assert!(BOILERPLATE_ATTR.is_some());
        assert!(BOILERPLATE_TEXT.is_some());
        assert!(CONTENT_ATTR.is_some());
        assert_eq!(LANDMARKS.len(), LANDMARK_SELECTORS.len());
    }
}
