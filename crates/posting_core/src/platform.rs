use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use url::Url;

/// One extraction technique in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Embedded JSON-LD `JobPosting` blocks.
    StructuredData,
    /// Landmark selection plus boilerplate stripping.
    HtmlCleaning,
    /// Readability-style density scoring.
    Fallback,
    /// Script rendering through an external renderer, then cleaning.
    Render,
}

impl StrategyKind {
    /// True for strategies that work on any markup and end a priority chain.
    pub fn is_terminal_fallback(self) -> bool {
        matches!(self, StrategyKind::Fallback)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::StructuredData => "structured-data",
            StrategyKind::HtmlCleaning => "html-cleaning",
            StrategyKind::Fallback => "fallback",
            StrategyKind::Render => "render",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Greenhouse,
    Lever,
    Workday,
    Apple,
    Icims,
    Ashby,
    SuccessFactors,
    Generic,
}

/// Static capability flags for a platform. Never mutated after lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformProfile {
    pub platform: Platform,
    pub display_name: &'static str,
    pub needs_script_rendering: bool,
    pub has_structured_data: bool,
    pub extraction_priority: &'static [StrategyKind],
}

const STRUCTURED_FIRST: &[StrategyKind] = &[
    StrategyKind::StructuredData,
    StrategyKind::HtmlCleaning,
    StrategyKind::Fallback,
];
const RENDER_FIRST: &[StrategyKind] = &[StrategyKind::Render, StrategyKind::Fallback];
const STRUCTURED_THEN_RENDER: &[StrategyKind] = &[
    StrategyKind::StructuredData,
    StrategyKind::Render,
    StrategyKind::Fallback,
];
const SERVER_RENDERED: &[StrategyKind] = &[StrategyKind::HtmlCleaning, StrategyKind::Fallback];

impl Platform {
    /// Every platform in detection order; `Generic` is the catch-all and comes last.
    pub const ALL: [Platform; 8] = [
        Platform::Greenhouse,
        Platform::Lever,
        Platform::Workday,
        Platform::Apple,
        Platform::Icims,
        Platform::Ashby,
        Platform::SuccessFactors,
        Platform::Generic,
    ];

    pub fn profile(self) -> PlatformProfile {
        let (display_name, needs_script_rendering, has_structured_data, extraction_priority) =
            match self {
                Platform::Greenhouse => ("Greenhouse", false, true, STRUCTURED_FIRST),
                Platform::Lever => ("Lever", false, true, STRUCTURED_FIRST),
                Platform::Workday => ("Workday", true, false, RENDER_FIRST),
                Platform::Apple => ("Apple Careers", true, false, RENDER_FIRST),
                Platform::Icims => ("iCIMS", true, false, RENDER_FIRST),
                // Ashby renders client side but still ships JSON-LD.
                Platform::Ashby => ("AshbyHQ", true, true, STRUCTURED_THEN_RENDER),
                Platform::SuccessFactors => ("SAP SuccessFactors", false, false, SERVER_RENDERED),
                Platform::Generic => ("Generic Job Site", false, false, STRUCTURED_FIRST),
            };
        PlatformProfile {
            platform: self,
            display_name,
            needs_script_rendering,
            has_structured_data,
            extraction_priority,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().display_name)
    }
}

/// Pattern sources per platform, evaluated top to bottom against the full URL.
const RULE_SOURCES: &[(Platform, &[&str])] = &[
    (
        Platform::Greenhouse,
        &[
            r"(?i)boards\.greenhouse\.io",
            r"(?i)job-boards(\.eu)?\.greenhouse\.io",
            r"(?i)greenhouse\.io/embed",
            r"(?i)job_app\.greenhouse\.io",
            r"(?i)[?&]gh_jid=\d+",
        ],
    ),
    (
        Platform::Lever,
        &[r"(?i)jobs\.lever\.co", r"(?i)lever\.co/[^/]+/[a-f0-9-]+"],
    ),
    (
        Platform::Workday,
        &[
            r"(?i)myworkdayjobs\.com",
            r"(?i)\.workday\.com/.*?/job/",
            r"(?i)wd\d+\.myworkdaysite\.com",
        ],
    ),
    (Platform::Apple, &[r"(?i)jobs\.apple\.com"]),
    (Platform::Icims, &[r"(?i)\.icims\.com", r"(?i)icims\.com/jobs/"]),
    (
        Platform::Ashby,
        &[r"(?i)jobs\.ashbyhq\.com", r"(?i)ashbyhq\.com/[^/]+/[a-f0-9-]+"],
    ),
    (
        Platform::SuccessFactors,
        &[
            r"(?i)\.careers/",
            r"(?i)successfactors\.(com|eu)",
            // Requisition slugs such as /job/City-Title-ST-12345/; the state code must be upper case.
            r"/job/[^/]+-[A-Z]{2}-\d+/",
        ],
    ),
];

struct PlatformRule {
    platform: Platform,
    patterns: Vec<Regex>,
}

static RULES: Lazy<Vec<PlatformRule>> = Lazy::new(|| {
    RULE_SOURCES
        .iter()
        .map(|(platform, sources)| PlatformRule {
            platform: *platform,
            patterns: sources
                .iter()
                .filter_map(|source| Regex::new(source).ok())
                .collect(),
        })
        .collect()
});

/// Classify a URL into a known platform. First matching rule wins; anything
/// unmatched resolves to the conservative `Generic` profile.
pub fn detect_platform(url: &Url) -> PlatformProfile {
    let haystack = url.as_str();
    RULES
        .iter()
        .find(|rule| rule.patterns.iter().any(|re| re.is_match(haystack)))
        .map(|rule| rule.platform)
        .unwrap_or(Platform::Generic)
        .profile()
}
