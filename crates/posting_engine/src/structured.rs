use engine_logging::engine_debug;
use once_cell::sync::Lazy;
use posting_core::{ExtractionCandidate, StrategyKind, StructuredFields};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use crate::extract::Extractor;
use crate::text::fragment_text;

const JOB_POSTING_TYPE: &str = "jobposting";

/// Descriptions are sometimes HTML-escaped twice; one pass per escape level.
const MAX_STRIP_PASSES: usize = 2;

static MARKUP_TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").ok());

/// Top-level layout of one parsed JSON-LD block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsonLdShape<'a> {
    Single(&'a Map<String, Value>),
    Array(&'a [Value]),
    /// An object wrapping its nodes in `@graph`.
    Graph(&'a [Value]),
    Unsupported,
}

pub fn classify_json_ld(value: &Value) -> JsonLdShape<'_> {
    match value {
        Value::Object(map) => match map.get("@graph") {
            Some(Value::Array(nodes)) => JsonLdShape::Graph(nodes),
            _ => JsonLdShape::Single(map),
        },
        Value::Array(items) => JsonLdShape::Array(items),
        _ => JsonLdShape::Unsupported,
    }
}

/// First `JobPosting` node reachable from a block without descending more
/// than one level.
pub fn find_job_posting(value: &Value) -> Option<&Map<String, Value>> {
    match classify_json_ld(value) {
        JsonLdShape::Single(map) => is_job_posting(map).then_some(map),
        JsonLdShape::Array(items) => items.iter().find_map(|item| match classify_json_ld(item) {
            JsonLdShape::Single(map) => is_job_posting(map).then_some(map),
            JsonLdShape::Graph(nodes) => first_posting(nodes),
            _ => None,
        }),
        JsonLdShape::Graph(nodes) => first_posting(nodes),
        JsonLdShape::Unsupported => None,
    }
}

fn first_posting(nodes: &[Value]) -> Option<&Map<String, Value>> {
    nodes
        .iter()
        .filter_map(Value::as_object)
        .find(|node| is_job_posting(node))
}

fn is_job_posting(map: &Map<String, Value>) -> bool {
    match map.get("@type") {
        Some(Value::String(kind)) => is_job_posting_type(kind),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .any(is_job_posting_type),
        _ => false,
    }
}

fn is_job_posting_type(kind: &str) -> bool {
    let kind = kind.rsplit(|c| c == '/' || c == ':').next().unwrap_or(kind);
    kind.eq_ignore_ascii_case(JOB_POSTING_TYPE)
}

/// Reads schema.org `JobPosting` blocks embedded as JSON-LD.
#[derive(Debug, Default)]
pub struct StructuredDataExtractor;

impl Extractor for StructuredDataExtractor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StructuredData
    }

    fn extract(&self, markup: &str) -> ExtractionCandidate {
        for block in json_ld_blocks(markup) {
            let value: Value = match serde_json::from_str(block.trim().trim_end_matches(';')) {
                Ok(value) => value,
                Err(err) => {
                    engine_debug!("Skipping malformed JSON-LD block: {}", err);
                    continue;
                }
            };
            if let Some(posting) = find_job_posting(&value) {
                let fields = normalize_fields(posting);
                let text = fields.get("description").cloned().unwrap_or_default();
                return ExtractionCandidate::new(self.kind(), text)
                    .with_fields(fields);
            }
        }
        ExtractionCandidate::empty(self.kind())
    }
}

fn json_ld_blocks(markup: &str) -> Vec<String> {
    let document = Html::parse_document(markup);
    let Ok(selector) = Selector::parse("script[type]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter(|script| {
            script
                .value()
                .attr("type")
                .is_some_and(|kind| kind.trim().to_ascii_lowercase().starts_with("application/ld+json"))
        })
        .map(|script| script.text().collect::<String>())
        .filter(|body| !body.trim().is_empty())
        .collect()
}

/// Map heterogeneous schema.org keys onto canonical field names.
pub fn normalize_fields(posting: &Map<String, Value>) -> StructuredFields {
    let mut fields = StructuredFields::new();
    let lookup = |names: &[&str]| lookup_key(posting, names);

    let mut put = |name: &str, value: Option<String>| {
        if let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            fields.insert(name.to_string(), value);
        }
    };

    put("title", lookup(&["title", "jobTitle", "name"]).and_then(scalar_text));
    put(
        "company",
        lookup(&["hiringOrganization", "company", "employer"]).and_then(named_text),
    );
    put(
        "description",
        lookup(&["description", "jobDescription"])
            .and_then(Value::as_str)
            .map(strip_markup),
    );
    put("location", lookup(&["jobLocation"]).and_then(location_text));
    put("location_type", lookup(&["jobLocationType"]).and_then(list_text));
    put("employment_type", lookup(&["employmentType"]).and_then(list_text));
    put("date_posted", lookup(&["datePosted"]).and_then(scalar_text));
    put("valid_through", lookup(&["validThrough"]).and_then(scalar_text));
    put("industry", lookup(&["industry"]).and_then(list_text));
    put("skills", lookup(&["skills"]).and_then(list_text).map(|s| strip_markup(&s)));
    put(
        "qualifications",
        lookup(&["qualifications"]).and_then(list_text).map(|s| strip_markup(&s)),
    );
    put(
        "responsibilities",
        lookup(&["responsibilities"]).and_then(list_text).map(|s| strip_markup(&s)),
    );
    put(
        "experience",
        lookup(&["experienceRequirements"]).and_then(experience_text),
    );
    put("identifier", lookup(&["identifier"]).and_then(identifier_text));

    if let Some(salary) = lookup(&["baseSalary", "estimatedSalary"]) {
        for (name, value) in salary_fields(salary) {
            put(name, Some(value));
        }
    }

    fields
}

fn lookup_key<'a>(posting: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| {
        posting
            .iter()
            .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.is_null())
            .map(|(_, value)| value)
    })
}

/// Plain text of a description, unwrapping double-escaped markup.
fn strip_markup(raw: &str) -> String {
    let mut text = raw.to_string();
    for _ in 0..MAX_STRIP_PASSES {
        let has_markup = MARKUP_TAG.as_ref().is_some_and(|re| re.is_match(&text));
        let has_entities = text.contains('&');
        if !has_markup && !has_entities {
            break;
        }
        text = fragment_text(&text);
    }
    text
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(items) => items.iter().find_map(scalar_text),
        _ => None,
    }
}

fn named_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.get("name").and_then(scalar_text),
        Value::Array(items) => items.iter().find_map(named_text),
        other => scalar_text(other),
    }
}

fn list_text(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(named_text).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        other => named_text(other),
    }
}

fn location_text(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(location_text).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Object(place) => match place.get("address") {
            Some(Value::Object(address)) => {
                let parts: Vec<String> = ["addressLocality", "addressRegion", "addressCountry"]
                    .iter()
                    .filter_map(|key| address.get(*key).and_then(named_text))
                    .filter(|part| !part.trim().is_empty())
                    .collect();
                (!parts.is_empty()).then(|| parts.join(", "))
            }
            Some(other) => scalar_text(other),
            None => named_text(value),
        },
        other => scalar_text(other),
    }
}

fn experience_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map
            .get("monthsOfExperience")
            .and_then(scalar_text)
            .map(|months| format!("{months} months"))
            .or_else(|| map.get("description").and_then(scalar_text)),
        other => list_text(other).map(|text| strip_markup(&text)),
    }
}

fn identifier_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.get("value").and_then(scalar_text),
        other => scalar_text(other),
    }
}

fn salary_fields(value: &Value) -> Vec<(&'static str, String)> {
    let mut out = Vec::new();
    let Value::Object(salary) = value else {
        if let Some(amount) = scalar_text(value) {
            out.push(("salary_min", amount));
        }
        return out;
    };

    if let Some(currency) = salary.get("currency").and_then(scalar_text) {
        out.push(("salary_currency", currency));
    }
    match salary.get("value") {
        Some(Value::Object(amount)) => {
            let exact = amount.get("value").and_then(scalar_text);
            let min = amount.get("minValue").and_then(scalar_text).or(exact.clone());
            let max = amount.get("maxValue").and_then(scalar_text).or(exact);
            if let Some(min) = min {
                out.push(("salary_min", min));
            }
            if let Some(max) = max {
                out.push(("salary_max", max));
            }
            if let Some(unit) = amount.get("unitText").and_then(scalar_text) {
                out.push(("salary_unit", unit));
            }
        }
        Some(other) => {
            if let Some(amount) = scalar_text(other) {
                out.push(("salary_min", amount.clone()));
                out.push(("salary_max", amount));
            }
        }
        None => {}
    }
    if let Some(unit) = salary.get("unitText").and_then(scalar_text) {
        if !out.iter().any(|(name, _)| *name == "salary_unit") {
            out.push(("salary_unit", unit));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{is_job_posting_type, strip_markup};

    #[test]
    fn type_matching_ignores_case_and_vocabulary_prefix() {
        assert!(is_job_posting_type("JobPosting"));
        assert!(is_job_posting_type("jobposting"));
        assert!(is_job_posting_type("https://schema.org/JobPosting"));
        assert!(is_job_posting_type("schema:JobPosting"));
        assert!(!is_job_posting_type("Organization"));
    }

    #[test]
    fn double_escaped_descriptions_are_unwrapped() {
        assert_eq!(
            strip_markup("&lt;p&gt;Responsibilities &amp;amp; duties&lt;/p&gt;"),
            "Responsibilities & duties"
        );
    }
}
