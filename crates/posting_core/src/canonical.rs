use serde::Serialize;
use url::Url;

use crate::Platform;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedUrl {
    pub original: Url,
    pub canonical: Url,
    pub was_resolved: bool,
}

impl ResolvedUrl {
    pub fn identity(url: Url) -> Self {
        Self {
            canonical: url.clone(),
            original: url,
            was_resolved: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlValidationError {
    #[error("URL cannot be empty")]
    Empty,
    #[error("invalid URL format: {0}")]
    Malformed(String),
    #[error("unsupported URL scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("URL host {0:?} is not a fully qualified domain")]
    MissingDomain(String),
}

/// Validate raw user input before any network call.
///
/// Input without a scheme is treated as `https://`.
pub fn validate_url(raw: &str) -> Result<Url, UrlValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url =
        Url::parse(&with_scheme).map_err(|err| UrlValidationError::Malformed(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_string()));
    }
    match url.host_str() {
        Some(host) if host.contains('.') => Ok(url),
        other => Err(UrlValidationError::MissingDomain(
            other.unwrap_or_default().to_string(),
        )),
    }
}

/// Rewrite embedded or proxied job URLs into their canonical form.
///
/// Never fails: when no rule applies the result is the identity resolution.
pub fn canonicalize(url: &Url, platform: Platform) -> ResolvedUrl {
    let rewritten = match platform {
        Platform::Greenhouse => greenhouse_embed(url),
        Platform::Lever => Some(strip_tail(url, "apply")),
        Platform::Ashby => Some(strip_tail(url, "application")),
        Platform::Workday => Some(strip_tail(url, "apply")),
        Platform::Apple | Platform::Icims => Some(without_query(url)),
        Platform::SuccessFactors | Platform::Generic => None,
    };

    match rewritten.filter(|canonical| canonical != url) {
        Some(canonical) => ResolvedUrl {
            original: url.clone(),
            canonical,
            was_resolved: true,
        },
        None => ResolvedUrl::identity(url.clone()),
    }
}

/// Key used to recognise the same posting submitted twice.
pub fn dedupe_key(resolved: &ResolvedUrl) -> String {
    let canonical = resolved.canonical.as_str().to_ascii_lowercase();
    canonical.trim_end_matches('/').to_string()
}

/// Company career pages embed Greenhouse boards with a `gh_jid` query parameter.
fn greenhouse_embed(url: &Url) -> Option<Url> {
    let host = url.host_str().unwrap_or_default();
    if host.ends_with("greenhouse.io") {
        return None;
    }
    let job_id = url
        .query_pairs()
        .find(|(key, _)| key == "gh_jid")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))?;

    let mut canonical = Url::parse("https://boards.greenhouse.io/embed/job_app").ok()?;
    canonical.query_pairs_mut().append_pair("token", &job_id);
    Some(canonical)
}

fn without_query(url: &Url) -> Url {
    let mut canonical = url.clone();
    canonical.set_query(None);
    canonical.set_fragment(None);
    canonical
}

/// Drop tracking parameters and a trailing action segment such as `/apply`.
fn strip_tail(url: &Url, action: &str) -> Url {
    let mut canonical = without_query(url);
    let ends_with_action = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .is_some_and(|last| last.eq_ignore_ascii_case(action));
    if ends_with_action {
        if let Ok(mut segments) = canonical.path_segments_mut() {
            segments.pop_if_empty().pop();
        }
    }
    canonical
}
