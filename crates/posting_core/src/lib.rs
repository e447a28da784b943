//! Posting core: pure extraction state machine, platform routing and text scoring.
mod canonical;
mod effect;
mod keywords;
mod msg;
mod platform;
mod state;
mod types;
mod update;
mod validate;

pub use canonical::{canonicalize, dedupe_key, validate_url, ResolvedUrl, UrlValidationError};
pub use effect::Effect;
pub use keywords::{
    normalize_term, KeywordEntry, KeywordRanker, RankedKeywords, RankerConfig, Tier,
    DEFAULT_STOP_WORDS,
};
pub use msg::Msg;
pub use platform::{detect_platform, Platform, PlatformProfile, StrategyKind};
pub use state::{ExtractionRun, Phase};
pub use types::{
    AttemptOutcome, AttemptRecord, ExtractionCandidate, ExtractionResult, FailureReason,
    FetchError, FetchErrorKind, FetchMetadata, Stage, StructuredFields,
};
pub use update::update;
pub use validate::{
    ContentValidator, Rejection, ValidatorConfig, DEFAULT_MIN_LENGTH, DEFAULT_SIGNAL_TERMS,
};
