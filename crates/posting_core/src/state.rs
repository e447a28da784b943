use std::collections::VecDeque;

use serde::Serialize;

use crate::{
    AttemptOutcome, AttemptRecord, ContentValidator, Effect, ExtractionCandidate,
    ExtractionResult, FailureReason, FetchMetadata, PlatformProfile, Rejection, ResolvedUrl,
    StrategyKind, StructuredFields,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Fetching,
    Attempting(StrategyKind),
    Validated,
    Exhausted,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Validated | Phase::Exhausted)
    }
}

/// State of one extraction run. Owned by a single pipeline instance; holds
/// at most one accepted candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRun {
    profile: PlatformProfile,
    resolved: ResolvedUrl,
    validator: ContentValidator,
    render_on_script_shell: bool,
    phase: Phase,
    pending: VecDeque<StrategyKind>,
    script_shell: bool,
    shell_render_queued: bool,
    attempts: Vec<AttemptRecord>,
    accepted: Option<ExtractionCandidate>,
    last_attempted: Option<ExtractionCandidate>,
    last_rejection: Option<(StrategyKind, Rejection)>,
    fetch: Option<FetchMetadata>,
    failure: Option<FailureReason>,
}

impl ExtractionRun {
    pub fn new(profile: PlatformProfile, resolved: ResolvedUrl, validator: ContentValidator) -> Self {
        Self {
            pending: profile.extraction_priority.iter().copied().collect(),
            profile,
            resolved,
            validator,
            render_on_script_shell: false,
            phase: Phase::NotStarted,
            script_shell: false,
            shell_render_queued: false,
            attempts: Vec::new(),
            accepted: None,
            last_attempted: None,
            last_rejection: None,
            fetch: None,
            failure: None,
        }
    }

    /// Allow one extra render attempt when every priority strategy was rejected
    /// and the fetched markup was a script shell.
    pub fn with_render_on_script_shell(mut self, enabled: bool) -> Self {
        self.render_on_script_shell = enabled;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn profile(&self) -> &PlatformProfile {
        &self.profile
    }

    pub fn resolved(&self) -> &ResolvedUrl {
        &self.resolved
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// Number of strategies that actually ran.
    pub fn attempt_count(&self) -> usize {
        self.attempts
            .iter()
            .filter(|attempt| attempt.outcome != AttemptOutcome::Unavailable)
            .count()
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    pub fn finish(self) -> ExtractionResult {
        let success = self.phase == Phase::Validated && self.accepted.is_some();
        let (best_method, content, structured_fields) = match self.accepted {
            Some(candidate) => (
                Some(candidate.strategy),
                candidate.text,
                candidate.structured_fields.unwrap_or_default(),
            ),
            None => (
                None,
                self.last_attempted
                    .map(|candidate| candidate.text)
                    .unwrap_or_default(),
                StructuredFields::new(),
            ),
        };

        ExtractionResult {
            platform: self.profile,
            resolved_url: self.resolved,
            best_method,
            content,
            structured_fields,
            success,
            failure_reason: if success { None } else { self.failure },
            attempts: self.attempts,
            fetch: self.fetch,
        }
    }

    pub(crate) fn begin_fetch(&mut self) -> Vec<Effect> {
        self.phase = Phase::Fetching;
        vec![Effect::Fetch {
            url: self.resolved.canonical.clone(),
        }]
    }

    pub(crate) fn record_fetch(&mut self, metadata: FetchMetadata, script_shell: bool) {
        self.fetch = Some(metadata);
        self.script_shell = script_shell;
    }

    /// Validate a candidate; the first one that passes ends the run.
    pub(crate) fn judge(&mut self, mut candidate: ExtractionCandidate) -> Vec<Effect> {
        let strategy = candidate.strategy;
        match self.validator.validate(&candidate.text) {
            Ok(()) => {
                candidate.is_valid = true;
                self.attempts.push(AttemptRecord {
                    strategy,
                    outcome: AttemptOutcome::Accepted,
                });
                self.accepted = Some(candidate);
                self.phase = Phase::Validated;
                vec![Effect::Finished]
            }
            Err(rejection) => {
                candidate.is_valid = false;
                self.attempts.push(AttemptRecord {
                    strategy,
                    outcome: AttemptOutcome::Rejected(rejection.clone()),
                });
                self.last_rejection = Some((strategy, rejection));
                self.last_attempted = Some(candidate);
                self.advance()
            }
        }
    }

    pub(crate) fn skip_unavailable(&mut self, strategy: StrategyKind) -> Vec<Effect> {
        self.attempts.push(AttemptRecord {
            strategy,
            outcome: AttemptOutcome::Unavailable,
        });
        self.advance()
    }

    /// Move to the next strategy in priority order, or exhaust the run.
    pub(crate) fn advance(&mut self) -> Vec<Effect> {
        if self.pending.is_empty() && self.should_render_shell() {
            self.shell_render_queued = true;
            self.pending.push_back(StrategyKind::Render);
        }

        match self.pending.pop_front() {
            Some(next) => {
                self.phase = Phase::Attempting(next);
                vec![Effect::RunStrategy(next)]
            }
            None => {
                let reason = match self.last_rejection.take() {
                    Some((strategy, rejection)) => FailureReason::ContentExtraction {
                        strategy,
                        rejection,
                    },
                    None => FailureReason::NoStrategyAvailable,
                };
                self.exhaust(reason)
            }
        }
    }

    pub(crate) fn exhaust(&mut self, reason: FailureReason) -> Vec<Effect> {
        self.phase = Phase::Exhausted;
        self.failure = Some(reason);
        vec![Effect::Finished]
    }

    fn should_render_shell(&self) -> bool {
        self.render_on_script_shell
            && self.script_shell
            && !self.shell_render_queued
            && !self
                .profile
                .extraction_priority
                .contains(&StrategyKind::Render)
    }
}
