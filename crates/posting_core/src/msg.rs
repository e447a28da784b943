use crate::{ExtractionCandidate, FetchError, FetchMetadata, Stage, StrategyKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Begin the run; the first effect is always a fetch of the canonical URL.
    Start,
    /// The fetch collaborator finished.
    FetchCompleted {
        result: Result<FetchMetadata, FetchError>,
        /// Markup looks like a client-rendered shell with no static content.
        script_shell: bool,
    },
    /// The strategy requested by the last `RunStrategy` effect produced a candidate.
    CandidateProduced(ExtractionCandidate),
    /// The strategy requested by the last `RunStrategy` effect has no collaborator.
    StrategyUnavailable(StrategyKind),
    /// The caller's deadline passed at a suspend point.
    DeadlineExceeded { stage: Stage },
}
