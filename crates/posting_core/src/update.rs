use crate::{Effect, ExtractionRun, FailureReason, Msg, Phase};

/// Pure update function: applies a message to a run and returns any effects.
///
/// Messages that do not fit the current phase (a candidate for a strategy that
/// was not requested, anything after a terminal phase) are ignored.
pub fn update(mut run: ExtractionRun, msg: Msg) -> (ExtractionRun, Vec<Effect>) {
    let effects = match (run.phase(), msg) {
        (Phase::NotStarted, Msg::Start) => run.begin_fetch(),
        (Phase::Fetching, Msg::FetchCompleted { result, script_shell }) => match result {
            Ok(metadata) => {
                run.record_fetch(metadata, script_shell);
                run.advance()
            }
            // No markup, nothing to validate.
            Err(err) => run.exhaust(FailureReason::Fetch(err)),
        },
        (Phase::Attempting(expected), Msg::CandidateProduced(candidate))
            if candidate.strategy == expected =>
        {
            run.judge(candidate)
        }
        (Phase::Attempting(expected), Msg::StrategyUnavailable(strategy))
            if strategy == expected =>
        {
            run.skip_unavailable(strategy)
        }
        (Phase::Fetching | Phase::Attempting(_), Msg::DeadlineExceeded { stage }) => {
            run.exhaust(FailureReason::DeadlineExceeded { stage })
        }
        _ => Vec::new(),
    };

    (run, effects)
}
