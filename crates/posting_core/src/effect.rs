use url::Url;

use crate::StrategyKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Fetch { url: Url },
    RunStrategy(StrategyKind),
    /// The run reached `Validated` or `Exhausted`; collect the result.
    Finished,
}
