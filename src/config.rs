use crate::strategy::Strategy;

/// Step budget for pre-evaluating a macro body under each strategy.
pub const DEFAULT_DEFINITION_BUDGET: usize = 1000;
/// Step budget for evaluating an expression.
pub const DEFAULT_EVALUATION_BUDGET: usize = 1000;

/// Session settings, passed explicitly to whatever needs them.
///
/// # Examples
/// ```
/// use lambstep::{config::Config, strategy::Strategy};
///
/// let config = Config::default()
///     .with_strategy(Strategy::CallByValue)
///     .with_evaluation_budget(50);
/// assert_eq!(config.evaluation_budget, 50);
/// assert_eq!(config.definition_budget, 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Budget for each pre-evaluation of a macro body.
    pub definition_budget: usize,
    /// Budget for evaluating user expressions.
    pub evaluation_budget: usize,
    /// Strategy used when the caller does not pick one.
    pub strategy: Strategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            definition_budget: DEFAULT_DEFINITION_BUDGET,
            evaluation_budget: DEFAULT_EVALUATION_BUDGET,
            strategy: Strategy::Normal,
        }
    }
}

impl Config {
    #[must_use]
    pub const fn with_definition_budget(mut self, budget: usize) -> Self {
        self.definition_budget = budget;
        self
    }

    #[must_use]
    pub const fn with_evaluation_budget(mut self, budget: usize) -> Self {
        self.evaluation_budget = budget;
        self
    }

    #[must_use]
    pub const fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}
