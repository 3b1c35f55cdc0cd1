use thiserror::Error;
use tracing::{debug, trace};

use crate::{expr::Expr, pretty::render, strategy::Strategy};

/// Rendered snapshots of an evaluation, starting term first.
pub type Trace = Vec<String>;

/// Errors that can occur during lambda calculus evaluation.
///
/// A run that exhausts its budget is not an error by itself (see [`Run`]);
/// this type exists for callers that want to propagate a timeout with `?`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// Evaluation exceeded the maximum number of reduction steps.
    /// Contains the limit that was exceeded.
    #[error("Reduction limit of {0} steps exceeded")]
    ReductionLimitExceeded(usize),
}

/// Outcome of a bounded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// One snapshot per observed term, including the final one when a value
    /// was reached.
    pub trace: Trace,
    /// The value reached, or `None` if the budget ran out first.
    pub value: Option<Expr>,
    /// Number of reduction steps performed.
    pub steps: usize,
    /// The budget the run was given.
    pub budget: usize,
}

impl Run {
    /// Whether the budget ran out before a value was reached.
    ///
    /// The trace of a timed-out run is only the observed prefix; its last
    /// entry is not the term's value.
    #[must_use]
    pub const fn timed_out(&self) -> bool {
        self.value.is_none()
    }

    /// Converts the run into its value.
    ///
    /// # Errors
    /// Returns `ReductionLimitExceeded` if the run timed out.
    pub fn into_result(self) -> Result<Expr, EvaluationError> {
        self.value
            .ok_or(EvaluationError::ReductionLimitExceeded(self.budget))
    }
}

/// Drives `step` from `initial` for at most `budget` rounds.
///
/// Each round records the rendering of the current term and then applies
/// `step`. The run stops with `value = Some(current)` the first time `step`
/// yields `None`; if all `budget` rounds step successfully the run times out
/// with `value = None`.
///
/// # Examples
/// ```
/// use lambstep::{abs, app, engine::run, strategy::Strategy};
///
/// let expr = app!(abs!("x", "x"), "y");
/// let result = run(&expr, 10, |e| Strategy::CallByValue.step(e));
/// assert_eq!(result.trace, ["(λx.x) y", "y"]);
/// assert_eq!(result.value.map(|e| e.to_string()), Some("y".to_string()));
/// ```
pub fn run<S>(initial: &Expr, budget: usize, step: S) -> Run
where
    S: FnMut(&Expr) -> Option<Expr>,
{
    run_with(initial, budget, step, |expr| render(expr, None))
}

/// Same as [`run`], with a custom rendering for the trace snapshots.
pub fn run_with<S, R>(initial: &Expr, budget: usize, mut step: S, mut render: R) -> Run
where
    S: FnMut(&Expr) -> Option<Expr>,
    R: FnMut(&Expr) -> String,
{
    let mut trace = Vec::new();
    let mut current = initial.clone();

    for steps in 0..budget {
        trace.push(render(&current));
        match step(&current) {
            Some(next) => {
                trace!(step = steps + 1, "reduced");
                current = next;
            }
            None => {
                debug!(steps, "reached a value");
                return Run {
                    trace,
                    value: Some(current),
                    steps,
                    budget,
                };
            }
        }
    }

    debug!(budget, "step budget exhausted");
    Run {
        trace,
        value: None,
        steps: budget,
        budget,
    }
}

/// Evaluates `expr` under `strategy` with at most `budget` rounds.
///
/// # Examples
/// ```
/// use lambstep::{abs, app, engine::evaluate, strategy::Strategy};
///
/// // Ω never reaches a value
/// let omega = app!(abs!("x", app!("x", "x")), abs!("x", app!("x", "x")));
/// let result = evaluate(&omega, Strategy::CallByValue, 5);
/// assert!(result.timed_out());
/// assert_eq!(result.trace.len(), 5);
/// ```
#[must_use]
pub fn evaluate(expr: &Expr, strategy: Strategy, budget: usize) -> Run {
    run(expr, budget, |e| strategy.step(e))
}

/// Evaluates like [`evaluate`], marking in every snapshot the redex that the
/// next step contracts.
#[must_use]
pub fn evaluate_highlighted(expr: &Expr, strategy: Strategy, budget: usize) -> Run {
    run_with(
        expr,
        budget,
        |e| strategy.step(e),
        |e| render(e, strategy.locate(e).as_deref()),
    )
}
