use std::{fmt, rc::Rc, str::FromStr};

use thiserror::Error;

use crate::expr::{Branch, Expr, Path, substitute_shared};

/// Order in which redexes are chosen.
///
/// Every strategy contracts redexes with the same beta rule,
/// `(λx.b) a → b[x := a]`, and unfolds macro references into their resolved
/// bodies; they differ in which redex goes first and in where they stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Arguments are reduced to values before being passed; never reduces
    /// under an abstraction.
    CallByValue,
    /// Arguments are passed unevaluated; never reduces under an abstraction.
    CallByName,
    /// Innermost-leftmost, including under abstractions.
    Applicative,
    /// Leftmost-outermost, including under abstractions. Finds the normal form
    /// whenever one exists.
    Normal,
}

/// Error returned when a strategy name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown reduction strategy: {0}")]
pub struct ParseStrategyError(pub String);

impl Strategy {
    pub const ALL: [Self; 4] = [
        Self::CallByValue,
        Self::CallByName,
        Self::Applicative,
        Self::Normal,
    ];

    /// Locates the redex this strategy would contract next.
    ///
    /// # Returns
    /// * `Some(path)` - Path to an application to beta-reduce or a macro
    ///   reference to unfold
    /// * `None` - The expression is a value for this strategy
    #[must_use]
    pub fn locate(self, expr: &Expr) -> Option<Path> {
        let mut path = Vec::new();
        let found = match self {
            Self::CallByValue => locate_by_value(expr, &mut path),
            Self::CallByName => locate_by_name(expr, &mut path),
            Self::Applicative => locate_applicative(expr, &mut path),
            Self::Normal => locate_normal(expr, &mut path),
        };
        found.then_some(path)
    }

    /// Performs one reduction step.
    ///
    /// Returns `None` exactly when [`Strategy::locate`] finds no redex.
    ///
    /// # Examples
    /// ```
    /// use lambstep::{abs, app, expr::Expr, strategy::Strategy};
    ///
    /// let expr = app!(abs!("x", "x"), "y");
    /// assert_eq!(Strategy::CallByValue.step(&expr), Some(Expr::var("y")));
    /// assert_eq!(Strategy::CallByValue.step(&Expr::var("y")), None);
    /// ```
    #[must_use]
    pub fn step(self, expr: &Expr) -> Option<Expr> {
        let path = self.locate(expr)?;
        rewrite(expr, &path)
    }

    /// Checks whether the expression is a value (no step applies).
    #[must_use]
    pub fn is_value(self, expr: &Expr) -> bool {
        self.locate(expr).is_none()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CallByValue => "call-by-value",
            Self::CallByName => "call-by-name",
            Self::Applicative => "applicative",
            Self::Normal => "normal",
        };
        f.write_str(name)
    }
}

impl FromStr for Strategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cbv" | "call-by-value" | "value" => Ok(Self::CallByValue),
            "cbn" | "call-by-name" | "name" => Ok(Self::CallByName),
            "applicative" | "app" => Ok(Self::Applicative),
            "normal" | "full" | "beta" => Ok(Self::Normal),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}

/// Runs `locate` on a child, keeping `path` unchanged when nothing is found.
fn descend(
    child: &Expr,
    branch: Branch,
    path: &mut Path,
    locate: fn(&Expr, &mut Path) -> bool,
) -> bool {
    path.push(branch);
    if locate(child, path) {
        true
    } else {
        path.pop();
        false
    }
}

/// A reference that does not resolve to an abstraction still has work to do.
fn weak_macro_is_value(resolved: &Expr) -> bool {
    resolved.as_abstraction().is_some()
}

fn locate_by_value(expr: &Expr, path: &mut Path) -> bool {
    match expr {
        Expr::Var(_) | Expr::Abs(..) => false,
        Expr::MacroRef(_, resolved) => !weak_macro_is_value(resolved),
        Expr::App(func, arg) => {
            if func.as_abstraction().is_some() {
                // An argument that cannot step is treated as a value
                descend(arg, Branch::Arg, path, locate_by_value);
                true
            } else {
                descend(func, Branch::Func, path, locate_by_value)
                    || descend(arg, Branch::Arg, path, locate_by_value)
            }
        }
    }
}

fn locate_by_name(expr: &Expr, path: &mut Path) -> bool {
    match expr {
        Expr::Var(_) | Expr::Abs(..) => false,
        Expr::MacroRef(_, resolved) => !weak_macro_is_value(resolved),
        Expr::App(func, arg) => {
            func.as_abstraction().is_some()
                || descend(func, Branch::Func, path, locate_by_name)
                || descend(arg, Branch::Arg, path, locate_by_name)
        }
    }
}

fn locate_applicative(expr: &Expr, path: &mut Path) -> bool {
    match expr {
        Expr::Var(_) => false,
        Expr::MacroRef(..) => true,
        Expr::Abs(_, body) => descend(body, Branch::Body, path, locate_applicative),
        Expr::App(func, arg) => {
            descend(func, Branch::Func, path, locate_applicative)
                || descend(arg, Branch::Arg, path, locate_applicative)
                || func.as_abstraction().is_some()
        }
    }
}

fn locate_normal(expr: &Expr, path: &mut Path) -> bool {
    match expr {
        Expr::Var(_) => false,
        Expr::MacroRef(..) => true,
        Expr::Abs(_, body) => descend(body, Branch::Body, path, locate_normal),
        Expr::App(func, arg) => {
            func.as_abstraction().is_some()
                || descend(func, Branch::Func, path, locate_normal)
                || descend(arg, Branch::Arg, path, locate_normal)
        }
    }
}

/// Rebuilds `expr` with the redex at `path` contracted.
///
/// Only the spine along `path` is reallocated.
fn rewrite(expr: &Expr, path: &[Branch]) -> Option<Expr> {
    let Some((first, rest)) = path.split_first() else {
        return contract(expr);
    };
    match (first, expr) {
        (Branch::Func, Expr::App(func, arg)) => Some(Expr::App(
            Rc::new(rewrite(func, rest)?),
            Rc::clone(arg),
        )),
        (Branch::Arg, Expr::App(func, arg)) => Some(Expr::App(
            Rc::clone(func),
            Rc::new(rewrite(arg, rest)?),
        )),
        (Branch::Body, Expr::Abs(name, body)) => {
            Some(Expr::Abs(name.clone(), Rc::new(rewrite(body, rest)?)))
        }
        _ => None,
    }
}

/// Contracts a single redex: beta for applications, unfolding for macro
/// references.
fn contract(expr: &Expr) -> Option<Expr> {
    match expr {
        Expr::App(func, arg) => {
            let (name, body) = func.as_abstraction()?;
            Some(Rc::unwrap_or_clone(substitute_shared(body, name, arg)))
        }
        Expr::MacroRef(_, resolved) => Some(resolved.as_ref().clone()),
        Expr::Var(_) | Expr::Abs(..) => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{abs, app};

    fn id() -> Expr {
        abs!("x", "x")
    }

    fn omega() -> Expr {
        app!(abs!("x", app!("x", "x")), abs!("x", app!("x", "x")))
    }

    /// Reduces to a value, or gives up after `limit` steps.
    fn normalize(strategy: Strategy, expr: &Expr, limit: usize) -> Option<Expr> {
        let mut current = expr.clone();
        for _ in 0..limit {
            match strategy.step(&current) {
                Some(next) => current = next,
                None => return Some(current),
            }
        }
        None
    }

    #[test]
    fn test_beta_identity_all_strategies() {
        let expr = app!(id(), "y");
        for strategy in Strategy::ALL {
            assert_eq!(strategy.step(&expr), Some(Expr::var("y")), "{strategy}");
        }
    }

    #[test]
    fn test_variables_and_abstractions_are_values() {
        for strategy in Strategy::ALL {
            assert!(strategy.is_value(&Expr::var("x")));
            assert!(strategy.is_value(&id()));
        }
    }

    #[test]
    fn test_weak_strategies_stop_at_abstractions() {
        // λz.(λx.x) z contains a redex under the binder
        let expr = abs!("z", app!(id(), "z"));
        assert_eq!(Strategy::CallByValue.step(&expr), None);
        assert_eq!(Strategy::CallByName.step(&expr), None);
        assert_eq!(Strategy::Normal.step(&expr), Some(abs!("z", "z")));
        assert_eq!(Strategy::Applicative.step(&expr), Some(abs!("z", "z")));
    }

    #[test]
    fn test_call_by_value_steps_argument_first() {
        // (λx.x x) ((λy.y) (λz.z)): argument is reduced before substitution
        let expr = app!(abs!("x", app!("x", "x")), app!(abs!("y", "y"), abs!("z", "z")));
        assert_eq!(Strategy::CallByValue.locate(&expr), Some(vec![Branch::Arg]));
        assert_eq!(
            Strategy::CallByValue.step(&expr),
            Some(app!(abs!("x", app!("x", "x")), abs!("z", "z")))
        );
    }

    #[test]
    fn test_call_by_name_substitutes_unevaluated() {
        let arg = app!(abs!("y", "y"), abs!("z", "z"));
        let expr = app!(abs!("x", app!("x", "x")), arg.clone());
        assert_eq!(Strategy::CallByName.locate(&expr), Some(vec![]));
        assert_eq!(Strategy::CallByName.step(&expr), Some(app!(arg.clone(), arg)));
    }

    #[test]
    fn test_call_by_value_steps_function_first() {
        // ((λa.a) (λb.b)) ((λc.c) d): the function side goes first
        let expr = app!(app!(abs!("a", "a"), abs!("b", "b")), app!(abs!("c", "c"), "d"));
        assert_eq!(
            Strategy::CallByValue.locate(&expr),
            Some(vec![Branch::Func])
        );
    }

    #[test]
    fn test_stuck_head_reduces_argument() {
        // x ((λy.y) z) under weak strategies continues into the argument
        let expr = app!("x", app!(id(), "z"));
        assert_eq!(Strategy::CallByValue.step(&expr), Some(app!("x", "z")));
        assert_eq!(Strategy::CallByName.step(&expr), Some(app!("x", "z")));
    }

    #[test]
    fn test_call_by_name_discards_divergent_argument() {
        // (λx.λy.y) Ω
        let expr = app!(abs!("x", "y", "y"), omega());
        assert_eq!(normalize(Strategy::CallByName, &expr, 10), Some(abs!("y", "y")));
        assert_eq!(normalize(Strategy::Normal, &expr, 10), Some(abs!("y", "y")));
        assert_eq!(normalize(Strategy::CallByValue, &expr, 10), None);
        assert_eq!(normalize(Strategy::Applicative, &expr, 10), None);
    }

    #[test]
    fn test_applicative_reduces_innermost_first() {
        // (λx.λy.x) ((λz.z) w): innermost redex is in the argument
        let expr = app!(abs!("x", "y", "x"), app!(abs!("z", "z"), "w"));
        assert_eq!(Strategy::Applicative.locate(&expr), Some(vec![Branch::Arg]));
        assert_eq!(Strategy::Normal.locate(&expr), Some(vec![]));

        // λf.(λx.x) ((λy.y) f): the inner argument before the outer redex
        let expr = abs!("f", app!(id(), app!(abs!("y", "y"), "f")));
        assert_eq!(
            Strategy::Applicative.locate(&expr),
            Some(vec![Branch::Body, Branch::Arg])
        );
    }

    #[test]
    fn test_normal_order_is_leftmost_outermost() {
        // f ((λx.x) a) ((λy.y) b): leftmost redex first, under a stuck head
        let expr = app!("f", app!(id(), "a"), app!(abs!("y", "y"), "b"));
        assert_eq!(
            Strategy::Normal.locate(&expr),
            Some(vec![Branch::Func, Branch::Arg])
        );
        assert_eq!(
            normalize(Strategy::Normal, &expr, 10),
            Some(app!("f", "a", "b"))
        );
    }

    #[test]
    fn test_omega_steps_to_itself() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.step(&omega()), Some(omega()), "{strategy}");
        }
    }

    #[test]
    fn test_value_idempotence() {
        let exprs = [
            app!(abs!("x", "y", "x"), "a", "b"),
            app!(abs!("f", "x", app!("f", app!("f", "x"))), id()),
            abs!("z", app!(id(), "z")),
        ];
        for strategy in Strategy::ALL {
            for expr in &exprs {
                let value = normalize(strategy, expr, 100).unwrap();
                assert_eq!(strategy.step(&value), None, "{strategy}: {value}");
            }
        }
    }

    #[test]
    fn test_beta_avoids_capture() {
        // (λx.λy.x) y → λy1.y
        let expr = app!(abs!("x", "y", "x"), "y");
        let result = Strategy::Normal.step(&expr).unwrap();
        assert_eq!(result, abs!("y1", "y"));
    }

    #[test]
    fn test_macro_in_function_position_fires_directly() {
        let reference = Expr::macro_ref("I", id());
        let expr = app!(reference.clone(), "a");
        for strategy in [Strategy::CallByValue, Strategy::CallByName, Strategy::Normal] {
            assert_eq!(strategy.locate(&expr), Some(vec![]), "{strategy}");
            assert_eq!(strategy.step(&expr), Some(Expr::var("a")));
        }
        // Applicative order unfolds the reference first
        assert_eq!(Strategy::Applicative.locate(&expr), Some(vec![Branch::Func]));
        assert_eq!(Strategy::Applicative.step(&expr), Some(app!(id(), "a")));
    }

    #[test]
    fn test_macro_unfolding() {
        let reference = Expr::macro_ref("I", id());
        // Weak strategies keep a reference to an abstraction as a value
        assert!(Strategy::CallByValue.is_value(&reference));
        assert!(Strategy::CallByName.is_value(&reference));
        // Full strategies unfold it
        assert_eq!(Strategy::Normal.step(&reference), Some(id()));
        assert_eq!(Strategy::Applicative.step(&reference), Some(id()));

        // A reference to a non-abstraction is unfolded by every strategy
        let stuck = Expr::macro_ref("W", omega());
        for strategy in Strategy::ALL {
            assert_eq!(strategy.step(&stuck), Some(omega()), "{strategy}");
        }
    }

    #[test]
    fn test_strategy_from_str_and_display() {
        assert_eq!("cbv".parse::<Strategy>().unwrap(), Strategy::CallByValue);
        assert_eq!("CBN".parse::<Strategy>().unwrap(), Strategy::CallByName);
        assert_eq!("applicative".parse::<Strategy>().unwrap(), Strategy::Applicative);
        assert_eq!("normal".parse::<Strategy>().unwrap(), Strategy::Normal);
        for strategy in Strategy::ALL {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }

        let err = "lazy".parse::<Strategy>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown reduction strategy: lazy");
    }
}
