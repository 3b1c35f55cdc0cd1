use std::rc::Rc;

use crate::{expr::Expr, macros::MacroTable, strategy::Strategy};

/// Folds subterms back into macro references.
///
/// Any subterm alpha-equivalent to a macro's value under `strategy` is
/// replaced by a reference to that macro. The largest matching subterm wins:
/// the tree is searched from the outside in and a folded subterm is not
/// searched any further. When several macros match, the one listed first by
/// [`MacroTable::list`] is used.
///
/// # Returns
/// The folded expression and whether anything changed. An unchanged
/// expression is returned as an equal copy.
///
/// # Examples
/// ```
/// use lambstep::{abs, app, macros::MacroTable, resugar::resugar, strategy::Strategy};
///
/// let mut table = MacroTable::new();
/// table.define("I", abs!("x", "x")).unwrap();
///
/// let (folded, changed) = resugar(&app!("f", abs!("y", "y")), &table, Strategy::Normal);
/// assert!(changed);
/// assert_eq!(folded.to_string(), "f I");
/// ```
#[must_use]
pub fn resugar(expr: &Expr, table: &MacroTable, strategy: Strategy) -> (Expr, bool) {
    let candidates: Vec<(&str, Expr)> = table
        .list()
        .into_iter()
        .filter_map(|definition| {
            table
                .resolve(definition.name(), strategy)
                .map(|value| (definition.name(), value))
        })
        .collect();

    if candidates.is_empty() {
        return (expr.clone(), false);
    }
    fold(expr, &candidates).map_or_else(|| (expr.clone(), false), |folded| (folded, true))
}

/// Returns `None` when nothing under `expr` matches.
fn fold(expr: &Expr, candidates: &[(&str, Expr)]) -> Option<Expr> {
    if let Expr::MacroRef(..) = expr {
        return None;
    }
    if let Some((name, value)) = candidates.iter().find(|(_, value)| expr.alpha_eq(value)) {
        return Some(Expr::macro_ref(*name, value.clone()));
    }

    match expr {
        Expr::Var(_) | Expr::MacroRef(..) => None,
        Expr::Abs(name, body) => {
            fold(body, candidates).map(|folded| Expr::Abs(name.clone(), Rc::new(folded)))
        }
        Expr::App(func, arg) => {
            let new_func = fold(func, candidates);
            let new_arg = fold(arg, candidates);
            if new_func.is_none() && new_arg.is_none() {
                return None;
            }
            Some(Expr::App(
                new_func.map_or_else(|| Rc::clone(func), Rc::new),
                new_arg.map_or_else(|| Rc::clone(arg), Rc::new),
            ))
        }
    }
}
