use std::{collections::BTreeSet, fmt, rc::Rc};

/// Lambda calculus expression with named variables.
///
/// This enum represents expressions in the untyped lambda calculus:
/// - `Var(name)`: Variable, bound or free
/// - `Abs(name, body)`: Lambda abstraction binding `name` in `body`
/// - `App(func, arg)`: Application (function call)
/// - `MacroRef(name, resolved)`: Reference to a named macro, carrying the
///   body it resolved to when the reference was made
///
/// Children are shared through `Rc`, so a reduction step rebuilds only the
/// spine leading to the redex and every other subtree is shared between the
/// old and the new expression.
///
/// # Examples
/// ```
/// use lambstep::expr::Expr;
/// let id = Expr::abs("x", Expr::var("x")); // λx.x
/// assert_eq!(id.to_string(), "λx.x");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Var(String),                // Variable name
    Abs(String, Rc<Expr>),      // Lambda abstraction (bound name, body)
    App(Rc<Expr>, Rc<Expr>),    // Application (e1 e2)
    MacroRef(String, Rc<Expr>), // Macro name and its resolved body
}

/// One step from an expression to one of its children.
///
/// A sequence of branches addresses a subterm; reduction strategies report
/// the location of the next redex this way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    /// Function side of an application
    Func,
    /// Argument side of an application
    Arg,
    /// Body of an abstraction
    Body,
}

/// Location of a subterm, outermost branch first.
pub type Path = Vec<Branch>;

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) | Self::MacroRef(name, _) => write!(f, "{name}"),
            Self::Abs(name, body) => write!(f, "(λ{name}.{body:?})"),
            Self::App(func, arg) => write!(f, "({func:?} {arg:?})"),
        }
    }
}

/// Conversion into an [`Expr`], used by the `abs!` and `app!` macros.
///
/// Strings become variables; expressions are passed through unchanged.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &str {
    fn into_expr(self) -> Expr {
        Expr::Var(self.to_string())
    }
}

impl IntoExpr for String {
    fn into_expr(self) -> Expr {
        Expr::Var(self)
    }
}

/// Builds nested abstractions; the last argument is the body.
///
/// ```
/// use lambstep::abs;
/// assert_eq!(abs!("x", "y", "x").to_string(), "λx.λy.x");
/// ```
#[macro_export]
macro_rules! abs {
    ($name:expr, $body:expr $(,)?) => {
        $crate::expr::Expr::abs($name, $crate::expr::IntoExpr::into_expr($body))
    };
    ($name:expr, $($rest:expr),+ $(,)?) => {
        $crate::expr::Expr::abs($name, $crate::abs!($($rest),+))
    };
}

/// Builds a left-associated application chain.
///
/// ```
/// use lambstep::app;
/// assert_eq!(app!("f", "x", "y").to_string(), "f x y");
/// ```
#[macro_export]
macro_rules! app {
    ($func:expr, $($arg:expr),+ $(,)?) => {{
        let expr = $crate::expr::IntoExpr::into_expr($func);
        $(
            let expr = $crate::expr::Expr::app(expr, $crate::expr::IntoExpr::into_expr($arg));
        )+
        expr
    }};
}

impl Expr {
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    #[must_use]
    pub fn abs(name: impl Into<String>, body: Self) -> Self {
        Self::Abs(name.into(), Rc::new(body))
    }

    #[must_use]
    pub fn app(func: Self, arg: Self) -> Self {
        Self::App(Rc::new(func), Rc::new(arg))
    }

    #[must_use]
    pub fn macro_ref(name: impl Into<String>, resolved: Self) -> Self {
        Self::MacroRef(name.into(), Rc::new(resolved))
    }

    /// Returns the subterm at `path`, if the path exists.
    #[must_use]
    pub fn at(&self, path: &[Branch]) -> Option<&Self> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };
        match (first, self) {
            (Branch::Func, Self::App(func, _)) => func.at(rest),
            (Branch::Arg, Self::App(_, arg)) => arg.at(rest),
            (Branch::Body, Self::Abs(_, body)) => body.at(rest),
            _ => None,
        }
    }

    /// Views the expression as an abstraction, looking through macro
    /// references.
    ///
    /// This is what makes `App(MacroRef(..), arg)` a redex when the macro
    /// resolves to an abstraction.
    #[must_use]
    pub fn as_abstraction(&self) -> Option<(&str, &Rc<Self>)> {
        match self {
            Self::Abs(name, body) => Some((name.as_str(), body)),
            Self::MacroRef(_, resolved) => resolved.as_abstraction(),
            Self::Var(_) | Self::App(..) => None,
        }
    }

    /// Collects the names of all free variables.
    ///
    /// Macro references contribute nothing: their bodies are closed.
    #[must_use]
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut free = BTreeSet::new();
        collect_free(self, &mut Vec::new(), &mut free);
        free
    }

    /// Checks whether `name` occurs free in the expression.
    #[must_use]
    pub fn occurs_free(&self, name: &str) -> bool {
        match self {
            Self::Var(var) => var == name,
            Self::Abs(bound, body) => bound != name && body.occurs_free(name),
            Self::App(func, arg) => func.occurs_free(name) || arg.occurs_free(name),
            Self::MacroRef(..) => false,
        }
    }

    /// Collects every variable and binder name, free or bound.
    #[must_use]
    pub fn names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_names(self, &mut names);
        names
    }

    /// Finds the first variable (left to right) not bound by an enclosing
    /// abstraction.
    ///
    /// Walks the tree keeping the sequence of names bound by the enclosing
    /// abstractions. Macro references count as closed.
    #[must_use]
    pub fn first_free_variable(&self) -> Option<&str> {
        find_unbound(self, &mut Vec::new())
    }

    /// Checks whether the expression has no free variables.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.first_free_variable().is_none()
    }

    /// Names of the macros this expression references directly.
    ///
    /// Resolved macro bodies are not searched; only references written in
    /// this expression count.
    #[must_use]
    pub fn referenced_macros(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_macros(self, &mut names);
        names
    }

    /// Alpha-equivalence: equality up to renaming of bound variables.
    ///
    /// Two references to the same macro are equal; otherwise a reference is
    /// compared through its resolved body.
    ///
    /// # Examples
    /// ```
    /// use lambstep::abs;
    /// assert!(abs!("x", "x").alpha_eq(&abs!("y", "y")));
    /// assert!(!abs!("x", "y").alpha_eq(&abs!("y", "y")));
    /// ```
    #[must_use]
    pub fn alpha_eq(&self, other: &Self) -> bool {
        alpha_eq_in(self, other, &mut Vec::new(), &mut Vec::new())
    }
}

fn collect_free<'e>(expr: &'e Expr, bound: &mut Vec<&'e str>, free: &mut BTreeSet<String>) {
    match expr {
        Expr::Var(name) => {
            if !bound.contains(&name.as_str()) {
                free.insert(name.clone());
            }
        }
        Expr::Abs(name, body) => {
            bound.push(name.as_str());
            collect_free(body, bound, free);
            bound.pop();
        }
        Expr::App(func, arg) => {
            collect_free(func, bound, free);
            collect_free(arg, bound, free);
        }
        Expr::MacroRef(..) => {}
    }
}

fn collect_names(expr: &Expr, names: &mut BTreeSet<String>) {
    match expr {
        Expr::Var(name) => {
            names.insert(name.clone());
        }
        Expr::Abs(name, body) => {
            names.insert(name.clone());
            collect_names(body, names);
        }
        Expr::App(func, arg) => {
            collect_names(func, names);
            collect_names(arg, names);
        }
        Expr::MacroRef(..) => {}
    }
}

fn find_unbound<'e>(expr: &'e Expr, bound: &mut Vec<&'e str>) -> Option<&'e str> {
    match expr {
        Expr::Var(name) => (!bound.contains(&name.as_str())).then_some(name.as_str()),
        Expr::Abs(name, body) => {
            bound.push(name.as_str());
            let found = find_unbound(body, bound);
            bound.pop();
            found
        }
        Expr::App(func, arg) => find_unbound(func, bound).or_else(|| find_unbound(arg, bound)),
        Expr::MacroRef(..) => None,
    }
}

fn collect_macros(expr: &Expr, names: &mut BTreeSet<String>) {
    match expr {
        Expr::Var(_) => {}
        Expr::Abs(_, body) => collect_macros(body, names),
        Expr::App(func, arg) => {
            collect_macros(func, names);
            collect_macros(arg, names);
        }
        Expr::MacroRef(name, _) => {
            names.insert(name.clone());
        }
    }
}

fn alpha_eq_in<'e>(
    left: &'e Expr,
    right: &'e Expr,
    left_bound: &mut Vec<&'e str>,
    right_bound: &mut Vec<&'e str>,
) -> bool {
    match (left, right) {
        (Expr::MacroRef(a, _), Expr::MacroRef(b, _)) if a == b => true,
        (Expr::MacroRef(_, resolved), _) => alpha_eq_in(resolved, right, left_bound, right_bound),
        (_, Expr::MacroRef(_, resolved)) => alpha_eq_in(left, resolved, left_bound, right_bound),
        (Expr::Var(a), Expr::Var(b)) => {
            // Both bound by the same binder, or both free with the same name
            let left_pos = left_bound.iter().rposition(|name| *name == a.as_str());
            let right_pos = right_bound.iter().rposition(|name| *name == b.as_str());
            match (left_pos, right_pos) {
                (Some(i), Some(j)) => i == j,
                (None, None) => a == b,
                _ => false,
            }
        }
        (Expr::Abs(a, left_body), Expr::Abs(b, right_body)) => {
            left_bound.push(a.as_str());
            right_bound.push(b.as_str());
            let equal = alpha_eq_in(left_body, right_body, left_bound, right_bound);
            left_bound.pop();
            right_bound.pop();
            equal
        }
        (Expr::App(f1, a1), Expr::App(f2, a2)) => {
            alpha_eq_in(f1, f2, left_bound, right_bound)
                && alpha_eq_in(a1, a2, left_bound, right_bound)
        }
        _ => false,
    }
}

/// Replaces the free occurrences of `name` in `body` with `value`, renaming
/// binders of `body` where they would capture a free variable of `value`.
///
/// Shadowing abstractions (`λname. ...`) are left untouched, and macro
/// references are never entered since their bodies are closed.
///
/// # Examples
/// ```
/// use lambstep::{abs, app, expr::{Expr, substitute}};
///
/// // (λy.x y)[x := y] must not capture the free y
/// let body = abs!("y", app!("x", "y"));
/// let result = substitute(&body, "x", &Expr::var("y"));
/// assert_eq!(result.to_string(), "λy1.y y1");
/// ```
#[must_use]
pub fn substitute(body: &Expr, name: &str, value: &Expr) -> Expr {
    let body = Rc::new(body.clone());
    let value = Rc::new(value.clone());
    Rc::unwrap_or_clone(substitute_shared(&body, name, &value))
}

/// Substitution on shared trees: subtrees without a free `name` are returned
/// as the same allocation.
pub(crate) fn substitute_shared(body: &Rc<Expr>, name: &str, value: &Rc<Expr>) -> Rc<Expr> {
    let value_free = value.free_variables();
    substitute_in(body, name, value, &value_free).unwrap_or_else(|| Rc::clone(body))
}

/// Returns `None` when nothing under `body` changes.
fn substitute_in(
    body: &Rc<Expr>,
    name: &str,
    value: &Rc<Expr>,
    value_free: &BTreeSet<String>,
) -> Option<Rc<Expr>> {
    match body.as_ref() {
        Expr::Var(var) => (var == name).then(|| Rc::clone(value)),
        Expr::MacroRef(..) => None,
        Expr::App(func, arg) => {
            let new_func = substitute_in(func, name, value, value_free);
            let new_arg = substitute_in(arg, name, value, value_free);
            if new_func.is_none() && new_arg.is_none() {
                return None;
            }
            Some(Rc::new(Expr::App(
                new_func.unwrap_or_else(|| Rc::clone(func)),
                new_arg.unwrap_or_else(|| Rc::clone(arg)),
            )))
        }
        Expr::Abs(bound, inner) => {
            if bound == name || !inner.occurs_free(name) {
                return None;
            }
            if value_free.contains(bound) {
                // The binder would capture a free variable of `value`
                let mut avoid = inner.names();
                avoid.extend(value.names());
                avoid.insert(name.to_string());
                let fresh = fresh_name(bound, &avoid);
                let renamed = substitute_shared(inner, bound, &Rc::new(Expr::Var(fresh.clone())));
                let replaced = substitute_in(&renamed, name, value, value_free).unwrap_or(renamed);
                Some(Rc::new(Expr::Abs(fresh, replaced)))
            } else {
                substitute_in(inner, name, value, value_free)
                    .map(|new_inner| Rc::new(Expr::Abs(bound.clone(), new_inner)))
            }
        }
    }
}

/// Produces `base` with its numeric suffix replaced by the smallest number
/// that yields a name outside `avoid`: `x` becomes `x1`, `x1` becomes `x2`.
pub(crate) fn fresh_name(base: &str, avoid: &BTreeSet<String>) -> String {
    let stem = base.trim_end_matches(|c: char| c.is_ascii_digit());
    let stem = if stem.is_empty() { base } else { stem };
    let mut suffix = 1_usize;
    loop {
        let candidate = format!("{stem}{suffix}");
        if !avoid.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{abs, app};

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_builder_macros() {
        let expr = abs!("x", "y", app!("x", "y", "z"));
        let expected = Expr::abs(
            "x",
            Expr::abs(
                "y",
                Expr::app(
                    Expr::app(Expr::var("x"), Expr::var("y")),
                    Expr::var("z"),
                ),
            ),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_debug_is_fully_parenthesized() {
        let expr = app!(abs!("x", "x"), "y");
        assert_eq!(format!("{expr:?}"), "((λx.x) y)");

        let reference = Expr::macro_ref("I", abs!("x", "x"));
        assert_eq!(format!("{reference:?}"), "I");
    }

    #[test]
    fn test_free_variables() {
        // λx.x y z
        let expr = abs!("x", app!("x", "y", "z"));
        assert_eq!(expr.free_variables(), set(&["y", "z"]));

        // (λx.x) x - the second x is free
        let expr = app!(abs!("x", "x"), "x");
        assert_eq!(expr.free_variables(), set(&["x"]));

        // Macro references are closed
        let expr = app!(Expr::macro_ref("I", abs!("x", "x")), "w");
        assert_eq!(expr.free_variables(), set(&["w"]));
    }

    #[test]
    fn test_closedness() {
        assert!(abs!("x", "y", app!("x", "y")).is_closed());
        assert!(!abs!("x", app!("x", "y")).is_closed());
        assert_eq!(abs!("x", app!("x", "y", "z")).first_free_variable(), Some("y"));

        // A binder only covers its own body
        let expr = app!(abs!("x", "x"), "x");
        assert_eq!(expr.first_free_variable(), Some("x"));

        let expr = abs!("x", app!("x", Expr::macro_ref("K", abs!("a", "b", "a"))));
        assert!(expr.is_closed());
    }

    #[test]
    fn test_referenced_macros() {
        let inner = Expr::macro_ref("B", abs!("x", "x"));
        // The reference to C inside B's resolved body is not a direct reference
        let nested = Expr::macro_ref("A", app!(Expr::macro_ref("C", abs!("y", "y")), "q"));
        let expr = abs!("z", app!(inner, nested, "z"));
        assert_eq!(expr.referenced_macros(), set(&["A", "B"]));
    }

    #[test]
    fn test_alpha_equivalence() {
        assert!(abs!("x", "y", "x").alpha_eq(&abs!("a", "b", "a")));
        assert!(!abs!("x", "y", "x").alpha_eq(&abs!("a", "b", "b")));

        // Free variables must match by name
        assert!(abs!("x", app!("x", "f")).alpha_eq(&abs!("y", app!("y", "f"))));
        assert!(!abs!("x", app!("x", "f")).alpha_eq(&abs!("y", app!("y", "g"))));

        // A bound variable never equals a free one
        assert!(!abs!("x", "x").alpha_eq(&abs!("y", "x")));

        // Shadowing: λx.λx.x binds the inner x
        assert!(abs!("x", "x", "x").alpha_eq(&abs!("a", "b", "b")));
    }

    #[test]
    fn test_alpha_equivalence_through_macros() {
        let id = abs!("x", "x");
        let reference = Expr::macro_ref("I", id.clone());
        assert!(reference.alpha_eq(&abs!("z", "z")));
        assert!(abs!("z", "z").alpha_eq(&reference));
        assert!(reference.alpha_eq(&Expr::macro_ref("I", id)));
    }

    #[test]
    fn test_substitute_var() {
        let result = substitute(&Expr::var("x"), "x", &Expr::var("y"));
        assert_eq!(result, Expr::var("y"));

        let result = substitute(&Expr::var("z"), "x", &Expr::var("y"));
        assert_eq!(result, Expr::var("z"));
    }

    #[test]
    fn test_substitute_app() {
        let result = substitute(&app!("x", "z", "x"), "x", &abs!("a", "a"));
        assert_eq!(result, app!(abs!("a", "a"), "z", abs!("a", "a")));
    }

    #[test]
    fn test_substitute_shadowing() {
        // (λx.x)[x := y] leaves the inner binding alone
        let body = abs!("x", "x");
        assert_eq!(substitute(&body, "x", &Expr::var("y")), body);
    }

    #[test]
    fn test_substitute_without_capture() {
        // (λz.x z)[x := y]: z is not free in y, no renaming
        let body = abs!("z", app!("x", "z"));
        let result = substitute(&body, "x", &Expr::var("y"));
        assert_eq!(result, abs!("z", app!("y", "z")));
    }

    #[test]
    fn test_substitute_renames_capturing_binder() {
        // (λy.x y)[x := y] → λy1.y y1
        let body = abs!("y", app!("x", "y"));
        let result = substitute(&body, "x", &Expr::var("y"));
        assert_eq!(result, abs!("y1", app!("y", "y1")));
        assert_eq!(result.free_variables(), set(&["y"]));
    }

    #[test]
    fn test_substitute_fresh_name_avoids_existing_names() {
        // (λy.x y y1)[x := y] must not pick y1, which is already free in the body
        let body = abs!("y", app!("x", "y", "y1"));
        let result = substitute(&body, "x", &Expr::var("y"));
        assert_eq!(result, abs!("y2", app!("y", "y2", "y1")));
    }

    #[test]
    fn test_substitute_capture_free_variable_law() {
        // free(b[x := v]) = (free(b) - {x}) ∪ free(v) when x occurs free in b
        let body = abs!("a", "b", app!("x", "a", "b", "c"));
        let value = app!("a", "b");
        let result = substitute(&body, "x", &value);

        let mut expected: BTreeSet<String> = body.free_variables();
        expected.remove("x");
        expected.extend(value.free_variables());
        assert_eq!(result.free_variables(), expected);
        assert!(result.alpha_eq(&abs!("p", "q", app!(app!("a", "b"), "p", "q", "c"))));
    }

    #[test]
    fn test_substitute_leaves_macro_refs() {
        let reference = Expr::macro_ref("K", abs!("x", "y", "x"));
        let body = app!(reference.clone(), "x");
        let result = substitute(&body, "x", &Expr::var("w"));
        assert_eq!(result, app!(reference, "w"));
    }

    #[test]
    fn test_substitute_shares_untouched_subtrees() {
        let untouched = Rc::new(abs!("q", app!("q", "q")));
        let body = Rc::new(Expr::App(Rc::clone(&untouched), Rc::new(Expr::var("x"))));
        let result = substitute_shared(&body, "x", &Rc::new(Expr::var("w")));
        let Expr::App(func, arg) = result.as_ref() else {
            panic!("Expected an application");
        };
        assert!(Rc::ptr_eq(func, &untouched));
        assert_eq!(arg.as_ref(), &Expr::var("w"));

        // Nothing to replace: the same allocation comes back
        let result = substitute_shared(&untouched, "x", &Rc::new(Expr::var("w")));
        assert!(Rc::ptr_eq(&result, &untouched));
    }

    #[test]
    fn test_fresh_name() {
        assert_eq!(fresh_name("x", &set(&["x"])), "x1");
        assert_eq!(fresh_name("x1", &set(&["x", "x1"])), "x2");
        assert_eq!(fresh_name("x", &set(&["x", "x1", "x2"])), "x3");
    }

    #[test]
    fn test_at_and_as_abstraction() {
        let expr = app!(abs!("x", app!("x", "x")), "y");
        assert_eq!(expr.at(&[Branch::Arg]), Some(&Expr::var("y")));
        assert_eq!(
            expr.at(&[Branch::Func, Branch::Body, Branch::Func]),
            Some(&Expr::var("x"))
        );
        assert_eq!(expr.at(&[Branch::Body]), None);

        let reference = Expr::macro_ref("I", abs!("x", "x"));
        assert_eq!(reference.as_abstraction().map(|(name, _)| name), Some("x"));
        assert!(Expr::var("x").as_abstraction().is_none());
    }
}
