use std::fmt;

use crate::expr::{Branch, Expr};

/// Opening marker placed before a highlighted span.
pub const HIGHLIGHT_OPEN: &str = "[[";
/// Closing marker placed after a highlighted span.
pub const HIGHLIGHT_CLOSE: &str = "]]";

/// Renders an expression as text, optionally marking one subterm.
///
/// Parentheses are kept to a minimum: application associates to the left and
/// abstraction bodies extend as far right as possible. An abstraction is
/// parenthesized whenever it appears inside an application, and an argument
/// that needs parentheses is written directly after its function without a
/// space. Macro references print as their names.
///
/// When `highlight` addresses a subterm, that subterm (with its parentheses)
/// is wrapped in [`HIGHLIGHT_OPEN`] and [`HIGHLIGHT_CLOSE`]. A path that does
/// not exist in `expr` marks nothing.
///
/// # Examples
/// ```
/// use lambstep::{abs, app, expr::Branch, pretty::render};
///
/// let expr = app!("f", app!(abs!("x", "x"), "y"));
/// assert_eq!(render(&expr, None), "f((λx.x) y)");
/// assert_eq!(render(&expr, Some(&[Branch::Arg])), "f[[((λx.x) y)]]");
/// ```
#[must_use]
pub fn render(expr: &Expr, highlight: Option<&[Branch]>) -> String {
    let mut out = String::new();
    write_child(&mut out, expr, false, highlight);
    out
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self, None))
    }
}

fn write_child(out: &mut String, expr: &Expr, parens: bool, target: Option<&[Branch]>) {
    let marked = matches!(target, Some([]));
    if marked {
        out.push_str(HIGHLIGHT_OPEN);
    }
    if parens {
        out.push('(');
    }
    write_expr(out, expr, if marked { None } else { target });
    if parens {
        out.push(')');
    }
    if marked {
        out.push_str(HIGHLIGHT_CLOSE);
    }
}

fn write_expr(out: &mut String, expr: &Expr, target: Option<&[Branch]>) {
    match expr {
        Expr::Var(name) | Expr::MacroRef(name, _) => out.push_str(name),
        Expr::Abs(name, body) => {
            out.push('λ');
            out.push_str(name);
            out.push('.');
            write_child(out, body, false, descend(target, Branch::Body));
        }
        Expr::App(func, arg) => {
            let func_parens = matches!(func.as_ref(), Expr::Abs(..));
            let arg_parens = matches!(arg.as_ref(), Expr::Abs(..) | Expr::App(..));
            write_child(out, func, func_parens, descend(target, Branch::Func));
            if !arg_parens {
                out.push(' ');
            }
            write_child(out, arg, arg_parens, descend(target, Branch::Arg));
        }
    }
}

fn descend(target: Option<&[Branch]>, branch: Branch) -> Option<&[Branch]> {
    match target?.split_first() {
        Some((first, rest)) if *first == branch => Some(rest),
        _ => None,
    }
}
