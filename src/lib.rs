pub mod config;
pub mod engine;
pub mod expr;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod pretty;
pub mod resugar;
pub mod strategy;

use anyhow::Result;
// Re-export main types and functions for convenient use
pub use config::Config;
pub use engine::{EvaluationError, Run, Trace, evaluate, evaluate_highlighted, run, run_with};
pub use expr::{Branch, Expr, IntoExpr, Path, substitute};
pub use lexer::{Lexer, Token};
pub use macros::{MacroDefinition, MacroError, MacroTable, is_macro_name};
pub use parser::{ParseError, Parser};
pub use pretty::render;
pub use resugar::resugar;
pub use strategy::{ParseStrategyError, Strategy};

// Macros are automatically exported at the crate root by #[macro_export]

/// Parse a lambda calculus expression from a string.
///
/// Every name is read as a variable; use [`parse_with_macros`] to refer to
/// macros.
///
/// # Errors
/// Returns `ParseError` if the input cannot be tokenized or parsed.
///
/// # Examples
/// ```
/// use lambstep::parse;
///
/// let expr = parse("(λx.x) y").unwrap();
/// assert_eq!(expr.to_string(), "(λx.x) y");
///
/// // Alternative lambda symbols
/// let expr = parse("\\x.x").unwrap();
/// let expr = parse("/x.x").unwrap();
/// let expr = parse("|x.x").unwrap();
/// ```
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    Parser::parse(input)
}

/// Parse an expression whose free uppercase names refer to macros in `table`.
///
/// # Errors
/// Returns `ParseError` if parsing fails or a macro is not defined.
pub fn parse_with_macros(
    input: &str,
    table: &MacroTable,
    strategy: Strategy,
) -> Result<Expr, ParseError> {
    Parser::parse_with_macros(input, table, strategy)
}

/// Parse a `NAME = expression` line and add it to `table`.
///
/// # Returns
/// The normal-order trace of the body.
///
/// # Errors
/// Returns an error if the line does not parse or the definition is rejected.
///
/// # Examples
/// ```
/// use lambstep::{MacroTable, define_source};
///
/// let mut table = MacroTable::new();
/// define_source(&mut table, "I = λx.x").unwrap();
/// define_source(&mut table, "II = I I").unwrap();
/// assert_eq!(table.get("II").unwrap().normal_form().unwrap().to_string(), "λx.x");
/// ```
pub fn define_source(table: &mut MacroTable, source: &str) -> Result<Trace> {
    let (name, body) = Parser::parse_definition(source, table)?;
    let trace = table.define(&name, body)?;
    Ok(trace)
}

/// Parse and evaluate a lambda calculus expression.
///
/// This is a convenience function that combines parsing and evaluation;
/// running out of steps is reported as an error.
///
/// # Errors
/// Returns an error if parsing fails or evaluation exceeds the step limit.
///
/// # Examples
/// ```
/// use lambstep::{MacroTable, Strategy, parse_and_evaluate};
///
/// let table = MacroTable::new();
/// let result = parse_and_evaluate("(λx.x) (λy.y)", &table, Strategy::Normal, 100).unwrap();
/// assert_eq!(result.to_string(), "λy.y");
/// ```
pub fn parse_and_evaluate(
    input: &str,
    table: &MacroTable,
    strategy: Strategy,
    max_steps: usize,
) -> Result<Expr> {
    let expr = parse_with_macros(input, table, strategy)?;
    let result = evaluate(&expr, strategy, max_steps).into_result()?;
    Ok(result)
}
