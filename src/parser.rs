use crate::{
    expr::Expr,
    lexer::{Lexer, Token},
    macros::{MacroTable, is_macro_name},
    strategy::Strategy,
};

/// Recursive-descent parser for named lambda terms.
///
/// Grammar, loosest binding first:
/// ```text
/// expression  := abstraction | application
/// abstraction := λ name+ . expression
/// application := atom (atom)*
/// atom        := name | ( expression ) | abstraction
/// ```
/// An abstraction body extends as far right as possible and application
/// associates to the left. When a macro table is attached, an uppercase name
/// that is not bound by an enclosing abstraction becomes a reference to the
/// macro of that name.
pub struct Parser<'t> {
    tokens: Vec<Token>,
    current: usize,
    context: Vec<String>, // Names bound by the enclosing abstractions
    macros: Option<(&'t MacroTable, Strategy)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidToken {
        message: String,
    },
    UnexpectedToken {
        expected: String,
        found: Token,
        position: usize,
    },
    UnboundMacro {
        name: String,
        position: usize,
    },
    EmptyExpression {
        position: usize,
    },
}

impl<'t> Parser<'t> {
    #[must_use]
    pub const fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            context: Vec::new(),
            macros: None,
        }
    }

    /// Attaches a macro table; references are resolved for `strategy`.
    #[must_use]
    pub const fn with_macros(mut self, table: &'t MacroTable, strategy: Strategy) -> Self {
        self.macros = Some((table, strategy));
        self
    }

    /// Parse a lambda calculus expression from a string.
    ///
    /// Without a macro table every name is a variable.
    ///
    /// # Errors
    /// Returns a `ParseError` if the input cannot be tokenized or parsed.
    pub fn parse(input: &str) -> Result<Expr, ParseError> {
        let mut parser = Parser::new(tokenize(input)?);
        parser.parse_complete()
    }

    /// Parse an expression, turning free uppercase names into references to
    /// the macros in `table`.
    ///
    /// # Errors
    /// Returns `UnboundMacro` for a free uppercase name that `table` does not
    /// define, or any other `ParseError` for malformed input.
    pub fn parse_with_macros(
        input: &str,
        table: &MacroTable,
        strategy: Strategy,
    ) -> Result<Expr, ParseError> {
        let mut parser = Parser::new(tokenize(input)?).with_macros(table, strategy);
        parser.parse_complete()
    }

    /// Parse a definition of the form `NAME = expression`.
    ///
    /// The body may reference macros already in `table`. The name itself is
    /// not validated here; [`MacroTable::define`] does that.
    ///
    /// # Errors
    /// Returns a `ParseError` if the input is not a definition.
    pub fn parse_definition(
        input: &str,
        table: &MacroTable,
    ) -> Result<(String, Expr), ParseError> {
        let mut parser = Parser::new(tokenize(input)?).with_macros(table, Strategy::Normal);
        parser.skip_whitespace();

        let name = match parser.peek() {
            Some(Token::Ident(name)) => name.clone(),
            _ => return Err(parser.unexpected("macro name")),
        };
        parser.advance();
        parser.skip_whitespace();

        if !matches!(parser.peek(), Some(Token::Equals)) {
            return Err(parser.unexpected("'='"));
        }
        parser.advance();

        let body = parser.parse_complete()?;
        Ok((name, body))
    }

    fn parse_complete(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;
        self.skip_whitespace();
        if !self.is_at_end() {
            return Err(self.unexpected("end of input"));
        }
        Ok(expr)
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();

        if self.is_at_end() {
            return Err(ParseError::EmptyExpression {
                position: self.current,
            });
        }

        // Check for abstraction or application
        if matches!(self.peek(), Some(Token::Lambda)) {
            self.parse_abstraction()
        } else {
            self.parse_application()
        }
    }

    fn parse_abstraction(&mut self) -> Result<Expr, ParseError> {
        // Parse: λx.e or λx y.e
        self.advance(); // consume lambda
        self.skip_whitespace();

        let mut bindings = Vec::new();
        while let Some(Token::Ident(name)) = self.peek() {
            bindings.push(name.clone());
            self.advance();
            self.skip_whitespace();
        }

        if bindings.is_empty() {
            return Err(self.unexpected("variable binding"));
        }
        if !matches!(self.peek(), Some(Token::Dot)) {
            return Err(self.unexpected("'.'"));
        }
        self.advance(); // consume dot

        let depth = self.context.len();
        self.context.extend(bindings.iter().cloned());
        let body = self.parse_expression();
        self.context.truncate(depth);

        Ok(bindings
            .into_iter()
            .rev()
            .fold(body?, |body, name| Expr::abs(name, body)))
    }

    fn parse_application(&mut self) -> Result<Expr, ParseError> {
        // Parse left-associative application: f g h = ((f g) h)
        let mut expr = self.parse_atom()?;

        loop {
            self.skip_whitespace();
            if matches!(self.peek(), Some(Token::RParen | Token::Eof) | None) {
                break;
            }
            let arg = self.parse_atom()?;
            expr = Expr::app(expr, arg);
        }

        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();

        match self.peek() {
            Some(Token::LParen) => {
                self.advance(); // consume '('
                let expr = self.parse_expression()?;
                if !matches!(self.peek(), Some(Token::RParen)) {
                    return Err(self.unexpected("')'"));
                }
                self.advance(); // consume ')'
                Ok(expr)
            }
            Some(Token::Ident(name)) => {
                let name = name.clone();
                let position = self.current;
                self.advance();
                self.resolve_variable(name, position)
            }
            // Abstraction as the last argument: f λx.x
            Some(Token::Lambda) => self.parse_abstraction(),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn resolve_variable(&self, name: String, position: usize) -> Result<Expr, ParseError> {
        if self.context.contains(&name) || !is_macro_name(&name) {
            return Ok(Expr::Var(name));
        }
        match self.macros {
            Some((table, strategy)) => table
                .reference(&name, strategy)
                .map_err(|_| ParseError::UnboundMacro { name, position }),
            None => Ok(Expr::Var(name)),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.peek().cloned().unwrap_or(Token::Eof),
            position: self.current,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn advance(&mut self) {
        if self.current < self.tokens.len() {
            self.current += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek(), Some(Token::Eof) | None)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(Token::Whitespace)) {
            self.advance();
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(input)
        .tokenize()
        .map_err(|message| ParseError::InvalidToken { message })
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidToken { message } => write!(f, "{message}"),
            Self::UnexpectedToken {
                expected,
                found,
                position,
            } => {
                write!(
                    f,
                    "Expected {expected} but found {found:?} at position {position}"
                )
            }
            Self::UnboundMacro { name, position } => {
                write!(f, "Unbound macro '{name}' at position {position}")
            }
            Self::EmptyExpression { position } => {
                write!(f, "Empty expression at position {position}")
            }
        }
    }
}

impl std::error::Error for ParseError {}
