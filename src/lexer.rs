#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// λ, \, /, |
    Lambda,
    /// .
    Dot,
    /// (
    LParen,
    /// )
    RParen,
    /// = in macro definitions
    Equals,
    /// Variable and macro names
    Ident(String),
    /// For explicit spacing in applications
    Whitespace,
    /// End of input
    Eof,
}

pub struct Lexer<'input> {
    chars: std::str::Chars<'input>,
    current_char: Option<char>,
    offset: usize,
}

impl<'input> Lexer<'input> {
    #[must_use]
    pub fn new(input: &'input str) -> Self {
        let mut chars = input.chars();
        let current_char = chars.next();
        Lexer {
            chars,
            current_char,
            offset: 0,
        }
    }

    /// Tokenizes the input string into a vector of tokens.
    ///
    /// Whitespace is reported only where it separates the parts of an
    /// application, i.e. after a name or a closing parenthesis.
    ///
    /// # Errors
    /// Returns an error if an unexpected character is encountered.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.current_char {
            match ch {
                // Lambda symbols
                'λ' | '\\' | '/' | '|' => {
                    tokens.push(Token::Lambda);
                    self.advance();
                }
                '.' => {
                    tokens.push(Token::Dot);
                    self.advance();
                }
                '(' => {
                    tokens.push(Token::LParen);
                    self.advance();
                }
                ')' => {
                    tokens.push(Token::RParen);
                    self.advance();
                }
                '=' => {
                    tokens.push(Token::Equals);
                    self.advance();
                }
                'a'..='z' | 'A'..='Z' | '_' => {
                    let ident = self.read_identifier();
                    tokens.push(Token::Ident(ident));
                }
                ch if ch.is_whitespace() => {
                    self.skip_whitespace();
                    if Self::is_significant_whitespace(&tokens) {
                        tokens.push(Token::Whitespace);
                    }
                }
                _ => {
                    return Err(format!(
                        "Unexpected character '{ch}' at offset {}",
                        self.offset
                    ));
                }
            }
        }

        tokens.push(Token::Eof);
        Ok(tokens)
    }

    fn advance(&mut self) {
        self.current_char = self.chars.next();
        self.offset += 1;
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    const fn is_significant_whitespace(tokens: &[Token]) -> bool {
        // Whitespace is significant between atoms in applications
        if let Some(last_token) = tokens.last() {
            matches!(last_token, Token::Ident(_) | Token::RParen)
        } else {
            false
        }
    }
}
