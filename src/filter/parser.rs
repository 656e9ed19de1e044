//! Recursive-descent parser for SCIM filter text.
//!
//! ```text
//! expr  := and ( "or" and )*
//! and   := term ( "and" term )*
//! term  := "not" term | "(" expr ")" | path "[" expr "]" | path "pr" | path op value
//! ```

use std::iter::Peekable;
use std::str::{CharIndices, FromStr};

use tracing::debug;

use super::{CompareOperator, Expression, LogicalOperator, MAX_DEPTH, Value};
use crate::error::PolicyError;

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Word(String),
    Str(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

impl Token {
    fn lexeme(&self) -> String {
        match &self.kind {
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
            TokenKind::LBracket => "[".to_string(),
            TokenKind::RBracket => "]".to_string(),
            TokenKind::Comma => ",".to_string(),
            TokenKind::Word(w) => w.clone(),
            TokenKind::Str(s) => super::value::quote(s),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '"' | ',')
}

fn tokenize(text: &str) -> Result<Vec<Token>, PolicyError> {
    let mut tokens = Vec::new();
    let mut chars: Peekable<CharIndices<'_>> = text.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        let kind = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '"' => {
                chars.next();
                tokens.push(Token {
                    kind: TokenKind::Str(read_string(text, pos, &mut chars)?),
                    pos,
                });
                continue;
            }
            _ => {
                let mut end = text.len();
                while let Some(&(i, c)) = chars.peek() {
                    if is_delimiter(c) {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                tokens.push(Token {
                    kind: TokenKind::Word(text[pos..end].to_string()),
                    pos,
                });
                continue;
            }
        };
        chars.next();
        tokens.push(Token { kind, pos });
    }

    Ok(tokens)
}

/// Reads the body of a string literal whose opening quote sits at `start`.
fn read_string(
    text: &str,
    start: usize,
    chars: &mut Peekable<CharIndices<'_>>,
) -> Result<String, PolicyError> {
    let mut out = String::new();
    while let Some((pos, c)) = chars.next() {
        match c {
            '"' => return Ok(out),
            '\\' => match chars.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, '/')) => out.push('/'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'b')) => out.push('\u{8}'),
                Some((_, 'f')) => out.push('\u{c}'),
                Some((_, 'u')) => out.push(read_unicode_escape(text, pos, chars)?),
                Some((_, other)) => {
                    return Err(PolicyError::parse(
                        pos,
                        format!("\\{other}"),
                        "unknown escape sequence",
                    ));
                }
                None => break,
            },
            _ => out.push(c),
        }
    }
    Err(PolicyError::parse(
        start,
        &text[start..],
        "unterminated string literal",
    ))
}

/// Four hex digits after `\u`; `pos` is the offset of the backslash.
fn read_unicode_escape(
    text: &str,
    pos: usize,
    chars: &mut Peekable<CharIndices<'_>>,
) -> Result<char, PolicyError> {
    let mut code = 0u32;
    for _ in 0..4 {
        let digit = chars
            .next_if(|(_, c)| c.is_ascii_hexdigit())
            .and_then(|(_, c)| c.to_digit(16));
        match digit {
            Some(d) => code = code * 16 + d,
            None => return Err(invalid_unicode_escape(text, pos)),
        }
    }
    char::from_u32(code).ok_or_else(|| invalid_unicode_escape(text, pos))
}

fn invalid_unicode_escape(text: &str, pos: usize) -> PolicyError {
    let end = text.len().min(pos + 6);
    PolicyError::parse(
        pos,
        text.get(pos..end).unwrap_or_default(),
        "invalid unicode escape",
    )
}

/// Parentheses, `not` and value paths open a nesting level.
const MAX_NESTING: usize = 128;

const TOO_DEEP: &str = "expression nested too deeply";

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    end: usize,
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn eof_error(&self, message: &str) -> PolicyError {
        PolicyError::parse(self.end, "", message)
    }

    fn parse_or(&mut self) -> Result<Expression, PolicyError> {
        let mut left = self.parse_and()?;
        while self.peek().is_some_and(|t| t.is_keyword("or")) {
            self.next();
            let right = self.parse_and()?;
            left = Expression::logical(LogicalOperator::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, PolicyError> {
        let mut left = self.parse_term()?;
        while self.peek().is_some_and(|t| t.is_keyword("and")) {
            self.next();
            let right = self.parse_term()?;
            left = Expression::logical(LogicalOperator::And, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expression, PolicyError> {
        if self.nesting >= MAX_NESTING {
            let (pos, lexeme) = self
                .peek()
                .map(|t| (t.pos, t.lexeme()))
                .unwrap_or((self.end, String::new()));
            return Err(PolicyError::parse(pos, lexeme, TOO_DEEP));
        }
        self.nesting += 1;
        let term = self.parse_nested_term();
        self.nesting -= 1;
        term
    }

    fn parse_nested_term(&mut self) -> Result<Expression, PolicyError> {
        let token = self
            .next()
            .ok_or_else(|| self.eof_error("expected an expression"))?;

        match token.kind {
            TokenKind::Word(ref w) if w.eq_ignore_ascii_case("not") => {
                Ok(Expression::negate(self.parse_term()?))
            }
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                self.expect_close(TokenKind::RParen, &token, "unbalanced '('")?;
                Ok(Expression::precedence(inner))
            }
            TokenKind::Word(ref w) if is_logical_keyword(w) => Err(PolicyError::parse(
                token.pos,
                w.clone(),
                "logical operator without a left-hand expression",
            )),
            TokenKind::Word(path) => self.parse_attribute(path, token.pos),
            TokenKind::RParen => Err(PolicyError::parse(token.pos, ")", "unbalanced ')'")),
            TokenKind::RBracket => Err(PolicyError::parse(token.pos, "]", "unbalanced ']'")),
            _ => Err(PolicyError::parse(
                token.pos,
                token.lexeme(),
                "unexpected token",
            )),
        }
    }

    fn expect_close(
        &mut self,
        close: TokenKind,
        open: &Token,
        message: &str,
    ) -> Result<(), PolicyError> {
        match self.next() {
            Some(t) if t.kind == close => Ok(()),
            Some(t) => Err(PolicyError::parse(t.pos, t.lexeme(), message)),
            None => Err(PolicyError::parse(open.pos, open.lexeme(), message)),
        }
    }

    fn parse_attribute(&mut self, path: String, pos: usize) -> Result<Expression, PolicyError> {
        let Some(token) = self.next() else {
            return Err(PolicyError::parse(
                pos,
                path,
                "attribute without a comparison operator",
            ));
        };

        let op_word = match token.kind {
            TokenKind::LBracket => {
                let filter = self.parse_or()?;
                self.expect_close(TokenKind::RBracket, &token, "unbalanced '['")?;
                return Ok(Expression::value_path(path, filter));
            }
            TokenKind::Word(ref w) => w.clone(),
            _ => {
                return Err(PolicyError::parse(
                    token.pos,
                    token.lexeme(),
                    "expected a comparison operator",
                ));
            }
        };

        let operator = CompareOperator::from_str(&op_word).map_err(|_| {
            PolicyError::parse(token.pos, op_word.clone(), "unknown comparison operator")
        })?;

        if operator == CompareOperator::Pr {
            return Ok(Expression::present(path));
        }

        let value = self.parse_value(operator, &token)?;
        Ok(Expression::attribute(path, operator, value))
    }

    fn parse_value(
        &mut self,
        operator: CompareOperator,
        op_token: &Token,
    ) -> Result<Value, PolicyError> {
        let missing = |t: &Token| {
            PolicyError::parse(t.pos, t.lexeme(), "missing value after operator")
        };

        let Some(token) = self.next() else {
            return Err(missing(op_token));
        };

        match token.kind {
            TokenKind::Str(s) => Ok(Value::String(s)),
            TokenKind::Word(ref w) if is_logical_keyword(w) || w.eq_ignore_ascii_case("not") => {
                Err(missing(&token))
            }
            TokenKind::Word(w) => Ok(Value::from_bare_word(&w)),
            TokenKind::LBracket if operator == CompareOperator::In => self.parse_list(&token),
            _ => Err(missing(&token)),
        }
    }

    fn parse_list(&mut self, open: &Token) -> Result<Value, PolicyError> {
        let mut items = Vec::new();
        loop {
            match self.next() {
                Some(Token {
                    kind: TokenKind::RBracket,
                    ..
                }) if items.is_empty() => break,
                Some(Token {
                    kind: TokenKind::Str(s),
                    ..
                }) => items.push(Value::String(s)),
                Some(Token {
                    kind: TokenKind::Word(w),
                    ..
                }) => items.push(Value::from_bare_word(&w)),
                Some(t) => {
                    return Err(PolicyError::parse(t.pos, t.lexeme(), "expected a list item"));
                }
                None => return Err(PolicyError::parse(open.pos, "[", "unbalanced '['")),
            }
            match self.next() {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => continue,
                Some(Token {
                    kind: TokenKind::RBracket,
                    ..
                }) => break,
                Some(t) => {
                    return Err(PolicyError::parse(
                        t.pos,
                        t.lexeme(),
                        "expected ',' or ']' in list",
                    ));
                }
                None => return Err(PolicyError::parse(open.pos, "[", "unbalanced '['")),
            }
        }
        Ok(Value::List(items))
    }
}

fn is_logical_keyword(word: &str) -> bool {
    word.eq_ignore_ascii_case("and") || word.eq_ignore_ascii_case("or")
}

/// Parse a SCIM filter into an [`Expression`].
///
/// Keywords and operators are case-insensitive. Bare words on the right-hand
/// side become strings unless they read as a number or boolean.
pub fn parse(text: &str) -> Result<Expression, PolicyError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        index: 0,
        end: text.len(),
        nesting: 0,
    };

    let expr = parser.parse_or()?;
    if let Some(token) = parser.next() {
        let message = match token.kind {
            TokenKind::RParen => "unbalanced ')'",
            TokenKind::RBracket => "unbalanced ']'",
            _ => "unexpected token after expression",
        };
        return Err(PolicyError::parse(token.pos, token.lexeme(), message));
    }
    // Long and/or chains nest to the left without opening a level.
    if expr.depth() > MAX_DEPTH {
        return Err(PolicyError::parse(0, "", TOO_DEEP));
    }

    debug!(event = "Filter", phase = "Parsed", filter = text, canonical = %expr);
    Ok(expr)
}
