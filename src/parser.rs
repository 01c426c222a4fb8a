//! Parser for the Tracker Query Language.
//!
//! Recursive descent over the token stream, precedence from low to high:
//!
//! ```text
//! parse()
//!   └─ parse_or_expression()            a OR b
//!        └─ parse_and_expression()      a AND b
//!             └─ parse_not_expression() NOT a
//!                  └─ parse_primary_expression()
//!                       ├─ "(" expression ")"
//!                       └─ identifier comparison
//!                            ├─ op literal          =, !=, <, <=, >, >=
//!                            ├─ BETWEEN(a, b)
//!                            └─ IN(v1, v2, ...)
//! ```
//!
//! Empty input is valid and means "match everything"; `parse` returns
//! `Ok(None)` for it. Every failure is a [`SyntaxError`] carrying the byte
//! span of the offending token; nothing is ever partially parsed.

use crate::ast::{CompOp, Condition, Expr, FieldRef, Literal};
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub span: Option<Span>,
}

impl SyntaxError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self { message, span: Some(span) }
    }
}

/// Parses a complete TQL query. `None` means "match everything".
pub fn parse(input: &str) -> Result<Option<Expr>, SyntaxError> {
    let tokens: Vec<_> = Lexer::new(input).collect();
    Parser::new(&tokens).parse()
}

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self { tokens, position: 0 }
    }

    /// Returns the current token without advancing
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.position)
    }

    /// Returns the current token and advances
    fn advance(&mut self) -> Option<&Token<'a>> {
        if self.position < self.tokens.len() {
            let token = &self.tokens[self.position];
            self.position += 1;
            Some(token)
        } else {
            None
        }
    }

    /// Expects a token of the given kind and advances, otherwise errors
    fn expect(&mut self, expected: TokenKind) -> Result<&Token<'a>, SyntaxError> {
        if let Some(token) = self.peek() {
            if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) {
                Ok(self.advance().unwrap())
            } else {
                Err(SyntaxError::at_position(
                    format!("Expected {:?}, found {:?}", expected, token.kind),
                    token.span,
                ))
            }
        } else {
            Err(SyntaxError::new(
                format!("Expected {:?}, but reached end of input", expected),
                None,
            ))
        }
    }

    /// Checks whether the current token matches the given kind
    fn match_token(&self, kind: &TokenKind) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        } else {
            false
        }
    }

    /// Checks whether the current token is a binary comparison operator
    fn is_comparison_operator(&self) -> bool {
        if let Some(token) = self.peek() {
            matches!(
                token.kind,
                TokenKind::Eq | TokenKind::NotEq | TokenKind::Gt
                    | TokenKind::Lt | TokenKind::Gte | TokenKind::Lte
            )
        } else {
            false
        }
    }

    pub fn parse(&mut self) -> Result<Option<Expr>, SyntaxError> {
        // Surface lexical garbage as a syntax error up front, with its span
        if let Some(bad) = self.tokens.iter().find(|t| t.kind == TokenKind::Illegal) {
            return Err(SyntaxError::at_position(
                "Illegal token".to_string(),
                bad.span,
            ));
        }

        if self.tokens.is_empty() {
            return Ok(None); // empty query matches everything
        }

        let expr = self.parse_or_expression()?;

        if let Some(token) = self.peek() {
            return Err(SyntaxError::at_position(
                format!("Unexpected trailing token: {:?}", token.kind),
                token.span,
            ));
        }

        Ok(Some(expr))
    }

    /// OR expression (lowest precedence): `and_expr (OR and_expr)*`
    fn parse_or_expression(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_and_expression()?;

        while self.match_token(&TokenKind::Or) {
            self.advance(); // consume OR
            let right = self.parse_and_expression()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    /// AND expression: `not_expr (AND not_expr)*`
    fn parse_and_expression(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_not_expression()?;

        while self.match_token(&TokenKind::And) {
            self.advance(); // consume AND
            let right = self.parse_not_expression()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    /// NOT expression: `NOT* primary_expr`, chaining allowed
    fn parse_not_expression(&mut self) -> Result<Expr, SyntaxError> {
        if self.match_token(&TokenKind::Not) {
            self.advance(); // consume NOT
            let expr = self.parse_not_expression()?;
            Ok(Expr::Not(Box::new(expr)))
        } else {
            self.parse_primary_expression()
        }
    }

    /// Primary expression: a parenthesized group or a single comparison
    fn parse_primary_expression(&mut self) -> Result<Expr, SyntaxError> {
        if let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::LParen => {
                    self.advance(); // consume (
                    let expr = self.parse_or_expression()?;
                    self.expect(TokenKind::RParen)?;
                    Ok(expr)
                }
                TokenKind::Identifier(_) => self.parse_comparison(),
                _ => Err(SyntaxError::at_position(
                    format!("Expected a field identifier or '(', found {:?}", token.kind),
                    token.span,
                )),
            }
        } else {
            Err(SyntaxError::new("Unexpected end of input".to_string(), None))
        }
    }

    /// Comparison: `identifier op value`, `identifier BETWEEN(a, b)` or
    /// `identifier IN(v1, v2, ...)`
    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let field_token = self.expect(TokenKind::Identifier(""))?;
        let field = if let TokenKind::Identifier(name) = &field_token.kind {
            FieldRef(name.to_string())
        } else {
            unreachable!("expect() returned a non-identifier")
        };

        let condition = if self.is_comparison_operator() {
            let op = self.parse_comparison_operator()?;
            let value = self.parse_literal()?;
            Condition::Compare(op, value)
        } else if self.match_token(&TokenKind::Between) {
            self.advance(); // consume BETWEEN
            self.expect(TokenKind::LParen)?;
            let low = self.parse_literal()?;
            self.expect(TokenKind::Comma)?;
            let high = self.parse_literal()?;
            self.expect(TokenKind::RParen)?;
            Condition::Between(low, high)
        } else if self.match_token(&TokenKind::In) {
            self.advance(); // consume IN
            self.expect(TokenKind::LParen)?;
            let mut values = Vec::new();
            if !self.match_token(&TokenKind::RParen) {
                loop {
                    values.push(self.parse_literal()?);
                    if self.match_token(&TokenKind::RParen) {
                        break;
                    }
                    self.expect(TokenKind::Comma)?;
                }
            }
            self.expect(TokenKind::RParen)?;
            Condition::In(values)
        } else if let Some(token) = self.peek() {
            return Err(SyntaxError::at_position(
                format!("Expected a comparison operator, found {:?}", token.kind),
                token.span,
            ));
        } else {
            return Err(SyntaxError::new(
                format!("Expected a comparison operator after '{}'", field.0),
                None,
            ));
        };

        Ok(Expr::Comparison { field, condition })
    }

    fn parse_comparison_operator(&mut self) -> Result<CompOp, SyntaxError> {
        if let Some(token) = self.advance() {
            match &token.kind {
                TokenKind::Eq => Ok(CompOp::Eq),
                TokenKind::NotEq => Ok(CompOp::NotEq),
                TokenKind::Gt => Ok(CompOp::Gt),
                TokenKind::Lt => Ok(CompOp::Lt),
                TokenKind::Gte => Ok(CompOp::Gte),
                TokenKind::Lte => Ok(CompOp::Lte),
                _ => Err(SyntaxError::at_position(
                    format!("Expected comparison operator, found {:?}", token.kind),
                    token.span,
                )),
            }
        } else {
            Err(SyntaxError::new("Expected comparison operator".to_string(), None))
        }
    }

    fn parse_literal(&mut self) -> Result<Literal, SyntaxError> {
        if let Some(token) = self.advance() {
            match &token.kind {
                TokenKind::String(s) => Ok(Literal::String(s.to_string())),
                TokenKind::Int(n) => Ok(Literal::Int(*n)),
                TokenKind::Float(x) => Ok(Literal::Float(*x)),
                _ => Err(SyntaxError::at_position(
                    format!("Expected literal value, found {:?}", token.kind),
                    token.span,
                )),
            }
        } else {
            Err(SyntaxError::new("Expected literal value".to_string(), None))
        }
    }
}
