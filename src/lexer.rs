//! Lexer for the Tracker Query Language.

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// Current position in the input string (byte index)
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// Returns the character at the current position without advancing
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// Returns the character after the current one without advancing
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// Advances one character and returns it
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// Skips whitespace characters
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Reads a number literal, optionally signed and with a fractional part.
    /// The sign (if any) and the first digit have already been consumed.
    fn read_number(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else {
                break;
            }
        }

        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.bump(); // consume '.'
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    self.bump();
                } else {
                    break;
                }
            }
        }

        let value_str = &self.input[start..self.position];
        let kind = if is_float {
            match value_str.parse::<f64>() {
                Ok(v) => TokenKind::Float(v),
                Err(_) => TokenKind::Illegal,
            }
        } else {
            match value_str.parse::<i64>() {
                Ok(v) => TokenKind::Int(v),
                Err(_) => TokenKind::Illegal, // overflow
            }
        };
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    /// Reads a quoted string literal.
    /// Note: the opening quote has already been consumed by the caller.
    fn read_string(&mut self, start: usize, quote: char) -> Token<'a> {
        let content_start = self.position;
        loop {
            match self.peek() {
                Some(c) if c == quote => break,
                Some(_) => {
                    self.bump();
                }
                // Unterminated string
                None => {
                    return Token {
                        kind: TokenKind::Illegal,
                        span: Span::new(start, self.position),
                    };
                }
            }
        }
        let content_end = self.position;
        self.bump(); // consume closing quote

        let content = &self.input[content_start..content_end];
        Token {
            kind: TokenKind::String(content),
            span: Span::new(start, self.position),
        }
    }

    /// Reads an identifier or keyword.
    /// Identifiers may contain letters, digits and underscores.
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        let kind = match_keyword(literal);
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }
}

fn match_keyword(s: &str) -> TokenKind {
    match s.to_ascii_lowercase().as_str() {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "between" => TokenKind::Between,
        "in" => TokenKind::In,
        _ => TokenKind::Identifier(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let start = self.position;

        let Some(c) = self.bump() else {
            return None; // end of input
        };

        let token = match c {
            '=' => Token { kind: TokenKind::Eq, span: Span::new(start, self.position) },
            '(' => Token { kind: TokenKind::LParen, span: Span::new(start, self.position) },
            ')' => Token { kind: TokenKind::RParen, span: Span::new(start, self.position) },
            ',' => Token { kind: TokenKind::Comma, span: Span::new(start, self.position) },
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: TokenKind::Lte, span: Span::new(start, self.position) }
                } else {
                    Token { kind: TokenKind::Lt, span: Span::new(start, self.position) }
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: TokenKind::Gte, span: Span::new(start, self.position) }
                } else {
                    Token { kind: TokenKind::Gt, span: Span::new(start, self.position) }
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: TokenKind::NotEq, span: Span::new(start, self.position) }
                } else {
                    Token { kind: TokenKind::Illegal, span: Span::new(start, self.position) }
                }
            }
            '-' => {
                if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump(); // consume first digit
                    self.read_number(start)
                } else {
                    Token { kind: TokenKind::Illegal, span: Span::new(start, self.position) }
                }
            }
            '\'' | '"' => self.read_string(start, c),
            c if c.is_ascii_digit() => self.read_number(start),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(start),
            _ => Token { kind: TokenKind::Illegal, span: Span::new(start, self.position) },
        };
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_comparison() {
        let input = "status = 'open'";
        let mut lexer = Lexer::new(input);

        assert_eq!(lexer.next().unwrap().kind, TokenKind::Identifier("status"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Eq);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::String("open"));
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn test_all_operators_and_punctuation() {
        let input = "!= = > < >= <= ( ) ,";
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::NotEq, TokenKind::Eq, TokenKind::Gt, TokenKind::Lt,
                TokenKind::Gte, TokenKind::Lte, TokenKind::LParen, TokenKind::RParen,
                TokenKind::Comma,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let input = "AND or nOt BETWEEN In my_field";
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::And, TokenKind::Or, TokenKind::Not, TokenKind::Between,
                TokenKind::In, TokenKind::Identifier("my_field"),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let input = "12345 -7 3.25 -0.5";
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Int(12345),
                TokenKind::Int(-7),
                TokenKind::Float(3.25),
                TokenKind::Float(-0.5),
            ]
        );
    }

    #[test]
    fn test_both_quote_styles() {
        let input = r#"'single' "double""#;
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::String("single"), TokenKind::String("double")]
        );
    }

    #[test]
    fn test_unterminated_string_is_illegal() {
        let input = "'never closed";
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::Illegal]);
    }

    #[test]
    fn test_spans_track_byte_offsets() {
        let input = "a >= 10";
        let tokens: Vec<_> = Lexer::new(input).collect();
        assert_eq!(tokens[0].span, Span::new(0, 1));
        assert_eq!(tokens[1].span, Span::new(2, 4));
        assert_eq!(tokens[2].span, Span::new(5, 7));
    }

    #[test]
    fn test_complex_query() {
        let input = r#"(priority = 'high' OR priority = 'urgent') AND remaining_effort BETWEEN(1, 5)"#;
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::LParen,
                TokenKind::Identifier("priority"),
                TokenKind::Eq,
                TokenKind::String("high"),
                TokenKind::Or,
                TokenKind::Identifier("priority"),
                TokenKind::Eq,
                TokenKind::String("urgent"),
                TokenKind::RParen,
                TokenKind::And,
                TokenKind::Identifier("remaining_effort"),
                TokenKind::Between,
                TokenKind::LParen,
                TokenKind::Int(1),
                TokenKind::Comma,
                TokenKind::Int(5),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_lone_dash_is_illegal() {
        let kinds: Vec<_> = Lexer::new("a - b").map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("a"),
                TokenKind::Illegal,
                TokenKind::Identifier("b"),
            ]
        );
    }
}
