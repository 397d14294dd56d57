use crate::error::Error;
use crate::token::{Span, Token, TokenKind};

/// Hand-rolled lexer for the arithmetic/logical/string grammar formulas are
/// written in. Whitespace is skipped; everything else becomes exactly one
/// token, greedy on the two-character operators (`==`, `!=`, `<=`, `>=`,
/// `&&`, `||`) so `!=` never splits into `!` then `=`.
pub struct Lexer<'s> {
    source: &'s str,
    bytes: &'s [u8],
    pos: usize,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Self {
        Lexer { source, bytes: source.as_bytes(), pos: 0 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Error> {
        // `peek`/`peek_at` below cast individual bytes to `char`, and
        // `number`/`identifier` slice `self.source` at the byte offsets
        // those scans stop on. Both are only sound over ASCII input: a
        // multi-byte UTF-8 character's continuation bytes would cast to
        // unrelated chars and a scan could stop mid-codepoint, slicing on
        // a non-char-boundary and panicking. Reject non-ASCII input
        // structurally, up front, instead.
        if let Some(pos) = self.bytes.iter().position(|&b| b >= 0x80) {
            return Err(Error::BadFormula {
                message: "formula source must be ASCII".to_string(),
                span: Some(Span::new(pos, pos + 1)),
            });
        }

        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Token { kind: TokenKind::Eof, span: Span::new(start, start) });
                break;
            };
            let kind = match c {
                '+' => self.advance_with(TokenKind::Plus),
                '-' => self.advance_with(TokenKind::Minus),
                '*' => self.advance_with(TokenKind::Star),
                '/' => self.advance_with(TokenKind::Slash),
                '%' => self.advance_with(TokenKind::Percent),
                '^' => self.advance_with(TokenKind::Caret),
                '(' => self.advance_with(TokenKind::LParen),
                ')' => self.advance_with(TokenKind::RParen),
                ',' => self.advance_with(TokenKind::Comma),
                '<' => self.two_char('=', TokenKind::Le, TokenKind::Lt),
                '>' => self.two_char('=', TokenKind::Ge, TokenKind::Gt),
                '=' => self.expect_two_char('=', TokenKind::EqEq, start)?,
                '!' => self.two_char('=', TokenKind::Ne, TokenKind::Bang),
                '&' => self.expect_two_char('&', TokenKind::AndAnd, start)?,
                '|' => self.expect_two_char('|', TokenKind::OrOr, start)?,
                '"' => self.quoted_string(start)?,
                c if c.is_ascii_digit() => self.number(),
                c if c.is_alphabetic() || c == '_' => self.identifier(),
                other => {
                    return Err(Error::BadFormula {
                        message: format!("unexpected character {other:?}"),
                        span: Some(Span::new(start, start + 1)),
                    })
                }
            };
            tokens.push(Token { kind, span: Span::new(start, self.pos) });
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.bytes.get(self.pos).map(|&b| b as char)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.bytes.get(self.pos + offset).map(|&b| b as char)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn advance_with(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    /// Consumes one or two characters: if the next char matches `second`,
    /// consumes both and returns `wide`; otherwise consumes one and returns `narrow`.
    fn two_char(&mut self, second: char, wide: TokenKind, narrow: TokenKind) -> TokenKind {
        self.pos += 1;
        if self.peek() == Some(second) {
            self.pos += 1;
            wide
        } else {
            narrow
        }
    }

    /// Like `two_char`, but narrow has no meaning (`=` alone, `&` alone, `|` alone
    /// are not part of the grammar) so a lone char is a lex error.
    fn expect_two_char(&mut self, second: char, wide: TokenKind, start: usize) -> Result<TokenKind, Error> {
        self.pos += 1;
        if self.peek() == Some(second) {
            self.pos += 1;
            Ok(wide)
        } else {
            Err(Error::BadFormula {
                message: format!("expected '{second}' after the character at position {start}"),
                span: Some(Span::new(start, self.pos)),
            })
        }
    }

    fn number(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        TokenKind::Number(self.source[start..self.pos].to_string())
    }

    fn identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        TokenKind::Identifier(self.source[start..self.pos].to_string())
    }

    fn quoted_string(&mut self, start: usize) -> Result<TokenKind, Error> {
        self.pos += 1; // opening quote
        let content_start = self.pos;
        while let Some(c) = self.peek() {
            if c == '"' {
                let content = self.source[content_start..self.pos].to_string();
                self.pos += 1;
                return Ok(TokenKind::QuotedString(content));
            }
            self.pos += 1;
        }
        Err(Error::BadFormula {
            message: "unterminated string literal".to_string(),
            span: Some(Span::new(start, self.pos)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_arithmetic_and_identifiers() {
        assert_eq!(
            kinds("a + 2 * bonus"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Plus,
                TokenKind::Number("2".into()),
                TokenKind::Star,
                TokenKind::Identifier("bonus".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators_are_greedy() {
        assert_eq!(kinds("a != b"), vec![
            TokenKind::Identifier("a".into()),
            TokenKind::Ne,
            TokenKind::Identifier("b".into()),
            TokenKind::Eof,
        ]);
        assert_eq!(kinds("a<=b"), vec![
            TokenKind::Identifier("a".into()),
            TokenKind::Le,
            TokenKind::Identifier("b".into()),
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn lexes_decimal_numbers_and_strings() {
        assert_eq!(
            kinds(r#"1.5 "hi""#),
            vec![TokenKind::Number("1.5".into()), TokenKind::QuotedString("hi".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn lone_ampersand_is_a_lex_error() {
        let err = Lexer::new("a & b").tokenize().unwrap_err();
        assert!(matches!(err, Error::BadFormula { .. }));
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let err = Lexer::new(r#""unterminated"#).tokenize().unwrap_err();
        assert!(matches!(err, Error::BadFormula { .. }));
    }

    #[test]
    fn non_ascii_input_is_a_lex_error_not_a_panic() {
        let err = Lexer::new("é + 1").tokenize().unwrap_err();
        assert!(matches!(err, Error::BadFormula { .. }));
    }
}
