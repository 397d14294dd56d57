use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::Error;
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};

/// Recursive-descent parser for exactly the grammar in the external
/// interface contract:
///
/// ```text
/// expr     := logical
/// logical  := equality  (('&&'|'||') equality)*
/// equality := relation  (('=='|'!=') relation)*
/// relation := addsub    (('<'|'>'|'<='|'>=') addsub)*
/// addsub   := muldiv    (('+'|'-') muldiv)*
/// muldiv   := expon     (('*'|'/'|'%') expon)*
/// expon    := unary     ('^' unary)*
/// unary    := ('-'|'!')? primary
/// primary  := number | qstring | ident | ident '(' args ')' | '(' expr ')'
/// ```
pub fn parse(source: &str) -> Result<Expr, Error> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut p = Parser { tokens, pos: 0 };
    let expr = p.logical()?;
    p.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_eof(&self) -> Result<(), Error> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(Error::BadFormula {
                message: format!("unexpected trailing token {:?}", self.peek().kind),
                span: Some(self.peek().span),
            })
        }
    }

    fn logical(&mut self) -> Result<Expr, Error> {
        let mut left = self.equality()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::AndAnd => BinaryOp::And,
                TokenKind::OrOr => BinaryOp::Or,
                _ => break,
            };
            let start = self.advance().span;
            let right = self.equality()?;
            let span = start.join(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, Error> {
        let mut left = self.relation()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::EqEq,
                TokenKind::Ne => BinaryOp::Ne,
                _ => break,
            };
            let start = self.advance().span;
            let right = self.relation()?;
            let span = start.join(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn relation(&mut self) -> Result<Expr, Error> {
        let mut left = self.addsub()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            let start = self.advance().span;
            let right = self.addsub()?;
            let span = start.join(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn addsub(&mut self) -> Result<Expr, Error> {
        let mut left = self.muldiv()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let start = self.advance().span;
            let right = self.muldiv()?;
            let span = start.join(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn muldiv(&mut self) -> Result<Expr, Error> {
        let mut left = self.expon()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let start = self.advance().span;
            let right = self.expon()?;
            let span = start.join(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn expon(&mut self) -> Result<Expr, Error> {
        let mut left = self.unary()?;
        while self.peek().kind == TokenKind::Caret {
            let start = self.advance().span;
            let right = self.unary()?;
            let span = start.join(right.span());
            left = Expr::Binary { op: BinaryOp::Pow, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, Error> {
        match self.peek().kind {
            TokenKind::Minus => {
                let start = self.advance().span;
                let operand = self.unary()?;
                let span = start.join(operand.span());
                Ok(Expr::Unary { op: UnaryOp::Neg, operand: Box::new(operand), span })
            }
            TokenKind::Bang => {
                let start = self.advance().span;
                let operand = self.unary()?;
                let span = start.join(operand.span());
                Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand), span })
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, Error> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(text) => {
                self.advance();
                Ok(Expr::Number(text, token.span))
            }
            TokenKind::QuotedString(text) => {
                self.advance();
                Ok(Expr::QuotedString(text, token.span))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.peek().kind == TokenKind::LParen {
                    self.advance();
                    let args = self.args()?;
                    let end = self.expect(TokenKind::RParen)?.span;
                    let span = token.span.join(end);
                    Ok(Expr::FunctionLookup { name, args, span })
                } else {
                    Ok(Expr::Identifier(name, token.span))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.logical()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            other => Err(Error::BadFormula {
                message: format!("unexpected token {other:?}"),
                span: Some(token.span),
            }),
        }
    }

    fn args(&mut self) -> Result<Vec<Expr>, Error> {
        let mut args = Vec::new();
        if self.peek().kind == TokenKind::RParen {
            return Ok(args);
        }
        args.push(self.logical()?);
        while self.peek().kind == TokenKind::Comma {
            self.advance();
            args.push(self.logical()?);
        }
        Ok(args)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, Error> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(Error::BadFormula {
                message: format!("expected {kind:?}, found {:?}", self.peek().kind),
                span: Some(self.peek().span),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("1 + 2 * 3").unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("expected a top-level addition, got {other:?}"),
        }
    }

    #[test]
    fn exponentiation_is_right_of_multiplication_and_parens_override_precedence() {
        let expr = parse("(1 + 2) * 3").unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::Mul, left, .. } => {
                assert!(matches!(*left, Expr::Paren(_)));
            }
            other => panic!("expected a top-level multiplication, got {other:?}"),
        }
    }

    #[test]
    fn function_calls_parse_their_argument_list() {
        let expr = parse("max(a, b+1)").unwrap();
        match expr {
            Expr::FunctionLookup { name, args, .. } => {
                assert_eq!(name, "max");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected a function lookup, got {other:?}"),
        }
    }

    #[test]
    fn unary_minus_is_right_associative_with_itself() {
        let expr = parse("--a").unwrap();
        match expr {
            Expr::Unary { op: UnaryOp::Neg, operand, .. } => {
                assert!(matches!(*operand, Expr::Unary { op: UnaryOp::Neg, .. }));
            }
            other => panic!("expected nested unary negation, got {other:?}"),
        }
    }

    #[test]
    fn trailing_tokens_after_a_complete_expression_are_an_error() {
        assert!(matches!(parse("1 + 2 3"), Err(Error::BadFormula { .. })));
    }

    #[test]
    fn unmatched_paren_is_an_error() {
        assert!(matches!(parse("(1 + 2"), Err(Error::BadFormula { .. })));
    }
}
