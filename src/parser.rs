//! Recursive descent parser for predicates.
//!
//! ```text
//! or         := and ( OR and )*
//! and        := unary ( AND unary )*
//! unary      := NOT unary | primary
//! primary    := '(' or ')' | TRUE | FALSE
//!             | column op literal | literal op column | column
//! column     := '[' name ']' | name
//! ```
//!
//! A lone column stands for `column = TRUE`.

use crate::error::ParseError;
use crate::expression::{ComparisonOp, Expr};
use crate::tokenizer::Token;
use crate::value::Value;

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Creates a parser over `tokens`, terminating them with [Token::Eof]
    /// when the caller did not.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last() != Some(&Token::Eof) {
            tokens.push(Token::Eof);
        }
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_or()?;

        // Check we are at the end of the predicate
        if !self.is_at_end() {
            return Err(ParseError::TrailingInput(format!(
                "{:?}",
                self.current_token()
            )));
        }

        Ok(expr)
    }

    //helpers
    fn current_token(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    fn consume(&mut self, expected: Token) -> Result<(), ParseError> {
        if *self.current_token() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("{expected:?}")))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::Unexpected {
            expected: expected.to_string(),
            found: format!("{:?}", self.current_token()),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_and()?;
        while matches!(self.current_token(), Token::Or) {
            self.advance();
            expr = expr.or(self.parse_and()?);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_unary()?;
        while matches!(self.current_token(), Token::And) {
            self.advance();
            expr = expr.and(self.parse_unary()?);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.current_token(), Token::Not) {
            self.advance();
            return Ok(self.parse_unary()?.negate());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current_token() {
            Token::LeftParen => {
                self.advance();
                let expr = self.parse_or()?;
                self.consume(Token::RightParen)?;
                Ok(expr)
            }
            Token::True | Token::False
                if self.comparison_op_at(self.position + 1).is_none() =>
            {
                let value = matches!(self.current_token(), Token::True);
                self.advance();
                Ok(Expr::Literal(value))
            }
            Token::Column(_) | Token::Ident(_) => {
                let column = self.consume_column()?;
                let Some(op) = self.consume_op() else {
                    return Ok(Expr::comparison(column, ComparisonOp::Eq, true));
                };
                let value = self.consume_literal()?;
                Ok(Expr::comparison(column, op, value))
            }
            _ => {
                // literal on the left: `3 < [n]` is `[n] > 3`
                let value = self.consume_literal()?;
                let op = self
                    .consume_op()
                    .ok_or_else(|| self.unexpected("comparison operator"))?;
                let column = self.consume_column()?;
                Ok(Expr::comparison(column, op.flip(), value))
            }
        }
    }

    fn consume_column(&mut self) -> Result<String, ParseError> {
        match self.current_token() {
            Token::Column(name) | Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("column")),
        }
    }

    fn comparison_op_at(&self, position: usize) -> Option<ComparisonOp> {
        match self.tokens.get(position)? {
            Token::Equal => Some(ComparisonOp::Eq),
            Token::NotEqual => Some(ComparisonOp::Ne),
            Token::Lower => Some(ComparisonOp::Lt),
            Token::LowerEqual => Some(ComparisonOp::Le),
            Token::Greater => Some(ComparisonOp::Gt),
            Token::GreaterEqual => Some(ComparisonOp::Ge),
            _ => None,
        }
    }

    fn consume_op(&mut self) -> Option<ComparisonOp> {
        let op = self.comparison_op_at(self.position)?;
        self.advance();
        Some(op)
    }

    /// Integer literals are `Int` when they fit in 32 bits, `Long` otherwise.
    fn consume_literal(&mut self) -> Result<Value, ParseError> {
        let value = match self.current_token() {
            Token::Number(n) => i32::try_from(*n).map_or(Value::Long(*n), Value::Int),
            Token::LongNumber(n) => Value::Long(*n),
            Token::FloatNumber(f) => Value::Float(*f),
            Token::String(s) => Value::Text(s.as_str().into()),
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::Null => Value::Null,
            _ => return Err(self.unexpected("literal")),
        };
        self.advance();
        Ok(value)
    }
}
