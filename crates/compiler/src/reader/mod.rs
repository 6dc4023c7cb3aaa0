//! The Reader (§4.1): a Pratt parser producing quotes.
//!
//! Built-in nud/led parselets are dispatched from `nud`/`led` by matching on
//! the current token; user-defined parselets (`nud NAME = <{ ... }>`) are
//! kept in a runtime table (`macros`) consulted first, so a user macro can
//! shadow nothing built-in (keywords are reserved) but can introduce any new
//! word as a prefix form.

mod directives;
mod envelope;
mod parselets;

use std::collections::HashMap;
use std::rc::Rc;

use ven_core::{Quote, VenError};

use crate::precedence::Precedence;
use crate::token::{Token, TokenKind};

/// A user-registered `nud` macro: its parameter names and its readtime body.
#[derive(Debug, Clone)]
pub struct UserNud {
    pub params: Vec<Rc<str>>,
    pub body: Vec<Quote>,
}

pub struct Reader {
    pub(crate) file: Rc<str>,
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    pub(crate) macros: HashMap<Rc<str>, UserNud>,
    pub(crate) distinct: Option<Vec<String>>,
    pub(crate) exposes: Vec<Vec<String>>,
}

pub struct ReadUnit {
    pub quotes: Vec<Quote>,
    pub distinct: Option<Vec<String>>,
    pub exposes: Vec<Vec<String>>,
}

impl Reader {
    pub fn new(file: Rc<str>, tokens: Vec<Token>) -> Self {
        Self {
            file,
            tokens,
            pos: 0,
            macros: HashMap::new(),
            distinct: None,
            exposes: Vec::new(),
        }
    }

    pub fn read(source: &str, file: &str) -> Result<ReadUnit, VenError> {
        let file: Rc<str> = Rc::from(file);
        let tokens = crate::lexer::Lexer::new(file.clone(), source).tokenize()?;
        let mut reader = Reader::new(file, tokens);
        reader.directives()?;
        let mut quotes = Vec::new();
        while !reader.at_eof() {
            quotes.push(reader.statement()?);
        }
        Ok(ReadUnit {
            quotes,
            distinct: reader.distinct.clone(),
            exposes: reader.exposes.clone(),
        })
    }

    // -- token-stream primitives exposed to parselets (§4.1) --

    pub fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    pub fn at_eof(&self) -> bool {
        self.peek().is_eof()
    }

    pub fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !tok.is_eof() {
            self.pos += 1;
        }
        tok
    }

    /// `word?(lexeme)` — true if the current token is the given word.
    pub fn word(&self, lexeme: &str) -> bool {
        self.peek().is_word(lexeme)
    }

    pub fn symbol(&self, lexeme: &str) -> bool {
        self.peek().is_symbol(lexeme)
    }

    /// `consume(kind)` — advance only if the predicate matches.
    pub fn consume_word(&mut self, lexeme: &str) -> bool {
        if self.word(lexeme) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn consume_symbol(&mut self, lexeme: &str) -> bool {
        if self.symbol(lexeme) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// `expect(lexeme)` — require and consume, or raise a `ReadError`.
    pub fn expect_word(&mut self, lexeme: &str) -> Result<(), VenError> {
        if self.consume_word(lexeme) {
            Ok(())
        } else {
            self.err(format!("expected '{lexeme}'"))
        }
    }

    pub fn expect_symbol(&mut self, lexeme: &str) -> Result<(), VenError> {
        if self.consume_symbol(lexeme) {
            Ok(())
        } else {
            self.err(format!("expected '{lexeme}'"))
        }
    }

    pub fn consume_colon(&mut self) -> bool {
        if matches!(self.peek().kind, TokenKind::Colon) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect_colon(&mut self) -> Result<(), VenError> {
        if self.consume_colon() {
            Ok(())
        } else {
            self.err("expected ':'")
        }
    }

    pub fn line(&self) -> u32 {
        self.peek().line
    }

    pub fn current_file(&self) -> Rc<str> {
        self.file.clone()
    }

    pub fn err<T>(&self, message: impl Into<String>) -> Result<T, VenError> {
        let tok = self.peek();
        Err(VenError::read_at(
            self.file.to_string(),
            tok.line,
            tok.column,
            Some(tok.lexeme.to_string()),
            message.into(),
        ))
    }

    /// `after(lexeme) { ... }` — require `lexeme`, then run `f`.
    pub fn after<T>(
        &mut self,
        lexeme: &str,
        f: impl FnOnce(&mut Self) -> Result<T, VenError>,
    ) -> Result<T, VenError> {
        self.expect_word(lexeme)?;
        f(self)
    }

    // -- statement/expression entry points --

    pub fn statement(&mut self) -> Result<Quote, VenError> {
        parselets::statement(self)
    }

    pub fn block(&mut self) -> Result<Quote, VenError> {
        parselets::block(self)
    }

    pub fn expression(&mut self, precedence: Precedence) -> Result<Quote, VenError> {
        let mut left = self.nud()?;
        while self.led_precedence() > precedence {
            left = self.led(left)?;
        }
        Ok(left)
    }

    fn led_precedence(&self) -> Precedence {
        match &self.peek().kind {
            TokenKind::Symbol(s) if s.as_ref() == ".." => Precedence::Addition,
            TokenKind::Symbol(s) => Precedence::of_symbol(s),
            TokenKind::LParen | TokenKind::LBracket => Precedence::Field,
            TokenKind::Word(w)
                if matches!(w.as_ref(), "is" | "in" | "and" | "or") =>
            {
                Precedence::Identity
            }
            TokenKind::Word(w) if w.as_ref() == "x" => Precedence::Convert,
            _ => Precedence::Zero,
        }
    }

    pub(crate) fn at_expr_terminator(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Semicolon
                | TokenKind::Comma
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::Eof
        )
    }

    pub fn nud(&mut self) -> Result<Quote, VenError> {
        parselets::nud(self)
    }

    pub fn led(&mut self, left: Quote) -> Result<Quote, VenError> {
        parselets::led(self, left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_arithmetic_with_precedence() {
        let unit = Reader::read("1 + 2 * 3;", "t.ven").unwrap();
        assert_eq!(unit.quotes.len(), 1);
    }

    #[test]
    fn reads_distinct_and_expose_directives() {
        let unit = Reader::read("distinct a.b.c; expose x.y;\n1;", "t.ven").unwrap();
        assert_eq!(unit.distinct, Some(vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(unit.exposes, vec![vec!["x".to_string(), "y".to_string()]]);
    }
}
