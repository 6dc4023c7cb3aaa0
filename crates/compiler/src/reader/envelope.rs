//! Readtime envelopes: `<{ ... }>`, `<[ ... ]>`, and `<expr>` (§4.2).
//!
//! All three are evaluated immediately as they are read, and the quote they
//! produce is spliced into the surrounding program in place of the
//! envelope. `<{ }>` runs a block of readtime statements and splices its
//! result value (converted back to a quote); `<[ ]>` evaluates a single
//! readtime expression used to build a compile-time type/constraint pattern
//! and is kept wrapped as a `PatternEnvelope` so the compiler can recognize
//! it; `<...>` evaluates one expression and splices the bare result.

use ven_core::{Quote, QuoteKind, Tag, VenError};

use super::{parselets, Reader};

pub(crate) fn curly(reader: &mut Reader, line: u32) -> Result<Quote, VenError> {
    let mut stmts = Vec::new();
    while !closes(reader) && !reader.at_eof() {
        stmts.push(parselets::statement(reader)?);
    }
    expect_close(reader)?;
    let value = crate::readtime::eval_block(reader, &stmts)?;
    Ok(Quote::new(Tag::new(reader.file.clone(), line), QuoteKind::Immediate(Box::new(
        crate::readtime::value_to_quote(reader, line, value),
    ))))
}

pub(crate) fn bracket(reader: &mut Reader, line: u32) -> Result<Quote, VenError> {
    let expr = reader.expression(crate::precedence::Precedence::Zero)?;
    if !reader.symbol("]") {
        return reader.err("expected ']'");
    }
    reader.advance();
    if !reader.symbol(">") {
        return reader.err("expected '>' closing '<['");
    }
    reader.advance();
    Ok(Quote::new(Tag::new(reader.file.clone(), line), QuoteKind::PatternEnvelope(Box::new(expr))))
}

pub(crate) fn immediate(reader: &mut Reader, line: u32) -> Result<Quote, VenError> {
    let expr = reader.expression(crate::precedence::Precedence::Relation)?;
    if !reader.symbol(">") {
        return reader.err("expected '>' closing '<'");
    }
    reader.advance();
    let value = crate::readtime::eval_expr(reader, &expr)?;
    Ok(crate::readtime::value_to_quote(reader, line, value))
}

fn closes(reader: &Reader) -> bool {
    reader.symbol("}>")
        || (matches!(reader.peek().kind, crate::token::TokenKind::RBrace)
            && reader.peek_at(1).is_symbol(">"))
}

fn expect_close(reader: &mut Reader) -> Result<(), VenError> {
    if reader.symbol("}>") {
        reader.advance();
        return Ok(());
    }
    if matches!(reader.peek().kind, crate::token::TokenKind::RBrace) {
        reader.advance();
        if reader.symbol(">") {
            reader.advance();
            return Ok(());
        }
    }
    reader.err("expected '}>' closing '<{'")
}
