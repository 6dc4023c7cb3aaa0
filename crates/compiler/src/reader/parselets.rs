//! Built-in nud/led parselets and statement grammar (§4.1).

use std::rc::Rc;

use ven_core::{BinaryOp, ConstrainedParamQ, FieldStep, Quote, QuoteKind, ReturnKind, Tag, UnaryOp};

use super::{Reader, UserNud};
use crate::precedence::Precedence;
use crate::token::TokenKind;

fn tag(reader: &Reader, line: u32) -> Tag {
    Tag::new(reader.file.clone(), line)
}

fn node(reader: &Reader, line: u32, kind: QuoteKind) -> Quote {
    Quote::new(tag(reader, line), kind)
}

// ---------------------------------------------------------------- statement

pub fn statement(reader: &mut Reader) -> Result<Quote, VenError> {
    if reader.word("fun") {
        return fun_decl(reader);
    }
    if reader.word("box") {
        return box_decl(reader);
    }
    if reader.word("nud") || reader.word("led") {
        macro_decl(reader)?;
        return statement(reader);
    }
    if reader.word("next") {
        return next_stmt(reader);
    }
    if reader.word("return") {
        return return_stmt(reader);
    }
    if reader.word("queue") {
        return queue_stmt(reader);
    }
    if reader.word("ensure") {
        return ensure_stmt(reader);
    }
    let expr = reader.expression(Precedence::Zero)?;
    reader.consume_symbol(";");
    Ok(expr)
}

pub fn block(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    if !matches!(reader.peek().kind, TokenKind::LBrace) {
        return reader.err("expected '{'");
    }
    reader.advance();
    let mut stmts = Vec::new();
    while !matches!(reader.peek().kind, TokenKind::RBrace) && !reader.at_eof() {
        stmts.push(statement(reader)?);
    }
    if !matches!(reader.peek().kind, TokenKind::RBrace) {
        return reader.err("expected '}'");
    }
    reader.advance();
    Ok(node(reader, line, QuoteKind::Block(stmts)))
}

fn fun_decl(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    reader.advance(); // fun
    let name = expect_ident(reader)?;
    reader.expect_symbol("(")?;
    let (params, slurpy) = param_list(reader)?;
    reader.expect_symbol(")")?;
    let given = if reader.consume_word("given") {
        Some(Box::new(given_vector(reader)?))
    } else {
        None
    };
    let body = Box::new(block(reader)?);
    Ok(node(
        reader,
        line,
        QuoteKind::Fun {
            name,
            params,
            body,
            given,
            slurpy,
        },
    ))
}

fn box_decl(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    reader.advance(); // box
    let name = expect_ident(reader)?;
    reader.expect_symbol("(")?;
    let mut params = Vec::new();
    while !reader.symbol(")") {
        params.push(expect_ident(reader)?);
        if !reader.consume_symbol(",") {
            break;
        }
    }
    reader.expect_symbol(")")?;
    let given = if reader.consume_word("given") {
        given_list(reader)?
    } else {
        Vec::new()
    };
    if !matches!(reader.peek().kind, TokenKind::LBrace) {
        return reader.err("expected '{'");
    }
    reader.advance();
    let mut namespace = Vec::new();
    while !matches!(reader.peek().kind, TokenKind::RBrace) && !reader.at_eof() {
        namespace.push(statement(reader)?);
    }
    if !matches!(reader.peek().kind, TokenKind::RBrace) {
        return reader.err("expected '}'");
    }
    reader.advance();
    Ok(node(
        reader,
        line,
        QuoteKind::Box {
            name,
            params,
            given,
            namespace,
        },
    ))
}

/// A `nud`/`led` macro definition: `nud NAME(params) { readtime-body }`.
fn macro_decl(reader: &mut Reader) -> Result<(), VenError> {
    reader.advance(); // nud | led
    let name = expect_ident(reader)?;
    let mut params = Vec::new();
    if reader.consume_symbol("(") {
        while !reader.symbol(")") {
            params.push(expect_ident(reader)?);
            if !reader.consume_symbol(",") {
                break;
            }
        }
        reader.expect_symbol(")")?;
    }
    let body_block = block(reader)?;
    let body = match body_block.kind {
        QuoteKind::Block(stmts) => stmts,
        other => vec![Quote::new(body_block.tag, other)],
    };
    reader.macros.insert(name, UserNud { params, body });
    Ok(())
}

fn next_stmt(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    reader.advance(); // next
    let label = if reader.consume_symbol("$") {
        Some(expect_ident(reader)?)
    } else {
        None
    };
    let mut values = Vec::new();
    if !reader.at_expr_terminator() {
        loop {
            values.push(reader.expression(Precedence::Assignment)?);
            if !reader.consume_symbol(",") {
                break;
            }
        }
    }
    reader.consume_symbol(";");
    Ok(node(reader, line, QuoteKind::Next(label, values)))
}

fn return_stmt(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    reader.advance(); // return
    let q = if reader.consume_word("queue") {
        node(
            reader,
            line,
            QuoteKind::Return(Box::new(node(reader, line, QuoteKind::Void)), ReturnKind::Queue),
        )
    } else if reader.at_expr_terminator() {
        node(
            reader,
            line,
            QuoteKind::Return(Box::new(node(reader, line, QuoteKind::Void)), ReturnKind::Plain),
        )
    } else {
        let expr = reader.expression(Precedence::Zero)?;
        node(reader, line, QuoteKind::Return(Box::new(expr), ReturnKind::Plain))
    };
    reader.consume_symbol(";");
    Ok(q)
}

fn queue_stmt(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    reader.advance(); // queue
    let expr = reader.expression(Precedence::Zero)?;
    reader.consume_symbol(";");
    Ok(node(reader, line, QuoteKind::Queue(Box::new(expr))))
}

fn ensure_stmt(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    reader.advance(); // ensure
    let expr = reader.expression(Precedence::Zero)?;
    reader.consume_symbol(";");
    Ok(node(reader, line, QuoteKind::Ensure(Box::new(expr))))
}

fn expect_ident(reader: &mut Reader) -> Result<Rc<str>, VenError> {
    match &reader.peek().kind {
        TokenKind::Word(w) => {
            let w = w.clone();
            reader.advance();
            Ok(w)
        }
        _ => reader.err("expected an identifier"),
    }
}

/// Parameter list: plain names, optionally with an inline `name: constraint`,
/// and an optional trailing bare `*` marking the function slurpy (§8).
fn param_list(reader: &mut Reader) -> Result<(Vec<ConstrainedParamQ>, bool), VenError> {
    let mut params = Vec::new();
    let mut slurpy = false;
    while !reader.symbol(")") {
        if reader.consume_symbol("*") {
            slurpy = true;
            break;
        }
        let name = expect_ident(reader)?;
        let constraint = if reader.consume_colon() {
            Some(Box::new(reader.expression(Precedence::Assignment)?))
        } else {
            None
        };
        params.push(ConstrainedParamQ { name, constraint });
        if !reader.consume_symbol(",") {
            break;
        }
    }
    Ok((params, slurpy))
}

fn given_list(reader: &mut Reader) -> Result<Vec<Quote>, VenError> {
    let mut exprs = Vec::new();
    loop {
        exprs.push(reader.expression(Precedence::Assignment)?);
        if !reader.consume_symbol(",") {
            break;
        }
    }
    Ok(exprs)
}

fn given_vector(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    let exprs = given_list(reader)?;
    Ok(node(reader, line, QuoteKind::Vector(exprs, None)))
}

// ------------------------------------------------------------------- nud

pub fn nud(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    let tok = reader.peek().clone();
    match &tok.kind {
        TokenKind::Number(s) => {
            reader.advance();
            Ok(node(reader, line, QuoteKind::Number(s.clone())))
        }
        TokenKind::String(s) => {
            reader.advance();
            Ok(node(reader, line, QuoteKind::String(s.clone())))
        }
        TokenKind::Regex(s) => {
            reader.advance();
            Ok(node(reader, line, QuoteKind::Regex(s.clone())))
        }
        TokenKind::LParen => {
            reader.advance();
            let expr = reader.expression(Precedence::Zero)?;
            reader.expect_symbol(")")?;
            Ok(expr)
        }
        TokenKind::LBracket => vector_literal(reader),
        TokenKind::LBrace => block(reader),
        TokenKind::Word(w) => word_nud(reader, w.clone(), line),
        TokenKind::Symbol(s) => symbol_nud(reader, s.clone(), line),
        _ => reader.err("unexpected token"),
    }
}

fn word_nud(reader: &mut Reader, w: Rc<str>, line: u32) -> Result<Quote, VenError> {
    match w.as_ref() {
        "true" => {
            reader.advance();
            Ok(node(reader, line, QuoteKind::True))
        }
        "false" => {
            reader.advance();
            Ok(node(reader, line, QuoteKind::False))
        }
        "void" => {
            reader.advance();
            Ok(node(reader, line, QuoteKind::Void))
        }
        "_" => {
            reader.advance();
            Ok(node(reader, line, QuoteKind::UPop))
        }
        "if" => if_expr(reader),
        "loop" => loop_expr(reader),
        "lambda" => lambda_expr(reader),
        "not" => {
            reader.advance();
            let operand = reader.expression(Precedence::Unary)?;
            Ok(node(reader, line, QuoteKind::Unary(UnaryOp::Not, Box::new(operand))))
        }
        "dies" => {
            reader.advance();
            let operand = reader.expression(Precedence::Prefix)?;
            Ok(node(reader, line, QuoteKind::Dies(Box::new(operand))))
        }
        "fun" | "box" | "given" | "next" | "return" | "queue" | "ensure" | "nud" | "led"
        | "distinct" | "expose" => reader.err(format!("'{w}' cannot start an expression")),
        _ => {
            if let Some(mac) = reader.macros.get(w.as_ref()).cloned() {
                invoke_macro(reader, &w, mac, line)
            } else {
                reader.advance();
                Ok(node(reader, line, QuoteKind::Symbol(w)))
            }
        }
    }
}

fn invoke_macro(reader: &mut Reader, name: &str, mac: UserNud, line: u32) -> Result<Quote, VenError> {
    reader.advance(); // macro name
    let mut args = Vec::new();
    if reader.consume_symbol("(") {
        while !reader.symbol(")") {
            args.push(reader.expression(Precedence::Assignment)?);
            if !reader.consume_symbol(",") {
                break;
            }
        }
        reader.expect_symbol(")")?;
    }
    crate::readtime::expand_macro(reader, name, &mac, args, line)
}

fn symbol_nud(reader: &mut Reader, s: Rc<str>, line: u32) -> Result<Quote, VenError> {
    match s.as_ref() {
        "+" => {
            reader.advance();
            let operand = reader.expression(Precedence::Unary)?;
            Ok(node(reader, line, QuoteKind::Unary(UnaryOp::Plus, Box::new(operand))))
        }
        "-" => {
            reader.advance();
            let operand = reader.expression(Precedence::Unary)?;
            Ok(node(reader, line, QuoteKind::Unary(UnaryOp::Minus, Box::new(operand))))
        }
        "!" => {
            reader.advance();
            let operand = reader.expression(Precedence::Unary)?;
            Ok(node(reader, line, QuoteKind::Unary(UnaryOp::Not, Box::new(operand))))
        }
        "#" => {
            reader.advance();
            let operand = reader.expression(Precedence::Unary)?;
            Ok(node(reader, line, QuoteKind::Unary(UnaryOp::Len, Box::new(operand))))
        }
        "~" => {
            reader.advance();
            let operand = reader.expression(Precedence::Convert)?;
            Ok(node(reader, line, QuoteKind::Unary(UnaryOp::ToStr, Box::new(operand))))
        }
        "&" => {
            reader.advance();
            if reader.word("_") {
                reader.advance();
                return Ok(node(reader, line, QuoteKind::URef));
            }
            let operand = reader.expression(Precedence::Convert)?;
            Ok(node(reader, line, QuoteKind::Unary(UnaryOp::ToVec, Box::new(operand))))
        }
        "%" => {
            if matches!(reader.peek_at(1).kind, TokenKind::LBrace) {
                reader.advance(); // %
                map_literal(reader, line)
            } else {
                reader.advance();
                let operand = reader.expression(Precedence::Convert)?;
                Ok(node(reader, line, QuoteKind::Unary(UnaryOp::ToMap, Box::new(operand))))
            }
        }
        "|" => spread_expr(reader, line),
        "<{" => {
            reader.advance();
            crate::reader::envelope::curly(reader, line)
        }
        "<[" => {
            reader.advance();
            crate::reader::envelope::bracket(reader, line)
        }
        "<" => {
            reader.advance();
            crate::reader::envelope::immediate(reader, line)
        }
        ".." => {
            reader.advance();
            if reader.at_expr_terminator() {
                Ok(node(reader, line, QuoteKind::Range(None, None)))
            } else {
                let hi = reader.expression(Precedence::Addition)?;
                Ok(node(reader, line, QuoteKind::Range(None, Some(Box::new(hi)))))
            }
        }
        _ => reader.err(format!("unexpected symbol '{s}'")),
    }
}

fn vector_literal(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    reader.advance(); // [
    let mut items = Vec::new();
    let mut spread = None;
    while !reader.symbol("]") {
        if reader.consume_symbol("*") {
            spread = Some(Box::new(reader.expression(Precedence::Assignment)?));
            break;
        }
        items.push(reader.expression(Precedence::Assignment)?);
        if !reader.consume_symbol(",") {
            break;
        }
    }
    reader.expect_symbol("]")?;
    Ok(node(reader, line, QuoteKind::Vector(items, spread)))
}

fn map_literal(reader: &mut Reader, line: u32) -> Result<Quote, VenError> {
    reader.advance(); // {
    let mut entries = Vec::new();
    while !reader.symbol("}") && !matches!(reader.peek().kind, TokenKind::RBrace) {
        let key = reader.expression(Precedence::Assignment)?;
        reader.expect_colon()?;
        let value = reader.expression(Precedence::Assignment)?;
        entries.push((key, value));
        if !reader.consume_symbol(",") {
            break;
        }
    }
    if !matches!(reader.peek().kind, TokenKind::RBrace) {
        return reader.err("expected '}'");
    }
    reader.advance();
    Ok(node(reader, line, QuoteKind::Map(entries)))
}

fn if_expr(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    reader.advance(); // if
    let cond = reader.expression(Precedence::Zero)?;
    let then_branch = block(reader)?;
    let else_branch = if reader.consume_word("else") {
        if reader.word("if") {
            Some(Box::new(if_expr(reader)?))
        } else {
            Some(Box::new(block(reader)?))
        }
    } else {
        None
    };
    Ok(node(
        reader,
        line,
        QuoteKind::If(Box::new(cond), Box::new(then_branch), else_branch),
    ))
}

/// `loop { .. }`, `loop COND { .. }`, and the step form
/// `loop VAR = INIT, COND, STEP { .. }` (§8 scenario 6).
fn loop_expr(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    reader.advance(); // loop
    if matches!(reader.peek().kind, TokenKind::LBrace) {
        let body = block(reader)?;
        return Ok(node(reader, line, QuoteKind::InfiniteLoop(Box::new(body))));
    }
    // Disambiguate `loop VAR = INIT, COND, STEP { }` from `loop COND { }` by
    // looking for `WORD =` immediately.
    if let TokenKind::Word(name) = reader.peek().kind.clone() {
        if reader.peek_at(1).is_symbol("=") {
            let name = name.clone();
            reader.advance(); // var
            reader.advance(); // =
            let init = reader.expression(Precedence::Assignment)?;
            reader.expect_symbol(",")?;
            let cond = reader.expression(Precedence::Assignment)?;
            reader.expect_symbol(",")?;
            let step = reader.expression(Precedence::Assignment)?;
            let body = block(reader)?;
            return Ok(node(
                reader,
                line,
                QuoteKind::StepLoop(
                    name,
                    Box::new(init),
                    Box::new(cond),
                    Box::new(step),
                    Box::new(body),
                ),
            ));
        }
    }
    let cond = reader.expression(Precedence::Zero)?;
    let body = block(reader)?;
    Ok(node(reader, line, QuoteKind::BaseLoop(Box::new(cond), Box::new(body))))
}

fn lambda_expr(reader: &mut Reader) -> Result<Quote, VenError> {
    let line = reader.line();
    reader.advance(); // lambda
    reader.expect_symbol("(")?;
    let mut params = Vec::new();
    let mut slurpy = false;
    while !reader.symbol(")") {
        if reader.consume_symbol("*") {
            slurpy = true;
            break;
        }
        params.push(expect_ident(reader)?);
        if !reader.consume_symbol(",") {
            break;
        }
    }
    reader.expect_symbol(")")?;
    let body = block(reader)?;
    Ok(node(
        reader,
        line,
        QuoteKind::Lambda {
            params,
            slurpy,
            body: Box::new(body),
        },
    ))
}

/// `|op| target` (BinarySpread, a fold) or `|fn| target` (LambdaSpread, a
/// map). A bare recognized operator word/symbol between the bars picks the
/// former; anything else is parsed as a callable expression.
fn spread_expr(reader: &mut Reader, line: u32) -> Result<Quote, VenError> {
    reader.advance(); // |
    let op = binop_symbol(reader);
    if let Some(op) = op {
        reader.expect_symbol("|")?;
        let target = reader.expression(Precedence::Convert)?;
        return Ok(node(reader, line, QuoteKind::BinarySpread(op, Box::new(target))));
    }
    let callee = reader.expression(Precedence::Zero)?;
    reader.expect_symbol("|")?;
    let reduce = reader.consume_symbol("/");
    let target = reader.expression(Precedence::Convert)?;
    Ok(node(
        reader,
        line,
        QuoteKind::LambdaSpread(Box::new(callee), Box::new(target), reduce),
    ))
}

fn binop_symbol(reader: &mut Reader) -> Option<BinaryOp> {
    let op = match &reader.peek().kind {
        TokenKind::Symbol(s) => match s.as_ref() {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "~" => BinaryOp::Concat,
            "&" => BinaryOp::Merge,
            _ => return None,
        },
        TokenKind::Word(w) => match w.as_ref() {
            "and" => BinaryOp::And,
            "or" => BinaryOp::Or,
            "x" => BinaryOp::Repeat,
            _ => return None,
        },
        _ => return None,
    };
    reader.advance();
    Some(op)
}

// ------------------------------------------------------------------- led

pub fn led(reader: &mut Reader, left: Quote) -> Result<Quote, VenError> {
    let line = reader.line();
    match reader.peek().kind.clone() {
        TokenKind::LParen => call_expr(reader, left, line),
        TokenKind::LBracket => access_expr(reader, left, line),
        TokenKind::Symbol(s) => symbol_led(reader, &s, left, line),
        TokenKind::Word(w) => word_led(reader, &w, left, line),
        _ => reader.err("unexpected token in expression"),
    }
}

fn call_expr(reader: &mut Reader, callee: Quote, line: u32) -> Result<Quote, VenError> {
    reader.advance(); // (
    let mut args = Vec::new();
    while !reader.symbol(")") {
        args.push(reader.expression(Precedence::Assignment)?);
        if !reader.consume_symbol(",") {
            break;
        }
    }
    reader.expect_symbol(")")?;
    Ok(node(reader, line, QuoteKind::Call(Box::new(callee), args)))
}

fn access_expr(reader: &mut Reader, target: Quote, line: u32) -> Result<Quote, VenError> {
    reader.advance(); // [
    let mut args = Vec::new();
    while !reader.symbol("]") {
        args.push(reader.expression(Precedence::Assignment)?);
        if !reader.consume_symbol(",") {
            break;
        }
    }
    reader.expect_symbol("]")?;
    Ok(node(reader, line, QuoteKind::Access(Box::new(target), args)))
}

fn symbol_led(reader: &mut Reader, s: &str, left: Quote, line: u32) -> Result<Quote, VenError> {
    match s {
        "+" => {
            reader.advance();
            binary_right(reader, left, BinaryOp::Add, Precedence::Addition, line)
        }
        "-" => {
            reader.advance();
            binary_right(reader, left, BinaryOp::Sub, Precedence::Addition, line)
        }
        "*" => {
            reader.advance();
            binary_right(reader, left, BinaryOp::Mul, Precedence::Product, line)
        }
        "/" => {
            reader.advance();
            binary_right(reader, left, BinaryOp::Div, Precedence::Product, line)
        }
        "<" => {
            reader.advance();
            binary_right(reader, left, BinaryOp::Lt, Precedence::Relation, line)
        }
        ">" => {
            reader.advance();
            binary_right(reader, left, BinaryOp::Gt, Precedence::Relation, line)
        }
        "<=" => {
            reader.advance();
            binary_right(reader, left, BinaryOp::Le, Precedence::Relation, line)
        }
        ">=" => {
            reader.advance();
            binary_right(reader, left, BinaryOp::Ge, Precedence::Relation, line)
        }
        "~" => {
            reader.advance();
            binary_right(reader, left, BinaryOp::Concat, Precedence::Convert, line)
        }
        "&" => {
            reader.advance();
            binary_right(reader, left, BinaryOp::Merge, Precedence::Convert, line)
        }
        ".." => {
            reader.advance();
            if reader.at_expr_terminator() {
                Ok(node(reader, line, QuoteKind::Range(Some(Box::new(left)), None)))
            } else {
                let hi = reader.expression(Precedence::Addition)?;
                Ok(node(reader, line, QuoteKind::Range(Some(Box::new(left)), Some(Box::new(hi)))))
            }
        }
        "." => {
            reader.advance();
            let mut steps = vec![field_step(reader)?];
            while reader.consume_symbol(".") {
                steps.push(field_step(reader)?);
            }
            Ok(node(reader, line, QuoteKind::AccessField(Box::new(left), steps)))
        }
        "++" => {
            reader.advance();
            Ok(node(reader, line, QuoteKind::ReturnIncrement(Box::new(left))))
        }
        "--" => {
            reader.advance();
            Ok(node(reader, line, QuoteKind::ReturnDecrement(Box::new(left))))
        }
        "=" => {
            reader.advance();
            let value = reader.expression(Precedence::Zero)?;
            Ok(node(reader, line, QuoteKind::Assign(Box::new(left), Box::new(value), false)))
        }
        ":=" => {
            reader.advance();
            let value = reader.expression(Precedence::Zero)?;
            Ok(node(reader, line, QuoteKind::Assign(Box::new(left), Box::new(value), true)))
        }
        "+=" => compound_assign(reader, left, line, BinaryOp::Add),
        "-=" => compound_assign(reader, left, line, BinaryOp::Sub),
        "*=" => compound_assign(reader, left, line, BinaryOp::Mul),
        "/=" => compound_assign(reader, left, line, BinaryOp::Div),
        "~=" => compound_assign(reader, left, line, BinaryOp::Concat),
        "&=" => compound_assign(reader, left, line, BinaryOp::Merge),
        _ => reader.err(format!("unexpected operator '{s}'")),
    }
}

fn binary_right(
    reader: &mut Reader,
    left: Quote,
    op: BinaryOp,
    precedence: Precedence,
    line: u32,
) -> Result<Quote, VenError> {
    let right = reader.expression(precedence)?;
    Ok(node(reader, line, QuoteKind::Binary(op, Box::new(left), Box::new(right))))
}

fn compound_assign(reader: &mut Reader, left: Quote, line: u32, op: BinaryOp) -> Result<Quote, VenError> {
    reader.advance();
    let value = reader.expression(Precedence::Zero)?;
    Ok(node(reader, line, QuoteKind::BinaryAssign(op, Box::new(left), Box::new(value))))
}

fn field_step(reader: &mut Reader) -> Result<FieldStep, VenError> {
    let name = expect_ident(reader)?;
    Ok(FieldStep { name })
}

fn word_led(reader: &mut Reader, w: &str, left: Quote, line: u32) -> Result<Quote, VenError> {
    let (op, precedence) = match w {
        "is" => (BinaryOp::Is, Precedence::Identity),
        "in" => (BinaryOp::In, Precedence::Identity),
        "and" => (BinaryOp::And, Precedence::Identity),
        "or" => (BinaryOp::Or, Precedence::Identity),
        "x" => (BinaryOp::Repeat, Precedence::Convert),
        _ => return reader.err(format!("unexpected word '{w}' in expression")),
    };
    reader.advance();
    binary_right(reader, left, op, precedence, line)
}

use ven_core::VenError;
