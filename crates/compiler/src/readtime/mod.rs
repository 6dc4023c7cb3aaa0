//! The Readtime Evaluator (§4.2): a restricted interpreter that runs inside
//! `<{ }>`/`<[ ]>`/`<...>` envelopes, user `nud`/`led` macro bodies, and
//! `given`-clause constraint expressions. It shares `ven_core::ops` with the
//! VM so constant folding here and runtime evaluation later never disagree.
//!
//! Only the operations named in §4.2 are supported: literals, vectors,
//! maps, ranges, arithmetic/comparison/logical operators, `if`, simple name
//! binding, `_`/`&_`, `loop`/`next`/`queue`/`return`, and a small builtin
//! set (`say`, `chars`, `reverse`, `quote`, and the `vec`/`map`/`any`
//! compound-type constructors used in `given` clauses). General function
//! calls are not supported — a macro body that needs the full language
//! belongs at runtime, not readtime.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use ven_core::{
    BinaryOp, CompoundType, MapKey, Quote, QuoteKind, ReturnKind, Tag, TypeName, TypeValue,
    UnaryOp, Value, VenError,
};

use crate::reader::{Reader, UserNud};

struct Frame {
    vars: HashMap<Rc<str>, Value>,
}

struct State {
    frames: Vec<Frame>,
    superlocal: Vec<Value>,
    queue: Vec<Value>,
}

impl State {
    fn new() -> Self {
        Self {
            frames: vec![Frame { vars: HashMap::new() }],
            superlocal: Vec::new(),
            queue: Vec::new(),
        }
    }

    fn push_frame(&mut self) {
        self.frames.push(Frame { vars: HashMap::new() });
    }

    fn pop_frame(&mut self) {
        self.frames.pop();
    }

    fn define(&mut self, name: Rc<str>, value: Value) {
        self.frames.last_mut().expect("at least one frame").vars.insert(name, value);
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.frames.iter().rev().find_map(|f| f.vars.get(name).cloned())
    }

    fn set_existing(&mut self, name: &str, value: Value) -> bool {
        for frame in self.frames.iter_mut().rev() {
            if frame.vars.contains_key(name) {
                frame.vars.insert(Rc::from(name), value);
                return true;
            }
        }
        false
    }
}

enum Flow {
    Value(Value),
    Return(Value),
    Next(Option<Rc<str>>),
}

impl Flow {
    fn into_value(self) -> Value {
        match self {
            Flow::Value(v) | Flow::Return(v) => v,
            Flow::Next(_) => Value::Void,
        }
    }
}

pub fn eval_block(reader: &Reader, stmts: &[Quote]) -> Result<Value, VenError> {
    let mut state = State::new();
    run_body(reader, &mut state, stmts).map(Flow::into_value)
}

pub fn eval_expr(reader: &Reader, expr: &Quote) -> Result<Value, VenError> {
    let mut state = State::new();
    eval_stmt(reader, &mut state, expr).map(Flow::into_value)
}

pub fn expand_macro(
    reader: &mut Reader,
    name: &str,
    mac: &UserNud,
    args: Vec<Quote>,
    line: u32,
) -> Result<Quote, VenError> {
    if args.len() != mac.params.len() {
        return reader.err(format!(
            "macro '{name}' expects {} argument(s), got {}",
            mac.params.len(),
            args.len()
        ));
    }
    let mut state = State::new();
    for (param, arg) in mac.params.iter().zip(args.into_iter()) {
        state.define(param.clone(), Value::Quote(Rc::new(arg)));
    }
    let value = run_body(&*reader, &mut state, &mac.body)?.into_value();
    Ok(value_to_quote(reader, line, value))
}

fn run_body(reader: &Reader, state: &mut State, stmts: &[Quote]) -> Result<Flow, VenError> {
    let mut last = Value::Void;
    for stmt in stmts {
        match eval_stmt(reader, state, stmt)? {
            Flow::Value(v) => last = v,
            other @ (Flow::Return(_) | Flow::Next(_)) => return Ok(other),
        }
    }
    Ok(Flow::Value(last))
}

fn truthy(v: &Value) -> bool {
    v.truthy()
}

fn err(reader: &Reader, message: impl Into<String>) -> VenError {
    let tok = reader.peek();
    VenError::read_at(
        reader.current_file().to_string(),
        tok.line,
        tok.column,
        None,
        message.into(),
    )
}

fn eval_stmt(reader: &Reader, state: &mut State, q: &Quote) -> Result<Flow, VenError> {
    let line = q.line();
    match &q.kind {
        QuoteKind::Symbol(name) => Ok(Flow::Value(lookup(reader, state, name)?)),
        QuoteKind::String(s) => Ok(Flow::Value(Value::Str(s.clone()))),
        QuoteKind::Number(s) => Ok(Flow::Value(Value::Num(
            ven_core::ops::parse_num(s).ok_or_else(|| err(reader, format!("invalid number literal '{s}'")))?,
        ))),
        QuoteKind::Regex(s) => {
            let compiled = regex::Regex::new(s).map_err(|e| err(reader, format!("invalid regex: {e}")))?;
            Ok(Flow::Value(Value::Regex(Rc::new(ven_core::RegexValue {
                source: s.clone(),
                compiled,
            }))))
        }
        QuoteKind::True => Ok(Flow::Value(Value::Bool(true))),
        QuoteKind::False => Ok(Flow::Value(Value::Bool(false))),
        QuoteKind::Void => Ok(Flow::Value(Value::Void)),
        QuoteKind::UPop => Ok(Flow::Value(state.superlocal.pop().unwrap_or(Value::Void))),
        QuoteKind::URef => Ok(Flow::Value(state.superlocal.last().cloned().unwrap_or(Value::Void))),
        QuoteKind::Vector(items, spread) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval_stmt(reader, state, item)?.into_value());
            }
            if let Some(spread) = spread {
                match eval_stmt(reader, state, spread)?.into_value() {
                    Value::Vec(items) => out.extend(items.borrow().iter().cloned()),
                    other => return Err(err(reader, format!("cannot spread a {:?} into a vector", other.type_name()))),
                }
            }
            Ok(Flow::Value(Value::vec(out)))
        }
        QuoteKind::Map(entries) => {
            let mut map = IndexMap::new();
            for (k, v) in entries {
                let key = eval_stmt(reader, state, k)?.into_value();
                let value = eval_stmt(reader, state, v)?.into_value();
                map.insert(MapKey(key), value);
            }
            Ok(Flow::Value(Value::map(map)))
        }
        QuoteKind::Range(lo, hi) => {
            let lo = match lo {
                Some(lo) => Some(Box::new(eval_stmt(reader, state, lo)?.into_value())),
                None => None,
            };
            let hi = match hi {
                Some(hi) => Some(Box::new(eval_stmt(reader, state, hi)?.into_value())),
                None => None,
            };
            Ok(Flow::Value(Value::Range(lo, hi)))
        }
        QuoteKind::Unary(op, operand) => {
            let v = eval_stmt(reader, state, operand)?.into_value();
            ven_core::ops::apply_unary(*op, &v).map(Flow::Value).map_err(|m| err(reader, m))
        }
        QuoteKind::Binary(BinaryOp::And, left, right) => {
            let l = eval_stmt(reader, state, left)?.into_value();
            if !truthy(&l) {
                Ok(Flow::Value(l))
            } else {
                eval_stmt(reader, state, right)
            }
        }
        QuoteKind::Binary(BinaryOp::Or, left, right) => {
            let l = eval_stmt(reader, state, left)?.into_value();
            if truthy(&l) {
                Ok(Flow::Value(l))
            } else {
                eval_stmt(reader, state, right)
            }
        }
        QuoteKind::Binary(op, left, right) => {
            let l = eval_stmt(reader, state, left)?.into_value();
            let r = eval_stmt(reader, state, right)?.into_value();
            ven_core::ops::apply_binary(*op, &l, &r).map(Flow::Value).map_err(|m| err(reader, m))
        }
        QuoteKind::IntoBool(inner) => {
            let v = eval_stmt(reader, state, inner)?.into_value();
            Ok(Flow::Value(Value::Bool(truthy(&v))))
        }
        QuoteKind::Dies(inner) => {
            let died = eval_stmt(reader, state, inner).is_err();
            Ok(Flow::Value(Value::Bool(died)))
        }
        QuoteKind::Ensure(inner) => {
            let v = eval_stmt(reader, state, inner)?.into_value();
            if truthy(&v) {
                Ok(Flow::Value(Value::Void))
            } else {
                Err(err(reader, "ensure failed: condition was false"))
            }
        }
        QuoteKind::Assign(target, value, is_local) => {
            let v = eval_stmt(reader, state, value)?.into_value();
            assign(reader, state, target, v.clone(), *is_local)?;
            Ok(Flow::Value(v))
        }
        QuoteKind::BinaryAssign(op, target, value) => {
            let name = symbol_name(reader, target)?;
            let current = lookup(reader, state, &name)?;
            let rhs = eval_stmt(reader, state, value)?.into_value();
            let next = ven_core::ops::apply_binary(*op, &current, &rhs).map_err(|m| err(reader, m))?;
            if !state.set_existing(&name, next.clone()) {
                state.define(name, next.clone());
            }
            Ok(Flow::Value(next))
        }
        QuoteKind::AccessField(target, steps) => {
            let mut current = eval_stmt(reader, state, target)?.into_value();
            for step in steps {
                current = field_of(reader, &current, &step.name)?;
            }
            Ok(Flow::Value(current))
        }
        QuoteKind::Access(target, args) => {
            let base = eval_stmt(reader, state, target)?.into_value();
            if args.len() != 1 {
                return Err(err(reader, "readtime indexing takes exactly one argument"));
            }
            let index = eval_stmt(reader, state, &args[0])?.into_value();
            Ok(Flow::Value(index_into(reader, &base, &index)?))
        }
        QuoteKind::Block(stmts) => {
            state.push_frame();
            let result = run_body(reader, state, stmts);
            state.pop_frame();
            result
        }
        QuoteKind::If(cond, then_branch, else_branch) => {
            let c = eval_stmt(reader, state, cond)?.into_value();
            if truthy(&c) {
                eval_stmt(reader, state, then_branch)
            } else if let Some(else_branch) = else_branch {
                eval_stmt(reader, state, else_branch)
            } else {
                Ok(Flow::Value(Value::Void))
            }
        }
        QuoteKind::Queue(inner) => {
            let v = eval_stmt(reader, state, inner)?.into_value();
            state.queue.push(v);
            Ok(Flow::Value(Value::Void))
        }
        QuoteKind::Next(label, values) => {
            for value in values {
                let v = eval_stmt(reader, state, value)?.into_value();
                state.queue.push(v);
            }
            Ok(Flow::Next(label.clone()))
        }
        QuoteKind::Return(inner, kind) => match kind {
            ReturnKind::Queue => Ok(Flow::Return(Value::vec(std::mem::take(&mut state.queue)))),
            ReturnKind::Plain => Ok(Flow::Return(eval_stmt(reader, state, inner)?.into_value())),
        },
        QuoteKind::InfiniteLoop(body) => run_loop(reader, state, None, None, None, body),
        QuoteKind::BaseLoop(cond, body) => run_loop(reader, state, None, Some(cond), None, body),
        QuoteKind::StepLoop(name, init, cond, step, body) => {
            state.push_frame();
            let initial = eval_stmt(reader, state, init)?.into_value();
            state.define(name.clone(), initial);
            let flow = run_loop(reader, state, None, Some(cond), Some(step), body);
            state.pop_frame();
            flow
        }
        QuoteKind::ComplexLoop { base, cond, step, body } => {
            state.push_frame();
            let flow = run_loop(reader, state, base.as_deref(), Some(cond), step.as_deref(), body);
            state.pop_frame();
            flow
        }
        QuoteKind::Lambda { .. } | QuoteKind::Fun { .. } | QuoteKind::Box { .. } => {
            Err(err(reader, "function/box definitions are not supported in a readtime context"))
        }
        QuoteKind::Call(callee, args) => eval_call(reader, state, callee, args),
        QuoteKind::Immediate(inner) => eval_stmt(reader, state, inner),
        QuoteKind::PatternEnvelope(inner) => eval_stmt(reader, state, inner),
        QuoteKind::LambdaSpread(..) | QuoteKind::BinarySpread(..) => {
            Err(err(reader, "spreads are not supported in a readtime context"))
        }
        QuoteKind::ReturnIncrement(_) | QuoteKind::ReturnDecrement(_) => {
            Err(err(reader, "++/-- are not supported in a readtime context"))
        }
    }
}

fn run_loop(
    reader: &Reader,
    state: &mut State,
    base: Option<&Quote>,
    cond: Option<&Quote>,
    step: Option<&Quote>,
    body: &Quote,
) -> Result<Flow, VenError> {
    if let Some(base) = base {
        eval_stmt(reader, state, base)?;
    }
    loop {
        if let Some(cond) = cond {
            let c = eval_stmt(reader, state, cond)?.into_value();
            if !truthy(&c) {
                break;
            }
        }
        match eval_stmt(reader, state, body)? {
            Flow::Return(v) => return Ok(Flow::Return(v)),
            Flow::Next(_) | Flow::Value(_) => {}
        }
        if let Some(step) = step {
            eval_stmt(reader, state, step)?;
        }
        if cond.is_none() && step.is_none() {
            // an unconditional `loop { }` only terminates via `return`.
            continue;
        }
    }
    Ok(Flow::Value(Value::Void))
}

fn symbol_name(reader: &Reader, target: &Quote) -> Result<Rc<str>, VenError> {
    match &target.kind {
        QuoteKind::Symbol(name) => Ok(name.clone()),
        _ => Err(err(reader, "only a plain name may be assigned in a readtime context")),
    }
}

fn assign(reader: &Reader, state: &mut State, target: &Quote, value: Value, is_local: bool) -> Result<(), VenError> {
    let name = symbol_name(reader, target)?;
    if is_local {
        state.define(name, value);
    } else if !state.set_existing(&name, value.clone()) {
        state.define(name, value);
    }
    Ok(())
}

fn lookup(reader: &Reader, state: &State, name: &str) -> Result<Value, VenError> {
    if let Some(v) = state.get(name) {
        return Ok(v);
    }
    if let Some(type_name) = type_name_for_word(name) {
        return Ok(Value::Type(TypeValue { name: type_name }));
    }
    Err(err(reader, format!("'{name}' is not defined in this readtime context")))
}

fn type_name_for_word(word: &str) -> Option<TypeName> {
    Some(match word {
        "num" => TypeName::Num,
        "str" => TypeName::Str,
        "vec" => TypeName::Vec,
        "map" => TypeName::Map,
        "bool" => TypeName::Bool,
        "regex" => TypeName::Regex,
        "range" => TypeName::Range,
        "fun" => TypeName::Fun,
        "box" => TypeName::Box,
        "quote" => TypeName::Quote,
        "void" => TypeName::Void,
        "any" => TypeName::Any,
        _ => return None,
    })
}

fn field_of(reader: &Reader, base: &Value, name: &str) -> Result<Value, VenError> {
    match base {
        Value::Map(entries) => Ok(entries
            .borrow()
            .get(&MapKey(Value::str(name)))
            .cloned()
            .unwrap_or(Value::Void)),
        other => Err(err(
            reader,
            format!("cannot access field '{name}' on a {:?}", other.type_name()),
        )),
    }
}

fn index_into(reader: &Reader, base: &Value, index: &Value) -> Result<Value, VenError> {
    match base {
        Value::Str(s) => {
            let i = ven_core::ops::to_num(index).map_err(|m| err(reader, m))?.to_integer();
            Ok(s.chars().nth(i.max(0) as usize).map(|c| Value::str(c.to_string())).unwrap_or(Value::Void))
        }
        Value::Vec(items) => {
            let i = ven_core::ops::to_num(index).map_err(|m| err(reader, m))?.to_integer();
            Ok(items.borrow().get(i.max(0) as usize).cloned().unwrap_or(Value::Void))
        }
        Value::Map(entries) => Ok(entries.borrow().get(&MapKey(index.clone())).cloned().unwrap_or(Value::Void)),
        other => Err(err(reader, format!("cannot index a {:?}", other.type_name()))),
    }
}

fn eval_call(reader: &Reader, state: &mut State, callee: &Quote, args: &[Quote]) -> Result<Flow, VenError> {
    let name = match &callee.kind {
        QuoteKind::Symbol(name) => name.clone(),
        _ => return Err(err(reader, "readtime calls must name a builtin directly")),
    };
    // `quote(expr)` captures `expr`'s own AST rather than its evaluated
    // value, so it must not go through the ordinary eager-argument path
    // below (a macro body ending in `quote(42)` yields the literal quote
    // for `42`, spliced back into the token stream in place of the call).
    if name.as_ref() == "quote" {
        return match args {
            [single] => Ok(Flow::Value(Value::Quote(Rc::new(single.clone())))),
            _ => Err(err(reader, "quote() expects exactly one argument")),
        };
    }
    let values = args
        .iter()
        .map(|a| eval_stmt(reader, state, a).map(Flow::into_value))
        .collect::<Result<Vec<_>, _>>()?;
    match name.as_ref() {
        "say" => {
            for v in &values {
                eprintln!("{v}");
            }
            Ok(Flow::Value(Value::Void))
        }
        "chars" => match values.first() {
            Some(Value::Str(s)) => Ok(Flow::Value(Value::vec(
                s.chars().map(|c| Value::str(c.to_string())).collect(),
            ))),
            _ => Err(err(reader, "chars() expects a string")),
        },
        "reverse" => match values.first() {
            Some(Value::Str(s)) => Ok(Flow::Value(Value::str(s.chars().rev().collect::<String>()))),
            Some(Value::Vec(items)) => {
                let mut v = items.borrow().clone();
                v.reverse();
                Ok(Flow::Value(Value::vec(v)))
            }
            _ => Err(err(reader, "reverse() expects a string or vector")),
        },
        "vec" | "map" | "any" => {
            let lead = TypeValue {
                name: match name.as_ref() {
                    "vec" => TypeName::Vec,
                    "map" => TypeName::Map,
                    _ => TypeName::Any,
                },
            };
            Ok(Flow::Value(Value::CompoundType(Rc::new(CompoundType { lead, args: values }))))
        }
        other => Err(err(reader, format!("'{other}' cannot be called in a readtime context"))),
    }
}

/// Convert a readtime result `Value` back into a spliceable quote.
pub fn value_to_quote(reader: &Reader, line: u32, value: Value) -> Quote {
    let tag = Tag::new(reader.current_file(), line);
    let kind = match value {
        Value::Num(n) => QuoteKind::Number(Rc::from(n.to_string())),
        Value::Str(s) => QuoteKind::String(s),
        Value::Bool(true) => QuoteKind::True,
        Value::Bool(false) => QuoteKind::False,
        Value::Void => QuoteKind::Void,
        Value::Vec(items) => QuoteKind::Vector(
            items
                .borrow()
                .iter()
                .cloned()
                .map(|v| value_to_quote(reader, line, v))
                .collect(),
            None,
        ),
        Value::Map(entries) => QuoteKind::Map(
            entries
                .borrow()
                .iter()
                .map(|(k, v)| {
                    (
                        value_to_quote(reader, line, k.0.clone()),
                        value_to_quote(reader, line, v.clone()),
                    )
                })
                .collect(),
        ),
        Value::Regex(r) => QuoteKind::Regex(r.source.clone()),
        Value::Quote(q) => return (*q).clone(),
        other => QuoteKind::String(Rc::from(other.to_string())),
    };
    Quote::new(tag, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader as R;

    #[test]
    fn evaluates_arithmetic_block() {
        let unit = R::read("1 + 2 * 3;", "t.ven").unwrap();
        let tokens = crate::lexer::Lexer::new(Rc::from("t.ven"), "").tokenize().unwrap();
        let scratch = R::new(Rc::from("t.ven"), tokens);
        let v = eval_block(&scratch, &unit.quotes);
        assert_eq!(v.unwrap(), Value::Num(ven_core::Num::from_integer(7)));
    }
}
