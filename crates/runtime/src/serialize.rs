//! JSON encoding for `-s/--serialize` (§6: "Serialization of quotes uses a
//! stable JSON shape: `{ kind, tag: {file, line}, ...fields }`"), extended
//! the same way to whichever step `-j` halted the pipeline at: quotes after
//! Read, ops after Compile/Optimize, a `Value` after Evaluate.
//!
//! Hand-built rather than `#[derive(Serialize)]`: `Quote`/`Value`/`Op` are
//! `Rc`/`RefCell`-shaped trees with recursive variants serde's derive
//! doesn't map cleanly onto, and §6 specifies one fixed external shape
//! regardless of how these types are laid out internally.

use std::rc::Rc;

use serde_json::{json, Value as Json};
use venc::{Chunk, ChunkTable, Op};

use ven_core::{
    BoxDecl, BoxInstance, CompoundType, Concrete, Function, Generic, MapKey, Quote, QuoteKind,
    TypeValue, Value,
};

fn tag_json(q: &Quote) -> Json {
    json!({ "file": q.tag.file.as_ref(), "line": q.tag.line })
}

/// A single quote as the stable `{kind, tag, ...fields}` shape (§6).
pub fn quote_json(q: &Quote) -> Json {
    let kind = q.detree_name();
    let tag = tag_json(q);
    let mut obj = match &q.kind {
        QuoteKind::Symbol(name) => json!({ "name": name.as_ref() }),
        QuoteKind::String(s) => json!({ "value": s.as_ref() }),
        QuoteKind::Number(s) => json!({ "value": s.as_ref() }),
        QuoteKind::Regex(s) => json!({ "source": s.as_ref() }),
        QuoteKind::True => json!({ "value": true }),
        QuoteKind::False => json!({ "value": false }),
        QuoteKind::Void | QuoteKind::UPop | QuoteKind::URef => json!({}),
        QuoteKind::Vector(items, spread) => json!({
            "items": items.iter().map(quote_json).collect::<Vec<_>>(),
            "spread": spread.as_deref().map(quote_json),
        }),
        QuoteKind::Unary(op, operand) => json!({
            "op": format!("{op:?}"),
            "operand": quote_json(operand),
        }),
        QuoteKind::Binary(op, left, right) => json!({
            "op": format!("{op:?}"),
            "left": quote_json(left),
            "right": quote_json(right),
        }),
        QuoteKind::Call(callee, args) => json!({
            "callee": quote_json(callee),
            "args": args.iter().map(quote_json).collect::<Vec<_>>(),
        }),
        QuoteKind::Assign(target, value, bind) => json!({
            "target": quote_json(target),
            "value": quote_json(value),
            "bind": bind,
        }),
        QuoteKind::BinaryAssign(op, target, value) => json!({
            "op": format!("{op:?}"),
            "target": quote_json(target),
            "value": quote_json(value),
        }),
        QuoteKind::AccessField(head, steps) => json!({
            "head": quote_json(head),
            "path": steps.iter().map(|s| s.name.as_ref()).collect::<Vec<_>>(),
        }),
        QuoteKind::Access(head, args) => json!({
            "head": quote_json(head),
            "args": args.iter().map(quote_json).collect::<Vec<_>>(),
        }),
        QuoteKind::IntoBool(inner) => json!({ "value": quote_json(inner) }),
        QuoteKind::ReturnIncrement(target) | QuoteKind::ReturnDecrement(target) => {
            json!({ "target": quote_json(target) })
        }
        QuoteKind::BinarySpread(op, body) => json!({
            "op": format!("{op:?}"),
            "body": quote_json(body),
        }),
        QuoteKind::LambdaSpread(lambda, operand, iterative) => json!({
            "lambda": quote_json(lambda),
            "operand": quote_json(operand),
            "iterative": iterative,
        }),
        QuoteKind::Block(stmts) => json!({ "body": stmts.iter().map(quote_json).collect::<Vec<_>>() }),
        QuoteKind::If(cond, succ, alt) => json!({
            "cond": quote_json(cond),
            "succ": quote_json(succ),
            "alt": alt.as_deref().map(quote_json),
        }),
        QuoteKind::Fun { name, params, body, given, slurpy } => json!({
            "name": name.as_ref(),
            "params": params.iter().map(|p| json!({
                "name": p.name.as_ref(),
                "constraint": p.constraint.as_deref().map(quote_json),
            })).collect::<Vec<_>>(),
            "body": quote_json(body),
            "given": given.as_deref().map(quote_json),
            "slurpy": slurpy,
        }),
        QuoteKind::Lambda { params, slurpy, body } => json!({
            "params": params.iter().map(|p| p.as_ref()).collect::<Vec<_>>(),
            "slurpy": slurpy,
            "body": quote_json(body),
        }),
        QuoteKind::Ensure(inner) | QuoteKind::Queue(inner) | QuoteKind::Dies(inner) => {
            json!({ "value": quote_json(inner) })
        }
        QuoteKind::Next(label, args) => json!({
            "label": label.as_deref(),
            "args": args.iter().map(quote_json).collect::<Vec<_>>(),
        }),
        QuoteKind::Return(value, kind) => json!({
            "value": quote_json(value),
            "return_kind": format!("{kind:?}"),
        }),
        QuoteKind::InfiniteLoop(body) => json!({ "body": quote_json(body) }),
        QuoteKind::BaseLoop(cond, body) => json!({
            "cond": quote_json(cond),
            "body": quote_json(body),
        }),
        QuoteKind::StepLoop(name, init, cond, step, body) => json!({
            "name": name.as_ref(),
            "init": quote_json(init),
            "cond": quote_json(cond),
            "step": quote_json(step),
            "body": quote_json(body),
        }),
        QuoteKind::ComplexLoop { base, cond, step, body } => json!({
            "base": base.as_deref().map(quote_json),
            "cond": quote_json(cond),
            "step": step.as_deref().map(quote_json),
            "body": quote_json(body),
        }),
        QuoteKind::Box { name, params, given, namespace } => json!({
            "name": name.as_ref(),
            "params": params.iter().map(|p| p.as_ref()).collect::<Vec<_>>(),
            "given": given.iter().map(quote_json).collect::<Vec<_>>(),
            "namespace": namespace.iter().map(quote_json).collect::<Vec<_>>(),
        }),
        QuoteKind::Immediate(inner) | QuoteKind::PatternEnvelope(inner) => {
            json!({ "value": quote_json(inner) })
        }
        QuoteKind::Map(pairs) => json!({
            "entries": pairs.iter().map(|(k, v)| json!({
                "key": quote_json(k),
                "value": quote_json(v),
            })).collect::<Vec<_>>(),
        }),
        QuoteKind::Range(lo, hi) => json!({
            "lo": lo.as_deref().map(quote_json),
            "hi": hi.as_deref().map(quote_json),
        }),
    };
    let map = obj.as_object_mut().expect("quote variant always serializes to an object");
    map.insert("kind".into(), json!(kind));
    map.insert("tag".into(), tag);
    obj
}

/// A runtime `Value` after Evaluate. No stable `kind` wrapper is prescribed
/// for values (only for quotes, §6), so this favors the shape a JSON
/// consumer would actually want: plain JSON scalars/arrays/objects where
/// Ven's own types line up with JSON's, and a `{type, ...}` envelope only
/// for the variants JSON has no native shape for.
pub fn value_json(v: &Value) -> Json {
    match v {
        Value::Num(n) => {
            if *n.denom() == 1 {
                json!(n.numer())
            } else {
                json!({ "type": "rational", "numer": n.numer(), "denom": n.denom() })
            }
        }
        Value::Str(s) => json!(s.as_ref()),
        Value::Bool(b) => json!(b),
        Value::Void => Json::Null,
        Value::Vec(items) => Json::Array(items.borrow().iter().map(value_json).collect()),
        Value::Map(entries) => {
            let mut out = serde_json::Map::new();
            for (k, v) in entries.borrow().iter() {
                out.insert(map_key_string(k), value_json(v));
            }
            Json::Object(out)
        }
        Value::Regex(r) => json!({ "type": "regex", "source": r.source.as_ref() }),
        Value::Range(lo, hi) => json!({
            "type": "range",
            "lo": lo.as_deref().map(value_json),
            "hi": hi.as_deref().map(value_json),
        }),
        Value::Type(t) => json!({ "type": "type", "name": type_name_word(t) }),
        Value::CompoundType(c) => json!({ "type": "compound-type", "value": compound_type_json(c) }),
        Value::Any => json!({ "type": "any" }),
        Value::Quote(q) => quote_json(q),
        Value::Function(f) => function_json(f),
        Value::Box(decl) => box_decl_json(decl),
        Value::BoxInstance(inst) => box_instance_json(inst),
        Value::Internal(_) => json!({ "type": "internal" }),
    }
}

fn map_key_string(key: &MapKey) -> String {
    match &key.0 {
        Value::Str(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn type_name_word(t: &TypeValue) -> &'static str {
    t.name.word()
}

fn compound_type_json(c: &Rc<CompoundType>) -> Json {
    json!({ "lead": type_name_word(&c.lead), "args": c.args.iter().map(value_json).collect::<Vec<_>>() })
}

fn function_json(f: &Function) -> Json {
    match f {
        Function::Concrete(c) => json!({ "type": "function", "kind": "concrete", "name": c.name.as_ref(), "arity": c.arity() }),
        Function::Generic(g) => generic_json(g),
        Function::Builtin(b) => json!({ "type": "function", "kind": "builtin", "name": b.name.as_ref(), "arity": b.arity }),
        Function::Lambda(l) => json!({ "type": "function", "kind": "lambda", "params": l.params.iter().map(|p| p.as_ref()).collect::<Vec<_>>() }),
        Function::Frozen(_) => json!({ "type": "function", "kind": "frozen" }),
        Function::Partial(p) => json!({
            "type": "function",
            "kind": "partial",
            "callee": function_json(&p.callee),
            "args": p.args.iter().map(value_json).collect::<Vec<_>>(),
        }),
    }
}

fn generic_json(g: &std::cell::RefCell<Generic>) -> Json {
    let g = g.borrow();
    json!({
        "type": "function",
        "kind": "generic",
        "name": g.name.as_ref(),
        "variants": g.variants.iter().map(concrete_json).collect::<Vec<_>>(),
    })
}

fn concrete_json(c: &Rc<Concrete>) -> Json {
    json!({ "name": c.name.as_ref(), "arity": c.arity(), "slurpy": c.slurpy, "general": c.general })
}

fn box_decl_json(decl: &Rc<BoxDecl>) -> Json {
    json!({
        "type": "box",
        "name": decl.name.as_ref(),
        "params": decl.params.iter().map(|p| p.as_ref()).collect::<Vec<_>>(),
    })
}

fn box_instance_json(inst: &Rc<BoxInstance>) -> Json {
    json!({ "type": "box-instance", "box": inst.parent.name.as_ref() })
}

/// A compiled chunk table (after Compile or Optimize) — every chunk's ops in
/// order, with embedded `ChunkId`s rendered as plain indices into this same
/// array.
pub fn chunk_table_json(table: &ChunkTable) -> Json {
    json!({
        "chunks": (0..table.len())
            .map(|i| chunk_json(table.get(ven_core::ChunkId(i))))
            .collect::<Vec<_>>(),
    })
}

fn chunk_json(chunk: &Chunk) -> Json {
    json!({
        "name": chunk.name.as_ref(),
        "file": chunk.file.as_ref(),
        "ops": chunk.ops.iter().enumerate().map(|(i, op)| op_json(op, chunk.lines.get(i).copied().unwrap_or(0))).collect::<Vec<_>>(),
    })
}

fn op_json(op: &Op, line: u32) -> Json {
    let mut obj = match op {
        Op::Nop => json!({ "op": "nop" }),
        Op::PushNum(n) => json!({ "op": "push-num", "value": value_json(&Value::Num(*n)) }),
        Op::PushStr(s) => json!({ "op": "push-str", "value": s.as_ref() }),
        Op::PushRegex(s) => json!({ "op": "push-regex", "source": s.as_ref() }),
        Op::PushBool(b) => json!({ "op": "push-bool", "value": b }),
        Op::PushVoid => json!({ "op": "push-void" }),
        Op::PushAny => json!({ "op": "push-any" }),
        Op::LoadName(n) => json!({ "op": "load-name", "name": n.as_ref() }),
        Op::DefineLocal(n) => json!({ "op": "define-local", "name": n.as_ref() }),
        Op::StoreBound(n) => json!({ "op": "store-bound", "name": n.as_ref() }),
        Op::Upop => json!({ "op": "upop" }),
        Op::Uref => json!({ "op": "uref" }),
        Op::MakeVec { count, spread } => json!({ "op": "make-vec", "count": count, "spread": spread }),
        Op::MakeMap { count } => json!({ "op": "make-map", "count": count }),
        Op::MakeRange { has_lo, has_hi } => json!({ "op": "make-range", "has_lo": has_lo, "has_hi": has_hi }),
        Op::Unary(u) => json!({ "op": "unary", "kind": format!("{u:?}") }),
        Op::Binary(b) => json!({ "op": "binary", "kind": format!("{b:?}") }),
        Op::FoldBinary(b) => json!({ "op": "fold-binary", "kind": format!("{b:?}") }),
        Op::SpreadCall { reduce } => json!({ "op": "spread-call", "reduce": reduce }),
        Op::AccessField(steps) => json!({ "op": "access-field", "path": steps.iter().map(|s| s.as_ref()).collect::<Vec<_>>() }),
        Op::Access => json!({ "op": "access" }),
        Op::StoreField(steps) => json!({ "op": "store-field", "path": steps.iter().map(|s| s.as_ref()).collect::<Vec<_>>() }),
        Op::StoreAccess => json!({ "op": "store-access" }),
        Op::CoerceBool => json!({ "op": "coerce-bool" }),
        Op::Pop => json!({ "op": "pop" }),
        Op::Dup => json!({ "op": "dup" }),
        Op::Jump(target) => json!({ "op": "jump", "target": target }),
        Op::JumpIfFalse(target) => json!({ "op": "jump-if-false", "target": target }),
        Op::JumpIfTrue(target) => json!({ "op": "jump-if-true", "target": target }),
        Op::Call(argc) => json!({ "op": "call", "argc": argc }),
        Op::PostStep { name, delta } => json!({ "op": "post-step", "name": name.as_ref(), "delta": delta }),
        Op::EnterScope => json!({ "op": "enter-scope" }),
        Op::ExitScope => json!({ "op": "exit-scope" }),
        Op::MakeLambda { target, params, slurpy } => json!({
            "op": "make-lambda",
            "target": target.0,
            "params": params.iter().map(|p| p.as_ref()).collect::<Vec<_>>(),
            "slurpy": slurpy,
        }),
        Op::DefineFun { name, params, slurpy, target, general, .. } => json!({
            "op": "define-fun",
            "name": name.as_ref(),
            "params": params.iter().map(|p| p.as_ref()).collect::<Vec<_>>(),
            "slurpy": slurpy,
            "target": target.0,
            "general": general,
        }),
        Op::DefineBox { name, params, namespace, .. } => json!({
            "op": "define-box",
            "name": name.as_ref(),
            "params": params.iter().map(|p| p.as_ref()).collect::<Vec<_>>(),
            "namespace": namespace.0,
        }),
        Op::Dies(target) => json!({ "op": "dies", "target": target.0 }),
        Op::Ensure => json!({ "op": "ensure" }),
        Op::QueuePush => json!({ "op": "queue-push" }),
        Op::QueueTake => json!({ "op": "queue-take" }),
        Op::Return => json!({ "op": "return" }),
        Op::ReturnQueue => json!({ "op": "return-queue" }),
    };
    obj.as_object_mut().expect("op variant always serializes to an object").insert("line".into(), json!(line));
    obj
}

#[cfg(test)]
mod tests {
    use super::*;
    use ven_core::Tag;

    fn q(kind: QuoteKind) -> Quote {
        Quote::new(Tag::new(Rc::from("t.ven"), 1), kind)
    }

    #[test]
    fn symbol_quote_serializes_to_stable_shape() {
        let out = quote_json(&q(QuoteKind::Symbol(Rc::from("x"))));
        assert_eq!(out["kind"], "symbol");
        assert_eq!(out["tag"]["file"], "t.ven");
        assert_eq!(out["tag"]["line"], 1);
        assert_eq!(out["name"], "x");
    }

    #[test]
    fn integer_value_serializes_as_a_plain_json_number() {
        assert_eq!(value_json(&Value::num(42)), json!(42));
    }

    #[test]
    fn void_value_serializes_as_json_null() {
        assert_eq!(value_json(&Value::Void), Json::Null);
    }

    #[test]
    fn vec_value_serializes_as_json_array() {
        let v = Value::vec(vec![Value::num(1), Value::str("a")]);
        assert_eq!(value_json(&v), json!([1, "a"]));
    }
}
