//! The Value Model (§3.2): a tagged sum type for every runtime value.
//!
//! `Value` is deliberately not `Copy`: vectors and maps are reference-counted
//! interior-mutable containers (`Rc<RefCell<_>>`) so that aliasing through a
//! shared scope slot is visible the way §9 describes for closures, and
//! cloning a `Value` is always cheap.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use num_rational::Ratio;

use crate::error::VenError;
use crate::quote::Quote;
use crate::scope::Scope;

/// Exact rational number (§3.3: "Numbers are exact rationals").
pub type Num = Ratio<i64>;

/// Opaque index into a chunk table owned by the VM/pipeline layer. Kept as a
/// plain handle here so `ven-core` does not need to depend on `ven-compiler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Copy)]
pub enum TypeName {
    Num,
    Str,
    Vec,
    Map,
    Bool,
    Regex,
    Range,
    Fun,
    Box,
    BoxInstance,
    Quote,
    Void,
    Any,
}

impl TypeName {
    pub fn word(&self) -> &'static str {
        match self {
            TypeName::Num => "num",
            TypeName::Str => "str",
            TypeName::Vec => "vec",
            TypeName::Map => "map",
            TypeName::Bool => "bool",
            TypeName::Regex => "regex",
            TypeName::Range => "range",
            TypeName::Fun => "fun",
            TypeName::Box => "box",
            TypeName::BoxInstance => "box-instance",
            TypeName::Quote => "quote",
            TypeName::Void => "void",
            TypeName::Any => "any",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        if matches!(self, TypeName::Any) {
            return true;
        }
        matches!(
            (self, value),
            (TypeName::Num, Value::Num(_))
                | (TypeName::Str, Value::Str(_))
                | (TypeName::Vec, Value::Vec(_))
                | (TypeName::Map, Value::Map(_))
                | (TypeName::Bool, Value::Bool(_))
                | (TypeName::Regex, Value::Regex(_))
                | (TypeName::Range, Value::Range(_, _))
                | (TypeName::Fun, Value::Function(_))
                | (TypeName::Box, Value::Box(_))
                | (TypeName::BoxInstance, Value::BoxInstance(_))
                | (TypeName::Quote, Value::Quote(_))
                | (TypeName::Void, Value::Void)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeValue {
    pub name: TypeName,
}

/// `CompoundType(lead, args)` — §4.7.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundType {
    pub lead: TypeValue,
    pub args: Vec<Value>,
}

/// A regex value: the source text plus a compiled matcher. Equality and
/// hashing are by source text only (compiled automata aren't comparable).
#[derive(Debug, Clone)]
pub struct RegexValue {
    pub source: Rc<str>,
    pub compiled: regex::Regex,
}

impl PartialEq for RegexValue {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// A single signature in a `Generic` bundle.
#[derive(Debug)]
pub struct Concrete {
    pub name: Rc<str>,
    pub params: Vec<ConstrainedParam>,
    pub body: ChunkId,
    pub slurpy: bool,
    pub general: bool,
    pub file: Rc<str>,
    pub line: u32,
}

impl Concrete {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone)]
pub enum Constraint {
    Type(TypeValue),
    Value(Value),
    Compound(Rc<CompoundType>),
}

#[derive(Debug, Clone)]
pub struct ConstrainedParam {
    pub name: Rc<str>,
    pub constraint: Option<Constraint>,
}

/// Dispatch container: concretes sorted arity-desc, strict-before-general,
/// later-added-wins among exact ties (§3.3, §8).
#[derive(Debug)]
pub struct Generic {
    pub name: Rc<str>,
    pub variants: Vec<Rc<Concrete>>,
}

impl Generic {
    pub fn new(name: Rc<str>) -> Self {
        Self {
            name,
            variants: Vec::new(),
        }
    }

    /// Insert keeping the invariant from §3.3: descending arity, strict
    /// before general within equal arity. Insert at the *front* of its rank
    /// group so that, among variants of identical rank, the most recently
    /// added one is tried first ("later-added wins", §8).
    pub fn add_variant(&mut self, variant: Rc<Concrete>) {
        let pos = self
            .variants
            .iter()
            .position(|existing| rank(existing) <= rank(&variant))
            .unwrap_or(self.variants.len());
        self.variants.insert(pos, variant);
    }
}

fn rank(c: &Concrete) -> (i64, i64) {
    // Higher arity first; strict (non-general) before general at equal arity.
    (-(c.arity() as i64), if c.general { 1 } else { 0 })
}

#[derive(Debug, Clone)]
pub struct Builtin {
    pub name: Rc<str>,
    pub arity: usize,
    pub slurpy: bool,
    pub id: usize,
}

/// Anonymous function capturing its defining scope chain.
#[derive(Debug)]
pub struct LambdaValue {
    pub scope: Rc<RefCell<Scope>>,
    pub params: Vec<Rc<str>>,
    pub slurpy: bool,
    pub target: ChunkId,
    /// Per-activation `_`/`&_` values owned by this lambda until it is
    /// called, at which point a fresh superlocal frame is pushed (§3.3).
    pub superlocal: RefCell<Vec<Value>>,
    /// Extra bindings grafted into the lambda's scope lazily, e.g. from a
    /// partial application or an operator section.
    pub injection: RefCell<Vec<(Rc<str>, Value)>>,
}

/// A lambda reified with a pinned scheduler task handle, suitable for
/// `spawn` (§4.2/§5).
#[derive(Debug)]
pub struct FrozenLambda {
    pub lambda: Rc<LambdaValue>,
    pub machine_ref: usize,
}

#[derive(Debug)]
pub struct Partial {
    pub callee: Function,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone)]
pub enum Function {
    Concrete(Rc<Concrete>),
    Generic(Rc<RefCell<Generic>>),
    Builtin(Rc<Builtin>),
    Lambda(Rc<LambdaValue>),
    Frozen(Rc<FrozenLambda>),
    Partial(Rc<Partial>),
}

impl Function {
    pub fn name(&self) -> Rc<str> {
        match self {
            Function::Concrete(c) => c.name.clone(),
            Function::Generic(g) => g.borrow().name.clone(),
            Function::Builtin(b) => b.name.clone(),
            Function::Lambda(_) => Rc::from("lambda"),
            Function::Frozen(_) => Rc::from("frozen-lambda"),
            Function::Partial(p) => p.callee.name(),
        }
    }
}

/// A box declaration (namespace template). Calling it binds `params` into a
/// fresh scope (child of `scope`, the lexical scope the `box` was declared
/// in — the same capture `LambdaValue` does) and re-runs `namespace` in it;
/// the result is a `BoxInstance` holding that freshly-populated scope. Unlike
/// a `Concrete`, the namespace chunk runs once per instantiation, not once
/// ever, since each instance's bindings close over its own param values.
/// `given` constrains the box's own params positionally, the same as a
/// `Concrete`'s params do.
#[derive(Debug)]
pub struct BoxDecl {
    pub name: Rc<str>,
    pub params: Vec<Rc<str>>,
    pub given: Vec<Option<Constraint>>,
    pub scope: Rc<RefCell<Scope>>,
    pub namespace: ChunkId,
}

#[derive(Debug)]
pub struct BoxInstance {
    pub parent: Rc<BoxDecl>,
    pub scope: Rc<RefCell<Scope>>,
}

/// A runtime-only internal value (e.g. iterator state for `__iter`), never
/// produced by user syntax directly.
#[derive(Debug, Clone)]
pub struct Internal {
    pub name: Rc<str>,
    pub slots: Vec<Value>,
}

pub type VecCell = Rc<RefCell<Vec<Value>>>;
pub type MapCell = Rc<RefCell<IndexMap<MapKey, Value>>>;

#[derive(Debug, Clone)]
pub enum Value {
    Num(Num),
    Str(Rc<str>),
    Vec(VecCell),
    Map(MapCell),
    Bool(bool),
    Regex(Rc<RegexValue>),
    /// `Range(begin?, end?)`
    Range(Option<Box<Value>>, Option<Box<Value>>),
    Type(TypeValue),
    CompoundType(Rc<CompoundType>),
    Any,
    Quote(Rc<Quote>),
    Function(Function),
    Box(Rc<BoxDecl>),
    BoxInstance(Rc<BoxInstance>),
    Internal(Rc<Internal>),
    Void,
}

impl Value {
    pub fn type_name(&self) -> TypeName {
        match self {
            Value::Num(_) => TypeName::Num,
            Value::Str(_) => TypeName::Str,
            Value::Vec(_) => TypeName::Vec,
            Value::Map(_) => TypeName::Map,
            Value::Bool(_) => TypeName::Bool,
            Value::Regex(_) => TypeName::Regex,
            Value::Range(..) => TypeName::Range,
            Value::Type(_) | Value::CompoundType(_) | Value::Any => TypeName::Any,
            Value::Quote(_) => TypeName::Quote,
            Value::Function(_) => TypeName::Fun,
            Value::Box(_) => TypeName::Box,
            Value::BoxInstance(_) => TypeName::BoxInstance,
            Value::Internal(_) => TypeName::Any,
            Value::Void => TypeName::Void,
        }
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    pub fn truthy(&self) -> bool {
        !self.is_false()
    }

    pub fn str(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn vec(items: Vec<Value>) -> Value {
        Value::Vec(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: IndexMap<MapKey, Value>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn num(n: i64) -> Value {
        Value::Num(Num::from_integer(n))
    }
}

/// A map key wraps a `Value` with structural hashing (§9's resolved Open
/// Question on hashing). Equality is `eqv?`-compatible: delegated to
/// `crate::ops::eqv` so a `MapKey` equals another exactly when the engine's
/// `is` operator would say so.
#[derive(Debug, Clone)]
pub struct MapKey(pub Value);

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        crate::ops::eqv(&self.0, &other.0)
    }
}
impl Eq for MapKey {}

impl std::hash::Hash for MapKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state);
    }
}

fn hash_value<H: std::hash::Hasher>(v: &Value, state: &mut H) {
    use std::hash::Hash;
    std::mem::discriminant(v).hash(state);
    match v {
        Value::Num(n) => {
            n.numer().hash(state);
            n.denom().hash(state);
        }
        Value::Str(s) => s.hash(state),
        Value::Bool(b) => b.hash(state),
        Value::Vec(items) => {
            for item in items.borrow().iter() {
                hash_value(item, state);
            }
        }
        Value::Map(entries) => {
            // Order-independent: fold key/value hashes with XOR.
            let mut acc: u64 = 0;
            for (k, val) in entries.borrow().iter() {
                let mut sub = std::collections::hash_map::DefaultHasher::new();
                hash_value(&k.0, &mut sub);
                hash_value(val, &mut sub);
                acc ^= std::hash::Hasher::finish(&sub);
            }
            acc.hash(state);
        }
        Value::Regex(r) => r.source.hash(state),
        Value::Range(lo, hi) => {
            if let Some(lo) = lo {
                hash_value(lo, state);
            }
            if let Some(hi) = hi {
                hash_value(hi, state);
            }
        }
        Value::Type(t) => t.name.word().hash(state),
        Value::Void | Value::Any => {}
        // Functions, boxes, quotes, compound types, internals: never
        // meaningfully key-equal by structural value, so fall back to a
        // pointer-identity-ish hash via their discriminant only. Two
        // distinct such values may collide in a hash bucket but `eqv?`
        // (used for actual equality) will still tell them apart correctly.
        Value::CompoundType(_)
        | Value::Quote(_)
        | Value::Function(_)
        | Value::Box(_)
        | Value::BoxInstance(_)
        | Value::Internal(_) => {}
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => {
                if *n.denom() == 1 {
                    write!(f, "{}", n.numer())
                } else {
                    write!(f, "{}/{}", n.numer(), n.denom())
                }
            }
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Vec(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k.0, v)?;
                }
                write!(f, "}}")
            }
            Value::Regex(r) => write!(f, "`{}`", r.source),
            Value::Range(lo, hi) => {
                write!(f, "{}..{}", opt(lo), opt(hi))
            }
            Value::Type(t) => write!(f, "{}", t.name.word()),
            Value::CompoundType(c) => write!(f, "{}(...)", c.lead.name.word()),
            Value::Any => write!(f, "any"),
            Value::Quote(_) => write!(f, "<quote>"),
            Value::Function(func) => write!(f, "{}", func.name()),
            Value::Box(b) => write!(f, "<box {}>", b.name),
            Value::BoxInstance(b) => write!(f, "<box-instance {}>", b.parent.name),
            Value::Internal(i) => write!(f, "<internal {}>", i.name),
            Value::Void => write!(f, "void"),
        }
    }
}

/// Structural equality delegates to `eqv?` (§3.3: "equality is deep and
/// element-wise"), so `Value` can be compared directly in tests and in
/// `MapKey`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        crate::ops::eqv(self, other)
    }
}

fn opt(v: &Option<Box<Value>>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Host hooks for side-effecting builtins (`say`, `ask`, `slurp`, `burp`,
/// `write`, §6 baked basis). Kept as a trait so `ven-core` values can
/// reference a builtin without depending on the VM that executes it.
pub trait Host {
    fn say(&mut self, text: &str);
    fn write(&mut self, text: &str);
    fn ask(&mut self) -> Option<String>;
    fn slurp(&mut self, path: &str) -> Result<String, VenError>;
    fn burp(&mut self, path: &str, content: &str) -> Result<(), VenError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_add_variant_later_wins_on_tie() {
        let mut g = Generic::new(Rc::from("f"));
        let mk = |n: &str| {
            Rc::new(Concrete {
                name: Rc::from(n),
                params: vec![],
                body: ChunkId(0),
                slurpy: false,
                general: false,
                file: Rc::from("a.ven"),
                line: 1,
            })
        };
        g.add_variant(mk("first"));
        g.add_variant(mk("second"));
        assert_eq!(g.variants[0].name.as_ref(), "second");
    }

    #[test]
    fn generic_sorts_arity_desc_strict_before_general() {
        let mut g = Generic::new(Rc::from("f"));
        let mk = |arity: usize, general: bool| {
            Rc::new(Concrete {
                name: Rc::from("f"),
                params: (0..arity)
                    .map(|i| ConstrainedParam {
                        name: Rc::from(format!("p{i}")),
                        constraint: None,
                    })
                    .collect(),
                body: ChunkId(0),
                slurpy: false,
                general,
                file: Rc::from("a.ven"),
                line: 1,
            })
        };
        g.add_variant(mk(1, false));
        g.add_variant(mk(2, true));
        g.add_variant(mk(2, false));
        assert_eq!(g.variants[0].arity(), 2);
        assert!(!g.variants[0].general);
        assert!(g.variants[1].general);
        assert_eq!(g.variants[2].arity(), 1);
    }
}
