//! Bytecode (§4.3). Scope slots are name-keyed (see `ven_core::scope::Scope`)
//! so the op set never needs indexed locals — every read/write names its
//! target directly and the VM resolves it against the live scope chain.

use std::rc::Rc;

use ven_core::{BinaryOp, ChunkId, Constraint, Num, UnaryOp};

#[derive(Debug, Clone)]
pub enum Op {
    /// Placeholder left behind by the optimizer; removed by a final
    /// compaction pass that also rewrites jump targets.
    Nop,

    PushNum(Num),
    PushStr(Rc<str>),
    PushRegex(Rc<str>),
    PushBool(bool),
    PushVoid,
    PushAny,

    LoadName(Rc<str>),
    DefineLocal(Rc<str>),
    StoreBound(Rc<str>),

    Upop,
    Uref,

    /// Build a vector from the top `count` stack values (bottom to top);
    /// if `spread` a trailing vector value is appended element-wise.
    MakeVec { count: usize, spread: bool },
    /// Build a map from `count` key/value pairs on the stack (key then value,
    /// repeated, bottom to top).
    MakeMap { count: usize },
    /// Pops (if present) high then low bound, per the flags.
    MakeRange { has_lo: bool, has_hi: bool },

    Unary(UnaryOp),
    Binary(BinaryOp),

    /// `|op| vec` (§4.1 spread, fold form). Pops a vector, left-folds it
    /// with `op`, pushes the result (void on an empty vector).
    FoldBinary(BinaryOp),
    /// `|fn| vec` (map) or `|fn|/ vec` (reduce). Pops a vector and a
    /// callable; the VM calls it per element (map) or pairwise (reduce).
    SpreadCall { reduce: bool },

    /// `a.b.c` — chained field lookups.
    AccessField(Vec<Rc<str>>),
    /// `a[i]` — subscript.
    Access,
    /// Stack (top→bottom): value, base. Writes `base.<steps> = value`,
    /// pushes value back.
    StoreField(Vec<Rc<str>>),
    /// Stack (top→bottom): index, base, value. Writes `base[index] = value`,
    /// pushes value back.
    StoreAccess,

    /// Truthiness coercion (§4.2 `IntoBool`), used where the language
    /// implicitly narrows a condition to a `Bool`.
    CoerceBool,

    Pop,
    Dup,

    Jump(usize),
    JumpIfFalse(usize),
    JumpIfTrue(usize),

    /// Calls the callee on top of the stack with `argc` arguments below it.
    Call(usize),

    /// Push a step-wise increment/decrement of a bound name, leaving the
    /// *old* value on the stack (§3: `++`/`--` are postfix and return-old).
    PostStep { name: Rc<str>, delta: i64 },

    EnterScope,
    ExitScope,

    MakeLambda { target: ChunkId, params: Vec<Rc<str>>, slurpy: bool },
    /// Builds a `Concrete` from already (compile-time) resolved constraints
    /// and merges it into the `Generic` bound to `name` in the current
    /// scope, creating that `Generic` on first use.
    DefineFun {
        name: Rc<str>,
        params: Vec<Rc<str>>,
        constraints: Vec<Option<Constraint>>,
        slurpy: bool,
        target: ChunkId,
        general: bool,
    },
    DefineBox {
        name: Rc<str>,
        params: Vec<Rc<str>>,
        constraints: Vec<Option<Constraint>>,
        namespace: ChunkId,
    },

    /// Runs `target` in an error-guarded sub-call and pushes whether it died.
    Dies(ChunkId),
    /// Pops a value, raises a `RuntimeError` if it is falsy.
    Ensure,

    QueuePush,
    /// Clears the current queue frame and pushes it as a vector.
    QueueTake,

    Return,
    /// Pops nothing; returns the current queue (same as `return queue`).
    ReturnQueue,

}

impl Op {
    /// Shifts every embedded `ChunkId` by `offset`, used when splicing one
    /// unit's chunk table into a program-wide one (§2 Program Pipeline:
    /// "merges chunk pools across exposed units").
    fn remap_chunk_ids(&mut self, offset: usize) {
        match self {
            Op::MakeLambda { target, .. } => target.0 += offset,
            Op::DefineFun { target, .. } => target.0 += offset,
            Op::DefineBox { namespace, .. } => namespace.0 += offset,
            Op::Dies(target) => target.0 += offset,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub ops: Vec<Op>,
    pub file: Rc<str>,
    /// Parallel to `ops`: the source line each op was compiled from, used to
    /// build `VenError` trace frames without re-walking quotes at runtime.
    pub lines: Vec<u32>,
    pub name: Rc<str>,
}

impl Chunk {
    pub fn new(file: Rc<str>, name: Rc<str>) -> Self {
        Self {
            ops: Vec::new(),
            file,
            lines: Vec::new(),
            name,
        }
    }

    pub fn emit(&mut self, op: Op, line: u32) -> usize {
        self.ops.push(op);
        self.lines.push(line);
        self.ops.len() - 1
    }

    pub fn patch_jump(&mut self, at: usize, target: usize) {
        match &mut self.ops[at] {
            Op::Jump(t) | Op::JumpIfFalse(t) | Op::JumpIfTrue(t) => *t = target,
            _ => panic!("patch_jump: op at {at} is not a jump"),
        }
    }

    pub fn here(&self) -> usize {
        self.ops.len()
    }

    /// Drops every `Nop` left by the optimizer and rewrites jump targets to
    /// match. A jump that targeted a now-removed instruction lands on
    /// whatever surviving instruction comes next, which is exactly the
    /// "fall through the hole" semantics a peephole pass wants.
    pub fn compact(&mut self) {
        let mut mapping = vec![0usize; self.ops.len() + 1];
        let mut new_len = 0;
        for (i, op) in self.ops.iter().enumerate() {
            mapping[i] = new_len;
            if !matches!(op, Op::Nop) {
                new_len += 1;
            }
        }
        mapping[self.ops.len()] = new_len;

        let old_lines = std::mem::take(&mut self.lines);
        let mut new_ops = Vec::with_capacity(new_len);
        let mut new_lines = Vec::with_capacity(new_len);
        for (i, mut op) in self.ops.drain(..).enumerate() {
            if matches!(op, Op::Nop) {
                continue;
            }
            match &mut op {
                Op::Jump(t) | Op::JumpIfFalse(t) | Op::JumpIfTrue(t) => *t = mapping[*t],
                _ => {}
            }
            new_ops.push(op);
            new_lines.push(old_lines[i]);
        }
        self.ops = new_ops;
        self.lines = new_lines;
    }

    fn remap_chunk_ids(&mut self, offset: usize) {
        for op in &mut self.ops {
            op.remap_chunk_ids(offset);
        }
    }
}

/// Every chunk ever compiled, addressed by the `ChunkId` handles `ven-core`
/// values carry (keeps `ven-core` free of a dependency on `ven-compiler`).
#[derive(Debug, Default)]
pub struct ChunkTable {
    chunks: Vec<Chunk>,
}

impl ChunkTable {
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    pub fn insert(&mut self, chunk: Chunk) -> ChunkId {
        self.chunks.push(chunk);
        ChunkId(self.chunks.len() - 1)
    }

    pub fn get(&self, id: ChunkId) -> &Chunk {
        &self.chunks[id.0]
    }

    pub fn get_mut(&mut self, id: ChunkId) -> &mut Chunk {
        &mut self.chunks[id.0]
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Splices `other`'s chunks onto the end of `self`, rewriting every
    /// `ChunkId` `other`'s ops embed so they still point at the right chunk
    /// in the merged table. Returns the offset applied, so the caller can
    /// remap any `ChunkId` it held onto separately (e.g. a unit's entry).
    pub fn merge(&mut self, other: ChunkTable) -> usize {
        let offset = self.chunks.len();
        for mut chunk in other.chunks {
            chunk.remap_chunk_ids(offset);
            self.chunks.push(chunk);
        }
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_remaps_embedded_chunk_ids() {
        let mut a = ChunkTable::new();
        a.insert(Chunk::new(Rc::from("a.ven"), Rc::from("main")));

        let mut b = ChunkTable::new();
        let target = b.insert(Chunk::new(Rc::from("b.ven"), Rc::from("lambda")));
        let mut caller = Chunk::new(Rc::from("b.ven"), Rc::from("main"));
        caller.emit(
            Op::MakeLambda { target, params: vec![], slurpy: false },
            1,
        );
        let caller_id = b.insert(caller);

        let offset = a.merge(b);
        let merged_target = ChunkId(target.0 + offset);
        let merged_caller = a.get(ChunkId(caller_id.0 + offset));
        assert!(matches!(
            merged_caller.ops[0],
            Op::MakeLambda { target: t, .. } if t == merged_target
        ));
    }
}
