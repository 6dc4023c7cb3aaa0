//! The Compiler (§4.3): lowers quotes into bytecode chunks.
//!
//! `given`-clause constraint expressions are evaluated once, here, at
//! compile time — by the shared `crate::readtime` evaluator — and the
//! resulting `Constraint` values are baked straight into the `DefineFun`/
//! `DefineBox` op rather than re-evaluated on every call.

pub mod op;

use std::rc::Rc;

use ven_core::{BinaryOp, ChunkId, Constraint, Quote, QuoteKind, ReturnKind, Value, VenError};

pub use op::{Chunk, ChunkTable, Op};

pub struct CompileUnit {
    pub chunks: ChunkTable,
    pub entry: ChunkId,
}

/// Compile a top-level program (a Read unit's quotes) into a chunk table
/// plus the entry chunk id.
pub fn compile_program(quotes: &[Quote], file: Rc<str>) -> Result<CompileUnit, VenError> {
    let mut compiler = Compiler::new(file.clone());
    let entry = compiler.new_chunk("main");
    compiler.compile_block(entry, quotes)?;
    let line = quotes.last().map(|q| q.line()).unwrap_or(1);
    compiler.emit(entry, Op::Return, line);
    Ok(CompileUnit { chunks: compiler.chunks, entry })
}

struct LoopCtx {
    label: Option<Rc<str>>,
    /// Indices of `Jump` placeholders emitted by a `next` targeting this
    /// loop; patched once the loop's continue point is known.
    pending_next: Vec<usize>,
}

struct Compiler {
    chunks: ChunkTable,
    file: Rc<str>,
    loops: Vec<LoopCtx>,
}

impl Compiler {
    fn new(file: Rc<str>) -> Self {
        Self {
            chunks: ChunkTable::new(),
            file,
            loops: Vec::new(),
        }
    }

    fn new_chunk(&mut self, name: &str) -> ChunkId {
        self.chunks.insert(Chunk::new(self.file.clone(), Rc::from(name)))
    }

    fn emit(&mut self, id: ChunkId, op: Op, line: u32) -> usize {
        self.chunks.get_mut(id).emit(op, line)
    }

    fn here(&self, id: ChunkId) -> usize {
        self.chunks.get(id).here()
    }

    fn patch(&mut self, id: ChunkId, at: usize, target: usize) {
        self.chunks.get_mut(id).patch_jump(at, target);
    }

    fn err(&self, line: u32, message: impl Into<String>) -> VenError {
        VenError::compile(self.file.to_string(), line, message.into())
    }

    // ------------------------------------------------------------ sequencing

    fn compile_block(&mut self, id: ChunkId, stmts: &[Quote]) -> Result<(), VenError> {
        if stmts.is_empty() {
            self.emit(id, Op::PushVoid, 1);
            return Ok(());
        }
        for (i, stmt) in stmts.iter().enumerate() {
            self.compile_expr(id, stmt)?;
            if i + 1 < stmts.len() {
                self.emit(id, Op::Pop, stmt.line());
            }
        }
        Ok(())
    }

    /// Compiles a brace block (`QuoteKind::Block`) or a single expression
    /// used where a block is expected, wrapping its own scope.
    fn compile_scoped_block(&mut self, id: ChunkId, q: &Quote) -> Result<(), VenError> {
        self.emit(id, Op::EnterScope, q.line());
        match &q.kind {
            QuoteKind::Block(stmts) => self.compile_block(id, stmts)?,
            _ => self.compile_expr(id, q)?,
        }
        self.emit(id, Op::ExitScope, q.line());
        Ok(())
    }

    // -------------------------------------------------------------- exprs

    fn compile_expr(&mut self, id: ChunkId, q: &Quote) -> Result<(), VenError> {
        let line = q.line();
        match &q.kind {
            QuoteKind::Symbol(name) => {
                self.emit(id, Op::LoadName(name.clone()), line);
            }
            QuoteKind::String(s) => {
                self.emit(id, Op::PushStr(s.clone()), line);
            }
            QuoteKind::Number(s) => {
                let n = ven_core::ops::parse_num(s)
                    .ok_or_else(|| self.err(line, format!("invalid number literal '{s}'")))?;
                self.emit(id, Op::PushNum(n), line);
            }
            QuoteKind::Regex(s) => {
                self.emit(id, Op::PushRegex(s.clone()), line);
            }
            QuoteKind::True => {
                self.emit(id, Op::PushBool(true), line);
            }
            QuoteKind::False => {
                self.emit(id, Op::PushBool(false), line);
            }
            QuoteKind::Void => {
                self.emit(id, Op::PushVoid, line);
            }
            QuoteKind::UPop => {
                self.emit(id, Op::Upop, line);
            }
            QuoteKind::URef => {
                self.emit(id, Op::Uref, line);
            }
            QuoteKind::Vector(items, spread) => {
                for item in items {
                    self.compile_expr(id, item)?;
                }
                if let Some(spread) = spread {
                    self.compile_expr(id, spread)?;
                }
                self.emit(id, Op::MakeVec { count: items.len(), spread: spread.is_some() }, line);
            }
            QuoteKind::Map(entries) => {
                for (k, v) in entries {
                    self.compile_expr(id, k)?;
                    self.compile_expr(id, v)?;
                }
                self.emit(id, Op::MakeMap { count: entries.len() }, line);
            }
            QuoteKind::Range(lo, hi) => {
                if let Some(lo) = lo {
                    self.compile_expr(id, lo)?;
                }
                if let Some(hi) = hi {
                    self.compile_expr(id, hi)?;
                }
                self.emit(id, Op::MakeRange { has_lo: lo.is_some(), has_hi: hi.is_some() }, line);
            }
            QuoteKind::Unary(op, operand) => {
                self.compile_expr(id, operand)?;
                self.emit(id, Op::Unary(*op), line);
            }
            QuoteKind::Binary(BinaryOp::And, left, right) => {
                self.compile_expr(id, left)?;
                self.emit(id, Op::Dup, line);
                let jump = self.emit(id, Op::JumpIfFalse(0), line);
                self.emit(id, Op::Pop, line);
                self.compile_expr(id, right)?;
                let end = self.here(id);
                self.patch(id, jump, end);
            }
            QuoteKind::Binary(BinaryOp::Or, left, right) => {
                self.compile_expr(id, left)?;
                self.emit(id, Op::Dup, line);
                let jump = self.emit(id, Op::JumpIfTrue(0), line);
                self.emit(id, Op::Pop, line);
                self.compile_expr(id, right)?;
                let end = self.here(id);
                self.patch(id, jump, end);
            }
            QuoteKind::Binary(op, left, right) => {
                self.compile_expr(id, left)?;
                self.compile_expr(id, right)?;
                self.emit(id, Op::Binary(*op), line);
            }
            QuoteKind::IntoBool(inner) => {
                self.compile_expr(id, inner)?;
                self.emit(id, Op::CoerceBool, line);
            }
            QuoteKind::Call(callee, args) => {
                self.compile_expr(id, callee)?;
                for arg in args {
                    self.compile_expr(id, arg)?;
                }
                self.emit(id, Op::Call(args.len()), line);
            }
            QuoteKind::Assign(target, value, is_local) => {
                self.compile_assign(id, target, value, *is_local, line)?;
            }
            QuoteKind::BinaryAssign(op, target, value) => {
                self.compile_binary_assign(id, *op, target, value, line)?;
            }
            QuoteKind::AccessField(target, steps) => {
                self.compile_expr(id, target)?;
                let names = steps.iter().map(|s| s.name.clone()).collect();
                self.emit(id, Op::AccessField(names), line);
            }
            QuoteKind::Access(target, args) => {
                if args.len() != 1 {
                    return Err(self.err(line, "subscript takes exactly one index"));
                }
                self.compile_expr(id, target)?;
                self.compile_expr(id, &args[0])?;
                self.emit(id, Op::Access, line);
            }
            QuoteKind::ReturnIncrement(target) | QuoteKind::ReturnDecrement(target) => {
                let delta = if matches!(q.kind, QuoteKind::ReturnIncrement(_)) { 1 } else { -1 };
                let name = match &target.kind {
                    QuoteKind::Symbol(name) => name.clone(),
                    _ => return Err(self.err(line, "++/-- apply only to a plain name")),
                };
                self.emit(id, Op::PostStep { name, delta }, line);
            }
            QuoteKind::Block(_) => self.compile_scoped_block(id, q)?,
            QuoteKind::If(cond, then_branch, else_branch) => {
                self.compile_expr(id, cond)?;
                self.emit(id, Op::CoerceBool, line);
                let else_jump = self.emit(id, Op::JumpIfFalse(0), line);
                self.compile_scoped_block(id, then_branch)?;
                let end_jump = self.emit(id, Op::Jump(0), line);
                let else_target = self.here(id);
                self.patch(id, else_jump, else_target);
                match else_branch {
                    Some(branch) => self.compile_scoped_block(id, branch)?,
                    None => {
                        self.emit(id, Op::PushVoid, line);
                    }
                }
                let end = self.here(id);
                self.patch(id, end_jump, end);
            }
            QuoteKind::Ensure(inner) => {
                self.compile_expr(id, inner)?;
                self.emit(id, Op::Ensure, line);
            }
            QuoteKind::Queue(inner) => {
                self.compile_expr(id, inner)?;
                self.emit(id, Op::QueuePush, line);
                self.emit(id, Op::PushVoid, line);
            }
            QuoteKind::Next(label, values) => {
                for value in values {
                    self.compile_expr(id, value)?;
                    self.emit(id, Op::QueuePush, line);
                }
                let jump = self.emit(id, Op::Jump(0), line);
                self.register_next(label.clone(), jump, line)?;
                self.emit(id, Op::PushVoid, line);
            }
            QuoteKind::Return(inner, kind) => {
                match kind {
                    ReturnKind::Queue => {
                        self.emit(id, Op::ReturnQueue, line);
                    }
                    ReturnKind::Plain => {
                        self.compile_expr(id, inner)?;
                        self.emit(id, Op::Return, line);
                    }
                }
                self.emit(id, Op::PushVoid, line);
            }
            QuoteKind::InfiniteLoop(body) => self.compile_infinite_loop(id, body, line)?,
            QuoteKind::BaseLoop(cond, body) => self.compile_base_loop(id, cond, body, line)?,
            QuoteKind::StepLoop(name, init, cond, step, body) => {
                self.compile_step_loop(id, Some(name.clone()), Some(init), cond, Some(step), body, line)?
            }
            QuoteKind::ComplexLoop { base, cond, step, body } => {
                self.compile_step_loop(id, None, base.as_deref(), cond, step.as_deref(), body, line)?
            }
            QuoteKind::Dies(inner) => {
                let sub = self.new_chunk("dies");
                self.compile_expr(sub, inner)?;
                self.emit(sub, Op::Return, line);
                self.emit(id, Op::Dies(sub), line);
            }
            QuoteKind::Lambda { params, slurpy, body } => {
                let sub = self.new_chunk("lambda");
                self.compile_function_body(sub, body)?;
                self.emit(
                    id,
                    Op::MakeLambda { target: sub, params: params.clone(), slurpy: *slurpy },
                    line,
                );
            }
            QuoteKind::Fun { name, params, body, given, slurpy } => {
                self.compile_fun(id, name, params, body, given.as_deref(), *slurpy, line)?;
                self.emit(id, Op::PushVoid, line);
            }
            QuoteKind::Box { name, params, given, namespace } => {
                self.compile_box(id, name, params, given, namespace, line)?;
                self.emit(id, Op::PushVoid, line);
            }
            QuoteKind::Immediate(inner) | QuoteKind::PatternEnvelope(inner) => {
                self.compile_expr(id, inner)?;
            }
            QuoteKind::LambdaSpread(callee, target, reduce) => {
                self.compile_expr(id, callee)?;
                self.compile_expr(id, target)?;
                self.emit(id, Op::SpreadCall { reduce: *reduce }, line);
            }
            QuoteKind::BinarySpread(op, target) => {
                self.compile_expr(id, target)?;
                self.emit(id, Op::FoldBinary(*op), line);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------ assign

    fn compile_assign(
        &mut self,
        id: ChunkId,
        target: &Quote,
        value: &Quote,
        is_local: bool,
        line: u32,
    ) -> Result<(), VenError> {
        match &target.kind {
            QuoteKind::Symbol(name) => {
                self.compile_expr(id, value)?;
                self.emit(id, Op::Dup, line);
                if is_local {
                    self.emit(id, Op::DefineLocal(name.clone()), line);
                } else {
                    self.emit(id, Op::StoreBound(name.clone()), line);
                }
            }
            QuoteKind::AccessField(base, steps) => {
                self.compile_expr(id, base)?;
                self.compile_expr(id, value)?;
                let names = steps.iter().map(|s| s.name.clone()).collect();
                self.emit(id, Op::StoreField(names), line);
            }
            QuoteKind::Access(base, args) => {
                if args.len() != 1 {
                    return Err(self.err(line, "subscript assignment takes exactly one index"));
                }
                self.compile_expr(id, value)?;
                self.compile_expr(id, base)?;
                self.compile_expr(id, &args[0])?;
                self.emit(id, Op::StoreAccess, line);
            }
            _ => return Err(self.err(line, "invalid assignment target")),
        }
        Ok(())
    }

    fn compile_binary_assign(
        &mut self,
        id: ChunkId,
        op: BinaryOp,
        target: &Quote,
        value: &Quote,
        line: u32,
    ) -> Result<(), VenError> {
        match &target.kind {
            QuoteKind::Symbol(name) => {
                self.emit(id, Op::LoadName(name.clone()), line);
                self.compile_expr(id, value)?;
                self.emit(id, Op::Binary(op), line);
                self.emit(id, Op::Dup, line);
                self.emit(id, Op::StoreBound(name.clone()), line);
            }
            QuoteKind::AccessField(base, steps) => {
                let names: Vec<Rc<str>> = steps.iter().map(|s| s.name.clone()).collect();
                self.compile_expr(id, base)?;
                self.emit(id, Op::Dup, line);
                self.emit(id, Op::AccessField(names.clone()), line);
                self.compile_expr(id, value)?;
                self.emit(id, Op::Binary(op), line);
                self.emit(id, Op::StoreField(names), line);
            }
            QuoteKind::Access(base, args) => {
                if args.len() != 1 {
                    return Err(self.err(line, "subscript assignment takes exactly one index"));
                }
                self.compile_expr(id, base)?;
                self.compile_expr(id, &args[0])?;
                self.emit(id, Op::Access, line);
                self.compile_expr(id, value)?;
                self.emit(id, Op::Binary(op), line);
                // Subscript targets are re-evaluated: `Access` consumes both
                // base and index reading the old value, so storing the new
                // one needs them compiled again.
                self.compile_expr(id, base)?;
                self.compile_expr(id, &args[0])?;
                self.emit(id, Op::StoreAccess, line);
            }
            _ => return Err(self.err(line, "invalid compound-assignment target")),
        }
        Ok(())
    }

    // -------------------------------------------------------------- loops

    fn register_next(&mut self, label: Option<Rc<str>>, jump_idx: usize, line: u32) -> Result<(), VenError> {
        let ctx = match &label {
            Some(l) => self.loops.iter_mut().rev().find(|c| c.label.as_deref() == Some(l.as_ref())),
            None => self.loops.last_mut(),
        };
        match ctx {
            Some(ctx) => {
                ctx.pending_next.push(jump_idx);
                Ok(())
            }
            None => Err(self.err(
                line,
                match label {
                    Some(l) => format!("no enclosing loop labeled '{l}'"),
                    None => "'next' outside of a loop".to_string(),
                },
            )),
        }
    }

    fn finish_loop(&mut self, id: ChunkId, continue_target: usize) {
        let ctx = self.loops.pop().expect("loop context pushed");
        for at in ctx.pending_next {
            self.patch(id, at, continue_target);
        }
    }

    fn compile_infinite_loop(&mut self, id: ChunkId, body: &Quote, line: u32) -> Result<(), VenError> {
        self.loops.push(LoopCtx { label: None, pending_next: Vec::new() });
        let start = self.here(id);
        self.compile_scoped_block(id, body)?;
        self.emit(id, Op::Pop, line);
        self.emit(id, Op::Jump(start), line);
        self.finish_loop(id, start);
        self.emit(id, Op::PushVoid, line);
        Ok(())
    }

    fn compile_base_loop(&mut self, id: ChunkId, cond: &Quote, body: &Quote, line: u32) -> Result<(), VenError> {
        self.loops.push(LoopCtx { label: None, pending_next: Vec::new() });
        let start = self.here(id);
        self.compile_expr(id, cond)?;
        self.emit(id, Op::CoerceBool, line);
        let exit = self.emit(id, Op::JumpIfFalse(0), line);
        self.compile_scoped_block(id, body)?;
        self.emit(id, Op::Pop, line);
        self.emit(id, Op::Jump(start), line);
        let end = self.here(id);
        self.patch(id, exit, end);
        self.finish_loop(id, start);
        self.emit(id, Op::PushVoid, line);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_step_loop(
        &mut self,
        id: ChunkId,
        name: Option<Rc<str>>,
        init: Option<&Quote>,
        cond: &Quote,
        step: Option<&Quote>,
        body: &Quote,
        line: u32,
    ) -> Result<(), VenError> {
        self.emit(id, Op::EnterScope, line);
        if let Some(init) = init {
            self.compile_expr(id, init)?;
        } else {
            self.emit(id, Op::PushVoid, line);
        }
        if let Some(name) = &name {
            self.emit(id, Op::DefineLocal(name.clone()), line);
        } else {
            self.emit(id, Op::Pop, line);
        }
        self.loops.push(LoopCtx { label: name, pending_next: Vec::new() });
        let cond_start = self.here(id);
        self.compile_expr(id, cond)?;
        self.emit(id, Op::CoerceBool, line);
        let exit = self.emit(id, Op::JumpIfFalse(0), line);
        self.compile_scoped_block(id, body)?;
        self.emit(id, Op::Pop, line);
        let step_target = self.here(id);
        if let Some(step) = step {
            self.compile_expr(id, step)?;
            self.emit(id, Op::Pop, line);
        }
        self.emit(id, Op::Jump(cond_start), line);
        let end = self.here(id);
        self.patch(id, exit, end);
        // `next` re-enters at the step (if any), otherwise straight to the
        // condition re-check.
        let continue_target = if step.is_some() { step_target } else { cond_start };
        self.finish_loop(id, continue_target);
        self.emit(id, Op::ExitScope, line);
        self.emit(id, Op::PushVoid, line);
        Ok(())
    }

    // ------------------------------------------------------------ fun/box

    fn compile_function_body(&mut self, id: ChunkId, body: &Quote) -> Result<(), VenError> {
        match &body.kind {
            QuoteKind::Block(stmts) => self.compile_block(id, stmts)?,
            _ => self.compile_expr(id, body)?,
        }
        let line = body.line();
        self.emit(id, Op::Return, line);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_fun(
        &mut self,
        id: ChunkId,
        name: &Rc<str>,
        params: &[ven_core::ConstrainedParamQ],
        body: &Quote,
        given: Option<&Quote>,
        slurpy: bool,
        line: u32,
    ) -> Result<(), VenError> {
        let given_values = match given {
            Some(given_vec) => eval_readtime_vector(&self.file, given_vec)?,
            None => Vec::new(),
        };
        let mut constraints = Vec::with_capacity(params.len());
        for (i, p) in params.iter().enumerate() {
            let constraint = match &p.constraint {
                Some(expr) => Some(constraint_from_value(eval_readtime(&self.file, expr)?)),
                None => given_values.get(i).cloned().map(constraint_from_value),
            };
            constraints.push(constraint);
        }
        let general = constraints.iter().all(Option::is_none);
        let sub = self.new_chunk(name.as_ref());
        self.compile_function_body(sub, body)?;
        self.emit(
            id,
            Op::DefineFun {
                name: name.clone(),
                params: params.iter().map(|p| p.name.clone()).collect(),
                constraints,
                slurpy,
                target: sub,
                general,
            },
            line,
        );
        Ok(())
    }

    fn compile_box(
        &mut self,
        id: ChunkId,
        name: &Rc<str>,
        params: &[Rc<str>],
        given: &[Quote],
        namespace: &[Quote],
        line: u32,
    ) -> Result<(), VenError> {
        let mut constraints = Vec::with_capacity(params.len());
        for (i, _) in params.iter().enumerate() {
            let constraint = match given.get(i) {
                Some(expr) => Some(constraint_from_value(eval_readtime(&self.file, expr)?)),
                None => None,
            };
            constraints.push(constraint);
        }
        let sub = self.new_chunk(&format!("{name}#namespace"));
        self.compile_block(sub, namespace)?;
        let ns_line = namespace.last().map(|q| q.line()).unwrap_or(line);
        self.emit(sub, Op::Return, ns_line);
        self.emit(
            id,
            Op::DefineBox {
                name: name.clone(),
                params: params.to_vec(),
                constraints,
                namespace: sub,
            },
            line,
        );
        Ok(())
    }
}

/// Evaluate a `given`-clause expression at compile time using the shared
/// readtime evaluator. Error positions are approximate (a scratch reader
/// carries no live token stream), which is an accepted limitation: what
/// matters is the value the constraint evaluates to, not a pinpoint column.
fn eval_readtime(file: &Rc<str>, expr: &Quote) -> Result<Value, VenError> {
    let tokens = crate::lexer::Lexer::new(file.clone(), "").tokenize()?;
    let scratch = crate::reader::Reader::new(file.clone(), tokens);
    crate::readtime::eval_expr(&scratch, expr)
}

fn eval_readtime_vector(file: &Rc<str>, expr: &Quote) -> Result<Vec<Value>, VenError> {
    match &expr.kind {
        QuoteKind::Vector(items, _) => items.iter().map(|i| eval_readtime(file, i)).collect(),
        _ => Ok(vec![eval_readtime(file, expr)?]),
    }
}

fn constraint_from_value(value: Value) -> Constraint {
    match value {
        Value::Type(t) => Constraint::Type(t),
        Value::CompoundType(c) => Constraint::Compound(c),
        other => Constraint::Value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;
    use ven_core::{TypeName, TypeValue};

    #[test]
    fn compiles_arithmetic_to_main_chunk() {
        let unit = Reader::read("1 + 2 * 3;", "t.ven").unwrap();
        let compiled = compile_program(&unit.quotes, Rc::from("t.ven")).unwrap();
        let chunk = compiled.chunks.get(compiled.entry);
        assert!(matches!(chunk.ops.last(), Some(Op::Return)));
        assert!(chunk.ops.iter().any(|op| matches!(op, Op::Binary(BinaryOp::Mul))));
        assert!(chunk.ops.iter().any(|op| matches!(op, Op::Binary(BinaryOp::Add))));
    }

    #[test]
    fn compiles_fun_decl_with_inline_constraint() {
        let unit = Reader::read("fun add(a: num, b: num) { a + b };", "t.ven").unwrap();
        let compiled = compile_program(&unit.quotes, Rc::from("t.ven")).unwrap();
        let chunk = compiled.chunks.get(compiled.entry);
        let def = chunk.ops.iter().find_map(|op| match op {
            Op::DefineFun { constraints, .. } => Some(constraints.clone()),
            _ => None,
        });
        let constraints = def.expect("DefineFun op emitted");
        assert_eq!(constraints.len(), 2);
        assert!(matches!(constraints[0], Some(Constraint::Type(TypeValue { name: TypeName::Num }))));
    }

    #[test]
    fn compiles_if_with_jump_patching() {
        let unit = Reader::read("if true { 1 } else { 2 };", "t.ven").unwrap();
        let compiled = compile_program(&unit.quotes, Rc::from("t.ven")).unwrap();
        let chunk = compiled.chunks.get(compiled.entry);
        assert!(chunk.ops.iter().any(|op| matches!(op, Op::JumpIfFalse(_))));
    }

    #[test]
    fn rejects_next_outside_loop() {
        let unit = Reader::read("next;", "t.ven").unwrap();
        let err = compile_program(&unit.quotes, Rc::from("t.ven")).unwrap_err();
        assert!(matches!(err, VenError::Compile { .. }));
    }
}
