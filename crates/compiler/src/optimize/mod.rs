//! The Optimizer (§4.4): a fixed-point peephole optimizer over compiled
//! chunks. Every pass only ever turns an `Op` into `Op::Nop` or narrows a
//! jump target — it never shifts indices mid-pass — so a single `compact()`
//! at the end of each chunk's fixed point is enough to restore a dense op
//! stream with correct jump targets.
//!
//! Passes share `ven_core::ops` with the readtime evaluator and the VM, so
//! folding a constant expression here can never disagree with what running
//! it would have produced (the idempotence property: optimizing an already
//! optimal chunk is a no-op).

use ven_core::{BinaryOp, Value};

use crate::compile::{Chunk, ChunkTable, Op};

/// Run every pass to a fixed point (bounded, so a pass bug can't hang the
/// compiler) on every chunk, then compact. `level` mirrors the CLI's `-O`:
/// `0` skips optimization entirely, higher values are accepted but the pass
/// set doesn't currently scale with it beyond "on".
pub fn optimize(table: &mut ChunkTable, level: u32) {
    if level == 0 {
        return;
    }
    for id in 0..table.len() {
        let chunk = table.get_mut(ven_core::ChunkId(id));
        run_fixed_point(chunk);
        chunk.compact();
    }
}

const MAX_ROUNDS: usize = 64;

fn run_fixed_point(chunk: &mut Chunk) {
    for _ in 0..MAX_ROUNDS {
        let mut changed = false;
        changed |= fold_constants(chunk);
        changed |= thread_jumps(chunk);
        changed |= eliminate_constant_branches(chunk);
        changed |= cancel_dup_pop(chunk);
        changed |= strip_dead_code(chunk);
        changed |= collapse_coerce_bool(chunk);
        if !changed {
            break;
        }
        // Peepholes match on textual adjacency; compact the `Nop`s this
        // round produced so the next round sees dense, adjacent ops again.
        chunk.compact();
    }
}

fn jump_targets(chunk: &Chunk) -> std::collections::HashSet<usize> {
    chunk
        .ops
        .iter()
        .filter_map(|op| match op {
            Op::Jump(t) | Op::JumpIfFalse(t) | Op::JumpIfTrue(t) => Some(*t),
            _ => None,
        })
        .collect()
}

/// `[PushX, PushY, Binary(op)]` → `[Nop, Nop, PushResult]`, likewise for
/// `[PushX, Unary(op)]`. Only folds when no other jump lands between the
/// pushes and the operator (folding across a jump target would be unsound:
/// something else might branch in expecting the pushes to have happened).
fn fold_constants(chunk: &mut Chunk) -> bool {
    let targets = jump_targets(chunk);
    let mut changed = false;
    let mut i = 0;
    while i < chunk.ops.len() {
        if let Op::Unary(op) = chunk.ops[i] {
            if i >= 1 && !targets.contains(&i) {
                if let Some(operand) = const_value(&chunk.ops[i - 1]) {
                    if let Ok(result) = ven_core::ops::apply_unary(op, &operand) {
                        if let Some(folded) = value_to_push(&result) {
                            chunk.ops[i - 1] = Op::Nop;
                            chunk.ops[i] = folded;
                            changed = true;
                        }
                    }
                }
            }
        }
        if let Op::Binary(op) = chunk.ops[i] {
            if matches!(op, BinaryOp::And | BinaryOp::Or) {
                // short-circuit forms are compiled with jumps, not a plain
                // `Binary` op; nothing to fold here.
            } else if i >= 2 && !targets.contains(&i) && !targets.contains(&(i - 1)) {
                if let (Some(l), Some(r)) = (const_value(&chunk.ops[i - 2]), const_value(&chunk.ops[i - 1])) {
                    if let Ok(result) = ven_core::ops::apply_binary(op, &l, &r) {
                        if let Some(folded) = value_to_push(&result) {
                            chunk.ops[i - 2] = Op::Nop;
                            chunk.ops[i - 1] = Op::Nop;
                            chunk.ops[i] = folded;
                            changed = true;
                        }
                    }
                }
            }
        }
        i += 1;
    }
    changed
}

fn const_value(op: &Op) -> Option<Value> {
    match op {
        Op::PushNum(n) => Some(Value::Num(*n)),
        Op::PushStr(s) => Some(Value::Str(s.clone())),
        Op::PushBool(b) => Some(Value::Bool(*b)),
        Op::PushVoid => Some(Value::Void),
        _ => None,
    }
}

fn value_to_push(v: &Value) -> Option<Op> {
    match v {
        Value::Num(n) => Some(Op::PushNum(*n)),
        Value::Str(s) => Some(Op::PushStr(s.clone())),
        Value::Bool(b) => Some(Op::PushBool(*b)),
        Value::Void => Some(Op::PushVoid),
        _ => None,
    }
}

/// A jump whose target is itself an unconditional `Jump` retargets straight
/// to the final destination, chasing chains with a visited guard.
fn thread_jumps(chunk: &mut Chunk) -> bool {
    let mut changed = false;
    let len = chunk.ops.len();
    for i in 0..len {
        let initial_target = match chunk.ops[i] {
            Op::Jump(t) | Op::JumpIfFalse(t) | Op::JumpIfTrue(t) => t,
            _ => continue,
        };
        let mut target = initial_target;
        let mut seen = std::collections::HashSet::new();
        while let Op::Jump(next) = chunk.ops.get(target).cloned().unwrap_or(Op::Nop) {
            if !seen.insert(target) || next == target {
                break;
            }
            target = next;
        }
        if target != initial_target {
            match &mut chunk.ops[i] {
                Op::Jump(t) | Op::JumpIfFalse(t) | Op::JumpIfTrue(t) => *t = target,
                _ => unreachable!(),
            }
            changed = true;
        }
    }
    changed
}

/// `[PushBool(b), JumpIfFalse(t)]` / `[PushBool(b), JumpIfTrue(t)]` resolve
/// at compile time: either the branch always taken (becomes `Jump`) or
/// never (becomes dead and is nopped, falling through).
fn eliminate_constant_branches(chunk: &mut Chunk) -> bool {
    let targets = jump_targets(chunk);
    let mut changed = false;
    for i in 1..chunk.ops.len() {
        if targets.contains(&i) {
            continue;
        }
        let Op::PushBool(b) = chunk.ops[i - 1] else { continue };
        match chunk.ops[i] {
            Op::JumpIfFalse(t) => {
                chunk.ops[i - 1] = Op::Nop;
                chunk.ops[i] = if b { Op::Nop } else { Op::Jump(t) };
                changed = true;
            }
            Op::JumpIfTrue(t) => {
                chunk.ops[i - 1] = Op::Nop;
                chunk.ops[i] = if b { Op::Jump(t) } else { Op::Nop };
                changed = true;
            }
            _ => {}
        }
    }
    changed
}

/// `[Dup, Pop]` with nothing jumping into the `Pop` is a no-op pair.
fn cancel_dup_pop(chunk: &mut Chunk) -> bool {
    let targets = jump_targets(chunk);
    let mut changed = false;
    for i in 1..chunk.ops.len() {
        if matches!(chunk.ops[i - 1], Op::Dup) && matches!(chunk.ops[i], Op::Pop) && !targets.contains(&i) {
            chunk.ops[i - 1] = Op::Nop;
            chunk.ops[i] = Op::Nop;
            changed = true;
        }
    }
    changed
}

/// Instructions after an unconditional `Return`/`ReturnQueue`/`Jump`, up to
/// the next instruction some jump actually lands on, can never run.
fn strip_dead_code(chunk: &mut Chunk) -> bool {
    let targets = jump_targets(chunk);
    let mut changed = false;
    let mut i = 0;
    while i < chunk.ops.len() {
        let terminates = matches!(chunk.ops[i], Op::Return | Op::ReturnQueue | Op::Jump(_));
        if terminates {
            let mut j = i + 1;
            while j < chunk.ops.len() && !targets.contains(&j) {
                if !matches!(chunk.ops[j], Op::Nop) {
                    chunk.ops[j] = Op::Nop;
                    changed = true;
                }
                j += 1;
            }
            i = j;
        } else {
            i += 1;
        }
    }
    changed
}

/// Two `CoerceBool` in a row, or one directly after a comparison/`Not`
/// unary (already boolean), collapse to one (or none).
fn collapse_coerce_bool(chunk: &mut Chunk) -> bool {
    let targets = jump_targets(chunk);
    let mut changed = false;
    for i in 1..chunk.ops.len() {
        if !matches!(chunk.ops[i], Op::CoerceBool) || targets.contains(&i) {
            continue;
        }
        let prev_already_bool = match &chunk.ops[i - 1] {
            Op::CoerceBool => true,
            Op::Binary(op) => matches!(
                op,
                BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Is | BinaryOp::In
            ),
            Op::Unary(ven_core::UnaryOp::Not) => true,
            Op::PushBool(_) => true,
            _ => false,
        };
        if prev_already_bool {
            chunk.ops[i] = Op::Nop;
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile_program;
    use crate::reader::Reader;
    use std::rc::Rc;

    #[test]
    fn folds_constant_arithmetic() {
        let unit = Reader::read("1 + 2 * 3;", "t.ven").unwrap();
        let mut compiled = compile_program(&unit.quotes, Rc::from("t.ven")).unwrap();
        optimize(&mut compiled.chunks, 1);
        let chunk = compiled.chunks.get(compiled.entry);
        assert!(!chunk.ops.iter().any(|op| matches!(op, Op::Binary(_))));
        assert!(chunk.ops.iter().any(|op| matches!(op, Op::PushNum(n) if *n == ven_core::Num::from_integer(7))));
    }

    #[test]
    fn eliminates_constant_branch() {
        let unit = Reader::read("if true { 1 } else { 2 };", "t.ven").unwrap();
        let mut compiled = compile_program(&unit.quotes, Rc::from("t.ven")).unwrap();
        optimize(&mut compiled.chunks, 1);
        let chunk = compiled.chunks.get(compiled.entry);
        assert!(!chunk.ops.iter().any(|op| matches!(op, Op::JumpIfFalse(_))));
    }

    #[test]
    fn level_zero_skips_optimization() {
        let unit = Reader::read("1 + 2 * 3;", "t.ven").unwrap();
        let mut compiled = compile_program(&unit.quotes, Rc::from("t.ven")).unwrap();
        optimize(&mut compiled.chunks, 0);
        let chunk = compiled.chunks.get(compiled.entry);
        assert!(chunk.ops.iter().any(|op| matches!(op, Op::Binary(_))));
    }

    #[test]
    fn idempotent_on_already_optimal_chunk() {
        let unit = Reader::read("1 + 2 * 3;", "t.ven").unwrap();
        let mut compiled = compile_program(&unit.quotes, Rc::from("t.ven")).unwrap();
        optimize(&mut compiled.chunks, 1);
        let before = compiled.chunks.get(compiled.entry).ops.len();
        optimize(&mut compiled.chunks, 1);
        let after = compiled.chunks.get(compiled.entry).ops.len();
        assert_eq!(before, after);
    }
}
