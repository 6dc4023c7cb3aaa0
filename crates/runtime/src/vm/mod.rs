//! The Virtual Machine (§4.5): fetch/decode/dispatch loop over compiled
//! chunks, generic dispatch, closures, boxes, and `dies`/`ensure` unwinding.
//!
//! Calls recurse through Rust's own call stack rather than threading an
//! explicit `Vec<CallFrame>` (§4.5 names a "call frame stack" as a concept,
//! not a concrete data structure): each nested `run_chunk` invocation's
//! locals — chunk id, scope, operand stack, queue accumulator — collectively
//! play that role. The simplification costs tail-call optimization, which
//! Ven's spec never requires.

pub mod access;
pub mod dispatch;
pub mod closures;

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use indexmap::IndexMap;
use ven_core::{
    BoxDecl, BoxInstance, Builtin, ChunkId, Concrete, ConstrainedParam, Function,
    Generic, Host, LambdaValue, MapKey, Num, RegexValue, Scope, SuperlocalStack, TraceStack,
    VenError, VenResult, Value,
};
use venc::{ChunkTable, Op};

use crate::builtins::BuiltinTable;

pub use dispatch::call_generic;

/// One VM activation. Carries everything a chunk execution needs to reach
/// out to the world (`host`), to the rest of the program (`chunks`,
/// `builtins`), and to the lexical root every non-closing `fun` body runs
/// against (`root`, §3.2: plain functions are not closures — only `lambda`
/// and `box` capture a defining scope).
pub struct Vm<'e> {
    pub chunks: Rc<ChunkTable>,
    pub builtins: Rc<BuiltinTable>,
    pub root: Rc<RefCell<Scope>>,
    pub host: &'e mut dyn Host,
    pub trace: TraceStack,
    pub superlocal: SuperlocalStack,
    pub test_mode: bool,
    steps: u64,
    budget: Option<u64>,
}

impl<'e> Vm<'e> {
    pub fn new(
        chunks: Rc<ChunkTable>,
        builtins: Rc<BuiltinTable>,
        root: Rc<RefCell<Scope>>,
        host: &'e mut dyn Host,
        test_mode: bool,
    ) -> Self {
        Self {
            chunks,
            builtins,
            root,
            host,
            trace: TraceStack::new(),
            superlocal: SuperlocalStack::new(),
            test_mode,
            steps: 0,
            budget: None,
        }
    }

    /// Caps the number of ops this Vm will execute before dying with a
    /// budget-exceeded `RuntimeError` (§5 "bounded instruction budget per
    /// turn"). A spawned task's Vm sets this; the main program's does not.
    pub fn with_budget(mut self, budget: Option<u64>) -> Self {
        self.budget = budget;
        self
    }

    /// Runs `entry` to completion in `scope`, establishing the outermost
    /// superlocal frame.
    pub fn run(&mut self, entry: ChunkId, scope: &Rc<RefCell<Scope>>) -> VenResult<Value> {
        self.superlocal.enter_frame();
        let result = self.run_chunk(entry, scope);
        self.superlocal.leave_frame();
        result
    }

    fn tick(&mut self, file: &str, line: u32) -> VenResult<()> {
        self.steps += 1;
        if crate::interrupt::requested() {
            return Err(self.err(file, line, "interrupted"));
        }
        if let Some(budget) = self.budget {
            if self.steps > budget {
                return Err(self.err(file, line, "instruction budget exceeded for this task"));
            }
        }
        Ok(())
    }

    fn err(&self, file: &str, line: u32, message: impl Into<String>) -> VenError {
        self.trace.decorate(VenError::runtime(file, line, message))
    }

    // ---------------------------------------------------------------- core

    /// Executes one chunk to completion against `scope`. Each call owns its
    /// own operand stack and queue accumulator, matching §4.5's "value
    /// stack" and "queue stack, one per block".
    fn run_chunk(&mut self, id: ChunkId, scope: &Rc<RefCell<Scope>>) -> VenResult<Value> {
        let file = self.chunks.get(id).file.clone();
        let mut stack: Vec<Value> = Vec::new();
        let mut queue: Vec<Value> = Vec::new();
        let mut scopes: Vec<Rc<RefCell<Scope>>> = vec![scope.clone()];
        let mut ip = 0usize;

        loop {
            let chunk = self.chunks.get(id);
            if ip >= chunk.ops.len() {
                return Ok(stack.pop().unwrap_or(Value::Void));
            }
            let op = chunk.ops[ip].clone();
            let line = chunk.lines[ip];
            self.tick(&file, line)?;
            ip += 1;
            let cur = scopes.last().expect("scope stack never empties mid-chunk").clone();

            match op {
                Op::Nop => {}

                Op::PushNum(n) => stack.push(Value::Num(n)),
                Op::PushStr(s) => stack.push(Value::Str(s)),
                Op::PushRegex(s) => {
                    let compiled = regex::Regex::new(&s).map_err(|e| self.err(&file, line, format!("bad regex: {e}")))?;
                    stack.push(Value::Regex(Rc::new(RegexValue { source: s, compiled })));
                }
                Op::PushBool(b) => stack.push(Value::Bool(b)),
                Op::PushVoid => stack.push(Value::Void),
                Op::PushAny => stack.push(Value::Any),

                Op::LoadName(name) => {
                    let v = Scope::get(&cur, &name)
                        .ok_or_else(|| self.err(&file, line, format!("'{name}' is not defined")))?;
                    stack.push(v);
                }
                Op::DefineLocal(name) => {
                    let v = stack.pop().expect("DefineLocal: value on stack");
                    cur.borrow_mut().define_local(name, v);
                }
                Op::StoreBound(name) => {
                    let v = stack.pop().expect("StoreBound: value on stack");
                    if !Scope::store_bound(&cur, &name, v.clone()) {
                        cur.borrow_mut().define_bound_here(name, v);
                    }
                }

                Op::Upop => {
                    let v = self
                        .superlocal
                        .pop()
                        .ok_or_else(|| self.err(&file, line, "no superlocal value to pop"))?;
                    stack.push(v);
                }
                Op::Uref => {
                    let v = self
                        .superlocal
                        .peek()
                        .ok_or_else(|| self.err(&file, line, "no superlocal value to reference"))?;
                    stack.push(v);
                }

                Op::MakeVec { count, spread } => {
                    let extra = if spread {
                        let v = stack.pop().expect("MakeVec: spread value on stack");
                        ven_core::ops::to_vec(&v)
                    } else {
                        Vec::new()
                    };
                    let mut items = Vec::with_capacity(count);
                    for _ in 0..count {
                        items.push(stack.pop().expect("MakeVec: item on stack"));
                    }
                    items.reverse();
                    items.extend(extra);
                    stack.push(Value::vec(items));
                }
                Op::MakeMap { count } => {
                    let mut pairs = Vec::with_capacity(count);
                    for _ in 0..count {
                        let v = stack.pop().expect("MakeMap: value on stack");
                        let k = stack.pop().expect("MakeMap: key on stack");
                        pairs.push((k, v));
                    }
                    pairs.reverse();
                    let mut map = IndexMap::new();
                    for (k, v) in pairs {
                        map.insert(MapKey(k), v);
                    }
                    stack.push(Value::map(map));
                }
                Op::MakeRange { has_lo, has_hi } => {
                    let hi = if has_hi { Some(Box::new(stack.pop().expect("MakeRange: hi"))) } else { None };
                    let lo = if has_lo { Some(Box::new(stack.pop().expect("MakeRange: lo"))) } else { None };
                    stack.push(Value::Range(lo, hi));
                }

                Op::Unary(op) => {
                    let v = stack.pop().expect("Unary: operand on stack");
                    let result = ven_core::ops::apply_unary(op, &v).map_err(|m| self.err(&file, line, m))?;
                    stack.push(result);
                }
                Op::Binary(op) => {
                    let right = stack.pop().expect("Binary: right operand on stack");
                    let left = stack.pop().expect("Binary: left operand on stack");
                    let result =
                        ven_core::ops::apply_binary(op, &left, &right).map_err(|m| self.err(&file, line, m))?;
                    stack.push(result);
                }
                Op::FoldBinary(op) => {
                    let v = stack.pop().expect("FoldBinary: vector on stack");
                    let items = ven_core::ops::to_vec(&v);
                    let mut it = items.into_iter();
                    let folded = match it.next() {
                        None => Value::Void,
                        Some(first) => it.try_fold(first, |acc, next| ven_core::ops::apply_binary(op, &acc, &next))
                            .map_err(|m| self.err(&file, line, m))?,
                    };
                    stack.push(folded);
                }
                Op::SpreadCall { reduce } => {
                    let target = stack.pop().expect("SpreadCall: target vector on stack");
                    let callee = stack.pop().expect("SpreadCall: callee on stack");
                    let items = ven_core::ops::to_vec(&target);
                    if reduce {
                        let mut it = items.into_iter();
                        let mut acc = match it.next() {
                            None => {
                                stack.push(Value::Void);
                                continue;
                            }
                            Some(first) => first,
                        };
                        for next in it {
                            acc = self.invoke(callee.clone(), vec![acc, next], &file, line)?;
                        }
                        stack.push(acc);
                    } else {
                        let mut out = Vec::with_capacity(items.len());
                        for item in items {
                            out.push(self.invoke(callee.clone(), vec![item], &file, line)?);
                        }
                        stack.push(Value::vec(out));
                    }
                }

                Op::AccessField(names) => {
                    let base = stack.pop().expect("AccessField: base on stack");
                    let mut cur_val = base;
                    for name in &names {
                        cur_val = access::field_of_method(&cur_val, name, &cur).map_err(|m| self.err(&file, line, m))?;
                    }
                    stack.push(cur_val);
                }
                Op::Access => {
                    let index = stack.pop().expect("Access: index on stack");
                    let base = stack.pop().expect("Access: base on stack");
                    let result = access::index_into(&base, &index).map_err(|m| self.err(&file, line, m))?;
                    stack.push(result);
                }
                Op::StoreField(names) => {
                    let value = stack.pop().expect("StoreField: value on stack");
                    let base = stack.pop().expect("StoreField: base on stack");
                    if let Some((last, steps)) = names.split_last() {
                        let mut cur_val = base;
                        for name in steps {
                            cur_val = access::field_of(&cur_val, name).map_err(|m| self.err(&file, line, m))?;
                        }
                        access::set_field(&cur_val, last, value.clone()).map_err(|m| self.err(&file, line, m))?;
                    }
                    stack.push(value);
                }
                Op::StoreAccess => {
                    let index = stack.pop().expect("StoreAccess: index on stack");
                    let base = stack.pop().expect("StoreAccess: base on stack");
                    let value = stack.pop().expect("StoreAccess: value on stack");
                    access::set_index(&base, &index, value.clone()).map_err(|m| self.err(&file, line, m))?;
                    stack.push(value);
                }

                Op::CoerceBool => {
                    let v = stack.pop().expect("CoerceBool: value on stack");
                    stack.push(Value::Bool(v.truthy()));
                }
                Op::Pop => {
                    stack.pop();
                }
                Op::Dup => {
                    let v = stack.last().expect("Dup: value on stack").clone();
                    stack.push(v);
                }

                Op::Jump(target) => ip = target,
                Op::JumpIfFalse(target) => {
                    let v = stack.pop().expect("JumpIfFalse: condition on stack");
                    if v.is_false() {
                        ip = target;
                    }
                }
                Op::JumpIfTrue(target) => {
                    let v = stack.pop().expect("JumpIfTrue: condition on stack");
                    if v.truthy() {
                        ip = target;
                    }
                }

                Op::Call(argc) => {
                    let mut args = Vec::with_capacity(argc);
                    for _ in 0..argc {
                        args.push(stack.pop().expect("Call: argument on stack"));
                    }
                    args.reverse();
                    let callee = stack.pop().expect("Call: callee on stack");
                    let result = self.invoke(callee, args, &file, line)?;
                    stack.push(result);
                }

                Op::PostStep { name, delta } => {
                    let old = Scope::get(&cur, &name)
                        .ok_or_else(|| self.err(&file, line, format!("'{name}' is not defined")))?;
                    let old_num = ven_core::ops::to_num(&old).map_err(|m| self.err(&file, line, m))?;
                    let new_val = Value::Num(old_num + Num::from_integer(delta));
                    if !Scope::store_bound(&cur, &name, new_val) {
                        return Err(self.err(&file, line, format!("'{name}' is not defined")));
                    }
                    stack.push(old);
                }

                Op::EnterScope => scopes.push(Scope::child(&cur)),
                Op::ExitScope => {
                    scopes.pop();
                }

                Op::MakeLambda { target, params, slurpy } => {
                    let lambda = Rc::new(LambdaValue {
                        scope: cur.clone(),
                        params,
                        slurpy,
                        target,
                        superlocal: RefCell::new(Vec::new()),
                        injection: RefCell::new(Vec::new()),
                    });
                    stack.push(Value::Function(Function::Lambda(lambda)));
                }

                Op::DefineFun { name, params, constraints, slurpy, target, general } => {
                    let concrete = Rc::new(Concrete {
                        name: name.clone(),
                        params: params
                            .into_iter()
                            .zip(constraints)
                            .map(|(name, constraint)| ConstrainedParam { name, constraint })
                            .collect(),
                        body: target,
                        slurpy,
                        general,
                        file: file.clone(),
                        line,
                    });
                    let existing = if cur.borrow().has_local(&name) { Scope::get(&cur, &name) } else { None };
                    match existing {
                        Some(Value::Function(Function::Generic(g))) => g.borrow_mut().add_variant(concrete),
                        _ => {
                            let generic = Rc::new(RefCell::new(Generic::new(name.clone())));
                            generic.borrow_mut().add_variant(concrete);
                            cur.borrow_mut().define_local(name, Value::Function(Function::Generic(generic)));
                        }
                    }
                }

                Op::DefineBox { name, params, constraints, namespace } => {
                    let decl = Rc::new(BoxDecl {
                        name: name.clone(),
                        params,
                        given: constraints,
                        scope: cur.clone(),
                        namespace,
                    });
                    cur.borrow_mut().define_local(name, Value::Box(decl));
                }

                Op::Dies(target) => match self.run_chunk(target, &cur) {
                    Ok(_) => stack.push(Value::Bool(false)),
                    Err(VenError::Runtime { .. }) => stack.push(Value::Bool(true)),
                    Err(other) => return Err(other),
                },
                Op::Ensure => {
                    let v = stack.pop().expect("Ensure: value on stack");
                    if self.test_mode && v.is_false() {
                        return Err(self.err(&file, line, "ensure failed"));
                    }
                    stack.push(Value::Void);
                }

                Op::QueuePush => {
                    let v = stack.pop().expect("QueuePush: value on stack");
                    queue.push(v);
                }
                Op::QueueTake => {
                    let taken = mem::take(&mut queue);
                    stack.push(Value::vec(taken));
                }

                Op::Return => {
                    let v = stack.pop().expect("Return: value on stack");
                    return Ok(v);
                }
                Op::ReturnQueue => {
                    return Ok(Value::vec(mem::take(&mut queue)));
                }
            }
        }
    }

    // -------------------------------------------------------------- invoke

    pub fn invoke(&mut self, callee: Value, args: Vec<Value>, file: &str, line: u32) -> VenResult<Value> {
        match callee {
            Value::Function(f) => self.invoke_function(f, args, file, line),
            Value::Box(decl) => self.instantiate_box(&decl, args, file, line),
            other => Err(self.err(file, line, format!("{} is not callable", other.type_name().word()))),
        }
    }

    fn invoke_function(&mut self, f: Function, args: Vec<Value>, file: &str, line: u32) -> VenResult<Value> {
        match f {
            Function::Concrete(c) => self.call_concrete(&c, args, file, line),
            Function::Generic(g) => {
                let variants = g.borrow().variants.clone();
                let chosen = call_generic(&variants, &args)
                    .cloned()
                    .ok_or_else(|| self.err(file, line, format!("no matching variant for '{}'", g.borrow().name)))?;
                self.call_concrete(&chosen, args, file, line)
            }
            Function::Builtin(b) => self.call_builtin(&b, args, file, line),
            Function::Lambda(l) => self.call_lambda(&l, args, file, line),
            Function::Frozen(fl) => self.call_lambda(&fl.lambda, args, file, line),
            Function::Partial(p) => {
                let mut combined = p.args.clone();
                combined.extend(args);
                self.invoke_function(p.callee.clone(), combined, file, line)
            }
        }
    }

    fn call_concrete(&mut self, c: &Rc<Concrete>, args: Vec<Value>, file: &str, line: u32) -> VenResult<Value> {
        let scope = Scope::child(&self.root);
        let params: Vec<Rc<str>> = c.params.iter().map(|p| p.name.clone()).collect();
        closures::bind_params(&scope, &params, c.slurpy, args).map_err(|m| self.err(file, line, m))?;
        self.trace.push(c.name.to_string(), file.to_string(), line);
        self.superlocal.enter_frame();
        let result = self.run_chunk(c.body, &scope);
        self.superlocal.leave_frame();
        self.trace.pop();
        result
    }

    fn call_lambda(&mut self, l: &Rc<LambdaValue>, args: Vec<Value>, file: &str, line: u32) -> VenResult<Value> {
        let scope = Scope::child(&l.scope);
        closures::bind_params(&scope, &l.params, l.slurpy, args).map_err(|m| self.err(file, line, m))?;
        for (name, value) in l.injection.borrow().iter() {
            scope.borrow_mut().define_local(name.clone(), value.clone());
        }
        self.trace.push("lambda".to_string(), file.to_string(), line);
        self.superlocal.enter_frame();
        let result = self.run_chunk(l.target, &scope);
        self.superlocal.leave_frame();
        self.trace.pop();
        result
    }

    fn call_builtin(&mut self, b: &Rc<Builtin>, args: Vec<Value>, file: &str, line: u32) -> VenResult<Value> {
        let arity_ok = if b.slurpy { args.len() >= b.arity } else { args.len() == b.arity };
        if !arity_ok {
            return Err(self.err(file, line, format!("'{}' expects {} arguments", b.name, b.arity)));
        }
        self.builtins.call(b.id, self.host, &args).map_err(|m| self.err(file, line, m))
    }

    /// Instantiates a `box` (§3.4: "BoxInstance holds its own scope,
    /// shallow-copied from the box namespace at instantiation" — realized
    /// here by running the namespace chunk fresh, once per call, in a new
    /// child of the box's closure scope).
    fn instantiate_box(&mut self, decl: &Rc<BoxDecl>, args: Vec<Value>, file: &str, line: u32) -> VenResult<Value> {
        if args.len() != decl.params.len() {
            return Err(self.err(file, line, format!("box '{}' expects {} arguments", decl.name, decl.params.len())));
        }
        for (param, (constraint, arg)) in decl.params.iter().zip(decl.given.iter().zip(args.iter())) {
            if !dispatch::constraint_matches(constraint, arg) {
                return Err(self.err(file, line, format!("argument for '{param}' does not satisfy box '{}'s constraint", decl.name)));
            }
        }
        let scope = Scope::child(&decl.scope);
        closures::bind_params(&scope, &decl.params, false, args).map_err(|m| self.err(file, line, m))?;
        self.trace.push(decl.name.to_string(), file.to_string(), line);
        self.run_chunk(decl.namespace, &scope)?;
        self.trace.pop();
        Ok(Value::BoxInstance(Rc::new(BoxInstance { parent: decl.clone(), scope })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinTable;
    use std::rc::Rc;
    use venc::{compile_program, optimize};

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

    fn run(source: &str) -> Value {
        let unit = venc::Reader::read(source, "t.ven").unwrap();
        let mut compiled = compile_program(&unit.quotes, Rc::from("t.ven")).unwrap();
        optimize(&mut compiled.chunks, 1);
        let chunks = Rc::new(compiled.chunks);
        let root = Scope::root();
        let mut host = NullHost;
        let mut vm = Vm::new(chunks, Rc::new(BuiltinTable::new()), root.clone(), &mut host, false);
        vm.run(compiled.entry, &root).unwrap()
    }

    #[test]
    fn evaluates_arithmetic() {
        assert_eq!(run("1 + 2 * 3;"), Value::num(7));
    }

    #[test]
    fn if_else_picks_branch() {
        assert_eq!(run("if false { 1 } else { 2 };"), Value::num(2));
    }

    #[test]
    fn bound_assignment_persists_across_statements() {
        assert_eq!(run("x = 1; x = x + 1; x;"), Value::num(2));
    }

    #[test]
    fn multiple_fun_decls_merge_into_one_generic() {
        let v = run(
            "fun f(x: num) { 1 };
             fun f(x: str) { 2 };
             f(\"hi\");",
        );
        assert_eq!(v, Value::num(2));
    }

    #[test]
    fn dies_catches_runtime_error() {
        assert_eq!(run("dies (1 / 0);"), Value::Bool(true));
        assert_eq!(run("dies (1 + 1);"), Value::Bool(false));
    }

    #[test]
    fn lambda_closes_over_defining_scope() {
        let v = run("x = 10; f = lambda() { x }; f();");
        assert_eq!(v, Value::num(10));
    }

    #[test]
    fn box_instance_exposes_namespace_bindings() {
        let v = run("box Counter(n) { total = n; }; c = Counter(5); c.total;");
        assert_eq!(v, Value::num(5));
    }
}
