//! Context/Scope (§2.2, §3.3): nested scope stack with bound vs local
//! variables, the superlocal `_`/`&_` stack, and the trace stack.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::VenError;
use crate::value::Value;

/// A single slot is a shared cell so that a bound variable captured by a
/// closure stays aliased to its defining scope (§4.5 "Closures").
pub type Cell = Rc<RefCell<Value>>;

#[derive(Debug, Default)]
pub struct Scope {
    parent: Option<Rc<RefCell<Scope>>>,
    slots: HashMap<Rc<str>, Cell>,
}

impl Scope {
    pub fn root() -> Rc<RefCell<Scope>> {
        Rc::new(RefCell::new(Scope {
            parent: None,
            slots: HashMap::new(),
        }))
    }

    pub fn child(parent: &Rc<RefCell<Scope>>) -> Rc<RefCell<Scope>> {
        Rc::new(RefCell::new(Scope {
            parent: Some(parent.clone()),
            slots: HashMap::new(),
        }))
    }

    /// `:=` — always creates (or overwrites) a slot in the innermost scope.
    pub fn define_local(&mut self, name: Rc<str>, value: Value) {
        self.slots.insert(name, Rc::new(RefCell::new(value)));
    }

    /// `=` on a name with no existing ancestor binding — the compiler has
    /// determined this is the definition site, so a bound slot is created
    /// here, in the innermost scope.
    pub fn define_bound_here(&mut self, name: Rc<str>, value: Value) {
        self.slots.insert(name, Rc::new(RefCell::new(value)));
    }

    /// `=` on a name that already resolves to an ancestor's bound slot:
    /// walk up and mutate that cell in place.
    pub fn store_bound(this: &Rc<RefCell<Scope>>, name: &str, value: Value) -> bool {
        let mut cursor = this.clone();
        loop {
            let cell = cursor.borrow().slots.get(name).cloned();
            if let Some(cell) = cell {
                *cell.borrow_mut() = value;
                return true;
            }
            let next = cursor.borrow().parent.clone();
            match next {
                Some(p) => cursor = p,
                None => return false,
            }
        }
    }

    pub fn get(this: &Rc<RefCell<Scope>>, name: &str) -> Option<Value> {
        let mut cursor = this.clone();
        loop {
            if let Some(cell) = cursor.borrow().slots.get(name) {
                return Some(cell.borrow().clone());
            }
            let next = cursor.borrow().parent.clone();
            match next {
                Some(p) => cursor = p,
                None => return None,
            }
        }
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }
}

/// Superlocal stack: one frame per function/lambda activation; spread
/// bodies also push/pop per iteration (§3.3, §4.2).
#[derive(Debug, Default)]
pub struct SuperlocalStack {
    frames: Vec<Vec<Value>>,
}

impl SuperlocalStack {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn enter_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    pub fn leave_frame(&mut self) {
        self.frames.pop();
    }

    pub fn push(&mut self, value: Value) {
        if let Some(top) = self.frames.last_mut() {
            top.push(value);
        }
    }

    /// `_` — pop from the top frame.
    pub fn pop(&mut self) -> Option<Value> {
        self.frames.last_mut().and_then(|f| f.pop())
    }

    /// `&_` — peek the top frame without consuming.
    pub fn peek(&self) -> Option<Value> {
        self.frames.last().and_then(|f| f.last()).cloned()
    }
}

/// Trace stack for diagnostics (§2.2, §7): one entry per active call.
#[derive(Debug, Default)]
pub struct TraceStack {
    frames: Vec<crate::error::TraceFrame>,
}

impl TraceStack {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push(&mut self, name: impl Into<String>, file: impl Into<String>, line: u32) {
        self.frames
            .push(crate::error::TraceFrame::new(name, file, line));
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn snapshot(&self) -> Vec<crate::error::TraceFrame> {
        self.frames.clone()
    }

    pub fn decorate(&self, mut err: VenError) -> VenError {
        for frame in self.frames.iter().rev() {
            err = err.with_frame(frame.clone());
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_write_updates_ancestor() {
        let root = Scope::root();
        root.borrow_mut().define_bound_here(Rc::from("y"), Value::num(1));
        let child = Scope::child(&root);
        assert!(Scope::store_bound(&child, "y", Value::num(4)));
        assert_eq!(Scope::get(&root, "y"), Some(Value::num(4)));
    }

    #[test]
    fn local_write_does_not_escape_innermost_scope() {
        let root = Scope::root();
        let child = Scope::child(&root);
        child.borrow_mut().define_local(Rc::from("x"), Value::num(1));
        assert_eq!(Scope::get(&root, "x"), None);
        assert_eq!(Scope::get(&child, "x"), Some(Value::num(1)));
    }

    #[test]
    fn superlocal_pop_and_peek() {
        let mut sl = SuperlocalStack::new();
        sl.enter_frame();
        sl.push(Value::num(1));
        sl.push(Value::num(2));
        assert_eq!(sl.peek(), Some(Value::num(2)));
        assert_eq!(sl.pop(), Some(Value::num(2)));
        assert_eq!(sl.pop(), Some(Value::num(1)));
        assert_eq!(sl.pop(), None);
    }
}
