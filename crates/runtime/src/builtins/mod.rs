//! Native function registry (§4.7 "Builtins") backing the handful of
//! `basis.ven` names that cannot be written in Ven itself because they
//! touch the outside world: `say`, `ask`, `slurp`, `burp`, `write`. Every
//! other basis name (`__iter`, `__filter*`, ...) is plain Ven source in
//! `basis.ven` and never reaches this table.

pub mod io;

use ven_core::{Builtin, Host, Value};

/// A native builtin's body. Takes the live `Host` (so `say`/`ask`/`slurp`/
/// `burp` can actually do I/O) and the already-arity-checked argument list.
pub type BuiltinFn = fn(&mut dyn Host, &[Value]) -> Result<Value, String>;

/// Every registered builtin, addressed by the `id` a `Builtin` value carries.
/// Built once at engine startup and shared (via `Rc`) by every `Vm`.
pub struct BuiltinTable {
    fns: Vec<BuiltinFn>,
}

impl Default for BuiltinTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinTable {
    pub fn new() -> Self {
        Self { fns: Vec::new() }
    }

    /// Registers one builtin, returning the `Builtin` value `basis.ven`'s
    /// root scope should be bound to under `name`.
    pub fn register(&mut self, name: &str, arity: usize, slurpy: bool, f: BuiltinFn) -> Builtin {
        let id = self.fns.len();
        self.fns.push(f);
        Builtin { name: name.into(), arity, slurpy, id }
    }

    pub fn call(&self, id: usize, host: &mut dyn Host, args: &[Value]) -> Result<Value, String> {
        (self.fns[id])(host, args)
    }

    /// The standard set (§4.7): `say`, `write`, `ask`, `slurp`, `burp`.
    /// Returns the table alongside each builtin's `Builtin` handle, which the
    /// caller binds into the root scope under its name.
    pub fn with_standard() -> (Self, Vec<Builtin>) {
        let mut table = Self::new();
        let bindings = io::register_all(&mut table);
        (table, bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullHost;
    impl Host for NullHost {
        fn say(&mut self, _: &str) {}
        fn write(&mut self, _: &str) {}
        fn ask(&mut self) -> Option<String> {
            None
        }
        fn slurp(&mut self, _: &str) -> ven_core::VenResult<String> {
            Ok(String::new())
        }
        fn burp(&mut self, _: &str, _: &str) -> ven_core::VenResult<()> {
            Ok(())
        }
    }

    #[test]
    fn registered_builtin_round_trips_through_its_id() {
        let mut table = BuiltinTable::new();
        let b = table.register("double", 1, false, |_, args| {
            let n = ven_core::ops::to_num(&args[0])?;
            Ok(Value::Num(n * ven_core::Num::from_integer(2)))
        });
        let mut host = NullHost;
        let result = table.call(b.id, &mut host, &[Value::num(21)]).unwrap();
        assert_eq!(result, Value::num(42));
    }
}
