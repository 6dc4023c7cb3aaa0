//! Call-binding helpers shared by every `Function` variant's activation
//! (§4.5 "Closures"). A closure is just a scope a `LambdaValue`/`BoxDecl`
//! keeps alive by shared ownership (§3.4); binding params is the same small
//! dance regardless of which callable kind is being invoked.

use std::cell::RefCell;
use std::rc::Rc;

use ven_core::{Scope, Value};

/// Binds `args` into `scope` under `params`, positionally. Non-slurpy
/// requires an exact argument count; slurpy (`fun f(a, b, *)`) only ever
/// names its fixed parameters — the surface grammar has no identifier for
/// the trailing `*` itself (§8: it merely relaxes arity matching to "at
/// least"), so any arguments beyond `params.len()` are accepted but not
/// bound to anything.
pub fn bind_params(
    scope: &Rc<RefCell<Scope>>,
    params: &[Rc<str>],
    slurpy: bool,
    args: Vec<Value>,
) -> Result<(), String> {
    if slurpy {
        if args.len() < params.len() {
            return Err(format!("expected at least {} arguments, got {}", params.len(), args.len()));
        }
    } else if args.len() != params.len() {
        return Err(format!("expected {} arguments, got {}", params.len(), args.len()));
    }
    for (p, a) in params.iter().zip(args) {
        scope.borrow_mut().define_local(p.clone(), a);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slurpy_binds_fixed_params_and_accepts_extra_args() {
        let scope = Scope::root();
        bind_params(
            &scope,
            &[Rc::from("a"), Rc::from("b")],
            true,
            vec![Value::num(1), Value::num(2), Value::num(3)],
        )
        .unwrap();
        assert_eq!(Scope::get(&scope, "a"), Some(Value::num(1)));
        assert_eq!(Scope::get(&scope, "b"), Some(Value::num(2)));
    }

    #[test]
    fn slurpy_errors_when_fewer_args_than_fixed_params() {
        let scope = Scope::root();
        let err = bind_params(&scope, &[Rc::from("a"), Rc::from("b")], true, vec![Value::num(1)]).unwrap_err();
        assert!(err.contains("at least 2"));
    }

    #[test]
    fn exact_arity_mismatch_errors() {
        let scope = Scope::root();
        let err = bind_params(&scope, &[Rc::from("a")], false, vec![]).unwrap_err();
        assert!(err.contains("expected 1"));
    }
}
