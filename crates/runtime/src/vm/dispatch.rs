//! Generic dispatch (§4.6): a linear scan over a `Generic`'s variants, which
//! are already kept sorted arity-desc / strict-before-general / later-wins
//! by `Generic::add_variant`. Shared between the VM's `Call` op and (per
//! SPEC_FULL §4) the readtime evaluator's function-call-like builtins, so a
//! dispatch decision made at readtime can never disagree with one made at
//! runtime.

use std::rc::Rc;

use ven_core::{ops, Concrete, Constraint, Value};

/// Whether a single parameter's constraint accepts `value` (§3.3 rule for
/// `ConstrainedParam`).
pub fn constraint_matches(constraint: &Option<Constraint>, value: &Value) -> bool {
    match constraint {
        None => true,
        Some(Constraint::Type(t)) => t.name.matches(value),
        Some(Constraint::Value(v)) => ops::eqv(v, value),
        Some(Constraint::Compound(c)) => ops::compound_matches(c, value, &|t, v| t.name.matches(v)),
    }
}

/// Finds the first variant whose arity and every parameter constraint match
/// `args` (§4.6 steps 1–4; §8 "slurpy variants match `arity >= variant.arity`").
/// Variants already come pre-sorted, so "first match" is "best match".
pub fn call_generic<'a>(variants: &'a [Rc<Concrete>], args: &[Value]) -> Option<&'a Rc<Concrete>> {
    variants.iter().find(|c| {
        let arity_ok = if c.slurpy { args.len() >= c.arity() } else { args.len() == c.arity() };
        arity_ok
            && c.params
                .iter()
                .zip(args.iter())
                .all(|(p, a)| constraint_matches(&p.constraint, a))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ven_core::{ChunkId, ConstrainedParam, TypeName, TypeValue};

    fn concrete(params: Vec<ConstrainedParam>, slurpy: bool, general: bool) -> Rc<Concrete> {
        Rc::new(Concrete {
            name: Rc::from("f"),
            params,
            body: ChunkId(0),
            slurpy,
            general,
            file: Rc::from("t.ven"),
            line: 1,
        })
    }

    #[test]
    fn picks_variant_matching_type_constraint() {
        let strict = concrete(
            vec![ConstrainedParam {
                name: Rc::from("x"),
                constraint: Some(Constraint::Type(TypeValue { name: TypeName::Str })),
            }],
            false,
            false,
        );
        let general = concrete(
            vec![ConstrainedParam { name: Rc::from("x"), constraint: None }],
            false,
            true,
        );
        let variants = vec![strict.clone(), general];
        let picked = call_generic(&variants, &[Value::str("hi")]).unwrap();
        assert!(Rc::ptr_eq(picked, &strict));
    }

    #[test]
    fn skips_arity_mismatch() {
        let one = concrete(
            vec![ConstrainedParam { name: Rc::from("x"), constraint: None }],
            false,
            true,
        );
        let variants = vec![one];
        assert!(call_generic(&variants, &[]).is_none());
    }

    #[test]
    fn slurpy_matches_extra_args() {
        let v = concrete(
            vec![
                ConstrainedParam { name: Rc::from("x"), constraint: None },
                ConstrainedParam { name: Rc::from("rest"), constraint: None },
            ],
            true,
            true,
        );
        let variants = vec![v];
        assert!(call_generic(&variants, &[Value::num(1), Value::num(2), Value::num(3)]).is_some());
    }
}
