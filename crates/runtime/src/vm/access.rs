//! `.field` and `[index]` access/assignment (§4.1 `AccessField`/`Access`).
//! Mirrors `ven_compiler::readtime`'s `field_of`/`index_into` (same base
//! cases: maps by string key, vectors/strings by numeric index, out-of-range
//! is `Void` rather than an error) but additionally reaches into a
//! `BoxInstance`'s scope, since a box's fields are its namespace's bound
//! names rather than map entries.

use std::cell::RefCell;
use std::rc::Rc;

use ven_core::{ops, Function, MapKey, Partial, Scope, Value};

pub fn field_of(base: &Value, name: &str) -> Result<Value, String> {
    match base {
        Value::Map(entries) => Ok(entries.borrow().get(&MapKey(Value::str(name))).cloned().unwrap_or(Value::Void)),
        Value::BoxInstance(inst) => Ok(Scope::get(&inst.scope, name).unwrap_or(Value::Void)),
        other => Err(format!("cannot access field '{name}' on a {}", other.type_name().word())),
    }
}

/// `.field` with a fallback for values that have no fields of their own
/// (numbers, strings, vectors, ...): `base.name` resolves to a `Partial`
/// binding `name`'s value from `scope` with `base` as its first argument, so
/// `"foobar".starts-with?("foo")` reads as the call `starts-with?("foobar",
/// "foo")` without a distinct method-dispatch mechanism. Maps and box
/// instances keep their own fields taking precedence, same as `field_of`.
pub fn field_of_method(base: &Value, name: &str, scope: &Rc<RefCell<Scope>>) -> Result<Value, String> {
    match field_of(base, name) {
        Ok(v) => Ok(v),
        Err(e) => match Scope::get(scope, name) {
            Some(Value::Function(f)) => {
                Ok(Value::Function(Function::Partial(Rc::new(Partial { callee: f, args: vec![base.clone()] }))))
            }
            _ => Err(e),
        },
    }
}

pub fn set_field(base: &Value, name: &str, value: Value) -> Result<(), String> {
    match base {
        Value::Map(entries) => {
            entries.borrow_mut().insert(MapKey(Value::str(name)), value);
            Ok(())
        }
        Value::BoxInstance(inst) => {
            if !Scope::store_bound(&inst.scope, name, value.clone()) {
                inst.scope.borrow_mut().define_local(name.into(), value);
            }
            Ok(())
        }
        other => Err(format!("cannot set field '{name}' on a {}", other.type_name().word())),
    }
}

pub fn index_into(base: &Value, index: &Value) -> Result<Value, String> {
    match base {
        Value::Str(s) => {
            let i = ops::to_num(index)?.to_integer();
            Ok(s.chars().nth(i.max(0) as usize).map(|c| Value::str(c.to_string())).unwrap_or(Value::Void))
        }
        Value::Vec(items) => {
            let i = ops::to_num(index)?.to_integer();
            Ok(items.borrow().get(i.max(0) as usize).cloned().unwrap_or(Value::Void))
        }
        Value::Map(entries) => Ok(entries.borrow().get(&MapKey(index.clone())).cloned().unwrap_or(Value::Void)),
        other => Err(format!("cannot index a {}", other.type_name().word())),
    }
}

pub fn set_index(base: &Value, index: &Value, value: Value) -> Result<(), String> {
    match base {
        Value::Vec(items) => {
            let i = ops::to_num(index)?.to_integer();
            let mut items = items.borrow_mut();
            if i < 0 {
                return Err("cannot index a vector with a negative number".to_string());
            }
            let i = i as usize;
            if i < items.len() {
                items[i] = value;
                Ok(())
            } else if i == items.len() {
                items.push(value);
                Ok(())
            } else {
                Err("vector index out of range".to_string())
            }
        }
        Value::Map(entries) => {
            entries.borrow_mut().insert(MapKey(index.clone()), value);
            Ok(())
        }
        other => Err(format!("cannot assign into a {}", other.type_name().word())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_of_map_missing_key_is_void() {
        let m = Value::map(indexmap::IndexMap::new());
        assert_eq!(field_of(&m, "x").unwrap(), Value::Void);
    }

    #[test]
    fn index_into_vec_out_of_range_is_void() {
        let v = Value::vec(vec![Value::num(1)]);
        assert_eq!(index_into(&v, &Value::num(5)).unwrap(), Value::Void);
    }

    #[test]
    fn set_index_extends_vec_by_one() {
        let v = Value::vec(vec![Value::num(1)]);
        set_index(&v, &Value::num(1), Value::num(2)).unwrap();
        assert_eq!(index_into(&v, &Value::num(1)).unwrap(), Value::num(2));
    }
}
