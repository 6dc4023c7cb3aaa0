//! End-to-end pipeline scenarios (§8) and the universal properties/boundary
//! cases that accompany them, each driving `Engine::eval`/`Engine::build`
//! the way `ven-cli` does rather than reaching into the compiler or VM
//! directly.

use std::fs;

use ven_core::{Host, Value, VenResult};
use ven_vm::{Engine, EngineConfig, FsResolver};

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

fn eval(source: &str) -> VenResult<Value> {
    let engine = Engine::new(EngineConfig::default());
    let mut host = NullHost;
    engine.eval(source, "t.ven", &mut host)
}

#[test]
fn scenario_1_precedence() {
    let v = eval("1 + 2 * 3;").unwrap();
    assert_eq!(v, Value::num(7));
    assert_eq!(v.to_string(), "7");
}

#[test]
fn scenario_2_generic_dispatch_by_type() {
    let v = eval(
        r#"
        fun f(x) given num { x + 1; }
        fun f(x) given str { "s" ~ x; }
        [f(2), f("a")];
        "#,
    )
    .unwrap();
    let Value::Vec(items) = v else { panic!("expected vec") };
    let items = items.borrow();
    assert_eq!(items[0], Value::num(3));
    assert_eq!(items[1], Value::str("sa"));
}

#[test]
fn scenario_3_binary_spread_reduce_then_is() {
    let v = eval("(|+| [1, 2, 3, 4]) is 10;").unwrap();
    assert_eq!(v, Value::num(10));
}

#[test]
fn scenario_4_method_call_sugar_via_exposed_std_module() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("std")).unwrap();
    fs::write(
        dir.path().join("std").join("str.ven"),
        r#"
        fun starts-with?(s, prefix) {
            starts-with-from?(s, prefix, 0);
        }

        fun starts-with-from?(s, prefix, i) {
            if i >= #prefix {
                true;
            } else {
                if i >= #s {
                    false;
                } else {
                    if s[i] is prefix[i] {
                        starts-with-from?(s, prefix, i + 1);
                    } else {
                        false;
                    }
                }
            }
        }
        "#,
    )
    .unwrap();

    let main_file = dir.path().join("main.ven");
    let source = r#"
        expose std.str;
        "foobar".starts-with?("foo");
    "#;
    fs::write(&main_file, source).unwrap();

    let engine = Engine::new(EngineConfig::default());
    let resolver = FsResolver::new(dir.path());
    let mut host = NullHost;
    let program = engine.build(source, &main_file.display().to_string(), &resolver).unwrap();
    let result = engine.run(&program, &mut host).unwrap();
    assert_eq!(result, Value::Bool(true));
}

#[test]
fn scenario_5_user_nud_macro_expands_at_readtime() {
    let v = eval(
        r#"
        nud T {
            ensure 1 + 1 is 2;
            quote(42);
        }
        T();
        "#,
    )
    .unwrap();
    assert_eq!(v, Value::num(42));
}

#[test]
fn scenario_6_step_loop_queue_and_return_queue() {
    let v = eval(
        r#"
        fun f() {
            loop i = 0, i < 3, i++ {
                queue i;
            }
            return queue;
        }
        f();
        "#,
    )
    .unwrap();
    let Value::Vec(items) = v else { panic!("expected vec") };
    let items = items.borrow();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0], Value::num(0));
    assert_eq!(items[1], Value::num(1));
    assert_eq!(items[2], Value::num(2));
}

#[test]
fn boundary_division_by_zero_dies_with_zero_in_the_message() {
    let err = eval("1 / 0;").unwrap_err();
    assert!(err.to_string().contains("zero"));
}

#[test]
fn boundary_slurpy_arity_matches_any_call_with_at_least_one_arg() {
    let v = eval(
        r#"
        fun f(a, *) { a; }
        [f(1), f(1, 2), f(1, 2, 3)];
        "#,
    )
    .unwrap();
    let Value::Vec(items) = v else { panic!("expected vec") };
    let items = items.borrow();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|v| *v == Value::num(1)));
}

#[test]
fn universal_property_eqv_is_reflexive_for_every_value_shape() {
    for src in ["1;", "\"hi\";", "true;", "void;", "[1, 2];", "%{\"a\": 1};"] {
        let v = eval(src).unwrap();
        assert_eq!(v, v.clone(), "eqv(v, v) failed for {src}");
    }
}

#[test]
fn universal_property_num_round_trips_through_its_decimal_string() {
    let v = eval(
        r#"
        n = 3 + 4 / 2;
        s = ~n;
        +s;
        "#,
    )
    .unwrap();
    let expected = eval("3 + 4 / 2;").unwrap();
    assert_eq!(v, expected);
}

#[test]
fn universal_property_later_variant_wins_dispatch_tie() {
    let v = eval(
        r#"
        fun f(x) given num { 1; }
        fun f(x) given num { 2; }
        f(9);
        "#,
    )
    .unwrap();
    assert_eq!(v, Value::num(2));
}
