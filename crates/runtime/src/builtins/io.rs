//! The five builtins that reach outside the interpreter (§4.7), plus
//! `StdHost`, the `Host` implementation the CLI wires a real program up to.
//! A test harness can swap in its own `Host` (see `ven-vm`'s own tests and
//! the integration scenarios) to capture output and script input instead.

use std::fs;
use std::io::{self, BufRead, Write as _};

use ven_core::{ops, Host, VenError, VenResult, Value};

use super::BuiltinTable;

pub fn register_all(table: &mut BuiltinTable) -> Vec<ven_core::Builtin> {
    vec![
        table.register("say", 1, false, say),
        table.register("write", 1, false, write),
        table.register("ask", 0, false, ask),
        table.register("slurp", 1, false, slurp),
        table.register("burp", 2, false, burp),
    ]
}

fn say(host: &mut dyn Host, args: &[Value]) -> Result<Value, String> {
    host.say(&ops::to_str(&args[0]));
    Ok(Value::Void)
}

fn write(host: &mut dyn Host, args: &[Value]) -> Result<Value, String> {
    host.write(&ops::to_str(&args[0]));
    Ok(Value::Void)
}

fn ask(host: &mut dyn Host, _args: &[Value]) -> Result<Value, String> {
    Ok(match host.ask() {
        Some(line) => Value::str(line),
        None => Value::Void,
    })
}

fn slurp(host: &mut dyn Host, args: &[Value]) -> Result<Value, String> {
    let path = ops::to_str(&args[0]);
    host.slurp(&path).map(Value::str).map_err(|e| e.message().to_string())
}

fn burp(host: &mut dyn Host, args: &[Value]) -> Result<Value, String> {
    let path = ops::to_str(&args[0]);
    let content = ops::to_str(&args[1]);
    host.burp(&path, &content).map(|_| Value::Void).map_err(|e| e.message().to_string())
}

/// The real-world `Host`: stdout for `say`/`write`, stdin (one line at a
/// time) for `ask`, the filesystem for `slurp`/`burp`.
#[derive(Default)]
pub struct StdHost {
    stdin: Option<io::Lines<io::StdinLock<'static>>>,
}

impl StdHost {
    pub fn new() -> Self {
        Self { stdin: None }
    }
}

impl Host for StdHost {
    fn say(&mut self, text: &str) {
        println!("{text}");
    }

    fn write(&mut self, text: &str) {
        print!("{text}");
        let _ = io::stdout().flush();
    }

    fn ask(&mut self) -> Option<String> {
        let lines = self.stdin.get_or_insert_with(|| io::stdin().lines());
        lines.next().and_then(Result::ok)
    }

    fn slurp(&mut self, path: &str) -> VenResult<String> {
        fs::read_to_string(path).map_err(|e| VenError::expose(format!("cannot read '{path}': {e}")))
    }

    fn burp(&mut self, path: &str, content: &str) -> VenResult<()> {
        fs::write(path, content).map_err(|e| VenError::expose(format!("cannot write '{path}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CapturingHost {
        out: Vec<String>,
    }
    impl Host for CapturingHost {
        fn say(&mut self, text: &str) {
            self.out.push(text.to_string());
        }
        fn write(&mut self, text: &str) {
            self.out.push(text.to_string());
        }
        fn ask(&mut self) -> Option<String> {
            None
        }
        fn slurp(&mut self, _: &str) -> VenResult<String> {
            Ok("contents".to_string())
        }
        fn burp(&mut self, _: &str, _: &str) -> VenResult<()> {
            Ok(())
        }
    }

    #[test]
    fn say_forwards_stringified_value_to_host() {
        let mut host = CapturingHost { out: Vec::new() };
        say(&mut host, &[Value::num(7)]).unwrap();
        assert_eq!(host.out, vec!["7".to_string()]);
    }

    #[test]
    fn slurp_returns_host_contents() {
        let mut host = CapturingHost { out: Vec::new() };
        let v = slurp(&mut host, &[Value::str("x.txt")]).unwrap();
        assert_eq!(v, Value::str("contents"));
    }
}
