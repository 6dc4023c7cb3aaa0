//! Program pipeline (§2): Read → Compile → Optimize → Evaluate, tying the
//! Reader/Compiler/Optimizer (`ven-compiler`) to the VM. `Engine` is the
//! single entry point the CLI drives; everything else here exists to give
//! it units to splice together via `expose`.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ven_core::{ChunkId, Function, Host, Scope, VenResult, Value};
use venc::{compile_program, optimize, ChunkTable, Reader};

use crate::basis;
use crate::builtins::BuiltinTable;
use crate::vm::Vm;

/// Resolves a dotted `expose` path (e.g. `math.stats`) to the files that
/// back it — the one seam the engine exposes for an out-of-process module
/// daemon to plug into (§6). `FsResolver` is the standalone default: a
/// dotted name maps to exactly one file on disk, relative to the running
/// program's own directory.
pub trait Resolver {
    fn files_for(&self, path: &[String]) -> Vec<(PathBuf, String)>;
}

/// Resolves `a.b.c` to `<root>/a/b/c.ven`, read eagerly. An unreadable path
/// contributes no files rather than failing the whole build — `expose` of a
/// module the daemon would otherwise have supplied is not fatal outside it.
pub struct FsResolver {
    root: PathBuf,
}

impl FsResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Resolver for FsResolver {
    fn files_for(&self, path: &[String]) -> Vec<(PathBuf, String)> {
        let mut file = self.root.clone();
        for segment in path {
            file.push(segment);
        }
        file.set_extension("ven");
        match fs::read_to_string(&file) {
            Ok(source) => vec![(file, source)],
            Err(e) => {
                tracing::warn!(path = %path.join("."), error = %e, "could not resolve exposed unit");
                Vec::new()
            }
        }
    }
}

pub struct EngineConfig {
    pub optimize_level: u32,
    pub test_mode: bool,
    pub instruction_budget: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { optimize_level: 1, test_mode: false, instruction_budget: None }
    }
}

/// A compiled program ready to run: the basis plus the main unit plus every
/// transitively `expose`d unit, spliced into one chunk table (§2 "merges
/// chunk pools across exposed units").
pub struct Program {
    pub chunks: Rc<ChunkTable>,
    pub basis_entry: ChunkId,
    pub entry: ChunkId,
}

pub struct Engine {
    config: EngineConfig,
    builtins: Rc<BuiltinTable>,
    builtin_bindings: Vec<ven_core::Builtin>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let (builtins, builtin_bindings) = BuiltinTable::with_standard();
        Self { config, builtins: Rc::new(builtins), builtin_bindings }
    }

    /// Reads, compiles, and optimizes `source` (plus the basis and anything
    /// it transitively exposes) into a runnable `Program`.
    pub fn build(&self, source: &str, file: &str, resolver: &dyn Resolver) -> VenResult<Program> {
        let mut table = ChunkTable::new();

        let basis_unit = Reader::read(basis::SOURCE, "basis.ven")?;
        let basis_compiled = compile_program(&basis_unit.quotes, Rc::from("basis.ven"))?;
        let basis_offset = table.merge(basis_compiled.chunks);
        let basis_entry = ChunkId(basis_compiled.entry.0 + basis_offset);

        let main_unit = Reader::read(source, file)?;
        let mut seen: Vec<Vec<String>> = Vec::new();
        for path in &main_unit.exposes {
            self.splice_exposed(&mut table, path, resolver, &mut seen)?;
        }
        let main_compiled = compile_program(&main_unit.quotes, Rc::from(file))?;
        let main_offset = table.merge(main_compiled.chunks);
        let main_entry = ChunkId(main_compiled.entry.0 + main_offset);

        optimize(&mut table, self.config.optimize_level);

        Ok(Program { chunks: Rc::new(table), basis_entry, entry: main_entry })
    }

    fn splice_exposed(
        &self,
        table: &mut ChunkTable,
        path: &[String],
        resolver: &dyn Resolver,
        seen: &mut Vec<Vec<String>>,
    ) -> VenResult<()> {
        if seen.contains(&path.to_vec()) {
            return Ok(());
        }
        seen.push(path.to_vec());
        for (file, source) in resolver.files_for(path) {
            let file = file.display().to_string();
            let unit = Reader::read(&source, &file)?;
            for nested in &unit.exposes {
                self.splice_exposed(table, nested, resolver, seen)?;
            }
            let compiled = compile_program(&unit.quotes, Rc::from(file.as_str()))?;
            table.merge(compiled.chunks);
        }
        Ok(())
    }

    /// Runs a built `Program` against `host`: binds the native builtins,
    /// evaluates the basis to populate the root scope with its Ven-level
    /// helpers, then evaluates the program's own entry chunk.
    pub fn run(&self, program: &Program, host: &mut dyn Host) -> VenResult<Value> {
        let root = Scope::root();
        for builtin in &self.builtin_bindings {
            root.borrow_mut().define_local(
                builtin.name.clone(),
                Value::Function(Function::Builtin(Rc::new(builtin.clone()))),
            );
        }
        let mut vm = Vm::new(program.chunks.clone(), self.builtins.clone(), root.clone(), host, self.config.test_mode)
            .with_budget(self.config.instruction_budget);
        vm.run(program.basis_entry, &root)?;
        vm.run(program.entry, &root)
    }

    /// Reads, compiles, optimizes, and runs `source` in one shot — the
    /// common case for the CLI and for tests that don't need an exposed
    /// module graph.
    pub fn eval(&self, source: &str, file: &str, host: &mut dyn Host) -> VenResult<Value> {
        let resolver = FsResolver::new(Path::new(file).parent().unwrap_or_else(|| Path::new(".")));
        let program = self.build(source, file, &resolver)?;
        self.run(&program, host)
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
        fn slurp(&mut self, _: &str) -> VenResult<String> {
            Ok(String::new())
        }
        fn burp(&mut self, _: &str, _: &str) -> VenResult<()> {
            Ok(())
        }
    }

    #[test]
    fn evaluates_simple_program_through_the_full_pipeline() {
        let engine = Engine::new(EngineConfig::default());
        let mut host = NullHost;
        let result = engine.eval("1 + 1;", "t.ven", &mut host).unwrap();
        assert_eq!(result, Value::num(2));
    }

    #[test]
    fn basis_helpers_are_available_to_user_programs() {
        let engine = Engine::new(EngineConfig::default());
        let mut host = NullHost;
        let result = engine.eval("__iter([1, 2, 3], lambda(x) { x * 2 });", "t.ven", &mut host).unwrap();
        let Value::Vec(items) = result else { panic!("expected vec") };
        assert_eq!(items.borrow().len(), 3);
    }
}
