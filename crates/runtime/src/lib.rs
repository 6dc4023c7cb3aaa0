//! Ven VM: the bytecode virtual machine, generic dispatch, cooperative task
//! scheduler, baked-in basis, and program pipeline that turn a `ven-compiler`
//! `CompileUnit` into a running Ven program.
//!
//! `ven-cli` is the only expected consumer: construct an [`Engine`], call
//! [`Engine::eval`] (or [`Engine::build`] + [`Engine::run`] when a `Resolver`
//! and a `Scheduler` need to be driven directly), and supply a [`Host`] for
//! the native side effects (`say`, `ask`, `slurp`, `burp`, `write`).

pub mod basis;
pub mod builtins;
pub mod interrupt;
pub mod pipeline;
pub mod scheduler;
pub mod serialize;
pub mod vm;

pub use builtins::io::StdHost;
pub use pipeline::{Engine, EngineConfig, FsResolver, Program, Resolver};
pub use scheduler::{new_channel, Channel, Scheduler, Task, TaskOutcome};
pub use vm::Vm;

pub use ven_core::Host;
