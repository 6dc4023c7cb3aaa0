//! `venc`: the Ven compiler front end — Read, readtime metaprogramming, and
//! Compile (§4.1–§4.3). The Optimizer lives here too since it operates
//! purely on the bytecode this crate produces.

pub mod compile;
pub mod lexer;
pub mod optimize;
pub mod precedence;
pub mod reader;
pub mod readtime;
pub mod token;

pub use compile::{compile_program, Chunk, ChunkTable, CompileUnit, Op};
pub use optimize::optimize;
pub use precedence::Precedence;
pub use reader::{ReadUnit, Reader, UserNud};
pub use token::{Token, TokenKind};

use std::rc::Rc;

use ven_core::VenError;

/// Run the full front end on one source file: Read then Compile. Optimizing
/// is a separate, explicit step (the CLI's `-O` controls whether/how many
/// passes run), so it is not folded in here.
pub fn build(source: &str, file: &str) -> Result<CompileUnit, VenError> {
    let unit = Reader::read(source, file)?;
    compile_program(&unit.quotes, Rc::from(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_trivial_program() {
        let compiled = build("1 + 1;", "t.ven").unwrap();
        assert!(!compiled.chunks.is_empty());
    }
}
