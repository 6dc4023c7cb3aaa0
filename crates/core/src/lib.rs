//! Ven Core: the value model, scope/context model, and the operator
//! coercion tables shared by the reader's readtime evaluator and the VM.
//!
//! # Modules
//!
//! - `value`: the tagged `Value` sum type, the function family, boxes,
//!   and the `Host` trait builtins use to perform side effects.
//! - `quote`: the AST node type, itself a first-class `Value` (§3.1).
//! - `scope`: nested scopes (bound vs local slots), the superlocal stack,
//!   and the trace stack (§3.3, §4.9).
//! - `ops`: unary/binary operator semantics and coercion (§4.8), deep
//!   equality (`eqv?`), and compound-type matching (§4.7).
//! - `error`: the five `VenError` kinds (§7).

pub mod error;
pub mod ops;
pub mod quote;
pub mod scope;
pub mod value;

pub use error::{TraceFrame, VenError, VenResult};
pub use quote::{
    quote_to_value, BinaryOp, ConstrainedParamQ, FieldStep, Quote, QuoteKind, ReturnKind, Tag,
    UnaryOp,
};
pub use scope::{Scope, SuperlocalStack, TraceStack};
pub use value::{
    BoxDecl, BoxInstance, Builtin, ChunkId, CompoundType, Concrete, Constraint, ConstrainedParam,
    Function, FrozenLambda, Generic, Host, Internal, LambdaValue, MapCell, MapKey, Num, Partial,
    RegexValue, TypeName, TypeValue, Value, VecCell,
};
