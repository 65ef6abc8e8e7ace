//! Structured WebAssembly expression IR for the prune optimizer.
//!
//! Unlike a CFG-based compiler IR, this representation keeps WebAssembly's
//! structured control flow: functions are trees of expressions with nested
//! `Block`/`Loop`/`If` nodes and symbolic branch labels. Tree-rewriting
//! passes mutate functions in place; see the `prune-opt` crate.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

mod builder;
mod entities;
mod expr;
mod function;
mod module;
pub mod timing;
mod types;
mod write;

pub use crate::builder::Builder;
pub use crate::entities::{
    Expr, FuncIndex, GlobalIndex, Label, MemoryIndex, SignatureIndex, TableIndex,
};
pub use crate::expr::{Binop, ExprData, ExprDfg, HostOp, Unop};
pub use crate::function::{Function, Signature};
pub use crate::module::{
    DataSegment, ElemSegment, Export, ExportKind, Global, GlobalType, Import, ImportKind,
    InitExpr, Limits, Memory, Module, Table,
};
pub use crate::types::{Ieee32, Ieee64, Literal, Type};
pub use crate::write::{write_function, DisplayFunction};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
