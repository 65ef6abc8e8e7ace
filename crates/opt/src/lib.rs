//! Tree-rewriting optimization passes for the prune WebAssembly IR.
//!
//! Passes implement the [`Pass`] trait and are driven by a [`PassRunner`],
//! which fans function-parallel passes out across a module's functions with
//! one fresh pass instance per function. The only optimization implemented so
//! far is [`DeadCodeElimination`].

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

pub mod block_utils;
pub mod break_seeker;
mod dce;
mod pass;
mod type_updater;

pub use crate::dce::DeadCodeElimination;
pub use crate::pass::{create_pass, Pass, PassRunner};
pub use crate::type_updater::TypeUpdater;

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
