//! The pass interface and runner.
//!
//! Passes declare whether they are function-parallel. A function-parallel
//! pass touches nothing outside the function it is handed, so the runner
//! fans such passes out across functions with one fresh pass instance per
//! function; nothing is shared and no ordering is guaranteed or needed
//! between functions. Other passes run on the whole module, sequentially.

use crate::dce::DeadCodeElimination;
use core::any::Any;
use prune_ir::{timing, Function, Module};
use rayon::prelude::*;

/// A transformation over a module or its functions.
pub trait Pass: Send + Sync {
    /// The name the pass is registered under.
    fn name(&self) -> &'static str;

    /// Whether independent functions can be processed concurrently by
    /// separate instances of this pass.
    fn is_function_parallel(&self) -> bool {
        false
    }

    /// Create a fresh instance of this pass. Function-parallel passes get
    /// one instance per function, so per-walk state needs no synchronization.
    fn create(&self) -> Box<dyn Pass>;

    /// Start this pass's timer; see [`prune_ir::timing`].
    fn start_timer(&self) -> Box<dyn Any> {
        timing::other_pass()
    }

    /// Run on a single function.
    fn run_on_function(&mut self, func: &mut Function);

    /// Run on a whole module. The default visits each function in turn.
    fn run_on_module(&mut self, module: &mut Module) {
        for func in module.functions.values_mut() {
            self.run_on_function(func);
        }
    }
}

/// Look up a pass by registered name.
pub fn create_pass(name: &str) -> Option<Box<dyn Pass>> {
    match name {
        "dce" => Some(Box::new(DeadCodeElimination::new())),
        _ => None,
    }
}

/// Runs a sequence of passes over a module.
#[derive(Default)]
pub struct PassRunner {
    passes: Vec<Box<dyn Pass>>,
}

impl PassRunner {
    /// Create an empty runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pass to the sequence.
    pub fn add(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Run all passes, in order, over `module`.
    pub fn run(&mut self, module: &mut Module) {
        for pass in &mut self.passes {
            let _tt = pass.start_timer();
            if pass.is_function_parallel() {
                log::debug!(
                    "running function-parallel pass '{}' on {} functions",
                    pass.name(),
                    module.functions.len()
                );
                let pass = &*pass;
                let funcs: Vec<&mut Function> = module.functions.values_mut().collect();
                funcs.into_par_iter().for_each(|func| {
                    let mut instance = pass.create();
                    instance.run_on_function(func);
                });
            } else {
                log::debug!("running pass '{}'", pass.name());
                pass.run_on_module(module);
            }
        }
    }
}
