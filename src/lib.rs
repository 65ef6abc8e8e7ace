//! The library backing the `wasm-prune` executable.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use prune_opt::{create_pass, PassRunner};
use prune_wasm::{ModuleReader, ModuleWriter};
use std::path::PathBuf;

const AFTER_HELP: &str = "By default the dead code elimination pass is run.\n\
        \n\
        Usage examples:\n\
        \n\
        Optimizing a WebAssembly module:\n\
        \n  \
        wasm-prune example.wasm\n\
        \n\
        Optimizing a text module and printing the result as text:\n\
        \n  \
        wasm-prune example.wat -S -o example.opt.wat\n";

/// Optimizes a WebAssembly module.
#[derive(Parser)]
#[command(version, after_help = AFTER_HELP)]
pub struct PruneCommand {
    /// The path of the WebAssembly module to optimize, in binary or text
    /// format.
    #[arg(index = 1, value_name = "MODULE")]
    pub module: PathBuf,

    /// The path of the output module; defaults to `<MODULE>.opt.wasm`.
    ///
    /// A `.wasm` suffix selects the binary format; any other suffix selects
    /// text.
    #[arg(short = 'o', long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Write the output in the text format regardless of the suffix.
    #[arg(short = 'S', long)]
    pub emit_text: bool,

    /// A pass to run; repeatable, run in order. Defaults to `dce`.
    #[arg(long = "pass", value_name = "NAME")]
    pub passes: Vec<String>,

    /// Validate the optimized module before writing it.
    #[arg(long)]
    pub validate: bool,

    /// Print a pass timing report to stderr.
    #[arg(long)]
    pub time_passes: bool,
}

impl PruneCommand {
    /// Executes the command.
    pub fn execute(self) -> Result<()> {
        let mut module = ModuleReader::new()
            .read(&self.module)
            .with_context(|| format!("failed to read {}", self.module.display()))?;

        let mut runner = PassRunner::new();
        let default_passes = [String::from("dce")];
        let names: &[String] = if self.passes.is_empty() {
            &default_passes
        } else {
            &self.passes
        };
        for name in names {
            let pass = create_pass(name).ok_or_else(|| anyhow!("unknown pass '{name}'"))?;
            runner.add(pass);
        }
        runner.run(&mut module);

        if self.validate {
            let binary = prune_wasm::encode_module(&module);
            let _tt = prune_ir::timing::validate();
            wasmparser::validate(&binary).context("optimized module failed validation")?;
        }

        let output = self
            .output
            .unwrap_or_else(|| self.module.with_extension("opt.wasm"));
        let writer = ModuleWriter::new();
        let written = if self.emit_text {
            writer.write_text(&module, &output)
        } else {
            writer.write(&module, &output)
        };
        written.with_context(|| format!("failed to write {}", output.display()))?;

        if self.time_passes {
            eprint!("{}", prune_ir::timing::take_current());
        }
        Ok(())
    }
}
