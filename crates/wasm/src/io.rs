//! Module file reading and writing.
//!
//! Abstracts reading and writing, supporting both text and binary depending
//! on the path suffix. When the suffix is unclear, writing defaults to text,
//! while reading checks for the binary magic number and falls back to text.

use crate::{decode_module, encode_module, Result};
use prune_ir::{timing, Module};
use std::fs;
use std::path::Path;

/// The 4-byte magic prefix of a binary module.
const WASM_MAGIC: &[u8; 4] = b"\0asm";

fn suffix(path: &Path) -> Option<&str> {
    path.extension().and_then(|s| s.to_str())
}

/// Reads a module from a file, in either format.
#[derive(Default)]
pub struct ModuleReader;

impl ModuleReader {
    /// Create a reader.
    pub fn new() -> Self {
        Self
    }

    /// Read a module, picking the format by suffix, or by the magic number
    /// when the suffix is unclear.
    pub fn read(&self, path: &Path) -> Result<Module> {
        let _tt = timing::process_file();
        match suffix(path) {
            Some("wat") | Some("wast") => self.read_text(path),
            Some("wasm") => self.read_binary(path),
            _ => {
                let contents = fs::read(path)?;
                if contents.starts_with(WASM_MAGIC) {
                    log::debug!("reading binary from {}", path.display());
                    decode_module(&contents)
                } else {
                    // default to text
                    self.read_text(path)
                }
            }
        }
    }

    /// Read a text module.
    pub fn read_text(&self, path: &Path) -> Result<Module> {
        log::debug!("reading text from {}", path.display());
        let binary = {
            let _tt = timing::parse_text();
            wat::parse_file(path)?
        };
        decode_module(&binary)
    }

    /// Read a binary module.
    pub fn read_binary(&self, path: &Path) -> Result<Module> {
        log::debug!("reading binary from {}", path.display());
        let contents = fs::read(path)?;
        decode_module(&contents)
    }
}

/// Writes a module to a file, in either format.
#[derive(Default)]
pub struct ModuleWriter;

impl ModuleWriter {
    /// Create a writer.
    pub fn new() -> Self {
        Self
    }

    /// Write a module, in binary for a `.wasm` suffix and in text for
    /// anything else.
    pub fn write(&self, module: &Module, path: &Path) -> Result<()> {
        match suffix(path) {
            Some("wasm") => self.write_binary(module, path),
            _ => self.write_text(module, path),
        }
    }

    /// Write a binary module.
    pub fn write_binary(&self, module: &Module, path: &Path) -> Result<()> {
        log::debug!("writing binary to {}", path.display());
        fs::write(path, encode_module(module))?;
        Ok(())
    }

    /// Write a text module.
    pub fn write_text(&self, module: &Module, path: &Path) -> Result<()> {
        log::debug!("writing text to {}", path.display());
        fs::write(path, self.render_text(module)?)?;
        Ok(())
    }

    /// Render a module as text. The module goes through the binary encoding,
    /// so the output is exactly what a binary round trip would produce.
    pub fn render_text(&self, module: &Module) -> Result<String> {
        let binary = encode_module(module);
        let _tt = timing::write_text();
        wasmprinter::print_bytes(binary).map_err(crate::Error::Print)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("prune-io-{}-{name}", std::process::id()));
        path
    }

    #[test]
    fn suffixless_reads_sniff_the_magic_number() {
        let wasm = wat::parse_str("(module (func (result i32) (i32.const 3)))").unwrap();
        assert!(wasm.starts_with(WASM_MAGIC));
        let path = scratch_path("magic");
        fs::write(&path, &wasm).unwrap();
        let module = ModuleReader::new().read(&path).unwrap();
        assert_eq!(module.functions.len(), 1);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn suffixless_reads_fall_back_to_text() {
        let path = scratch_path("text");
        fs::write(&path, "(module (func))").unwrap();
        let module = ModuleReader::new().read(&path).unwrap();
        assert_eq!(module.functions.len(), 1);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_defaults_to_text_for_odd_suffixes() {
        let wasm = wat::parse_str("(module (func))").unwrap();
        let module = decode_module(&wasm).unwrap();
        let path = scratch_path("out.mystery");
        ModuleWriter::new().write(&module, &path).unwrap();
        let written = fs::read(&path).unwrap();
        assert!(!written.starts_with(WASM_MAGIC));
        assert!(written.starts_with(b"(module"));
        fs::remove_file(&path).unwrap();
    }
}
