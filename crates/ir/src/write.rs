//! Textual IR writer.
//!
//! Renders functions as folded s-expressions for logs, error messages, and
//! tests. This is the IR's own notation, close to but not exactly the wasm
//! text format; canonical `.wat` output goes through the binary encoder and
//! an external printer.

use crate::entities::OptionalLabel;
use crate::expr::ExprData;
use crate::function::Function;
use crate::module::Module;
use crate::types::Type;
use crate::Expr;
use core::fmt::{self, Write};

/// Write a function to `w` as folded s-expressions.
pub fn write_function(w: &mut dyn Write, func: &Function) -> fmt::Result {
    write!(w, "(func")?;
    if !func.signature.params.is_empty() {
        write!(w, " (param")?;
        for ty in &func.signature.params {
            write!(w, " {ty}")?;
        }
        write!(w, ")")?;
    }
    if let Some(result) = func.signature.result {
        write!(w, " (result {result})")?;
    }
    if !func.locals.is_empty() {
        write!(w, " (local")?;
        for ty in &func.locals {
            write!(w, " {ty}")?;
        }
        write!(w, ")")?;
    }
    writeln!(w)?;
    write_expr(w, func, func.body, 1)?;
    writeln!(w, "\n)")
}

fn indent(w: &mut dyn Write, depth: usize) -> fmt::Result {
    write!(w, "{:1$}", "", depth * 2)
}

/// The wasm-style mnemonic of a memory access.
fn mem_mnemonic(ty: Type, bytes: u8, signed: bool, load: bool) -> String {
    let op = if load { "load" } else { "store" };
    let width = match (ty, bytes) {
        (Type::I32, 4) | (Type::I64, 8) | (Type::F32, 4) | (Type::F64, 8) => String::new(),
        (_, b) => format!("{}", 8 * u32::from(b)),
    };
    let sign = if width.is_empty() || !load {
        ""
    } else if signed {
        "_s"
    } else {
        "_u"
    };
    format!("{ty}.{op}{width}{sign}")
}

fn write_expr(w: &mut dyn Write, func: &Function, expr: Expr, depth: usize) -> fmt::Result {
    let dfg = &func.dfg;
    indent(w, depth)?;
    let ty = dfg.ty(expr);
    match &dfg[expr] {
        ExprData::Block { name, list } => {
            write!(w, "(block{}", OptionalLabel(*name))?;
            if ty != Type::None {
                write!(w, " {ty}")?;
            }
            write_children(w, func, list.iter().copied(), depth)?;
        }
        ExprData::If {
            condition,
            if_true,
            if_false,
        } => {
            write!(w, "(if")?;
            if ty != Type::None {
                write!(w, " {ty}")?;
            }
            let children = [Some(*condition), Some(*if_true), *if_false];
            write_children(w, func, children.into_iter().flatten(), depth)?;
        }
        ExprData::Loop { name, body } => {
            write!(w, "(loop{}", OptionalLabel(*name))?;
            if ty != Type::None {
                write!(w, " {ty}")?;
            }
            write_children(w, func, [*body].into_iter(), depth)?;
        }
        ExprData::Break {
            name,
            value,
            condition,
        } => {
            let op = if condition.is_some() { "br_if" } else { "br" };
            write!(w, "({op} ${name}")?;
            write_children(w, func, value.iter().chain(condition.iter()).copied(), depth)?;
        }
        ExprData::Switch {
            targets,
            default,
            value,
            condition,
        } => {
            write!(w, "(br_table")?;
            for target in targets {
                write!(w, " ${target}")?;
            }
            write!(w, " ${default}")?;
            write_children(
                w,
                func,
                value.iter().copied().chain([*condition]),
                depth,
            )?;
        }
        ExprData::Call { target, operands } => {
            write!(w, "(call {target}")?;
            write_children(w, func, operands.iter().copied(), depth)?;
        }
        ExprData::CallImport { import, operands } => {
            write!(w, "(call_import {import}")?;
            write_children(w, func, operands.iter().copied(), depth)?;
        }
        ExprData::CallIndirect {
            sig,
            operands,
            target,
        } => {
            write!(w, "(call_indirect {sig}")?;
            write_children(w, func, operands.iter().copied().chain([*target]), depth)?;
        }
        ExprData::LocalGet { local } => write!(w, "(local.get {local})")?,
        ExprData::LocalSet { local, value, tee } => {
            let op = if *tee { "local.tee" } else { "local.set" };
            write!(w, "({op} {local}")?;
            write_children(w, func, [*value].into_iter(), depth)?;
        }
        ExprData::GlobalGet { global } => write!(w, "(global.get {global})")?,
        ExprData::GlobalSet { global, value } => {
            write!(w, "(global.set {global}")?;
            write_children(w, func, [*value].into_iter(), depth)?;
        }
        ExprData::Load {
            bytes,
            signed,
            offset,
            ptr,
            ..
        } => {
            write!(w, "({}", mem_mnemonic(ty, *bytes, *signed, true))?;
            if *offset != 0 {
                write!(w, " offset={offset}")?;
            }
            write_children(w, func, [*ptr].into_iter(), depth)?;
        }
        ExprData::Store {
            bytes,
            offset,
            ptr,
            value,
            value_ty,
            ..
        } => {
            write!(w, "({}", mem_mnemonic(*value_ty, *bytes, false, false))?;
            if *offset != 0 {
                write!(w, " offset={offset}")?;
            }
            write_children(w, func, [*ptr, *value].into_iter(), depth)?;
        }
        ExprData::Const { value } => write!(w, "({value})")?,
        ExprData::Unary { op, value } => {
            write!(w, "({}", op.mnemonic())?;
            write_children(w, func, [*value].into_iter(), depth)?;
        }
        ExprData::Binary { op, left, right } => {
            write!(w, "({}", op.mnemonic())?;
            write_children(w, func, [*left, *right].into_iter(), depth)?;
        }
        ExprData::Select {
            if_true,
            if_false,
            condition,
        } => {
            write!(w, "(select")?;
            write_children(w, func, [*if_true, *if_false, *condition].into_iter(), depth)?;
        }
        ExprData::Drop { value } => {
            write!(w, "(drop")?;
            write_children(w, func, [*value].into_iter(), depth)?;
        }
        ExprData::Return { value } => {
            write!(w, "(return")?;
            write_children(w, func, value.iter().copied(), depth)?;
        }
        ExprData::Host { op, operands } => {
            write!(w, "({}", op.mnemonic())?;
            write_children(w, func, operands.iter().copied(), depth)?;
        }
        ExprData::Nop => write!(w, "(nop)")?,
        ExprData::Unreachable => write!(w, "(unreachable)")?,
    }
    Ok(())
}

fn write_children(
    w: &mut dyn Write,
    func: &Function,
    children: impl Iterator<Item = Expr>,
    depth: usize,
) -> fmt::Result {
    for child in children {
        writeln!(w)?;
        write_expr(w, func, child, depth + 1)?;
    }
    write!(w, ")")
}

/// A printable wrapper for a function.
pub struct DisplayFunction<'a>(pub &'a Function);

impl fmt::Display for DisplayFunction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_function(f, self.0)
    }
}

impl Function {
    /// Display this function as folded s-expressions.
    pub fn display(&self) -> DisplayFunction<'_> {
        DisplayFunction(self)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "(module")?;
        for (index, func) in self.functions.iter() {
            write!(f, ";; {index}\n{}", func.display())?;
        }
        writeln!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::function::Signature;
    use crate::SignatureIndex;

    #[test]
    fn renders_nested_blocks() {
        let mut func = Function::new(
            Signature::new(vec![], Some(Type::I32)),
            SignatureIndex::from_u32(0),
        );
        let mut b = Builder::new(&mut func.dfg);
        let c = b.i32_const(42);
        let block = b.block(None, vec![c], Type::I32);
        func.body = block;
        let text = func.display().to_string();
        assert!(text.contains("(block i32"), "{text}");
        assert!(text.contains("(i32.const 42)"), "{text}");
    }
}
