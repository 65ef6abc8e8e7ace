//! Decoding WebAssembly binaries into the expression IR.
//!
//! Function bodies arrive as a flat operator stream; this module rebuilds the
//! expression trees. A stack of control frames mirrors the wasm label stack,
//! and each frame accumulates its expressions in evaluation order. Operand
//! pops have two wrinkles:
//!
//! - A value may sit beneath side-effecting statements that were pushed after
//!   it (e.g. `i32.const`, `call $void`, `i32.const`, `i32.add`). Plain
//!   constants move past such statements freely; anything else is spilled to
//!   a synthesized scratch local so evaluation order is preserved.
//! - Code following a trap or an unconditional branch is decoded against a
//!   polymorphic stack. It is still materialized (later passes fold it away),
//!   with fresh `Unreachable` nodes standing in where the stack has run out.

use crate::{unsupported, Error, Result};
use prune_ir::{
    timing, Builder, DataSegment, ElemSegment, Export, ExportKind, Expr, ExprData, FuncIndex,
    Function, Global, GlobalIndex, GlobalType, Ieee32, Ieee64, Import, ImportKind, InitExpr,
    Label, Limits, Literal, Memory, Module, Signature, SignatureIndex, Table, Type, Unop,
};
use wasmparser::{BlockType, ConstExpr, FunctionBody, MemArg, Operator, Parser, Payload, ValType};

/// Decode a binary WebAssembly module.
///
/// The input is expected to be valid; structural errors are reported, but no
/// full validation is performed here.
pub fn decode_module(data: &[u8]) -> Result<Module> {
    let _tt = timing::parse_binary();
    let mut module = Module::new();
    // The unified function index space (imports first), and the declared
    // signatures of defined functions awaiting their bodies.
    let mut func_sigs: Vec<SignatureIndex> = Vec::new();
    let mut defined_sigs: Vec<SignatureIndex> = Vec::new();
    let mut num_imported_funcs = 0u32;

    for payload in Parser::new(0).parse_all(data) {
        match payload? {
            Payload::Version { .. } | Payload::End(_) => {}
            Payload::TypeSection(types) => {
                for ty in types.into_iter_err_on_gc_types() {
                    let ty = ty?;
                    module.signatures.push(signature(&ty)?);
                }
            }
            Payload::ImportSection(imports) => {
                for import in imports {
                    let import = import?;
                    let kind = match import.ty {
                        wasmparser::TypeRef::Func(sig) => {
                            func_sigs.push(SignatureIndex::from_u32(sig));
                            num_imported_funcs += 1;
                            ImportKind::Func(SignatureIndex::from_u32(sig))
                        }
                        wasmparser::TypeRef::Table(ty) => ImportKind::Table(table(&ty)?),
                        wasmparser::TypeRef::Memory(ty) => ImportKind::Memory(memory(&ty)?),
                        wasmparser::TypeRef::Global(ty) => ImportKind::Global(global_ty(&ty)?),
                        other => return Err(unsupported!("import type {other:?}")),
                    };
                    module.imports.push(Import {
                        module: import.module.to_string(),
                        field: import.name.to_string(),
                        kind,
                    });
                }
            }
            Payload::FunctionSection(funcs) => {
                for sig in funcs {
                    let sig = SignatureIndex::from_u32(sig?);
                    func_sigs.push(sig);
                    defined_sigs.push(sig);
                }
            }
            Payload::TableSection(tables) => {
                for t in tables {
                    let t = t?;
                    if !matches!(t.init, wasmparser::TableInit::RefNull) {
                        return Err(unsupported!("table initializer expression"));
                    }
                    module.tables.push(table(&t.ty)?);
                }
            }
            Payload::MemorySection(memories) => {
                for m in memories {
                    module.memories.push(memory(&m?)?);
                }
            }
            Payload::GlobalSection(globals) => {
                for g in globals {
                    let g = g?;
                    module.globals.push(Global {
                        ty: global_ty(&g.ty)?,
                        init: init_expr(&g.init_expr)?,
                    });
                }
            }
            Payload::ExportSection(exports) => {
                for e in exports {
                    let e = e?;
                    let kind = match e.kind {
                        wasmparser::ExternalKind::Func => ExportKind::Func,
                        wasmparser::ExternalKind::Table => ExportKind::Table,
                        wasmparser::ExternalKind::Memory => ExportKind::Memory,
                        wasmparser::ExternalKind::Global => ExportKind::Global,
                        other => return Err(unsupported!("export kind {other:?}")),
                    };
                    module.exports.push(Export {
                        name: e.name.to_string(),
                        kind,
                        index: e.index,
                    });
                }
            }
            Payload::StartSection { func, .. } => module.start = Some(func),
            Payload::ElementSection(elements) => {
                for elem in elements {
                    let elem = elem?;
                    let wasmparser::ElementKind::Active {
                        table_index,
                        offset_expr,
                    } = elem.kind
                    else {
                        return Err(unsupported!("non-active element segment"));
                    };
                    let wasmparser::ElementItems::Functions(items) = elem.items else {
                        return Err(unsupported!("element expressions"));
                    };
                    let mut entries = Vec::new();
                    for item in items {
                        entries.push(item?);
                    }
                    module.elem_segments.push(ElemSegment {
                        table_index: table_index.unwrap_or(0),
                        offset: init_expr(&offset_expr)?,
                        entries,
                    });
                }
            }
            Payload::DataSection(datas) => {
                for data in datas {
                    let data = data?;
                    let wasmparser::DataKind::Active {
                        memory_index,
                        offset_expr,
                    } = data.kind
                    else {
                        return Err(unsupported!("passive data segment"));
                    };
                    module.data_segments.push(DataSegment {
                        memory_index,
                        offset: init_expr(&offset_expr)?,
                        data: data.data.to_vec(),
                    });
                }
            }
            Payload::DataCountSection { .. } | Payload::CodeSectionStart { .. } => {}
            Payload::CodeSectionEntry(body) => {
                let index = module.functions.len();
                let sig_index = *defined_sigs
                    .get(index)
                    .ok_or_else(|| invalid("code entry without a declared function", 0))?;
                let signature = module
                    .signatures
                    .get(sig_index)
                    .ok_or_else(|| invalid("function signature out of range", 0))?
                    .clone();
                log::trace!("decoding function {index}");
                let func = FuncDecoder::new(
                    &module,
                    signature,
                    sig_index,
                    &func_sigs,
                    num_imported_funcs,
                )
                .decode(body)?;
                module.functions.push(func);
            }
            Payload::CustomSection(section) => {
                log::debug!("skipping custom section '{}'", section.name());
            }
            other => return Err(unsupported!("section {other:?}")),
        }
    }
    Ok(module)
}

fn invalid(message: &str, offset: usize) -> Error {
    Error::InvalidWebAssembly {
        message: message.to_string(),
        offset,
    }
}

fn valtype(ty: ValType) -> Result<Type> {
    match ty {
        ValType::I32 => Ok(Type::I32),
        ValType::I64 => Ok(Type::I64),
        ValType::F32 => Ok(Type::F32),
        ValType::F64 => Ok(Type::F64),
        other => Err(unsupported!("value type {other}")),
    }
}

fn signature(ty: &wasmparser::FuncType) -> Result<Signature> {
    let mut params = Vec::with_capacity(ty.params().len());
    for &param in ty.params() {
        params.push(valtype(param)?);
    }
    let result = match ty.results() {
        [] => None,
        &[result] => Some(valtype(result)?),
        _ => return Err(unsupported!("multiple results")),
    };
    Ok(Signature::new(params, result))
}

fn limits(initial: u64, maximum: Option<u64>) -> Result<Limits> {
    let min = u32::try_from(initial).map_err(|_| unsupported!("64-bit limits"))?;
    let max = match maximum {
        None => None,
        Some(max) => Some(u32::try_from(max).map_err(|_| unsupported!("64-bit limits"))?),
    };
    Ok(Limits { min, max })
}

fn table(ty: &wasmparser::TableType) -> Result<Table> {
    if !ty.element_type.is_func_ref() {
        return Err(unsupported!("table element type {}", ty.element_type));
    }
    if ty.shared || ty.table64 {
        return Err(unsupported!("shared or 64-bit table"));
    }
    Ok(Table {
        limits: limits(ty.initial, ty.maximum)?,
    })
}

fn memory(ty: &wasmparser::MemoryType) -> Result<Memory> {
    if ty.shared || ty.memory64 || ty.page_size_log2.is_some() {
        return Err(unsupported!("shared, 64-bit, or custom-page-size memory"));
    }
    Ok(Memory {
        limits: limits(ty.initial, ty.maximum)?,
    })
}

fn global_ty(ty: &wasmparser::GlobalType) -> Result<GlobalType> {
    if ty.shared {
        return Err(unsupported!("shared global"));
    }
    Ok(GlobalType {
        ty: valtype(ty.content_type)?,
        mutable: ty.mutable,
    })
}

fn init_expr(expr: &ConstExpr) -> Result<InitExpr> {
    let mut ops = expr.get_operators_reader();
    let init = match ops.read()? {
        Operator::I32Const { value } => InitExpr::Const(Literal::I32(value)),
        Operator::I64Const { value } => InitExpr::Const(Literal::I64(value)),
        Operator::F32Const { value } => {
            InitExpr::Const(Literal::F32(Ieee32::with_bits(value.bits())))
        }
        Operator::F64Const { value } => {
            InitExpr::Const(Literal::F64(Ieee64::with_bits(value.bits())))
        }
        Operator::GlobalGet { global_index } => InitExpr::GlobalGet(GlobalIndex::from_u32(global_index)),
        other => return Err(unsupported!("constant expression operator {other:?}")),
    };
    match ops.read()? {
        Operator::End => Ok(init),
        _ => Err(unsupported!("compound constant expression")),
    }
}

/// What introduced a control frame, along with any parts of the eventual
/// expression already decoded.
#[derive(Clone, Copy)]
enum FrameKind {
    /// The implicit function-level frame.
    Function,
    /// A `block`.
    Block,
    /// A `loop`.
    Loop,
    /// An `if` whose consequent is still being decoded.
    If {
        /// The already decoded condition.
        condition: Expr,
    },
    /// An `if` past its `else`.
    Else {
        /// The already decoded condition.
        condition: Expr,
        /// The sealed consequent arm.
        if_true: Expr,
    },
}

/// One entry of the control stack.
struct Frame {
    kind: FrameKind,
    /// Branch-target label, allocated the first time a branch names this
    /// frame.
    label: Option<Label>,
    /// The frame's declared result type.
    result_ty: Type,
    /// Everything decoded inside the frame, in evaluation order: trailing
    /// value-typed entries are the frame's operand stack.
    exprs: Vec<Expr>,
    /// Set once control in this frame cannot fall through; pops below the
    /// materialized expressions then produce fresh `Unreachable` nodes.
    polymorphic: bool,
}

impl Frame {
    fn new(kind: FrameKind, result_ty: Type) -> Self {
        Self {
            kind,
            label: None,
            result_ty,
            exprs: Vec::new(),
            polymorphic: false,
        }
    }
}

struct FuncDecoder<'a> {
    module: &'a Module,
    func: Function,
    frames: Vec<Frame>,
    /// Unified function index space: signature of every import and defined
    /// function.
    func_sigs: &'a [SignatureIndex],
    num_imported_funcs: u32,
    /// Byte offset of the operator being decoded, for error reporting.
    offset: usize,
}

impl<'a> FuncDecoder<'a> {
    fn new(
        module: &'a Module,
        signature: Signature,
        sig_index: SignatureIndex,
        func_sigs: &'a [SignatureIndex],
        num_imported_funcs: u32,
    ) -> Self {
        let result_ty = signature.result_ty();
        let func = Function::new(signature, sig_index);
        Self {
            module,
            func,
            frames: vec![Frame::new(FrameKind::Function, result_ty)],
            func_sigs,
            num_imported_funcs,
            offset: 0,
        }
    }

    fn decode(mut self, body: FunctionBody<'_>) -> Result<Function> {
        for locals in body.get_locals_reader()? {
            let (count, ty) = locals?;
            let ty = valtype(ty)?;
            for _ in 0..count {
                self.func.locals.push(ty);
            }
        }
        let mut ops = body.get_operators_reader()?;
        while !ops.eof() {
            self.offset = ops.original_position();
            let op = ops.read()?;
            if self.frames.is_empty() {
                return Err(invalid("operator after function end", self.offset));
            }
            self.op(op)?;
        }
        if !self.frames.is_empty() {
            return Err(invalid("unbalanced control flow", self.offset));
        }
        Ok(self.func)
    }

    fn err(&self, message: &str) -> Error {
        invalid(message, self.offset)
    }

    /// Append a decoded expression to the innermost frame.
    fn push(&mut self, expr: Expr) {
        let ty = self.func.dfg.ty(expr);
        let frame = self.frames.last_mut().expect("no open frame");
        frame.exprs.push(expr);
        if ty == Type::Unreachable {
            frame.polymorphic = true;
        }
    }

    /// Pop one operand value from the innermost frame.
    fn pop(&mut self) -> Result<Expr> {
        let frame = self.frames.last_mut().expect("no open frame");
        if let Some(&last) = frame.exprs.last() {
            if self.func.dfg.ty(last) != Type::None {
                return Ok(frame.exprs.pop().expect("just checked"));
            }
        }
        if frame.polymorphic {
            // The stack bottomed out in code following a trap; the operand
            // can never be evaluated, and a trap stands in for it.
            return Ok(Builder::new(&mut self.func.dfg).unreachable());
        }
        // The value sits beneath trailing statements. A constant can move
        // past them; anything else is spilled through a scratch local so the
        // original evaluation order is kept.
        let dfg = &self.func.dfg;
        let index = frame
            .exprs
            .iter()
            .rposition(|&e| dfg.ty(e).is_concrete())
            .ok_or_else(|| invalid("expected an operand on the stack", self.offset))?;
        let value = frame.exprs[index];
        if matches!(self.func.dfg[value], ExprData::Const { .. }) {
            frame.exprs.remove(index);
            return Ok(value);
        }
        let ty = self.func.dfg.ty(value);
        let local = self.func.add_local(ty);
        let mut b = Builder::new(&mut self.func.dfg);
        let set = b.local_set(local, value);
        let get = b.local_get(local, ty);
        frame.exprs[index] = set;
        Ok(get)
    }

    /// Pop `n` operands, in evaluation order.
    fn pop_operands(&mut self, n: usize) -> Result<Vec<Expr>> {
        let mut operands = Vec::with_capacity(n);
        for _ in 0..n {
            operands.push(self.pop()?);
        }
        operands.reverse();
        Ok(operands)
    }

    /// The label of the frame `relative_depth` levels up, allocating it on
    /// first use, and the type a branch there carries (`None` for a loop:
    /// its label is the loop start, which takes no value).
    fn branch_target(&mut self, relative_depth: u32) -> Result<(Label, Type)> {
        let index = self
            .frames
            .len()
            .checked_sub(1 + relative_depth as usize)
            .ok_or_else(|| invalid("branch depth out of range", self.offset))?;
        if self.frames[index].label.is_none() {
            self.frames[index].label = Some(self.func.new_label());
        }
        let frame = &self.frames[index];
        let carries = match frame.kind {
            FrameKind::Loop => Type::None,
            _ => frame.result_ty,
        };
        Ok((frame.label.expect("just set"), carries))
    }

    /// Seal a frame's expressions into a single arm or body expression.
    fn seal_arm(&mut self, exprs: Vec<Expr>, result_ty: Type) -> Expr {
        let mut b = Builder::new(&mut self.func.dfg);
        match exprs.len() {
            0 => b.nop(),
            1 => exprs[0],
            _ => b.block(None, exprs, result_ty),
        }
    }

    /// Close the innermost frame on `end`, pushing the finished expression
    /// to the parent (or installing the function body).
    fn finish_frame(&mut self) -> Result<()> {
        let Some(frame) = self.frames.pop() else {
            return Err(invalid("unbalanced end", self.offset));
        };
        let result_ty = frame.result_ty;
        let node = match frame.kind {
            FrameKind::Function | FrameKind::Block => {
                let materialize = matches!(frame.kind, FrameKind::Block);
                if !materialize && frame.label.is_none() {
                    self.seal_arm(frame.exprs, result_ty)
                } else {
                    let mut b = Builder::new(&mut self.func.dfg);
                    b.block(frame.label, frame.exprs, result_ty)
                }
            }
            FrameKind::Loop => {
                let body = self.seal_arm(frame.exprs, result_ty);
                let mut b = Builder::new(&mut self.func.dfg);
                let looped = b.loop_(frame.label, body);
                let ty = if self.func.dfg.is_unreachable(body) {
                    Type::Unreachable
                } else {
                    result_ty
                };
                self.func.dfg.set_ty(looped, ty);
                looped
            }
            FrameKind::If { condition } => {
                let if_true = self.seal_arm(frame.exprs, result_ty);
                let mut b = Builder::new(&mut self.func.dfg);
                let node = b.if_(condition, if_true, None);
                self.wrap_branch_target(node, frame.label, result_ty)
            }
            FrameKind::Else { condition, if_true } => {
                let if_false = self.seal_arm(frame.exprs, result_ty);
                let mut b = Builder::new(&mut self.func.dfg);
                let node = b.if_(condition, if_true, Some(if_false));
                self.wrap_branch_target(node, frame.label, result_ty)
            }
        };
        if self.frames.is_empty() {
            self.func.body = node;
        } else {
            self.push(node);
        }
        Ok(())
    }

    /// Branches can target an `if`; the IR expresses that by wrapping the
    /// `if` in a labeled block.
    fn wrap_branch_target(&mut self, node: Expr, label: Option<Label>, result_ty: Type) -> Expr {
        match label {
            None => node,
            Some(label) => {
                let mut b = Builder::new(&mut self.func.dfg);
                b.block(Some(label), vec![node], result_ty)
            }
        }
    }

    fn blocktype(&self, ty: BlockType) -> Result<Type> {
        match ty {
            BlockType::Empty => Ok(Type::None),
            BlockType::Type(ty) => valtype(ty),
            BlockType::FuncType(_) => Err(unsupported!("multi-value block type")),
        }
    }

    /// The signature of a unified function index. The reference borrows the
    /// module, not the decoder, so decoding can continue while it is held.
    fn callee_sig(&self, function_index: u32) -> Result<&'a Signature> {
        let func_sigs = self.func_sigs;
        let module = self.module;
        let sig = func_sigs
            .get(function_index as usize)
            .ok_or_else(|| self.err("call target out of range"))?;
        module
            .signatures
            .get(*sig)
            .ok_or_else(|| self.err("call signature out of range"))
    }

    fn local_ty(&self, local: u32) -> Result<Type> {
        self.func
            .local_ty(local)
            .ok_or_else(|| self.err("local index out of range"))
    }

    fn global_ty(&self, global: u32) -> Result<Type> {
        self.module
            .global_ty(GlobalIndex::from_u32(global))
            .map(|g| g.ty)
            .ok_or_else(|| self.err("global index out of range"))
    }

    fn memarg(&self, memarg: &MemArg) -> Result<(u32, u8)> {
        if memarg.memory != 0 {
            return Err(unsupported!("multiple memories"));
        }
        let offset =
            u32::try_from(memarg.offset).map_err(|_| unsupported!("64-bit address offset"))?;
        Ok((offset, memarg.align))
    }

    fn load(&mut self, ty: Type, bytes: u8, signed: bool, memarg: &MemArg) -> Result<()> {
        let (offset, align) = self.memarg(memarg)?;
        let ptr = self.pop()?;
        let load = self.func.dfg.make(
            ExprData::Load {
                bytes,
                signed,
                offset,
                align,
                ptr,
            },
            ty,
        );
        self.push(load);
        Ok(())
    }

    fn store(&mut self, value_ty: Type, bytes: u8, memarg: &MemArg) -> Result<()> {
        let (offset, align) = self.memarg(memarg)?;
        let value = self.pop()?;
        let ptr = self.pop()?;
        let store = self.func.dfg.make(
            ExprData::Store {
                bytes,
                offset,
                align,
                ptr,
                value,
                value_ty,
            },
            Type::None,
        );
        self.push(store);
        Ok(())
    }

    fn unary(&mut self, op: Unop) -> Result<()> {
        let value = self.pop()?;
        let expr = Builder::new(&mut self.func.dfg).unary(op, value);
        self.push(expr);
        Ok(())
    }

    fn binary(&mut self, op: prune_ir::Binop) -> Result<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        let expr = Builder::new(&mut self.func.dfg).binary(op, left, right);
        self.push(expr);
        Ok(())
    }

    fn op(&mut self, op: Operator<'_>) -> Result<()> {
        use prune_ir::Binop as B;
        use prune_ir::Unop as U;
        match op {
            Operator::Unreachable => {
                let expr = Builder::new(&mut self.func.dfg).unreachable();
                self.push(expr);
            }
            Operator::Nop => {
                let expr = Builder::new(&mut self.func.dfg).nop();
                self.push(expr);
            }
            Operator::Block { blockty } => {
                let result_ty = self.blocktype(blockty)?;
                self.frames.push(Frame::new(FrameKind::Block, result_ty));
            }
            Operator::Loop { blockty } => {
                let result_ty = self.blocktype(blockty)?;
                self.frames.push(Frame::new(FrameKind::Loop, result_ty));
            }
            Operator::If { blockty } => {
                let result_ty = self.blocktype(blockty)?;
                let condition = self.pop()?;
                self.frames
                    .push(Frame::new(FrameKind::If { condition }, result_ty));
            }
            Operator::Else => {
                let offset = self.offset;
                let frame = self
                    .frames
                    .last_mut()
                    .ok_or_else(|| invalid("else outside of an if", offset))?;
                let FrameKind::If { condition } = frame.kind else {
                    return Err(invalid("else outside of an if", offset));
                };
                let exprs = std::mem::take(&mut frame.exprs);
                let result_ty = frame.result_ty;
                let if_true = self.seal_arm(exprs, result_ty);
                let frame = self.frames.last_mut().expect("just seen");
                frame.kind = FrameKind::Else { condition, if_true };
                frame.polymorphic = false;
            }
            Operator::End => self.finish_frame()?,
            Operator::Br { relative_depth } => {
                let (label, carries) = self.branch_target(relative_depth)?;
                let value = if carries.is_concrete() {
                    Some(self.pop()?)
                } else {
                    None
                };
                let expr = Builder::new(&mut self.func.dfg).break_(label, value, None);
                self.push(expr);
            }
            Operator::BrIf { relative_depth } => {
                let (label, carries) = self.branch_target(relative_depth)?;
                let condition = self.pop()?;
                let value = if carries.is_concrete() {
                    Some(self.pop()?)
                } else {
                    None
                };
                let expr = Builder::new(&mut self.func.dfg).break_(label, value, Some(condition));
                self.push(expr);
            }
            Operator::BrTable { targets } => {
                let mut labels = Vec::with_capacity(targets.len() as usize);
                let depths: Vec<u32> = targets
                    .targets()
                    .collect::<std::result::Result<_, wasmparser::BinaryReaderError>>()?;
                for depth in depths {
                    labels.push(self.branch_target(depth)?.0);
                }
                let (default, carries) = self.branch_target(targets.default())?;
                let condition = self.pop()?;
                let value = if carries.is_concrete() {
                    Some(self.pop()?)
                } else {
                    None
                };
                let expr = Builder::new(&mut self.func.dfg).switch(labels, default, value, condition);
                self.push(expr);
            }
            Operator::Return => {
                let value = if self.func.signature.result_ty().is_concrete() {
                    Some(self.pop()?)
                } else {
                    None
                };
                let expr = Builder::new(&mut self.func.dfg).return_(value);
                self.push(expr);
            }
            Operator::Call { function_index } => {
                let sig = self.callee_sig(function_index)?;
                let num_params = sig.params.len();
                let result_ty = sig.result_ty();
                let operands = self.pop_operands(num_params)?;
                let mut b = Builder::new(&mut self.func.dfg);
                let expr = match function_index.checked_sub(self.num_imported_funcs) {
                    Some(defined) => {
                        b.call(FuncIndex::from_u32(defined), operands, result_ty)
                    }
                    None => b.call_import(function_index, operands, result_ty),
                };
                self.push(expr);
            }
            Operator::CallIndirect { type_index, .. } => {
                let sig_index = SignatureIndex::from_u32(type_index);
                let module = self.module;
                let sig = module
                    .signatures
                    .get(sig_index)
                    .ok_or_else(|| self.err("call_indirect signature out of range"))?;
                let num_params = sig.params.len();
                let result_ty = sig.result_ty();
                let target = self.pop()?;
                let operands = self.pop_operands(num_params)?;
                let expr =
                    Builder::new(&mut self.func.dfg).call_indirect(sig_index, operands, target, result_ty);
                self.push(expr);
            }
            Operator::Drop => {
                let value = self.pop()?;
                let expr = Builder::new(&mut self.func.dfg).drop_(value);
                self.push(expr);
            }
            Operator::Select => {
                let condition = self.pop()?;
                let if_false = self.pop()?;
                let if_true = self.pop()?;
                let dfg = &self.func.dfg;
                let ty = if dfg.ty(if_true).is_concrete() {
                    dfg.ty(if_true)
                } else if dfg.ty(if_false).is_concrete() {
                    dfg.ty(if_false)
                } else {
                    Type::Unreachable
                };
                let expr = Builder::new(&mut self.func.dfg).select(if_true, if_false, condition, ty);
                self.push(expr);
            }
            Operator::LocalGet { local_index } => {
                let ty = self.local_ty(local_index)?;
                let expr = Builder::new(&mut self.func.dfg).local_get(local_index, ty);
                self.push(expr);
            }
            Operator::LocalSet { local_index } => {
                self.local_ty(local_index)?;
                let value = self.pop()?;
                let expr = Builder::new(&mut self.func.dfg).local_set(local_index, value);
                self.push(expr);
            }
            Operator::LocalTee { local_index } => {
                self.local_ty(local_index)?;
                let value = self.pop()?;
                let expr = Builder::new(&mut self.func.dfg).local_tee(local_index, value);
                self.push(expr);
            }
            Operator::GlobalGet { global_index } => {
                let ty = self.global_ty(global_index)?;
                let expr =
                    Builder::new(&mut self.func.dfg).global_get(GlobalIndex::from_u32(global_index), ty);
                self.push(expr);
            }
            Operator::GlobalSet { global_index } => {
                self.global_ty(global_index)?;
                let value = self.pop()?;
                let expr =
                    Builder::new(&mut self.func.dfg).global_set(GlobalIndex::from_u32(global_index), value);
                self.push(expr);
            }
            Operator::MemorySize { .. } => {
                let expr = Builder::new(&mut self.func.dfg).host(prune_ir::HostOp::MemorySize, vec![]);
                self.push(expr);
            }
            Operator::MemoryGrow { .. } => {
                let delta = self.pop()?;
                let expr =
                    Builder::new(&mut self.func.dfg).host(prune_ir::HostOp::MemoryGrow, vec![delta]);
                self.push(expr);
            }
            Operator::I32Const { value } => {
                let expr = Builder::new(&mut self.func.dfg).const_(Literal::I32(value));
                self.push(expr);
            }
            Operator::I64Const { value } => {
                let expr = Builder::new(&mut self.func.dfg).const_(Literal::I64(value));
                self.push(expr);
            }
            Operator::F32Const { value } => {
                let expr = Builder::new(&mut self.func.dfg)
                    .const_(Literal::F32(Ieee32::with_bits(value.bits())));
                self.push(expr);
            }
            Operator::F64Const { value } => {
                let expr = Builder::new(&mut self.func.dfg)
                    .const_(Literal::F64(Ieee64::with_bits(value.bits())));
                self.push(expr);
            }

            Operator::I32Load { memarg } => self.load(Type::I32, 4, false, &memarg)?,
            Operator::I64Load { memarg } => self.load(Type::I64, 8, false, &memarg)?,
            Operator::F32Load { memarg } => self.load(Type::F32, 4, false, &memarg)?,
            Operator::F64Load { memarg } => self.load(Type::F64, 8, false, &memarg)?,
            Operator::I32Load8S { memarg } => self.load(Type::I32, 1, true, &memarg)?,
            Operator::I32Load8U { memarg } => self.load(Type::I32, 1, false, &memarg)?,
            Operator::I32Load16S { memarg } => self.load(Type::I32, 2, true, &memarg)?,
            Operator::I32Load16U { memarg } => self.load(Type::I32, 2, false, &memarg)?,
            Operator::I64Load8S { memarg } => self.load(Type::I64, 1, true, &memarg)?,
            Operator::I64Load8U { memarg } => self.load(Type::I64, 1, false, &memarg)?,
            Operator::I64Load16S { memarg } => self.load(Type::I64, 2, true, &memarg)?,
            Operator::I64Load16U { memarg } => self.load(Type::I64, 2, false, &memarg)?,
            Operator::I64Load32S { memarg } => self.load(Type::I64, 4, true, &memarg)?,
            Operator::I64Load32U { memarg } => self.load(Type::I64, 4, false, &memarg)?,
            Operator::I32Store { memarg } => self.store(Type::I32, 4, &memarg)?,
            Operator::I64Store { memarg } => self.store(Type::I64, 8, &memarg)?,
            Operator::F32Store { memarg } => self.store(Type::F32, 4, &memarg)?,
            Operator::F64Store { memarg } => self.store(Type::F64, 8, &memarg)?,
            Operator::I32Store8 { memarg } => self.store(Type::I32, 1, &memarg)?,
            Operator::I32Store16 { memarg } => self.store(Type::I32, 2, &memarg)?,
            Operator::I64Store8 { memarg } => self.store(Type::I64, 1, &memarg)?,
            Operator::I64Store16 { memarg } => self.store(Type::I64, 2, &memarg)?,
            Operator::I64Store32 { memarg } => self.store(Type::I64, 4, &memarg)?,

            Operator::I32Clz => self.unary(U::I32Clz)?,
            Operator::I32Ctz => self.unary(U::I32Ctz)?,
            Operator::I32Popcnt => self.unary(U::I32Popcnt)?,
            Operator::I32Eqz => self.unary(U::I32Eqz)?,
            Operator::I64Clz => self.unary(U::I64Clz)?,
            Operator::I64Ctz => self.unary(U::I64Ctz)?,
            Operator::I64Popcnt => self.unary(U::I64Popcnt)?,
            Operator::I64Eqz => self.unary(U::I64Eqz)?,
            Operator::F32Abs => self.unary(U::F32Abs)?,
            Operator::F32Neg => self.unary(U::F32Neg)?,
            Operator::F32Ceil => self.unary(U::F32Ceil)?,
            Operator::F32Floor => self.unary(U::F32Floor)?,
            Operator::F32Trunc => self.unary(U::F32Trunc)?,
            Operator::F32Nearest => self.unary(U::F32Nearest)?,
            Operator::F32Sqrt => self.unary(U::F32Sqrt)?,
            Operator::F64Abs => self.unary(U::F64Abs)?,
            Operator::F64Neg => self.unary(U::F64Neg)?,
            Operator::F64Ceil => self.unary(U::F64Ceil)?,
            Operator::F64Floor => self.unary(U::F64Floor)?,
            Operator::F64Trunc => self.unary(U::F64Trunc)?,
            Operator::F64Nearest => self.unary(U::F64Nearest)?,
            Operator::F64Sqrt => self.unary(U::F64Sqrt)?,
            Operator::I32WrapI64 => self.unary(U::I32WrapI64)?,
            Operator::I32TruncF32S => self.unary(U::I32TruncF32S)?,
            Operator::I32TruncF32U => self.unary(U::I32TruncF32U)?,
            Operator::I32TruncF64S => self.unary(U::I32TruncF64S)?,
            Operator::I32TruncF64U => self.unary(U::I32TruncF64U)?,
            Operator::I64ExtendI32S => self.unary(U::I64ExtendI32S)?,
            Operator::I64ExtendI32U => self.unary(U::I64ExtendI32U)?,
            Operator::I64TruncF32S => self.unary(U::I64TruncF32S)?,
            Operator::I64TruncF32U => self.unary(U::I64TruncF32U)?,
            Operator::I64TruncF64S => self.unary(U::I64TruncF64S)?,
            Operator::I64TruncF64U => self.unary(U::I64TruncF64U)?,
            Operator::F32ConvertI32S => self.unary(U::F32ConvertI32S)?,
            Operator::F32ConvertI32U => self.unary(U::F32ConvertI32U)?,
            Operator::F32ConvertI64S => self.unary(U::F32ConvertI64S)?,
            Operator::F32ConvertI64U => self.unary(U::F32ConvertI64U)?,
            Operator::F32DemoteF64 => self.unary(U::F32DemoteF64)?,
            Operator::F64ConvertI32S => self.unary(U::F64ConvertI32S)?,
            Operator::F64ConvertI32U => self.unary(U::F64ConvertI32U)?,
            Operator::F64ConvertI64S => self.unary(U::F64ConvertI64S)?,
            Operator::F64ConvertI64U => self.unary(U::F64ConvertI64U)?,
            Operator::F64PromoteF32 => self.unary(U::F64PromoteF32)?,
            Operator::I32ReinterpretF32 => self.unary(U::I32ReinterpretF32)?,
            Operator::I64ReinterpretF64 => self.unary(U::I64ReinterpretF64)?,
            Operator::F32ReinterpretI32 => self.unary(U::F32ReinterpretI32)?,
            Operator::F64ReinterpretI64 => self.unary(U::F64ReinterpretI64)?,

            Operator::I32Add => self.binary(B::I32Add)?,
            Operator::I32Sub => self.binary(B::I32Sub)?,
            Operator::I32Mul => self.binary(B::I32Mul)?,
            Operator::I32DivS => self.binary(B::I32DivS)?,
            Operator::I32DivU => self.binary(B::I32DivU)?,
            Operator::I32RemS => self.binary(B::I32RemS)?,
            Operator::I32RemU => self.binary(B::I32RemU)?,
            Operator::I32And => self.binary(B::I32And)?,
            Operator::I32Or => self.binary(B::I32Or)?,
            Operator::I32Xor => self.binary(B::I32Xor)?,
            Operator::I32Shl => self.binary(B::I32Shl)?,
            Operator::I32ShrS => self.binary(B::I32ShrS)?,
            Operator::I32ShrU => self.binary(B::I32ShrU)?,
            Operator::I32Rotl => self.binary(B::I32Rotl)?,
            Operator::I32Rotr => self.binary(B::I32Rotr)?,
            Operator::I32Eq => self.binary(B::I32Eq)?,
            Operator::I32Ne => self.binary(B::I32Ne)?,
            Operator::I32LtS => self.binary(B::I32LtS)?,
            Operator::I32LtU => self.binary(B::I32LtU)?,
            Operator::I32GtS => self.binary(B::I32GtS)?,
            Operator::I32GtU => self.binary(B::I32GtU)?,
            Operator::I32LeS => self.binary(B::I32LeS)?,
            Operator::I32LeU => self.binary(B::I32LeU)?,
            Operator::I32GeS => self.binary(B::I32GeS)?,
            Operator::I32GeU => self.binary(B::I32GeU)?,
            Operator::I64Add => self.binary(B::I64Add)?,
            Operator::I64Sub => self.binary(B::I64Sub)?,
            Operator::I64Mul => self.binary(B::I64Mul)?,
            Operator::I64DivS => self.binary(B::I64DivS)?,
            Operator::I64DivU => self.binary(B::I64DivU)?,
            Operator::I64RemS => self.binary(B::I64RemS)?,
            Operator::I64RemU => self.binary(B::I64RemU)?,
            Operator::I64And => self.binary(B::I64And)?,
            Operator::I64Or => self.binary(B::I64Or)?,
            Operator::I64Xor => self.binary(B::I64Xor)?,
            Operator::I64Shl => self.binary(B::I64Shl)?,
            Operator::I64ShrS => self.binary(B::I64ShrS)?,
            Operator::I64ShrU => self.binary(B::I64ShrU)?,
            Operator::I64Rotl => self.binary(B::I64Rotl)?,
            Operator::I64Rotr => self.binary(B::I64Rotr)?,
            Operator::I64Eq => self.binary(B::I64Eq)?,
            Operator::I64Ne => self.binary(B::I64Ne)?,
            Operator::I64LtS => self.binary(B::I64LtS)?,
            Operator::I64LtU => self.binary(B::I64LtU)?,
            Operator::I64GtS => self.binary(B::I64GtS)?,
            Operator::I64GtU => self.binary(B::I64GtU)?,
            Operator::I64LeS => self.binary(B::I64LeS)?,
            Operator::I64LeU => self.binary(B::I64LeU)?,
            Operator::I64GeS => self.binary(B::I64GeS)?,
            Operator::I64GeU => self.binary(B::I64GeU)?,
            Operator::F32Add => self.binary(B::F32Add)?,
            Operator::F32Sub => self.binary(B::F32Sub)?,
            Operator::F32Mul => self.binary(B::F32Mul)?,
            Operator::F32Div => self.binary(B::F32Div)?,
            Operator::F32Min => self.binary(B::F32Min)?,
            Operator::F32Max => self.binary(B::F32Max)?,
            Operator::F32Copysign => self.binary(B::F32Copysign)?,
            Operator::F32Eq => self.binary(B::F32Eq)?,
            Operator::F32Ne => self.binary(B::F32Ne)?,
            Operator::F32Lt => self.binary(B::F32Lt)?,
            Operator::F32Gt => self.binary(B::F32Gt)?,
            Operator::F32Le => self.binary(B::F32Le)?,
            Operator::F32Ge => self.binary(B::F32Ge)?,
            Operator::F64Add => self.binary(B::F64Add)?,
            Operator::F64Sub => self.binary(B::F64Sub)?,
            Operator::F64Mul => self.binary(B::F64Mul)?,
            Operator::F64Div => self.binary(B::F64Div)?,
            Operator::F64Min => self.binary(B::F64Min)?,
            Operator::F64Max => self.binary(B::F64Max)?,
            Operator::F64Copysign => self.binary(B::F64Copysign)?,
            Operator::F64Eq => self.binary(B::F64Eq)?,
            Operator::F64Ne => self.binary(B::F64Ne)?,
            Operator::F64Lt => self.binary(B::F64Lt)?,
            Operator::F64Gt => self.binary(B::F64Gt)?,
            Operator::F64Le => self.binary(B::F64Le)?,
            Operator::F64Ge => self.binary(B::F64Ge)?,

            other => return Err(unsupported!("operator {other:?}")),
        }
        Ok(())
    }
}
