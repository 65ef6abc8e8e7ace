//! Encoding the expression IR back to a WebAssembly binary.
//!
//! Lowering the trees to the stack machine is mostly mechanical; the two
//! points of interest both concern types:
//!
//! - A non-final element of a statement list that leaves a value gets a
//!   `drop` appended, since the list's later elements do not consume it.
//! - A control construct whose declared type is `Unreachable` has no wasm
//!   block type. It is emitted with an empty block type and followed by an
//!   `unreachable` opcode, which keeps the stack polymorphic for whatever
//!   the surrounding code expected of it.
//!
//! Branch label depths are recomputed from scratch here: the IR stores
//! symbolic labels, and every emitted `block`/`loop`/`if` contributes one
//! level whether labeled or not.

use prune_ir::{
    timing, Binop, Expr, ExprData, ExportKind, Function, HostOp, InitExpr, Label, Limits, Literal,
    Module, Type, Unop,
};
use std::borrow::Cow;
use wasm_encoder::{BlockType, ConstExpr, Instruction, MemArg, RefType, ValType};

/// Encode a module to the binary format.
pub fn encode_module(module: &Module) -> Vec<u8> {
    let _tt = timing::write_binary();
    let mut out = wasm_encoder::Module::new();

    if module.signatures.len() > 0 {
        let mut types = wasm_encoder::TypeSection::new();
        for sig in module.signatures.values() {
            let params: Vec<ValType> = sig.params.iter().map(|&ty| valtype(ty)).collect();
            let results: Vec<ValType> = sig.result.iter().map(|&ty| valtype(ty)).collect();
            types.ty().function(params, results);
        }
        out.section(&types);
    }

    if !module.imports.is_empty() {
        let mut imports = wasm_encoder::ImportSection::new();
        for import in &module.imports {
            let ty = match &import.kind {
                prune_ir::ImportKind::Func(sig) => {
                    wasm_encoder::EntityType::Function(sig.as_u32())
                }
                prune_ir::ImportKind::Table(table) => {
                    wasm_encoder::EntityType::Table(table_type(&table.limits))
                }
                prune_ir::ImportKind::Memory(memory) => {
                    wasm_encoder::EntityType::Memory(memory_type(&memory.limits))
                }
                prune_ir::ImportKind::Global(global) => {
                    wasm_encoder::EntityType::Global(global_type(global))
                }
            };
            imports.import(&import.module, &import.field, ty);
        }
        out.section(&imports);
    }

    if module.functions.len() > 0 {
        let mut functions = wasm_encoder::FunctionSection::new();
        for func in module.functions.values() {
            functions.function(func.sig_index.as_u32());
        }
        out.section(&functions);
    }

    if !module.tables.is_empty() {
        let mut tables = wasm_encoder::TableSection::new();
        for table in &module.tables {
            tables.table(table_type(&table.limits));
        }
        out.section(&tables);
    }

    if !module.memories.is_empty() {
        let mut memories = wasm_encoder::MemorySection::new();
        for memory in &module.memories {
            memories.memory(memory_type(&memory.limits));
        }
        out.section(&memories);
    }

    if !module.globals.is_empty() {
        let mut globals = wasm_encoder::GlobalSection::new();
        for global in &module.globals {
            globals.global(global_type(&global.ty), &const_expr(global.init));
        }
        out.section(&globals);
    }

    if !module.exports.is_empty() {
        let mut exports = wasm_encoder::ExportSection::new();
        for export in &module.exports {
            let kind = match export.kind {
                ExportKind::Func => wasm_encoder::ExportKind::Func,
                ExportKind::Table => wasm_encoder::ExportKind::Table,
                ExportKind::Memory => wasm_encoder::ExportKind::Memory,
                ExportKind::Global => wasm_encoder::ExportKind::Global,
            };
            exports.export(&export.name, kind, export.index);
        }
        out.section(&exports);
    }

    if let Some(function_index) = module.start {
        out.section(&wasm_encoder::StartSection { function_index });
    }

    if !module.elem_segments.is_empty() {
        let mut elements = wasm_encoder::ElementSection::new();
        for segment in &module.elem_segments {
            let table_index = (segment.table_index != 0).then_some(segment.table_index);
            elements.active(
                table_index,
                &const_expr(segment.offset),
                wasm_encoder::Elements::Functions(Cow::Borrowed(&segment.entries)),
            );
        }
        out.section(&elements);
    }

    if module.functions.len() > 0 {
        let mut code = wasm_encoder::CodeSection::new();
        for func in module.functions.values() {
            code.function(&encode_function(module, func));
        }
        out.section(&code);
    }

    if !module.data_segments.is_empty() {
        let mut datas = wasm_encoder::DataSection::new();
        for segment in &module.data_segments {
            datas.active(
                segment.memory_index,
                &const_expr(segment.offset),
                segment.data.iter().copied(),
            );
        }
        out.section(&datas);
    }

    out.finish()
}

fn valtype(ty: Type) -> ValType {
    match ty {
        Type::I32 => ValType::I32,
        Type::I64 => ValType::I64,
        Type::F32 => ValType::F32,
        Type::F64 => ValType::F64,
        Type::None | Type::Unreachable => panic!("{ty} is not a value type"),
    }
}

fn table_type(limits: &Limits) -> wasm_encoder::TableType {
    wasm_encoder::TableType {
        element_type: RefType::FUNCREF,
        table64: false,
        minimum: limits.min.into(),
        maximum: limits.max.map(Into::into),
        shared: false,
    }
}

fn memory_type(limits: &Limits) -> wasm_encoder::MemoryType {
    wasm_encoder::MemoryType {
        minimum: limits.min.into(),
        maximum: limits.max.map(Into::into),
        memory64: false,
        shared: false,
        page_size_log2: None,
    }
}

fn global_type(global: &prune_ir::GlobalType) -> wasm_encoder::GlobalType {
    wasm_encoder::GlobalType {
        val_type: valtype(global.ty),
        mutable: global.mutable,
        shared: false,
    }
}

fn const_expr(init: InitExpr) -> ConstExpr {
    match init {
        InitExpr::Const(Literal::I32(value)) => ConstExpr::i32_const(value),
        InitExpr::Const(Literal::I64(value)) => ConstExpr::i64_const(value),
        InitExpr::Const(Literal::F32(value)) => ConstExpr::f32_const(f32::from_bits(value.bits())),
        InitExpr::Const(Literal::F64(value)) => ConstExpr::f64_const(f64::from_bits(value.bits())),
        InitExpr::GlobalGet(global) => ConstExpr::global_get(global.as_u32()),
    }
}

fn encode_function(module: &Module, func: &Function) -> wasm_encoder::Function {
    // Run-length encode the declared locals.
    let mut locals: Vec<(u32, ValType)> = Vec::new();
    for &ty in &func.locals {
        let ty = valtype(ty);
        match locals.last_mut() {
            Some((count, last)) if *last == ty => *count += 1,
            _ => locals.push((1, ty)),
        }
    }
    let mut encoder = FuncEncoder {
        module,
        func,
        out: wasm_encoder::Function::new(locals),
        labels: Vec::new(),
    };
    encoder.body(func.body, func.signature.result_ty());
    encoder.out.instruction(&Instruction::End);
    encoder.out
}

struct FuncEncoder<'a> {
    module: &'a Module,
    func: &'a Function,
    out: wasm_encoder::Function,
    /// The emit-time label stack; one entry per emitted `block`/`loop`/`if`.
    labels: Vec<Option<Label>>,
}

impl FuncEncoder<'_> {
    fn ty(&self, expr: Expr) -> Type {
        self.func.dfg.ty(expr)
    }

    /// The branch depth of `label` from the innermost emitted frame.
    fn depth_of(&self, label: Label) -> u32 {
        let position = self
            .labels
            .iter()
            .rposition(|&l| l == Some(label))
            .expect("branch target must be in scope");
        (self.labels.len() - 1 - position) as u32
    }

    fn block_type(&self, ty: Type) -> BlockType {
        if ty.is_concrete() {
            BlockType::Result(valtype(ty))
        } else {
            BlockType::Empty
        }
    }

    /// Emit the function body. An unlabeled block at the top level needs no
    /// `block` instruction; its elements sit directly in the function frame.
    fn body(&mut self, body: Expr, result_ty: Type) {
        // Borrow the tree through the long-lived function reference, not
        // through `self`, so emission can recurse.
        let func = self.func;
        match &func.dfg[body] {
            ExprData::Block { name: None, list } => self.list(list, result_ty),
            _ => self.list(std::slice::from_ref(&body), result_ty),
        }
    }

    /// Emit a statement list that must leave `result_ty` on the stack.
    fn list(&mut self, list: &[Expr], result_ty: Type) {
        for (index, &elem) in list.iter().enumerate() {
            self.expr(elem);
            let ty = self.ty(elem);
            let last = index + 1 == list.len();
            // A value nothing will consume is dropped: interior elements
            // always, the final element when the context expects none.
            if ty.is_concrete() && (!last || !result_ty.is_concrete()) {
                self.out.instruction(&Instruction::Drop);
            }
        }
    }

    /// Emit an `if` arm or `loop` body expression under the frame's
    /// expected type.
    fn arm(&mut self, arm: Expr, result_ty: Type) {
        let func = self.func;
        match &func.dfg[arm] {
            ExprData::Block { name: None, list } => self.list(list, result_ty),
            _ => self.list(std::slice::from_ref(&arm), result_ty),
        }
    }

    fn expr(&mut self, expr: Expr) {
        let ty = self.ty(expr);
        let func = self.func;
        match &func.dfg[expr] {
            ExprData::Block { name, list } => {
                self.labels.push(*name);
                self.out.instruction(&Instruction::Block(self.block_type(ty)));
                self.list(list, ty);
                self.out.instruction(&Instruction::End);
                self.labels.pop();
                self.polymorphic_fixup(ty);
            }
            ExprData::Loop { name, body } => {
                self.labels.push(*name);
                self.out.instruction(&Instruction::Loop(self.block_type(ty)));
                self.arm(*body, ty);
                self.out.instruction(&Instruction::End);
                self.labels.pop();
                self.polymorphic_fixup(ty);
            }
            ExprData::If {
                condition,
                if_true,
                if_false,
            } => {
                self.expr(*condition);
                self.labels.push(None);
                self.out.instruction(&Instruction::If(self.block_type(ty)));
                self.arm(*if_true, ty);
                if let Some(if_false) = if_false {
                    self.out.instruction(&Instruction::Else);
                    self.arm(*if_false, ty);
                }
                self.out.instruction(&Instruction::End);
                self.labels.pop();
                self.polymorphic_fixup(ty);
            }
            ExprData::Break {
                name,
                value,
                condition,
            } => {
                if let Some(value) = value {
                    self.expr(*value);
                }
                if let Some(condition) = condition {
                    self.expr(*condition);
                    self.out.instruction(&Instruction::BrIf(self.depth_of(*name)));
                } else {
                    self.out.instruction(&Instruction::Br(self.depth_of(*name)));
                }
            }
            ExprData::Switch {
                targets,
                default,
                value,
                condition,
            } => {
                if let Some(value) = value {
                    self.expr(*value);
                }
                self.expr(*condition);
                let depths: Vec<u32> = targets.iter().map(|&t| self.depth_of(t)).collect();
                let default = self.depth_of(*default);
                self.out
                    .instruction(&Instruction::BrTable(Cow::Owned(depths), default));
            }
            ExprData::Call { target, operands } => {
                for &operand in operands {
                    self.expr(operand);
                }
                let function_index = self.module.num_imported_funcs() + target.as_u32();
                self.out.instruction(&Instruction::Call(function_index));
            }
            ExprData::CallImport { import, operands } => {
                for &operand in operands {
                    self.expr(operand);
                }
                self.out.instruction(&Instruction::Call(*import));
            }
            ExprData::CallIndirect {
                sig,
                operands,
                target,
            } => {
                for &operand in operands {
                    self.expr(operand);
                }
                self.expr(*target);
                self.out.instruction(&Instruction::CallIndirect {
                    type_index: sig.as_u32(),
                    table_index: 0,
                });
            }
            ExprData::Return { value } => {
                if let Some(value) = value {
                    self.expr(*value);
                }
                self.out.instruction(&Instruction::Return);
            }
            ExprData::LocalGet { local } => {
                self.out.instruction(&Instruction::LocalGet(*local));
            }
            ExprData::LocalSet { local, value, tee } => {
                self.expr(*value);
                let instruction = if *tee {
                    Instruction::LocalTee(*local)
                } else {
                    Instruction::LocalSet(*local)
                };
                self.out.instruction(&instruction);
            }
            ExprData::GlobalGet { global } => {
                self.out.instruction(&Instruction::GlobalGet(global.as_u32()));
            }
            ExprData::GlobalSet { global, value } => {
                self.expr(*value);
                self.out.instruction(&Instruction::GlobalSet(global.as_u32()));
            }
            ExprData::Load {
                bytes,
                signed,
                offset,
                align,
                ptr,
            } => {
                self.expr(*ptr);
                let memarg = memarg(*offset, *align);
                self.out.instruction(&load_instruction(ty, *bytes, *signed, memarg));
            }
            ExprData::Store {
                bytes,
                offset,
                align,
                ptr,
                value,
                value_ty,
            } => {
                self.expr(*ptr);
                self.expr(*value);
                let memarg = memarg(*offset, *align);
                self.out
                    .instruction(&store_instruction(*value_ty, *bytes, memarg));
            }
            ExprData::Const { value } => {
                let instruction = match value {
                    Literal::I32(x) => Instruction::I32Const(*x),
                    Literal::I64(x) => Instruction::I64Const(*x),
                    Literal::F32(x) => Instruction::F32Const(f32::from_bits(x.bits())),
                    Literal::F64(x) => Instruction::F64Const(f64::from_bits(x.bits())),
                };
                self.out.instruction(&instruction);
            }
            ExprData::Unary { op, value } => {
                self.expr(*value);
                self.out.instruction(&unop_instruction(*op));
            }
            ExprData::Binary { op, left, right } => {
                self.expr(*left);
                self.expr(*right);
                self.out.instruction(&binop_instruction(*op));
            }
            ExprData::Select {
                if_true,
                if_false,
                condition,
            } => {
                self.expr(*if_true);
                self.expr(*if_false);
                self.expr(*condition);
                self.out.instruction(&Instruction::Select);
            }
            ExprData::Drop { value } => {
                self.expr(*value);
                self.out.instruction(&Instruction::Drop);
            }
            ExprData::Host { op, operands } => {
                for &operand in operands {
                    self.expr(operand);
                }
                let instruction = match op {
                    HostOp::MemorySize => Instruction::MemorySize(0),
                    HostOp::MemoryGrow => Instruction::MemoryGrow(0),
                };
                self.out.instruction(&instruction);
            }
            ExprData::Nop => {
                self.out.instruction(&Instruction::Nop);
            }
            ExprData::Unreachable => {
                self.out.instruction(&Instruction::Unreachable);
            }
        }
    }

    /// After a construct typed `Unreachable` (emitted with an empty block
    /// type), an `unreachable` opcode restores stack polymorphism for the
    /// surrounding code.
    fn polymorphic_fixup(&mut self, ty: Type) {
        if ty == Type::Unreachable {
            self.out.instruction(&Instruction::Unreachable);
        }
    }
}

fn memarg(offset: u32, align: u8) -> MemArg {
    MemArg {
        offset: offset.into(),
        align: align.into(),
        memory_index: 0,
    }
}

fn load_instruction(ty: Type, bytes: u8, signed: bool, memarg: MemArg) -> Instruction<'static> {
    match (ty, bytes, signed) {
        (Type::I32, 4, _) => Instruction::I32Load(memarg),
        (Type::I64, 8, _) => Instruction::I64Load(memarg),
        (Type::F32, 4, _) => Instruction::F32Load(memarg),
        (Type::F64, 8, _) => Instruction::F64Load(memarg),
        (Type::I32, 1, true) => Instruction::I32Load8S(memarg),
        (Type::I32, 1, false) => Instruction::I32Load8U(memarg),
        (Type::I32, 2, true) => Instruction::I32Load16S(memarg),
        (Type::I32, 2, false) => Instruction::I32Load16U(memarg),
        (Type::I64, 1, true) => Instruction::I64Load8S(memarg),
        (Type::I64, 1, false) => Instruction::I64Load8U(memarg),
        (Type::I64, 2, true) => Instruction::I64Load16S(memarg),
        (Type::I64, 2, false) => Instruction::I64Load16U(memarg),
        (Type::I64, 4, true) => Instruction::I64Load32S(memarg),
        (Type::I64, 4, false) => Instruction::I64Load32U(memarg),
        _ => panic!("no load of {bytes} bytes to {ty}"),
    }
}

fn store_instruction(value_ty: Type, bytes: u8, memarg: MemArg) -> Instruction<'static> {
    match (value_ty, bytes) {
        (Type::I32, 4) => Instruction::I32Store(memarg),
        (Type::I64, 8) => Instruction::I64Store(memarg),
        (Type::F32, 4) => Instruction::F32Store(memarg),
        (Type::F64, 8) => Instruction::F64Store(memarg),
        (Type::I32, 1) => Instruction::I32Store8(memarg),
        (Type::I32, 2) => Instruction::I32Store16(memarg),
        (Type::I64, 1) => Instruction::I64Store8(memarg),
        (Type::I64, 2) => Instruction::I64Store16(memarg),
        (Type::I64, 4) => Instruction::I64Store32(memarg),
        _ => panic!("no store of {bytes} bytes from {value_ty}"),
    }
}

fn unop_instruction(op: Unop) -> Instruction<'static> {
    use Unop::*;
    match op {
        I32Clz => Instruction::I32Clz,
        I32Ctz => Instruction::I32Ctz,
        I32Popcnt => Instruction::I32Popcnt,
        I32Eqz => Instruction::I32Eqz,
        I64Clz => Instruction::I64Clz,
        I64Ctz => Instruction::I64Ctz,
        I64Popcnt => Instruction::I64Popcnt,
        I64Eqz => Instruction::I64Eqz,
        F32Abs => Instruction::F32Abs,
        F32Neg => Instruction::F32Neg,
        F32Ceil => Instruction::F32Ceil,
        F32Floor => Instruction::F32Floor,
        F32Trunc => Instruction::F32Trunc,
        F32Nearest => Instruction::F32Nearest,
        F32Sqrt => Instruction::F32Sqrt,
        F64Abs => Instruction::F64Abs,
        F64Neg => Instruction::F64Neg,
        F64Ceil => Instruction::F64Ceil,
        F64Floor => Instruction::F64Floor,
        F64Trunc => Instruction::F64Trunc,
        F64Nearest => Instruction::F64Nearest,
        F64Sqrt => Instruction::F64Sqrt,
        I32WrapI64 => Instruction::I32WrapI64,
        I32TruncF32S => Instruction::I32TruncF32S,
        I32TruncF32U => Instruction::I32TruncF32U,
        I32TruncF64S => Instruction::I32TruncF64S,
        I32TruncF64U => Instruction::I32TruncF64U,
        I64ExtendI32S => Instruction::I64ExtendI32S,
        I64ExtendI32U => Instruction::I64ExtendI32U,
        I64TruncF32S => Instruction::I64TruncF32S,
        I64TruncF32U => Instruction::I64TruncF32U,
        I64TruncF64S => Instruction::I64TruncF64S,
        I64TruncF64U => Instruction::I64TruncF64U,
        F32ConvertI32S => Instruction::F32ConvertI32S,
        F32ConvertI32U => Instruction::F32ConvertI32U,
        F32ConvertI64S => Instruction::F32ConvertI64S,
        F32ConvertI64U => Instruction::F32ConvertI64U,
        F32DemoteF64 => Instruction::F32DemoteF64,
        F64ConvertI32S => Instruction::F64ConvertI32S,
        F64ConvertI32U => Instruction::F64ConvertI32U,
        F64ConvertI64S => Instruction::F64ConvertI64S,
        F64ConvertI64U => Instruction::F64ConvertI64U,
        F64PromoteF32 => Instruction::F64PromoteF32,
        I32ReinterpretF32 => Instruction::I32ReinterpretF32,
        I64ReinterpretF64 => Instruction::I64ReinterpretF64,
        F32ReinterpretI32 => Instruction::F32ReinterpretI32,
        F64ReinterpretI64 => Instruction::F64ReinterpretI64,
    }
}

fn binop_instruction(op: Binop) -> Instruction<'static> {
    use Binop::*;
    match op {
        I32Add => Instruction::I32Add,
        I32Sub => Instruction::I32Sub,
        I32Mul => Instruction::I32Mul,
        I32DivS => Instruction::I32DivS,
        I32DivU => Instruction::I32DivU,
        I32RemS => Instruction::I32RemS,
        I32RemU => Instruction::I32RemU,
        I32And => Instruction::I32And,
        I32Or => Instruction::I32Or,
        I32Xor => Instruction::I32Xor,
        I32Shl => Instruction::I32Shl,
        I32ShrS => Instruction::I32ShrS,
        I32ShrU => Instruction::I32ShrU,
        I32Rotl => Instruction::I32Rotl,
        I32Rotr => Instruction::I32Rotr,
        I32Eq => Instruction::I32Eq,
        I32Ne => Instruction::I32Ne,
        I32LtS => Instruction::I32LtS,
        I32LtU => Instruction::I32LtU,
        I32GtS => Instruction::I32GtS,
        I32GtU => Instruction::I32GtU,
        I32LeS => Instruction::I32LeS,
        I32LeU => Instruction::I32LeU,
        I32GeS => Instruction::I32GeS,
        I32GeU => Instruction::I32GeU,
        I64Add => Instruction::I64Add,
        I64Sub => Instruction::I64Sub,
        I64Mul => Instruction::I64Mul,
        I64DivS => Instruction::I64DivS,
        I64DivU => Instruction::I64DivU,
        I64RemS => Instruction::I64RemS,
        I64RemU => Instruction::I64RemU,
        I64And => Instruction::I64And,
        I64Or => Instruction::I64Or,
        I64Xor => Instruction::I64Xor,
        I64Shl => Instruction::I64Shl,
        I64ShrS => Instruction::I64ShrS,
        I64ShrU => Instruction::I64ShrU,
        I64Rotl => Instruction::I64Rotl,
        I64Rotr => Instruction::I64Rotr,
        I64Eq => Instruction::I64Eq,
        I64Ne => Instruction::I64Ne,
        I64LtS => Instruction::I64LtS,
        I64LtU => Instruction::I64LtU,
        I64GtS => Instruction::I64GtS,
        I64GtU => Instruction::I64GtU,
        I64LeS => Instruction::I64LeS,
        I64LeU => Instruction::I64LeU,
        I64GeS => Instruction::I64GeS,
        I64GeU => Instruction::I64GeU,
        F32Add => Instruction::F32Add,
        F32Sub => Instruction::F32Sub,
        F32Mul => Instruction::F32Mul,
        F32Div => Instruction::F32Div,
        F32Min => Instruction::F32Min,
        F32Max => Instruction::F32Max,
        F32Copysign => Instruction::F32Copysign,
        F32Eq => Instruction::F32Eq,
        F32Ne => Instruction::F32Ne,
        F32Lt => Instruction::F32Lt,
        F32Gt => Instruction::F32Gt,
        F32Le => Instruction::F32Le,
        F32Ge => Instruction::F32Ge,
        F64Add => Instruction::F64Add,
        F64Sub => Instruction::F64Sub,
        F64Mul => Instruction::F64Mul,
        F64Div => Instruction::F64Div,
        F64Min => Instruction::F64Min,
        F64Max => Instruction::F64Max,
        F64Copysign => Instruction::F64Copysign,
        F64Eq => Instruction::F64Eq,
        F64Ne => Instruction::F64Ne,
        F64Lt => Instruction::F64Lt,
        F64Gt => Instruction::F64Gt,
        F64Le => Instruction::F64Le,
        F64Ge => Instruction::F64Ge,
    }
}
