//! Expression nodes and the per-function expression arena.
//!
//! The prune IR is a structured tree, not a CFG: control flow is expressed
//! with nested `Block`/`Loop`/`If` expressions and symbolic branch labels,
//! mirroring WebAssembly's structured control flow. Every node has a declared
//! result type, kept in a side table of the arena so that passes can retype a
//! node without rebuilding it.
//!
//! Nodes are stored in an append-only [`PrimaryMap`] owned by the function.
//! Passes mutate the tree by overwriting a node in place or by allocating a
//! replacement and swapping the parent's child slot; old subtrees are never
//! freed individually and die with the function.

use crate::entities::{Expr, FuncIndex, GlobalIndex, Label, SignatureIndex};
use crate::types::{Literal, Type};
use core::ops::{Index, IndexMut};
use cranelift_entity::{PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

/// A unary operator.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[allow(missing_docs)]
pub enum Unop {
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Eqz,
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Eqz,
    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,
    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,
    I32WrapI64,
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64ExtendI32S,
    I64ExtendI32U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F32DemoteF64,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
}

impl Unop {
    /// The result type of this operator.
    pub fn result_ty(self) -> Type {
        use Unop::*;
        match self {
            I32Clz | I32Ctz | I32Popcnt | I32Eqz | I64Eqz | I32WrapI64 | I32TruncF32S
            | I32TruncF32U | I32TruncF64S | I32TruncF64U | I32ReinterpretF32 => Type::I32,
            I64Clz | I64Ctz | I64Popcnt | I64ExtendI32S | I64ExtendI32U | I64TruncF32S
            | I64TruncF32U | I64TruncF64S | I64TruncF64U | I64ReinterpretF64 => Type::I64,
            F32Abs | F32Neg | F32Ceil | F32Floor | F32Trunc | F32Nearest | F32Sqrt
            | F32ConvertI32S | F32ConvertI32U | F32ConvertI64S | F32ConvertI64U | F32DemoteF64
            | F32ReinterpretI32 => Type::F32,
            F64Abs | F64Neg | F64Ceil | F64Floor | F64Trunc | F64Nearest | F64Sqrt
            | F64ConvertI32S | F64ConvertI32U | F64ConvertI64S | F64ConvertI64U | F64PromoteF32
            | F64ReinterpretI64 => Type::F64,
        }
    }

    /// The WebAssembly mnemonic for this operator.
    pub fn mnemonic(self) -> &'static str {
        use Unop::*;
        match self {
            I32Clz => "i32.clz",
            I32Ctz => "i32.ctz",
            I32Popcnt => "i32.popcnt",
            I32Eqz => "i32.eqz",
            I64Clz => "i64.clz",
            I64Ctz => "i64.ctz",
            I64Popcnt => "i64.popcnt",
            I64Eqz => "i64.eqz",
            F32Abs => "f32.abs",
            F32Neg => "f32.neg",
            F32Ceil => "f32.ceil",
            F32Floor => "f32.floor",
            F32Trunc => "f32.trunc",
            F32Nearest => "f32.nearest",
            F32Sqrt => "f32.sqrt",
            F64Abs => "f64.abs",
            F64Neg => "f64.neg",
            F64Ceil => "f64.ceil",
            F64Floor => "f64.floor",
            F64Trunc => "f64.trunc",
            F64Nearest => "f64.nearest",
            F64Sqrt => "f64.sqrt",
            I32WrapI64 => "i32.wrap_i64",
            I32TruncF32S => "i32.trunc_f32_s",
            I32TruncF32U => "i32.trunc_f32_u",
            I32TruncF64S => "i32.trunc_f64_s",
            I32TruncF64U => "i32.trunc_f64_u",
            I64ExtendI32S => "i64.extend_i32_s",
            I64ExtendI32U => "i64.extend_i32_u",
            I64TruncF32S => "i64.trunc_f32_s",
            I64TruncF32U => "i64.trunc_f32_u",
            I64TruncF64S => "i64.trunc_f64_s",
            I64TruncF64U => "i64.trunc_f64_u",
            F32ConvertI32S => "f32.convert_i32_s",
            F32ConvertI32U => "f32.convert_i32_u",
            F32ConvertI64S => "f32.convert_i64_s",
            F32ConvertI64U => "f32.convert_i64_u",
            F32DemoteF64 => "f32.demote_f64",
            F64ConvertI32S => "f64.convert_i32_s",
            F64ConvertI32U => "f64.convert_i32_u",
            F64ConvertI64S => "f64.convert_i64_s",
            F64ConvertI64U => "f64.convert_i64_u",
            F64PromoteF32 => "f64.promote_f32",
            I32ReinterpretF32 => "i32.reinterpret_f32",
            I64ReinterpretF64 => "i64.reinterpret_f64",
            F32ReinterpretI32 => "f32.reinterpret_i32",
            F64ReinterpretI64 => "f64.reinterpret_i64",
        }
    }
}

/// A binary operator.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[allow(missing_docs)]
pub enum Binop {
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,
}

impl Binop {
    /// The result type of this operator. All comparisons produce `i32`.
    pub fn result_ty(self) -> Type {
        use Binop::*;
        match self {
            I64Add | I64Sub | I64Mul | I64DivS | I64DivU | I64RemS | I64RemU | I64And | I64Or
            | I64Xor | I64Shl | I64ShrS | I64ShrU | I64Rotl | I64Rotr => Type::I64,
            F32Add | F32Sub | F32Mul | F32Div | F32Min | F32Max | F32Copysign => Type::F32,
            F64Add | F64Sub | F64Mul | F64Div | F64Min | F64Max | F64Copysign => Type::F64,
            _ => Type::I32,
        }
    }

    /// The WebAssembly mnemonic for this operator.
    pub fn mnemonic(self) -> &'static str {
        use Binop::*;
        match self {
            I32Add => "i32.add",
            I32Sub => "i32.sub",
            I32Mul => "i32.mul",
            I32DivS => "i32.div_s",
            I32DivU => "i32.div_u",
            I32RemS => "i32.rem_s",
            I32RemU => "i32.rem_u",
            I32And => "i32.and",
            I32Or => "i32.or",
            I32Xor => "i32.xor",
            I32Shl => "i32.shl",
            I32ShrS => "i32.shr_s",
            I32ShrU => "i32.shr_u",
            I32Rotl => "i32.rotl",
            I32Rotr => "i32.rotr",
            I32Eq => "i32.eq",
            I32Ne => "i32.ne",
            I32LtS => "i32.lt_s",
            I32LtU => "i32.lt_u",
            I32GtS => "i32.gt_s",
            I32GtU => "i32.gt_u",
            I32LeS => "i32.le_s",
            I32LeU => "i32.le_u",
            I32GeS => "i32.ge_s",
            I32GeU => "i32.ge_u",
            I64Add => "i64.add",
            I64Sub => "i64.sub",
            I64Mul => "i64.mul",
            I64DivS => "i64.div_s",
            I64DivU => "i64.div_u",
            I64RemS => "i64.rem_s",
            I64RemU => "i64.rem_u",
            I64And => "i64.and",
            I64Or => "i64.or",
            I64Xor => "i64.xor",
            I64Shl => "i64.shl",
            I64ShrS => "i64.shr_s",
            I64ShrU => "i64.shr_u",
            I64Rotl => "i64.rotl",
            I64Rotr => "i64.rotr",
            I64Eq => "i64.eq",
            I64Ne => "i64.ne",
            I64LtS => "i64.lt_s",
            I64LtU => "i64.lt_u",
            I64GtS => "i64.gt_s",
            I64GtU => "i64.gt_u",
            I64LeS => "i64.le_s",
            I64LeU => "i64.le_u",
            I64GeS => "i64.ge_s",
            I64GeU => "i64.ge_u",
            F32Add => "f32.add",
            F32Sub => "f32.sub",
            F32Mul => "f32.mul",
            F32Div => "f32.div",
            F32Min => "f32.min",
            F32Max => "f32.max",
            F32Copysign => "f32.copysign",
            F32Eq => "f32.eq",
            F32Ne => "f32.ne",
            F32Lt => "f32.lt",
            F32Gt => "f32.gt",
            F32Le => "f32.le",
            F32Ge => "f32.ge",
            F64Add => "f64.add",
            F64Sub => "f64.sub",
            F64Mul => "f64.mul",
            F64Div => "f64.div",
            F64Min => "f64.min",
            F64Max => "f64.max",
            F64Copysign => "f64.copysign",
            F64Eq => "f64.eq",
            F64Ne => "f64.ne",
            F64Lt => "f64.lt",
            F64Gt => "f64.gt",
            F64Le => "f64.le",
            F64Ge => "f64.ge",
        }
    }
}

/// An operator provided by the host environment.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum HostOp {
    /// `memory.size`: the current size of linear memory, in pages.
    MemorySize,
    /// `memory.grow`: grow linear memory by the operand's number of pages.
    MemoryGrow,
}

impl HostOp {
    /// The WebAssembly mnemonic for this operator.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::MemorySize => "memory.size",
            Self::MemoryGrow => "memory.grow",
        }
    }
}

/// The contents of an expression node.
///
/// Child expressions are listed in evaluation order in each variant's
/// documentation where it is not obvious.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ExprData {
    /// A sequence of expressions, optionally a branch target.
    Block {
        /// Branch-target label, if any branch targets this block.
        name: Option<Label>,
        /// The elements, in evaluation order.
        list: Vec<Expr>,
    },
    /// A conditional. The condition is evaluated first, then exactly one arm.
    If {
        /// The `i32` condition.
        condition: Expr,
        /// Arm taken when the condition is non-zero.
        if_true: Expr,
        /// Arm taken when the condition is zero, if present.
        if_false: Option<Expr>,
    },
    /// A loop. Branching to its label restarts the body.
    Loop {
        /// Branch-target label, if any branch targets this loop.
        name: Option<Label>,
        /// The loop body.
        body: Expr,
    },
    /// A branch to an enclosing `Block` or `Loop`. Evaluation order: `value`,
    /// then `condition`. Unconditional iff `condition` is absent.
    Break {
        /// The target label.
        name: Label,
        /// Value carried to the target, if the target expects one.
        value: Option<Expr>,
        /// `i32` condition making this a conditional branch (`br_if`).
        condition: Option<Expr>,
    },
    /// A multi-way branch (`br_table`). Evaluation order: `value`, then
    /// `condition`. Never falls through.
    Switch {
        /// The branch targets, indexed by the condition.
        targets: Vec<Label>,
        /// Target used when the condition is out of range.
        default: Label,
        /// Value carried to the target, if the targets expect one.
        value: Option<Expr>,
        /// The `i32` selector.
        condition: Expr,
    },
    /// A call to a function defined in this module.
    Call {
        /// The callee.
        target: FuncIndex,
        /// Arguments, in evaluation order.
        operands: Vec<Expr>,
    },
    /// A call to an imported function.
    CallImport {
        /// Index into the module's imported-function space.
        import: u32,
        /// Arguments, in evaluation order.
        operands: Vec<Expr>,
    },
    /// An indirect call through the table. Evaluation order: `operands`,
    /// then `target`.
    CallIndirect {
        /// The expected signature.
        sig: SignatureIndex,
        /// Arguments, in evaluation order.
        operands: Vec<Expr>,
        /// The `i32` table index of the callee.
        target: Expr,
    },
    /// Read a local variable.
    LocalGet {
        /// The local index (params first, then declared locals).
        local: u32,
    },
    /// Write a local variable; with `tee` the value is also the result.
    LocalSet {
        /// The local index.
        local: u32,
        /// The value to store.
        value: Expr,
        /// True for `local.tee`.
        tee: bool,
    },
    /// Read a global variable.
    GlobalGet {
        /// The global index.
        global: GlobalIndex,
    },
    /// Write a global variable.
    GlobalSet {
        /// The global index.
        global: GlobalIndex,
        /// The value to store.
        value: Expr,
    },
    /// Load from linear memory. The loaded width is `bytes`; narrow integer
    /// loads extend per `signed`. The node's declared type is the result.
    Load {
        /// Width of the access in bytes: 1, 2, 4 or 8.
        bytes: u8,
        /// Sign-extend narrow integer loads.
        signed: bool,
        /// Constant address offset.
        offset: u32,
        /// Alignment, log2.
        align: u8,
        /// The `i32` address.
        ptr: Expr,
    },
    /// Store to linear memory. Evaluation order: `ptr`, then `value`.
    Store {
        /// Width of the access in bytes: 1, 2, 4 or 8.
        bytes: u8,
        /// Constant address offset.
        offset: u32,
        /// Alignment, log2.
        align: u8,
        /// The `i32` address.
        ptr: Expr,
        /// The value to store.
        value: Expr,
        /// The value's type, kept for opcode selection when the operand has
        /// been retyped by a rewrite.
        value_ty: Type,
    },
    /// A constant.
    Const {
        /// The value.
        value: Literal,
    },
    /// A unary operator application.
    Unary {
        /// The operator.
        op: Unop,
        /// The operand.
        value: Expr,
    },
    /// A binary operator application. Evaluation order: `left`, then `right`.
    Binary {
        /// The operator.
        op: Binop,
        /// The left operand.
        left: Expr,
        /// The right operand.
        right: Expr,
    },
    /// Choose between two values. Both arms are evaluated; evaluation order:
    /// `if_true`, `if_false`, `condition`.
    Select {
        /// Result when the condition is non-zero.
        if_true: Expr,
        /// Result when the condition is zero.
        if_false: Expr,
        /// The `i32` condition.
        condition: Expr,
    },
    /// Evaluate the operand and discard its value.
    Drop {
        /// The discarded value.
        value: Expr,
    },
    /// Return from the function.
    Return {
        /// The returned value, if the function has a result.
        value: Option<Expr>,
    },
    /// A host environment operator.
    Host {
        /// The operator.
        op: HostOp,
        /// Operands, in evaluation order.
        operands: Vec<Expr>,
    },
    /// Do nothing.
    Nop,
    /// Trap. The canonical `Unreachable`-typed expression; reachability
    /// rewriting collapses dead subtrees into this.
    Unreachable,
}

impl ExprData {
    /// The child expressions of this node, in evaluation order.
    pub fn children(&self) -> SmallVec<[Expr; 4]> {
        let mut out = SmallVec::new();
        match self {
            Self::Block { list, .. } => out.extend(list.iter().copied()),
            Self::If {
                condition,
                if_true,
                if_false,
            } => {
                out.push(*condition);
                out.push(*if_true);
                out.extend(if_false.iter().copied());
            }
            Self::Loop { body, .. } => out.push(*body),
            Self::Break {
                value, condition, ..
            } => {
                out.extend(value.iter().copied());
                out.extend(condition.iter().copied());
            }
            Self::Switch {
                value, condition, ..
            } => {
                out.extend(value.iter().copied());
                out.push(*condition);
            }
            Self::Call { operands, .. }
            | Self::CallImport { operands, .. }
            | Self::Host { operands, .. } => out.extend(operands.iter().copied()),
            Self::CallIndirect {
                operands, target, ..
            } => {
                out.extend(operands.iter().copied());
                out.push(*target);
            }
            Self::LocalSet { value, .. }
            | Self::GlobalSet { value, .. }
            | Self::Unary { value, .. }
            | Self::Drop { value } => out.push(*value),
            Self::Load { ptr, .. } => out.push(*ptr),
            Self::Store { ptr, value, .. } => {
                out.push(*ptr);
                out.push(*value);
            }
            Self::Binary { left, right, .. } => {
                out.push(*left);
                out.push(*right);
            }
            Self::Select {
                if_true,
                if_false,
                condition,
            } => {
                out.push(*if_true);
                out.push(*if_false);
                out.push(*condition);
            }
            Self::Return { value } => out.extend(value.iter().copied()),
            Self::LocalGet { .. }
            | Self::GlobalGet { .. }
            | Self::Const { .. }
            | Self::Nop
            | Self::Unreachable => {}
        }
        out
    }

    /// Mutable slots of the child expressions, in the same order as
    /// [`children`](Self::children). Walkers use this to write replacement
    /// children back into the parent.
    pub fn children_mut(&mut self) -> SmallVec<[&mut Expr; 4]> {
        let mut out = SmallVec::new();
        match self {
            Self::Block { list, .. } => out.extend(list.iter_mut()),
            Self::If {
                condition,
                if_true,
                if_false,
            } => {
                out.push(condition);
                out.push(if_true);
                out.extend(if_false.iter_mut());
            }
            Self::Loop { body, .. } => out.push(body),
            Self::Break {
                value, condition, ..
            } => {
                out.extend(value.iter_mut());
                out.extend(condition.iter_mut());
            }
            Self::Switch {
                value, condition, ..
            } => {
                out.extend(value.iter_mut());
                out.push(condition);
            }
            Self::Call { operands, .. }
            | Self::CallImport { operands, .. }
            | Self::Host { operands, .. } => out.extend(operands.iter_mut()),
            Self::CallIndirect {
                operands, target, ..
            } => {
                out.extend(operands.iter_mut());
                out.push(target);
            }
            Self::LocalSet { value, .. }
            | Self::GlobalSet { value, .. }
            | Self::Unary { value, .. }
            | Self::Drop { value } => out.push(value),
            Self::Load { ptr, .. } => out.push(ptr),
            Self::Store { ptr, value, .. } => {
                out.push(ptr);
                out.push(value);
            }
            Self::Binary { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            Self::Select {
                if_true,
                if_false,
                condition,
            } => {
                out.push(if_true);
                out.push(if_false);
                out.push(condition);
            }
            Self::Return { value } => out.extend(value.iter_mut()),
            Self::LocalGet { .. }
            | Self::GlobalGet { .. }
            | Self::Const { .. }
            | Self::Nop
            | Self::Unreachable => {}
        }
        out
    }
}

/// The expression arena of one function.
///
/// Node contents and node types are stored side by side so a pass can retype
/// a node (e.g. a block that stops falling through) without rebuilding it.
#[derive(Clone, Default)]
pub struct ExprDfg {
    exprs: PrimaryMap<Expr, ExprData>,
    types: SecondaryMap<Expr, Type>,
}

impl ExprDfg {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node with the given declared type.
    pub fn make(&mut self, data: ExprData, ty: Type) -> Expr {
        let expr = self.exprs.push(data);
        self.types[expr] = ty;
        expr
    }

    /// The number of nodes ever allocated, including detached garbage.
    pub fn num_exprs(&self) -> usize {
        self.exprs.len()
    }

    /// The declared result type of a node.
    pub fn ty(&self, expr: Expr) -> Type {
        self.types[expr]
    }

    /// Change the declared result type of a node.
    pub fn set_ty(&mut self, expr: Expr, ty: Type) {
        self.types[expr] = ty;
    }

    /// True if the node's declared type is `Unreachable`.
    pub fn is_unreachable(&self, expr: Expr) -> bool {
        self.types[expr] == Type::Unreachable
    }

    /// Overwrite a node in place with the canonical trap.
    ///
    /// The node keeps its identity, so parents need not be touched; its old
    /// children become garbage in the arena.
    pub fn turn_into_unreachable(&mut self, expr: Expr) {
        self.exprs[expr] = ExprData::Unreachable;
        self.types[expr] = Type::Unreachable;
    }

    /// The child expressions of a node, in evaluation order.
    pub fn children(&self, expr: Expr) -> SmallVec<[Expr; 4]> {
        self.exprs[expr].children()
    }

    /// Finalize a block's declared type from its context.
    ///
    /// `declared` is the type the surrounding code expects. An unlabeled
    /// block that is expected to push nothing but whose list ends in an
    /// `Unreachable`-typed element does not complete, so it is typed
    /// `Unreachable` instead. Labeled blocks are left alone here: a label
    /// only exists because some branch targets it, and a branch can exit the
    /// block even when its list ends in a trap. (Once a pass has removed the
    /// last such branch, the type updater performs the upgrade instead.)
    pub fn finalize_block(&mut self, block: Expr, declared: Type) {
        let labeled = match &self.exprs[block] {
            ExprData::Block { name, .. } => name.is_some(),
            _ => panic!("{block} is not a block"),
        };
        let mut ty = declared;
        if ty == Type::None
            && !labeled
            && self.block_fallthrough_ty(block) == Some(Type::Unreachable)
        {
            ty = Type::Unreachable;
        }
        self.types[block] = ty;
    }

    /// The type a block's list falls through with: the last element's type,
    /// or `None` for an empty list.
    ///
    /// Panics if the node is not a block.
    pub fn block_fallthrough_ty(&self, block: Expr) -> Option<Type> {
        match &self.exprs[block] {
            ExprData::Block { list, .. } => list.last().map(|&e| self.types[e]),
            _ => panic!("{block} is not a block"),
        }
    }

    /// Recompute an `If` node's type from its children.
    ///
    /// An `If` without an else never produces a value. With an else, the arm
    /// types join: equal types join to themselves, and `Unreachable` joins to
    /// the other arm's type. An unreachable condition makes the whole node
    /// unreachable.
    pub fn if_ty(&self, expr: Expr) -> Type {
        let ExprData::If {
            condition,
            if_true,
            if_false,
        } = &self.exprs[expr]
        else {
            panic!("{expr} is not an if")
        };
        let (condition, if_true, if_false) = (*condition, *if_true, *if_false);
        if self.types[condition] == Type::Unreachable {
            return Type::Unreachable;
        }
        match if_false {
            None => Type::None,
            Some(if_false) => match (self.types[if_true], self.types[if_false]) {
                (t, f) if t == f => t,
                (Type::Unreachable, f) => f,
                (t, Type::Unreachable) => t,
                _ => Type::None,
            },
        }
    }
}

impl Index<Expr> for ExprDfg {
    type Output = ExprData;

    fn index(&self, expr: Expr) -> &ExprData {
        &self.exprs[expr]
    }
}

impl IndexMut<Expr> for ExprDfg {
    fn index_mut(&mut self, expr: Expr) -> &mut ExprData {
        &mut self.exprs[expr]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_and_retype() {
        let mut dfg = ExprDfg::new();
        let c = dfg.make(
            ExprData::Const {
                value: Literal::I32(7),
            },
            Type::I32,
        );
        assert_eq!(dfg.ty(c), Type::I32);
        dfg.turn_into_unreachable(c);
        assert!(dfg.is_unreachable(c));
        assert_eq!(dfg[c], ExprData::Unreachable);
    }

    #[test]
    fn block_finalize_upgrades_to_unreachable() {
        let mut dfg = ExprDfg::new();
        let trap = dfg.make(ExprData::Unreachable, Type::Unreachable);
        let block = dfg.make(
            ExprData::Block {
                name: None,
                list: vec![trap],
            },
            Type::None,
        );
        dfg.finalize_block(block, Type::None);
        assert_eq!(dfg.ty(block), Type::Unreachable);

        // A declared concrete type is kept even when the list ends in a trap;
        // the block still fits where its parent expects a value.
        dfg.finalize_block(block, Type::I32);
        assert_eq!(dfg.ty(block), Type::I32);
    }

    #[test]
    fn if_join() {
        let mut dfg = ExprDfg::new();
        let cond = dfg.make(
            ExprData::Const {
                value: Literal::I32(1),
            },
            Type::I32,
        );
        let t = dfg.make(
            ExprData::Return { value: None },
            Type::Unreachable,
        );
        let f = dfg.make(
            ExprData::Const {
                value: Literal::I32(7),
            },
            Type::I32,
        );
        let if_ = dfg.make(
            ExprData::If {
                condition: cond,
                if_true: t,
                if_false: Some(f),
            },
            Type::I32,
        );
        assert_eq!(dfg.if_ty(if_), Type::I32);

        dfg.turn_into_unreachable(f);
        assert_eq!(dfg.if_ty(if_), Type::Unreachable);
    }
}
