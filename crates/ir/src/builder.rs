//! Convenient expression construction.
//!
//! A thin layer over [`ExprDfg::make`] that fills in the declared type where
//! it is implied by the node kind. Used by the decoder, the rewriting passes,
//! and tests.

use crate::entities::{Expr, FuncIndex, GlobalIndex, Label, SignatureIndex};
use crate::expr::{Binop, ExprData, ExprDfg, HostOp, Unop};
use crate::types::{Literal, Type};

/// Expression builder borrowing a function's arena.
pub struct Builder<'a> {
    dfg: &'a mut ExprDfg,
}

impl<'a> Builder<'a> {
    /// Create a builder for the given arena.
    pub fn new(dfg: &'a mut ExprDfg) -> Self {
        Self { dfg }
    }

    /// A constant.
    pub fn const_(&mut self, value: Literal) -> Expr {
        let ty = value.ty();
        self.dfg.make(ExprData::Const { value }, ty)
    }

    /// An `i32` constant.
    pub fn i32_const(&mut self, value: i32) -> Expr {
        self.const_(Literal::I32(value))
    }

    /// A `nop`.
    pub fn nop(&mut self) -> Expr {
        self.dfg.make(ExprData::Nop, Type::None)
    }

    /// The canonical trap.
    pub fn unreachable(&mut self) -> Expr {
        self.dfg.make(ExprData::Unreachable, Type::Unreachable)
    }

    /// Evaluate and discard a value.
    pub fn drop_(&mut self, value: Expr) -> Expr {
        self.dfg.make(ExprData::Drop { value }, Type::None)
    }

    /// A block finalized against the declared type of its context.
    pub fn block(&mut self, name: Option<Label>, list: Vec<Expr>, declared: Type) -> Expr {
        let block = self.dfg.make(ExprData::Block { name, list }, declared);
        self.dfg.finalize_block(block, declared);
        block
    }

    /// A loop. Its type is its body's type.
    pub fn loop_(&mut self, name: Option<Label>, body: Expr) -> Expr {
        let ty = self.dfg.ty(body);
        self.dfg.make(ExprData::Loop { name, body }, ty)
    }

    /// An `if`, typed by [`ExprDfg::if_ty`].
    pub fn if_(&mut self, condition: Expr, if_true: Expr, if_false: Option<Expr>) -> Expr {
        let expr = self.dfg.make(
            ExprData::If {
                condition,
                if_true,
                if_false,
            },
            Type::None,
        );
        let ty = self.dfg.if_ty(expr);
        self.dfg.set_ty(expr, ty);
        expr
    }

    /// A branch. Unconditional branches are `Unreachable`-typed; conditional
    /// ones have their carried value's type, or `None`.
    pub fn break_(&mut self, name: Label, value: Option<Expr>, condition: Option<Expr>) -> Expr {
        let ty = match condition {
            None => Type::Unreachable,
            Some(_) => value.map_or(Type::None, |v| self.dfg.ty(v)),
        };
        self.dfg.make(
            ExprData::Break {
                name,
                value,
                condition,
            },
            ty,
        )
    }

    /// A multi-way branch. Never falls through, so always `Unreachable`.
    pub fn switch(
        &mut self,
        targets: Vec<Label>,
        default: Label,
        value: Option<Expr>,
        condition: Expr,
    ) -> Expr {
        self.dfg.make(
            ExprData::Switch {
                targets,
                default,
                value,
                condition,
            },
            Type::Unreachable,
        )
    }

    /// A `return`.
    pub fn return_(&mut self, value: Option<Expr>) -> Expr {
        self.dfg.make(ExprData::Return { value }, Type::Unreachable)
    }

    /// Read a local of the given type.
    pub fn local_get(&mut self, local: u32, ty: Type) -> Expr {
        self.dfg.make(ExprData::LocalGet { local }, ty)
    }

    /// Write a local.
    pub fn local_set(&mut self, local: u32, value: Expr) -> Expr {
        self.dfg.make(
            ExprData::LocalSet {
                local,
                value,
                tee: false,
            },
            Type::None,
        )
    }

    /// Write a local, keeping the value as the result.
    pub fn local_tee(&mut self, local: u32, value: Expr) -> Expr {
        let ty = self.dfg.ty(value);
        self.dfg.make(
            ExprData::LocalSet {
                local,
                value,
                tee: true,
            },
            ty,
        )
    }

    /// Read a global of the given type.
    pub fn global_get(&mut self, global: GlobalIndex, ty: Type) -> Expr {
        self.dfg.make(ExprData::GlobalGet { global }, ty)
    }

    /// Write a global.
    pub fn global_set(&mut self, global: GlobalIndex, value: Expr) -> Expr {
        self.dfg.make(ExprData::GlobalSet { global, value }, Type::None)
    }

    /// A full-width load producing `ty`.
    pub fn load(&mut self, ty: Type, offset: u32, align: u8, ptr: Expr) -> Expr {
        self.dfg.make(
            ExprData::Load {
                bytes: ty.bytes(),
                signed: false,
                offset,
                align,
                ptr,
            },
            ty,
        )
    }

    /// A full-width store of a `value_ty` value.
    pub fn store(&mut self, value_ty: Type, offset: u32, align: u8, ptr: Expr, value: Expr) -> Expr {
        self.dfg.make(
            ExprData::Store {
                bytes: value_ty.bytes(),
                offset,
                align,
                ptr,
                value,
                value_ty,
            },
            Type::None,
        )
    }

    /// A unary operator application.
    pub fn unary(&mut self, op: Unop, value: Expr) -> Expr {
        self.dfg.make(ExprData::Unary { op, value }, op.result_ty())
    }

    /// A binary operator application.
    pub fn binary(&mut self, op: Binop, left: Expr, right: Expr) -> Expr {
        self.dfg
            .make(ExprData::Binary { op, left, right }, op.result_ty())
    }

    /// A `select` between two values of the given type.
    pub fn select(&mut self, if_true: Expr, if_false: Expr, condition: Expr, ty: Type) -> Expr {
        self.dfg.make(
            ExprData::Select {
                if_true,
                if_false,
                condition,
            },
            ty,
        )
    }

    /// A call to a defined function.
    pub fn call(&mut self, target: FuncIndex, operands: Vec<Expr>, ty: Type) -> Expr {
        self.dfg.make(ExprData::Call { target, operands }, ty)
    }

    /// A call to an imported function.
    pub fn call_import(&mut self, import: u32, operands: Vec<Expr>, ty: Type) -> Expr {
        self.dfg
            .make(ExprData::CallImport { import, operands }, ty)
    }

    /// An indirect call.
    pub fn call_indirect(
        &mut self,
        sig: SignatureIndex,
        operands: Vec<Expr>,
        target: Expr,
        ty: Type,
    ) -> Expr {
        self.dfg.make(
            ExprData::CallIndirect {
                sig,
                operands,
                target,
            },
            ty,
        )
    }

    /// A host operator application.
    pub fn host(&mut self, op: HostOp, operands: Vec<Expr>) -> Expr {
        let ty = match op {
            HostOp::MemorySize | HostOp::MemoryGrow => Type::I32,
        };
        self.dfg.make(ExprData::Host { op, operands }, ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implied_types() {
        let mut dfg = ExprDfg::new();
        let mut b = Builder::new(&mut dfg);
        let c = b.i32_const(1);
        let d = b.drop_(c);
        let t = b.unreachable();
        let label = Label::from_u32(0);
        let br = b.break_(label, None, None);
        let br_if = b.break_(label, None, Some(c));
        assert_eq!(dfg.ty(d), Type::None);
        assert_eq!(dfg.ty(t), Type::Unreachable);
        assert_eq!(dfg.ty(br), Type::Unreachable);
        assert_eq!(dfg.ty(br_if), Type::None);
    }

    #[test]
    fn rewrite_block_keeps_declared_concrete_type() {
        let mut dfg = ExprDfg::new();
        let mut b = Builder::new(&mut dfg);
        let c = b.i32_const(1);
        let d = b.drop_(c);
        let t = b.unreachable();
        let block = b.block(None, vec![d, t], Type::I32);
        assert_eq!(dfg.ty(block), Type::I32);

        let mut b = Builder::new(&mut dfg);
        let d2 = {
            let c2 = b.i32_const(2);
            b.drop_(c2)
        };
        let t2 = b.unreachable();
        let stmt_block = b.block(None, vec![d2, t2], Type::None);
        assert_eq!(dfg.ty(stmt_block), Type::Unreachable);
    }
}
