//! Function representation.

use crate::entities::{Expr, Label, SignatureIndex};
use crate::expr::{ExprData, ExprDfg};
use crate::types::Type;

/// A function signature: parameter types and an optional single result.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Signature {
    /// Parameter types, in order.
    pub params: Vec<Type>,
    /// The result type, if the function produces a value.
    pub result: Option<Type>,
}

impl Signature {
    /// Create a signature.
    pub fn new(params: Vec<Type>, result: Option<Type>) -> Self {
        Self { params, result }
    }

    /// The function's result as an expression type.
    pub fn result_ty(&self) -> Type {
        self.result.unwrap_or(Type::None)
    }
}

/// A function defined in the module: its signature, declared locals, and a
/// body expression rooted in the function's own arena.
///
/// Each function owns its arena outright, so passes running on different
/// functions share no mutable state.
pub struct Function {
    /// The signature, resolved from the module's type section.
    pub signature: Signature,
    /// Index of the signature in the module's type section.
    pub sig_index: SignatureIndex,
    /// Declared local types (params are not repeated here).
    pub locals: Vec<Type>,
    /// The expression arena.
    pub dfg: ExprDfg,
    /// The body expression.
    pub body: Expr,
    next_label: u32,
}

impl Function {
    /// Create a function with an empty (`Nop`) body.
    pub fn new(signature: Signature, sig_index: SignatureIndex) -> Self {
        let mut dfg = ExprDfg::new();
        let body = dfg.make(ExprData::Nop, Type::None);
        Self {
            signature,
            sig_index,
            locals: Vec::new(),
            dfg,
            body,
            next_label: 0,
        }
    }

    /// The type of a local, with params occupying the low indices.
    pub fn local_ty(&self, local: u32) -> Option<Type> {
        let local = local as usize;
        let num_params = self.signature.params.len();
        if local < num_params {
            Some(self.signature.params[local])
        } else {
            self.locals.get(local - num_params).copied()
        }
    }

    /// Total number of locals, params included.
    pub fn num_locals(&self) -> u32 {
        (self.signature.params.len() + self.locals.len()) as u32
    }

    /// Append a synthesized local and return its index.
    pub fn add_local(&mut self, ty: Type) -> u32 {
        let index = self.num_locals();
        self.locals.push(ty);
        index
    }

    /// Allocate a fresh branch-target label, unique within this function.
    pub fn new_label(&mut self) -> Label {
        let label = Label::from_u32(self.next_label);
        self.next_label += 1;
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_indexing_spans_params_then_locals() {
        let sig = Signature::new(vec![Type::I32, Type::F64], Some(Type::I32));
        let mut func = Function::new(sig, SignatureIndex::from_u32(0));
        func.locals.push(Type::I64);
        assert_eq!(func.local_ty(0), Some(Type::I32));
        assert_eq!(func.local_ty(1), Some(Type::F64));
        assert_eq!(func.local_ty(2), Some(Type::I64));
        assert_eq!(func.local_ty(3), None);
        assert_eq!(func.add_local(Type::F32), 3);
        assert_eq!(func.local_ty(3), Some(Type::F32));
    }

    #[test]
    fn labels_are_unique() {
        let mut func = Function::new(Signature::default(), SignatureIndex::from_u32(0));
        let a = func.new_label();
        let b = func.new_label();
        assert_ne!(a, b);
    }
}
