//! Dead code elimination.
//!
//! We keep a record of when control flow is reachable. When it isn't, we
//! overwrite the code in place with `Unreachable`, then fold entire
//! `Unreachable`-typed expressions away.
//!
//! When dead code stops an operation from happening, like a store, a call or
//! an add, we replace the operation with a block listing what does still
//! happen: each live operand, dropped, followed by the trapping operand. That
//! isn't necessarily smaller, but blocks are friendlier to other
//! optimizations, and they clearly have no further effects.

use crate::block_utils;
use crate::break_seeker;
use crate::pass::Pass;
use crate::type_updater::TypeUpdater;
use core::any::Any;
use core::mem;
use prune_ir::{timing, Builder, Expr, ExprData, ExprDfg, Function, Label};
use rustc_hash::FxHashSet;

/// The dead code elimination pass.
///
/// One instance holds the traversal state for a single function walk; the
/// pass runner constructs a fresh instance per function.
#[derive(Default)]
pub struct DeadCodeElimination {
    /// Whether the code currently being visited is reachable.
    reachable: bool,
    /// Labels for which at least one still-reachable branch exists.
    reachable_breaks: FxHashSet<Label>,
    /// Saved reachability at `if`-arm forks.
    if_stack: Vec<bool>,
    /// Keeps ancestor types valid as code is removed.
    type_updater: TypeUpdater,
}

impl DeadCodeElimination {
    /// Create a pass instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// A child that exists and is `Unreachable`-typed can replace its parent.
    fn is_dead(&self, dfg: &ExprDfg, child: Option<Expr>) -> bool {
        child.is_some_and(|child| dfg.is_unreachable(child))
    }

    /// Record a still-reachable branch to `name`.
    ///
    /// The branch's own operands are scanned first and may have killed
    /// control already; a branch visited in that state never executes, so it
    /// must not keep its target alive.
    fn add_break(&mut self, name: Label) {
        if self.reachable {
            self.reachable_breaks.insert(name);
        }
    }

    /// Swap `new` into the current node's slot, keeping the type updater
    /// consistent. The caller returns the result to its parent.
    fn replace(&mut self, dfg: &ExprDfg, old: Expr, new: Expr) -> Expr {
        self.type_updater.note_replacement(dfg, old, new);
        new
    }

    /// Drop a value, unless it is already `Unreachable`-typed; dropping a
    /// trap is redundant.
    fn drop_expr(&mut self, dfg: &mut ExprDfg, value: Expr) -> Expr {
        if dfg.is_unreachable(value) {
            value
        } else {
            Builder::new(dfg).drop_(value)
        }
    }

    /// Scan one subtree: suppress it outright if control cannot reach it,
    /// otherwise walk the children (`if` arms under forked reachability) and
    /// run the node's visitor. Returns the node that should occupy this slot.
    fn scan(&mut self, dfg: &mut ExprDfg, expr: Expr) -> Expr {
        if !self.reachable {
            // This code can never execute. Overwrite it in place; its old
            // children become garbage in the arena, and any branches inside
            // them no longer exist as far as types are concerned.
            if !matches!(dfg[expr], ExprData::Unreachable) {
                self.type_updater.note_recursive_removal(dfg, expr);
                dfg.turn_into_unreachable(expr);
            }
            return expr;
        }
        // Detach the node data so child scans can borrow the arena freely;
        // the slot holds a placeholder until the children are written back.
        let mut data = mem::replace(&mut dfg[expr], ExprData::Nop);
        match &mut data {
            ExprData::If {
                condition,
                if_true,
                if_false,
            } => {
                // The arms fork reachability and must be joined afterwards,
                // so the default child order does not work here.
                *condition = self.scan(dfg, *condition);
                self.if_stack.push(self.reachable);
                *if_true = self.scan(dfg, *if_true);
                if let Some(if_false) = if_false {
                    let after_if_true = self.reachable;
                    self.reachable = self.if_stack.pop().expect("if fork");
                    self.if_stack.push(after_if_true);
                    *if_false = self.scan(dfg, *if_false);
                }
            }
            data => {
                for slot in data.children_mut() {
                    *slot = self.scan(dfg, *slot);
                }
            }
        }
        dfg[expr] = data;
        self.visit(dfg, expr)
    }

    /// Dispatch to the per-variant visitor.
    fn visit(&mut self, dfg: &mut ExprDfg, expr: Expr) -> Expr {
        match &dfg[expr] {
            ExprData::Block { .. } => self.visit_block(dfg, expr),
            ExprData::If { .. } => self.visit_if(dfg, expr),
            ExprData::Loop { .. } => self.visit_loop(dfg, expr),
            ExprData::Break { .. } => self.visit_break(dfg, expr),
            ExprData::Switch { .. } => self.visit_switch(dfg, expr),
            ExprData::Return { .. } => self.visit_return(dfg, expr),
            ExprData::Call { .. }
            | ExprData::CallImport { .. }
            | ExprData::Host { .. } => self.visit_call_like(dfg, expr),
            ExprData::CallIndirect { .. } => self.visit_call_indirect(dfg, expr),
            ExprData::LocalSet { .. } | ExprData::GlobalSet { .. } => {
                self.visit_value_consumer(dfg, expr)
            }
            ExprData::Load { .. } => self.visit_load(dfg, expr),
            ExprData::Store { .. } => self.visit_store(dfg, expr),
            ExprData::Unary { .. } | ExprData::Drop { .. } => {
                self.visit_value_consumer(dfg, expr)
            }
            ExprData::Binary { .. } => self.visit_binary(dfg, expr),
            ExprData::Select { .. } => self.visit_select(dfg, expr),
            ExprData::Unreachable => {
                self.reachable = false;
                expr
            }
            ExprData::Const { .. }
            | ExprData::LocalGet { .. }
            | ExprData::GlobalGet { .. }
            | ExprData::Nop => expr,
        }
    }

    fn visit_break(&mut self, dfg: &mut ExprDfg, expr: Expr) -> Expr {
        let ExprData::Break {
            name,
            value,
            condition,
        } = dfg[expr]
        else {
            unreachable!()
        };
        if self.is_dead(dfg, value) {
            // The condition is evaluated last, so a trapping value consumes
            // the whole branch.
            return self.replace(dfg, expr, value.expect("dead value"));
        }
        if self.is_dead(dfg, condition) {
            let condition = condition.expect("dead condition");
            let new = match value {
                Some(value) => {
                    // If the branch carried a value the replacement block
                    // must keep its type to fit the tree; it ends in a trap
                    // anyhow, so that is fine.
                    let ty = dfg.ty(expr);
                    let dropped = self.drop_expr(dfg, value);
                    Builder::new(dfg).block(None, vec![dropped, condition], ty)
                }
                None => condition,
            };
            return self.replace(dfg, expr, new);
        }
        self.add_break(name);
        if condition.is_none() {
            self.reachable = false;
        }
        expr
    }

    fn visit_switch(&mut self, dfg: &mut ExprDfg, expr: Expr) -> Expr {
        let ExprData::Switch {
            ref targets,
            default,
            value,
            condition,
        } = dfg[expr]
        else {
            unreachable!()
        };
        let targets = targets.clone();
        if self.is_dead(dfg, value) {
            return self.replace(dfg, expr, value.expect("dead value"));
        }
        if dfg.is_unreachable(condition) {
            let new = match value {
                Some(value) => {
                    let ty = dfg.ty(expr);
                    let dropped = self.drop_expr(dfg, value);
                    Builder::new(dfg).block(None, vec![dropped, condition], ty)
                }
                None => condition,
            };
            return self.replace(dfg, expr, new);
        }
        for target in targets {
            self.add_break(target);
        }
        self.add_break(default);
        // A switch never falls through.
        self.reachable = false;
        expr
    }

    fn visit_return(&mut self, dfg: &ExprDfg, expr: Expr) -> Expr {
        let ExprData::Return { value } = dfg[expr] else {
            unreachable!()
        };
        if self.is_dead(dfg, value) {
            return self.replace(dfg, expr, value.expect("dead value"));
        }
        self.reachable = false;
        expr
    }

    fn visit_block(&mut self, dfg: &mut ExprDfg, expr: Expr) -> Expr {
        // If we are unreachable here (before accounting for branches to this
        // block), some element stopped control; everything after the first
        // `Unreachable`-typed element was already overwritten by the
        // suppressed scan and can simply be cut off.
        if !self.reachable {
            let cut = {
                let ExprData::Block { list, .. } = &dfg[expr] else {
                    unreachable!()
                };
                list[..list.len().saturating_sub(1)]
                    .iter()
                    .position(|&e| dfg.is_unreachable(e))
            };
            if let Some(index) = cut {
                let ExprData::Block { list, .. } = &mut dfg[expr] else {
                    unreachable!()
                };
                list.truncate(index + 1);
            }
        }
        let name = {
            let ExprData::Block { name, .. } = &dfg[expr] else {
                unreachable!()
            };
            *name
        };
        if let Some(name) = name {
            self.reachable = self.reachable || self.reachable_breaks.contains(&name);
            self.reachable_breaks.remove(&name);
        }
        let singleton = {
            let ExprData::Block { list, .. } = &dfg[expr] else {
                unreachable!()
            };
            match list.as_slice() {
                &[only] if dfg.is_unreachable(only) => Some(only),
                _ => None,
            }
        };
        if singleton.is_some() {
            let new = block_utils::simplify_to_contents_with_possible_type_change(dfg, expr);
            if new != expr {
                return self.replace(dfg, expr, new);
            }
        } else {
            // The block may have had a type but can now be unreachable,
            // which allows more reduction outside.
            self.type_updater.maybe_update_type_to_unreachable(dfg, expr);
        }
        expr
    }

    fn visit_loop(&mut self, dfg: &ExprDfg, expr: Expr) -> Expr {
        let ExprData::Loop { name, body } = dfg[expr] else {
            unreachable!()
        };
        if let Some(name) = name {
            self.reachable_breaks.remove(&name);
        }
        if dfg.is_unreachable(body) {
            // A loop whose body cannot complete is just its body, unless a
            // branch inside still targets the loop's label; then the loop
            // must remain as the branch target.
            let label_used = name.is_some_and(|name| break_seeker::has(dfg, body, name));
            if !label_used {
                return self.replace(dfg, expr, body);
            }
        }
        expr
    }

    fn visit_if(&mut self, dfg: &mut ExprDfg, expr: Expr) -> Expr {
        // The top of the stack is the branch that joins us: the state after
        // `if_true` for an if-else, or the state entering the `if` when there
        // is no else (an if without an else always admits the fall-through).
        let joined = self.if_stack.pop().expect("if fork");
        self.reachable = self.reachable || joined;
        let ExprData::If { condition, .. } = dfg[expr] else {
            unreachable!()
        };
        if dfg.is_unreachable(condition) {
            return self.replace(dfg, expr, condition);
        }
        // The node may have had a type but can now be unreachable, which
        // allows more reduction outside.
        let ty = dfg.if_ty(expr);
        dfg.set_ty(expr, ty);
        expr
    }

    /// The shared rewrite for nodes that evaluate an operand list left to
    /// right: at the first trapping operand, evaluate and drop everything
    /// before it, then the trap, and the node itself is gone.
    fn handle_operands(&mut self, dfg: &mut ExprDfg, expr: Expr) -> Option<Expr> {
        let operands: Vec<Expr> = {
            let (ExprData::Call { operands, .. }
            | ExprData::CallImport { operands, .. }
            | ExprData::CallIndirect { operands, .. }
            | ExprData::Host { operands, .. }) = &dfg[expr]
            else {
                unreachable!()
            };
            operands.clone()
        };
        for (index, &operand) in operands.iter().enumerate() {
            if !dfg.is_unreachable(operand) {
                continue;
            }
            if index == 0 {
                return Some(self.replace(dfg, expr, operand));
            }
            let ty = dfg.ty(expr);
            let list = operands[..=index]
                .to_vec()
                .into_iter()
                .map(|op| self.drop_expr(dfg, op))
                .collect();
            let block = Builder::new(dfg).block(None, list, ty);
            return Some(self.replace(dfg, expr, block));
        }
        None
    }

    fn visit_call_like(&mut self, dfg: &mut ExprDfg, expr: Expr) -> Expr {
        self.handle_operands(dfg, expr).unwrap_or(expr)
    }

    fn visit_call_indirect(&mut self, dfg: &mut ExprDfg, expr: Expr) -> Expr {
        if let Some(new) = self.handle_operands(dfg, expr) {
            return new;
        }
        let ExprData::CallIndirect {
            ref operands,
            target,
            ..
        } = dfg[expr]
        else {
            unreachable!()
        };
        if !dfg.is_unreachable(target) {
            return expr;
        }
        // The callee index is evaluated after the arguments.
        let operands = operands.clone();
        let ty = dfg.ty(expr);
        let mut list: Vec<Expr> = operands
            .into_iter()
            .map(|op| self.drop_expr(dfg, op))
            .collect();
        list.push(target);
        let block = Builder::new(dfg).block(None, list, ty);
        self.replace(dfg, expr, block)
    }

    /// `local.set`, `global.set`, `unary`, and `drop` all die with their
    /// single consumed value.
    fn visit_value_consumer(&mut self, dfg: &ExprDfg, expr: Expr) -> Expr {
        let (ExprData::LocalSet { value, .. }
        | ExprData::GlobalSet { value, .. }
        | ExprData::Unary { value, .. }
        | ExprData::Drop { value }) = dfg[expr]
        else {
            unreachable!()
        };
        if dfg.is_unreachable(value) {
            return self.replace(dfg, expr, value);
        }
        expr
    }

    fn visit_load(&mut self, dfg: &ExprDfg, expr: Expr) -> Expr {
        let ExprData::Load { ptr, .. } = dfg[expr] else {
            unreachable!()
        };
        if dfg.is_unreachable(ptr) {
            return self.replace(dfg, expr, ptr);
        }
        expr
    }

    fn visit_store(&mut self, dfg: &mut ExprDfg, expr: Expr) -> Expr {
        let ExprData::Store { ptr, value, .. } = dfg[expr] else {
            unreachable!()
        };
        if dfg.is_unreachable(ptr) {
            return self.replace(dfg, expr, ptr);
        }
        if dfg.is_unreachable(value) {
            let ty = dfg.ty(expr);
            let dropped = self.drop_expr(dfg, ptr);
            let block = Builder::new(dfg).block(None, vec![dropped, value], ty);
            return self.replace(dfg, expr, block);
        }
        expr
    }

    fn visit_binary(&mut self, dfg: &mut ExprDfg, expr: Expr) -> Expr {
        let ExprData::Binary { left, right, .. } = dfg[expr] else {
            unreachable!()
        };
        if dfg.is_unreachable(left) {
            return self.replace(dfg, expr, left);
        }
        if dfg.is_unreachable(right) {
            let ty = dfg.ty(expr);
            let dropped = self.drop_expr(dfg, left);
            let block = Builder::new(dfg).block(None, vec![dropped, right], ty);
            return self.replace(dfg, expr, block);
        }
        expr
    }

    fn visit_select(&mut self, dfg: &mut ExprDfg, expr: Expr) -> Expr {
        let ExprData::Select {
            if_true,
            if_false,
            condition,
        } = dfg[expr]
        else {
            unreachable!()
        };
        if dfg.is_unreachable(if_true) {
            return self.replace(dfg, expr, if_true);
        }
        let ty = dfg.ty(expr);
        if dfg.is_unreachable(if_false) {
            let dropped = self.drop_expr(dfg, if_true);
            let block = Builder::new(dfg).block(None, vec![dropped, if_false], ty);
            return self.replace(dfg, expr, block);
        }
        if dfg.is_unreachable(condition) {
            let dropped_true = self.drop_expr(dfg, if_true);
            let dropped_false = self.drop_expr(dfg, if_false);
            let block =
                Builder::new(dfg).block(None, vec![dropped_true, dropped_false, condition], ty);
            return self.replace(dfg, expr, block);
        }
        expr
    }
}

impl Pass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn is_function_parallel(&self) -> bool {
        true
    }

    fn create(&self) -> Box<dyn Pass> {
        Box::new(Self::new())
    }

    fn start_timer(&self) -> Box<dyn Any> {
        timing::dce()
    }

    fn run_on_function(&mut self, func: &mut Function) {
        self.reachable = true;
        self.reachable_breaks.clear();
        self.if_stack.clear();
        self.type_updater.walk(&func.dfg, func.body);
        func.body = self.scan(&mut func.dfg, func.body);
        debug_assert!(
            self.reachable_breaks.is_empty(),
            "every label must be retired by its owning block or loop"
        );
        debug_assert!(self.if_stack.is_empty());
        log::trace!("dce produced:\n{}", func.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prune_ir::{FuncIndex, Signature, SignatureIndex, Type};

    fn make_func() -> Function {
        Function::new(Signature::default(), SignatureIndex::from_u32(0))
    }

    fn run(func: &mut Function) {
        DeadCodeElimination::new().run_on_function(func);
    }

    fn f0() -> FuncIndex {
        FuncIndex::from_u32(0)
    }

    #[test]
    fn binary_with_dead_left_collapses() {
        // (i32.add (unreachable) (call $f)) => (unreachable)
        let mut func = make_func();
        let mut b = Builder::new(&mut func.dfg);
        let trap = b.unreachable();
        let call = b.call(f0(), vec![], Type::I32);
        let add = b.binary(prune_ir::Binop::I32Add, trap, call);
        func.body = add;
        run(&mut func);
        assert_eq!(func.body, trap);
        // The never-evaluated right operand was overwritten, not preserved.
        assert_eq!(func.dfg[call], ExprData::Unreachable);
    }

    #[test]
    fn binary_with_dead_right_preserves_left_effects() {
        // (i32.add (call $f) (unreachable))
        //   => (block i32 (drop (call $f)) (unreachable))
        let mut func = make_func();
        let mut b = Builder::new(&mut func.dfg);
        let call = b.call(f0(), vec![], Type::I32);
        let trap = b.unreachable();
        let add = b.binary(prune_ir::Binop::I32Add, call, trap);
        func.body = add;
        run(&mut func);
        let dfg = &func.dfg;
        assert_eq!(dfg.ty(func.body), Type::I32);
        let ExprData::Block { name: None, list } = &dfg[func.body] else {
            panic!("expected a block, got {}", func.display());
        };
        assert_eq!(list.len(), 2);
        assert_eq!(dfg[list[0]], ExprData::Drop { value: call });
        assert_eq!(list[1], trap);
    }

    #[test]
    fn call_with_dead_first_operand_is_the_operand() {
        // (call $f (unreachable) (call $g)) => (unreachable): the second
        // operand is never evaluated under left-to-right evaluation.
        let mut func = make_func();
        let mut b = Builder::new(&mut func.dfg);
        let trap = b.unreachable();
        let call_g = b.call(f0(), vec![], Type::None);
        let call_f = b.call(f0(), vec![trap, call_g], Type::None);
        func.body = call_f;
        run(&mut func);
        assert_eq!(func.body, trap);
        assert_eq!(func.dfg[call_g], ExprData::Unreachable);
    }

    #[test]
    fn call_with_dead_middle_operand_drops_the_live_prefix() {
        let mut func = make_func();
        let mut b = Builder::new(&mut func.dfg);
        let call_g = b.call(f0(), vec![], Type::I32);
        let trap = b.unreachable();
        let call_h = b.call(f0(), vec![], Type::I32);
        let call_f = b.call(f0(), vec![call_g, trap, call_h], Type::None);
        func.body = call_f;
        run(&mut func);
        let dfg = &func.dfg;
        let ExprData::Block { list, .. } = &dfg[func.body] else {
            panic!("expected a block, got {}", func.display());
        };
        // Operands past the trap are gone entirely.
        assert_eq!(list.len(), 2);
        assert_eq!(dfg[list[0]], ExprData::Drop { value: call_g });
        assert_eq!(list[1], trap);
    }

    #[test]
    fn loop_with_unreachable_body_and_unused_label_unwraps() {
        // (loop $L (unreachable)) with no branch to $L => (unreachable)
        let mut func = make_func();
        let label = func.new_label();
        let mut b = Builder::new(&mut func.dfg);
        let trap = b.unreachable();
        let looped = b.loop_(Some(label), trap);
        func.body = looped;
        run(&mut func);
        assert_eq!(func.body, trap);
    }

    #[test]
    fn loop_targeted_from_inside_is_retained() {
        // (loop $L (block (br $L) (unreachable))): the branch keeps the loop.
        let mut func = make_func();
        let label = func.new_label();
        let mut b = Builder::new(&mut func.dfg);
        let br = b.break_(label, None, None);
        let trap = b.unreachable();
        let body = b.block(None, vec![br, trap], Type::None);
        let looped = b.loop_(Some(label), body);
        func.body = looped;
        run(&mut func);
        let dfg = &func.dfg;
        let ExprData::Loop { name, body } = dfg[func.body] else {
            panic!("expected the loop to survive, got {}", func.display());
        };
        assert_eq!(name, Some(label));
        // The inner block was simplified away to the branch itself.
        assert_eq!(body, br);
    }

    #[test]
    fn code_after_unconditional_break_dies_but_block_stays_a_target() {
        // (block $b (br $b) (call $f)) => (block $b (br $b))
        let mut func = make_func();
        let label = func.new_label();
        let mut b = Builder::new(&mut func.dfg);
        let br = b.break_(label, None, None);
        let call = b.call(f0(), vec![], Type::None);
        let block = b.block(Some(label), vec![br, call], Type::None);
        func.body = block;
        run(&mut func);
        let dfg = &func.dfg;
        let ExprData::Block { name, list } = &dfg[func.body] else {
            panic!("expected a block, got {}", func.display());
        };
        assert_eq!(*name, Some(label));
        assert_eq!(list.as_slice(), &[br]);
        // Targeted from inside, so the block could not be simplified away.
        assert_eq!(dfg.ty(func.body), Type::None);
    }

    #[test]
    fn labeled_block_ending_in_trap_is_retyped() {
        // (block $b i32 (call $f) (unreachable)): retained, with the type
        // upgraded to unreachable now that nothing exits through $b.
        let mut func = make_func();
        let label = func.new_label();
        let mut b = Builder::new(&mut func.dfg);
        let call = b.call(f0(), vec![], Type::None);
        let trap = b.unreachable();
        let block = b.block(Some(label), vec![call, trap], Type::I32);
        func.body = block;
        run(&mut func);
        let dfg = &func.dfg;
        assert_eq!(func.body, block);
        assert_eq!(dfg.ty(block), Type::Unreachable);
        let ExprData::Block { list, .. } = &dfg[block] else {
            panic!("expected a block, got {}", func.display());
        };
        assert_eq!(list.as_slice(), &[call, trap]);
    }

    #[test]
    fn if_with_one_returning_arm_keeps_following_code() {
        // (block (if (c) (return) (nop)) (call $f)): only one arm stops
        // control, so the join leaves the call reachable.
        let mut func = make_func();
        let mut b = Builder::new(&mut func.dfg);
        let cond = b.i32_const(1);
        let ret = b.return_(None);
        let nop = b.nop();
        let if_ = b.if_(cond, ret, Some(nop));
        let call = b.call(f0(), vec![], Type::None);
        let block = b.block(None, vec![if_, call], Type::None);
        func.body = block;
        run(&mut func);
        let dfg = &func.dfg;
        let ExprData::Block { list, .. } = &dfg[func.body] else {
            panic!("expected a block, got {}", func.display());
        };
        assert_eq!(list.as_slice(), &[if_, call]);
        assert!(matches!(dfg[call], ExprData::Call { .. }));
        assert_eq!(dfg[ret], ExprData::Return { value: None });
    }

    #[test]
    fn if_without_else_never_kills_following_code() {
        let mut func = make_func();
        let mut b = Builder::new(&mut func.dfg);
        let cond = b.i32_const(1);
        let ret = b.return_(None);
        let if_ = b.if_(cond, ret, None);
        let call = b.call(f0(), vec![], Type::None);
        let block = b.block(None, vec![if_, call], Type::None);
        func.body = block;
        run(&mut func);
        let dfg = &func.dfg;
        let ExprData::Block { list, .. } = &dfg[func.body] else {
            panic!("expected a block, got {}", func.display());
        };
        assert_eq!(list.len(), 2);
        assert!(matches!(dfg[call], ExprData::Call { .. }));
    }

    #[test]
    fn if_with_two_returning_arms_kills_following_code() {
        let mut func = make_func();
        let mut b = Builder::new(&mut func.dfg);
        let cond = b.i32_const(1);
        let ret_a = b.return_(None);
        let ret_b = b.return_(None);
        let if_ = b.if_(cond, ret_a, Some(ret_b));
        let call = b.call(f0(), vec![], Type::None);
        let block = b.block(None, vec![if_, call], Type::None);
        func.body = block;
        run(&mut func);
        // The block shrank to the if alone and then unwrapped.
        assert_eq!(func.body, if_);
        assert_eq!(func.dfg.ty(if_), Type::Unreachable);
        assert_eq!(func.dfg[call], ExprData::Unreachable);
    }

    #[test]
    fn if_with_dead_condition_hoists_the_condition() {
        let mut func = make_func();
        let mut b = Builder::new(&mut func.dfg);
        let trap = b.unreachable();
        let then = b.nop();
        let if_ = b.if_(trap, then, None);
        func.body = if_;
        run(&mut func);
        assert_eq!(func.body, trap);
    }

    #[test]
    fn break_with_dead_value_is_the_value() {
        let mut func = make_func();
        let label = func.new_label();
        let mut b = Builder::new(&mut func.dfg);
        let trap = b.unreachable();
        let cond = b.i32_const(1);
        let br = b.break_(label, Some(trap), Some(cond));
        let block = b.block(Some(label), vec![br], Type::None);
        func.body = block;
        run(&mut func);
        // The branch collapsed to its trapping value, the label lost its
        // last use, and the block folded away around it.
        assert_eq!(func.body, trap);
        assert_eq!(func.dfg[cond], ExprData::Unreachable);
    }

    #[test]
    fn break_with_dead_condition_keeps_the_value_effects() {
        let mut func = make_func();
        let label = func.new_label();
        let mut b = Builder::new(&mut func.dfg);
        let value = b.call(f0(), vec![], Type::I32);
        let trap = b.unreachable();
        let outer_label_block = {
            let br = b.break_(label, Some(value), Some(trap));
            b.block(Some(label), vec![br], Type::I32)
        };
        func.body = outer_label_block;
        run(&mut func);
        let dfg = &func.dfg;
        // br's replacement: (block i32 (drop (call)) (unreachable)), and the
        // labeled block around it kept nothing else.
        let ExprData::Block { list, .. } = &dfg[func.body] else {
            panic!("expected a block, got {}", func.display());
        };
        assert_eq!(list.len(), 1);
        let ExprData::Block { name: None, list } = &dfg[list[0]] else {
            panic!("expected an inner rewrite block, got {}", func.display());
        };
        assert_eq!(list.len(), 2);
        assert_eq!(dfg[list[0]], ExprData::Drop { value });
        assert_eq!(list[1], trap);
    }

    #[test]
    fn store_with_dead_value_drops_the_address() {
        let mut func = make_func();
        let mut b = Builder::new(&mut func.dfg);
        let ptr = b.call(f0(), vec![], Type::I32);
        let trap = b.unreachable();
        let store = b.store(Type::I32, 0, 2, ptr, trap);
        func.body = store;
        run(&mut func);
        let dfg = &func.dfg;
        assert_eq!(dfg.ty(func.body), Type::Unreachable);
        let ExprData::Block { list, .. } = &dfg[func.body] else {
            panic!("expected a block, got {}", func.display());
        };
        assert_eq!(dfg[list[0]], ExprData::Drop { value: ptr });
        assert_eq!(list[1], trap);
    }

    #[test]
    fn store_with_dead_address_is_the_address() {
        let mut func = make_func();
        let mut b = Builder::new(&mut func.dfg);
        let trap = b.unreachable();
        let value = b.i32_const(7);
        let store = b.store(Type::I32, 0, 2, trap, value);
        func.body = store;
        run(&mut func);
        assert_eq!(func.body, trap);
        assert_eq!(func.dfg[value], ExprData::Unreachable);
    }

    #[test]
    fn select_with_dead_condition_drops_both_arms() {
        let mut func = make_func();
        let mut b = Builder::new(&mut func.dfg);
        let left = b.call(f0(), vec![], Type::I32);
        let right = b.call(f0(), vec![], Type::I32);
        let trap = b.unreachable();
        let select = b.select(left, right, trap, Type::I32);
        func.body = select;
        run(&mut func);
        let dfg = &func.dfg;
        assert_eq!(dfg.ty(func.body), Type::I32);
        let ExprData::Block { list, .. } = &dfg[func.body] else {
            panic!("expected a block, got {}", func.display());
        };
        assert_eq!(list.len(), 3);
        assert_eq!(dfg[list[0]], ExprData::Drop { value: left });
        assert_eq!(dfg[list[1]], ExprData::Drop { value: right });
        assert_eq!(list[2], trap);
    }

    #[test]
    fn switch_records_all_targets() {
        // (block $a (block $b (br_table $a $b (call $f)) (call $g))): both
        // labels stay live, the code after the switch does not.
        let mut func = make_func();
        let label_a = func.new_label();
        let label_b = func.new_label();
        let mut b = Builder::new(&mut func.dfg);
        let selector = b.call(f0(), vec![], Type::I32);
        let sw = b.switch(vec![label_a], label_b, None, selector);
        let call_g = b.call(f0(), vec![], Type::None);
        let inner = b.block(Some(label_b), vec![sw, call_g], Type::None);
        let outer = b.block(Some(label_a), vec![inner], Type::None);
        func.body = outer;
        run(&mut func);
        let dfg = &func.dfg;
        assert_eq!(dfg[call_g], ExprData::Unreachable);
        let ExprData::Block { list, .. } = &dfg[inner] else {
            panic!("expected the inner block to survive, got {}", func.display());
        };
        assert_eq!(list.as_slice(), &[sw]);
        // Both blocks remain branch targets, so neither was retyped.
        assert_eq!(dfg.ty(inner), Type::None);
        assert_eq!(dfg.ty(outer), Type::None);
    }

    #[test]
    fn drop_of_dead_value_is_the_value() {
        let mut func = make_func();
        let mut b = Builder::new(&mut func.dfg);
        let trap = b.unreachable();
        let dropped = b.drop_(trap);
        func.body = dropped;
        run(&mut func);
        assert_eq!(func.body, trap);
    }

    #[test]
    fn reachable_code_is_left_alone() {
        let mut func = make_func();
        func.locals.push(Type::I32);
        let mut b = Builder::new(&mut func.dfg);
        let x = b.local_get(0, Type::I32);
        let one = b.i32_const(1);
        let sum = b.binary(prune_ir::Binop::I32Add, x, one);
        let set = b.local_set(0, sum);
        let block = b.block(None, vec![set], Type::None);
        func.body = block;
        let before = func.display().to_string();
        run(&mut func);
        assert_eq!(func.display().to_string(), before);
    }
}
