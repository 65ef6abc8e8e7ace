//! Incremental type maintenance while a pass removes code.
//!
//! As a rewriting pass detaches or overwrites subtrees, container nodes above
//! the rewrite can change type: a block that used to fall through may now end
//! in a trap, making it `Unreachable`-typed, which in turn can retype its
//! ancestors. Recomputing types from scratch after every rewrite would be
//! quadratic, so the updater keeps two caches built in one walk up front:
//!
//! - a parent map, so a retyped node can push the change upward, and
//! - per-label counts of branches still present in the tree, so a labeled
//!   block is only retyped `Unreachable` once no branch can exit through it.
//!
//! The pass notifies the updater of every replacement and every wholesale
//! subtree removal; the caches stay consistent with the tree it is mutating.

use prune_ir::{Expr, ExprData, ExprDfg, Label, Type};
use rustc_hash::FxHashMap;

/// Parent and live-branch caches for one function body.
#[derive(Default)]
pub struct TypeUpdater {
    parents: FxHashMap<Expr, Expr>,
    num_breaks: FxHashMap<Label, usize>,
}

impl TypeUpdater {
    /// Create an updater with empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the caches for the tree rooted at `root`, discarding any
    /// previous state.
    pub fn walk(&mut self, dfg: &ExprDfg, root: Expr) {
        self.parents.clear();
        self.num_breaks.clear();
        self.add_tree(dfg, root, None);
    }

    /// Register a one-for-one swap of `old` for `new` in `old`'s parent slot.
    ///
    /// `new` is commonly a node from inside `old`'s subtree; the old
    /// subtree's branches are discarded and the new subtree's re-registered,
    /// so the counts come out right either way.
    pub fn note_replacement(&mut self, dfg: &ExprDfg, old: Expr, new: Expr) {
        let parent = self.parents.get(&old).copied();
        self.remove_tree(dfg, old);
        self.add_tree(dfg, new, parent);
    }

    /// Register that `root`'s entire subtree has been removed from the tree.
    pub fn note_recursive_removal(&mut self, dfg: &ExprDfg, root: Expr) {
        self.remove_tree(dfg, root);
    }

    /// The number of branches still targeting `label`.
    pub fn num_breaks(&self, label: Label) -> usize {
        self.num_breaks.get(&label).copied().unwrap_or(0)
    }

    /// Retype `block` to `Unreachable` if its list no longer falls through
    /// and no branch can exit through its label, then push the change up the
    /// parent chain.
    pub fn maybe_update_type_to_unreachable(&mut self, dfg: &mut ExprDfg, block: Expr) {
        if dfg.ty(block) == Type::Unreachable || !self.block_stops_flow(dfg, block) {
            return;
        }
        dfg.set_ty(block, Type::Unreachable);
        self.propagate_types_up(dfg, block);
    }

    /// Whether `block` cannot complete: its list ends `Unreachable`-typed and
    /// no live branch targets its label.
    fn block_stops_flow(&self, dfg: &ExprDfg, block: Expr) -> bool {
        let ExprData::Block { name, .. } = &dfg[block] else {
            panic!("{block} is not a block");
        };
        if let Some(name) = name {
            if self.num_breaks(*name) > 0 {
                return false;
            }
        }
        dfg.block_fallthrough_ty(block) == Some(Type::Unreachable)
    }

    /// Re-finalize containers up the parent chain from `child`, stopping as
    /// soon as a type does not change. Non-container parents are left to
    /// their own visitors: the pass traverses post-order, so they have not
    /// run yet and will see the updated child type.
    fn propagate_types_up(&mut self, dfg: &mut ExprDfg, child: Expr) {
        let mut current = child;
        while let Some(&parent) = self.parents.get(&current) {
            let old_ty = dfg.ty(parent);
            let new_ty = match &dfg[parent] {
                ExprData::Block { .. } => {
                    if self.block_stops_flow(dfg, parent) {
                        Type::Unreachable
                    } else {
                        old_ty
                    }
                }
                ExprData::Loop { body, .. } => dfg.ty(*body),
                ExprData::If { .. } => dfg.if_ty(parent),
                _ => break,
            };
            if new_ty == old_ty {
                break;
            }
            dfg.set_ty(parent, new_ty);
            current = parent;
        }
    }

    fn add_tree(&mut self, dfg: &ExprDfg, root: Expr, parent: Option<Expr>) {
        if let Some(parent) = parent {
            self.parents.insert(root, parent);
        }
        let mut stack = vec![root];
        while let Some(expr) = stack.pop() {
            self.note_targets(&dfg[expr], 1);
            for child in dfg.children(expr) {
                self.parents.insert(child, expr);
                stack.push(child);
            }
        }
    }

    fn remove_tree(&mut self, dfg: &ExprDfg, root: Expr) {
        self.parents.remove(&root);
        let mut stack = vec![root];
        while let Some(expr) = stack.pop() {
            self.note_targets(&dfg[expr], -1);
            for child in dfg.children(expr) {
                self.parents.remove(&child);
                stack.push(child);
            }
        }
    }

    fn note_targets(&mut self, data: &ExprData, delta: isize) {
        let mut bump = |label: Label| {
            let count = self.num_breaks.entry(label).or_insert(0);
            *count = count
                .checked_add_signed(delta)
                .expect("branch count underflow");
        };
        match data {
            ExprData::Break { name, .. } => bump(*name),
            ExprData::Switch {
                targets, default, ..
            } => {
                for target in targets {
                    bump(*target);
                }
                bump(*default);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prune_ir::{Builder, Label};

    #[test]
    fn branch_counts_follow_removals() {
        let mut dfg = ExprDfg::new();
        let label = Label::from_u32(0);
        let mut b = Builder::new(&mut dfg);
        let cond = b.i32_const(1);
        let br = b.break_(label, None, Some(cond));
        let block = b.block(Some(label), vec![br], Type::None);

        let mut updater = TypeUpdater::new();
        updater.walk(&dfg, block);
        assert_eq!(updater.num_breaks(label), 1);

        updater.note_recursive_removal(&dfg, br);
        assert_eq!(updater.num_breaks(label), 0);
    }

    #[test]
    fn labeled_block_with_live_branch_keeps_its_type() {
        let mut dfg = ExprDfg::new();
        let label = Label::from_u32(0);
        let mut b = Builder::new(&mut dfg);
        let cond = b.i32_const(1);
        let br = b.break_(label, None, Some(cond));
        let trap = b.unreachable();
        let block = b.block(Some(label), vec![br, trap], Type::None);
        assert_eq!(dfg.ty(block), Type::None);

        let mut updater = TypeUpdater::new();
        updater.walk(&dfg, block);
        updater.maybe_update_type_to_unreachable(&mut dfg, block);
        assert_eq!(dfg.ty(block), Type::None);
    }

    #[test]
    fn retype_propagates_through_containers() {
        let mut dfg = ExprDfg::new();
        let mut b = Builder::new(&mut dfg);
        let trap = b.unreachable();
        let inner = b.block(None, vec![trap], Type::None);
        dfg.set_ty(inner, Type::None); // pretend the trap arrived later
        let mut b = Builder::new(&mut dfg);
        let outer = b.block(None, vec![inner], Type::None);
        dfg.set_ty(outer, Type::None);

        let mut updater = TypeUpdater::new();
        updater.walk(&dfg, outer);
        updater.maybe_update_type_to_unreachable(&mut dfg, inner);
        assert_eq!(dfg.ty(inner), Type::Unreachable);
        assert_eq!(dfg.ty(outer), Type::Unreachable);
    }
}
