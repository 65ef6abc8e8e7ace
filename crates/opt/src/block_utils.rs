//! Block simplification helpers shared by rewriting passes.

use crate::break_seeker;
use prune_ir::{Expr, ExprData, ExprDfg};

/// Simplify a block whose single element is `Unreachable`-typed down to that
/// element, accepting that the replacement's type may differ from the
/// block's.
///
/// Returns the replacement expression, or the block itself when it must stay:
/// a branch inside the element may still target the block's own label, in
/// which case the block is load-bearing as a branch target.
pub fn simplify_to_contents_with_possible_type_change(dfg: &ExprDfg, block: Expr) -> Expr {
    let ExprData::Block { name, list } = &dfg[block] else {
        panic!("{block} is not a block");
    };
    debug_assert_eq!(list.len(), 1);
    let singleton = list[0];
    debug_assert!(dfg.is_unreachable(singleton));
    if let Some(name) = name {
        if break_seeker::has(dfg, singleton, *name) {
            return block;
        }
    }
    singleton
}
