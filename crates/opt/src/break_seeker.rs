//! Structural search for branches to a label.

use prune_ir::{Expr, ExprData, ExprDfg, Label};

/// True if any `Break` or `Switch` within `root`'s subtree targets `label`.
///
/// Labels are unique within a function, so there is no shadowing to account
/// for; the scan is a plain traversal.
pub fn has(dfg: &ExprDfg, root: Expr, label: Label) -> bool {
    let mut stack = vec![root];
    while let Some(expr) = stack.pop() {
        match &dfg[expr] {
            ExprData::Break { name, .. } if *name == label => return true,
            ExprData::Switch {
                targets, default, ..
            } if *default == label || targets.contains(&label) => return true,
            _ => {}
        }
        stack.extend(dfg.children(expr));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use prune_ir::Builder;

    #[test]
    fn finds_branches_through_nesting() {
        let mut dfg = ExprDfg::new();
        let inner = Label::from_u32(0);
        let outer = Label::from_u32(1);
        let mut b = Builder::new(&mut dfg);
        let br = b.break_(outer, None, None);
        let block = b.block(Some(inner), vec![br], prune_ir::Type::None);
        assert!(has(&dfg, block, outer));
        assert!(!has(&dfg, block, inner));
    }

    #[test]
    fn finds_switch_targets() {
        let mut dfg = ExprDfg::new();
        let a = Label::from_u32(0);
        let b_label = Label::from_u32(1);
        let c = Label::from_u32(2);
        let mut b = Builder::new(&mut dfg);
        let cond = b.i32_const(0);
        let sw = b.switch(vec![a], b_label, None, cond);
        assert!(has(&dfg, sw, a));
        assert!(has(&dfg, sw, b_label));
        assert!(!has(&dfg, sw, c));
    }
}
