//! End-to-end dead code elimination tests: parse a text module, run the
//! pass, and check both the rewritten tree and that the re-encoded module
//! still validates.

use prune_ir::{ExprData, Module, Type};
use prune_opt::{create_pass, PassRunner};
use prune_wasm::{decode_module, encode_module};

/// Parse `wat`, run DCE through the pass runner, and validate the output.
fn optimize(wat: &str) -> Module {
    let binary = wat::parse_str(wat).expect("test input must parse");
    wasmparser::validate(&binary).expect("test input must validate");
    let mut module = decode_module(&binary).expect("test input must decode");
    run_dce(&mut module);
    module
}

fn run_dce(module: &mut Module) {
    let mut runner = PassRunner::new();
    runner.add(create_pass("dce").expect("dce is registered"));
    runner.run(module);
    let binary = encode_module(module);
    wasmparser::validate(&binary).expect("optimized module must validate");
}

/// Encoded bytes after another DCE run; for checking that the pass has
/// nothing more to say.
fn encoded_fixpoint(module: &mut Module) -> (Vec<u8>, Vec<u8>) {
    let before = encode_module(module);
    run_dce(module);
    (before, encode_module(module))
}

#[test]
fn block_ending_in_trap_is_retyped() {
    // The block keeps its shape; only its type changes, now that nothing can
    // flow out of it.
    let mut module = optimize(
        r#"(module
            (func $f)
            (func (result i32)
                (block (result i32) (call $f) (unreachable))))"#,
    );
    let func = module.functions.values().nth(1).unwrap();
    let ExprData::Block { list, .. } = &func.dfg[func.body] else {
        panic!("expected a block body:\n{}", func.display());
    };
    assert_eq!(list.len(), 2);
    assert_eq!(func.dfg.ty(func.body), Type::Unreachable);
    assert!(matches!(func.dfg[list[0]], ExprData::Call { .. }));
    assert!(matches!(func.dfg[list[1]], ExprData::Unreachable));

    let (before, after) = encoded_fixpoint(&mut module);
    assert_eq!(before, after);
}

#[test]
fn dead_left_operand_consumes_the_add() {
    let mut module = optimize(
        r#"(module
            (func $g (result i32) (i32.const 3))
            (func (result i32)
                (i32.add (unreachable) (call $g))))"#,
    );
    let func = module.functions.values().nth(1).unwrap();
    assert!(
        matches!(func.dfg[func.body], ExprData::Unreachable),
        "expected the whole add to collapse:\n{}",
        func.display()
    );

    let (before, after) = encoded_fixpoint(&mut module);
    assert_eq!(before, after);
}

#[test]
fn dead_right_operand_keeps_the_left_side_effects() {
    let mut module = optimize(
        r#"(module
            (func $g (result i32) (i32.const 3))
            (func (result i32)
                (i32.add (call $g) (unreachable))))"#,
    );
    let func = module.functions.values().nth(1).unwrap();
    let ExprData::Block { list, .. } = &func.dfg[func.body] else {
        panic!("expected a drop block:\n{}", func.display());
    };
    assert_eq!(list.len(), 2);
    assert!(matches!(func.dfg[list[0]], ExprData::Drop { .. }));
    assert!(matches!(func.dfg[list[1]], ExprData::Unreachable));

    let (before, after) = encoded_fixpoint(&mut module);
    assert_eq!(before, after);
}

#[test]
fn if_join_keeps_code_after_a_one_armed_return() {
    let mut module = optimize(
        r#"(module
            (func (result i32)
                (if (result i32) (i32.const 1)
                    (then (return (i32.const 5)))
                    (else (i32.const 7)))))"#,
    );
    let func = module.functions.values().next().unwrap();
    let ExprData::If { if_true, .. } = func.dfg[func.body] else {
        panic!("expected the if to survive:\n{}", func.display());
    };
    assert_eq!(func.dfg.ty(func.body), Type::I32);
    assert!(matches!(func.dfg[if_true], ExprData::Return { .. }));

    let (before, after) = encoded_fixpoint(&mut module);
    assert_eq!(before, after);
}

#[test]
fn code_after_a_break_dies_while_the_block_survives() {
    let mut module = optimize(
        r#"(module
            (func $f)
            (func
                (block $b (br $b) (call $f))))"#,
    );
    let func = module.functions.values().nth(1).unwrap();
    let ExprData::Block { name, list } = &func.dfg[func.body] else {
        panic!("expected a block body:\n{}", func.display());
    };
    assert!(name.is_some(), "the block is still a branch target");
    assert_eq!(list.len(), 1, "the call is gone:\n{}", func.display());
    assert!(matches!(func.dfg[list[0]], ExprData::Break { .. }));

    let (before, after) = encoded_fixpoint(&mut module);
    assert_eq!(before, after);
}

#[test]
fn loop_of_nothing_but_a_trap_unwraps() {
    let mut module = optimize(
        r#"(module
            (func (loop $l (unreachable))))"#,
    );
    let func = module.functions.values().next().unwrap();
    assert!(
        matches!(func.dfg[func.body], ExprData::Unreachable),
        "expected the loop to unwrap:\n{}",
        func.display()
    );

    let (before, after) = encoded_fixpoint(&mut module);
    assert_eq!(before, after);
}

#[test]
fn loop_that_is_branched_to_survives() {
    let mut module = optimize(
        r#"(module
            (func (loop $l (block (br $l) (unreachable)))))"#,
    );
    let func = module.functions.values().next().unwrap();
    let ExprData::Loop { name, body } = func.dfg[func.body] else {
        panic!("expected the loop to survive:\n{}", func.display());
    };
    assert!(name.is_some());
    assert!(matches!(func.dfg[body], ExprData::Break { .. }));

    let (before, after) = encoded_fixpoint(&mut module);
    assert_eq!(before, after);
}

#[test]
fn switch_targets_stay_live() {
    let mut module = optimize(
        r#"(module
            (func $f)
            (func (param i32) (result i32)
                (block $a
                    (block $b
                        (br_table $a $b (local.get 0))
                        (call $f))
                    (return (i32.const 1)))
                (i32.const 2)))"#,
    );
    let func = module.functions.values().nth(1).unwrap();
    // Everything but the dead call survives: both labels are live.
    let text = func.display().to_string();
    assert!(text.contains("br_table"), "{text}");
    assert!(!text.contains("(call"), "the dead call is gone: {text}");

    let (before, after) = encoded_fixpoint(&mut module);
    assert_eq!(before, after);
}

#[test]
fn trapping_store_address_erases_the_store() {
    let mut module = optimize(
        r#"(module
            (memory 1)
            (func (i32.store (unreachable) (i32.const 7))))"#,
    );
    let func = module.functions.values().next().unwrap();
    assert!(matches!(func.dfg[func.body], ExprData::Unreachable));
}

#[test]
fn trapping_store_value_preserves_the_address_effects() {
    let mut module = optimize(
        r#"(module
            (memory 1)
            (func $addr (result i32) (i32.const 8))
            (func (i32.store (call $addr) (unreachable))))"#,
    );
    let func = module.functions.values().nth(1).unwrap();
    let ExprData::Block { list, .. } = &func.dfg[func.body] else {
        panic!("expected a drop block:\n{}", func.display());
    };
    assert!(matches!(func.dfg[list[0]], ExprData::Drop { .. }));
    assert!(matches!(func.dfg[list[1]], ExprData::Unreachable));
}

#[test]
fn nested_value_consumers_converge_after_two_runs() {
    // A rewrite block in value position keeps its concrete type on the first
    // run; a second run may retype it and let the consumer collapse too. The
    // third run must have nothing left to do.
    let binary = wat::parse_str(
        r#"(module
            (func $g (result i32) (i32.const 3))
            (func (result i32)
                (i32.eqz (i32.add (call $g) (unreachable)))))"#,
    )
    .unwrap();
    let mut module = decode_module(&binary).unwrap();
    run_dce(&mut module);
    run_dce(&mut module);
    let (before, after) = encoded_fixpoint(&mut module);
    assert_eq!(before, after);
}

#[test]
fn reachable_functions_round_trip_untouched() {
    let wat = r#"(module
        (memory 1)
        (global $g (mut i32) (i32.const 0))
        (func $fac (param i64) (result i64)
            (if (result i64) (i64.eqz (local.get 0))
                (then (i64.const 1))
                (else (i64.mul (local.get 0)
                               (call $fac (i64.sub (local.get 0) (i64.const 1)))))))
        (func $store (param i32)
            (global.set $g (local.get 0))
            (i32.store offset=4 (local.get 0) (global.get $g))))"#;
    let binary = wat::parse_str(wat).unwrap();
    let mut module = decode_module(&binary).unwrap();
    let before = encode_module(&module);
    run_dce(&mut module);
    let after = encode_module(&module);
    assert_eq!(before, after, "no dead code, so nothing changes");
}

#[test]
fn function_parallel_fanout_handles_many_functions() {
    // One module with enough functions that the runner actually fans out.
    let mut wat = String::from("(module (func $f (result i32) (i32.const 1))");
    for _ in 0..64 {
        wat.push_str(
            "(func (result i32) (i32.add (call $f) (unreachable)))\
             (func (result i32) (call $f))",
        );
    }
    wat.push(')');
    let mut module = optimize(&wat);
    for (index, func) in module.functions.iter() {
        if index.as_u32() != 0 && index.as_u32() % 2 == 1 {
            assert!(
                matches!(func.dfg[func.body], ExprData::Block { .. }),
                "function {index} should have been rewritten"
            );
        }
    }
    let (before, after) = encoded_fixpoint(&mut module);
    assert_eq!(before, after);
}
