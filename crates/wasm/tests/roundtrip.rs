//! Decode/encode fidelity tests: evaluation-order preservation, polymorphic
//! code materialization, and whole-module section handling.

use prune_ir::{ExprData, ImportKind, InitExpr, Literal, Module};
use prune_wasm::{decode_module, encode_module, Error};

fn decode(wat: &str) -> Module {
    let binary = wat::parse_str(wat).expect("test input must parse");
    wasmparser::validate(&binary).expect("test input must validate");
    decode_module(&binary).expect("test input must decode")
}

fn reencode(module: &Module) -> Vec<u8> {
    let binary = encode_module(module);
    wasmparser::validate(&binary).expect("re-encoded module must validate");
    binary
}

#[test]
fn impure_value_under_statements_is_spilled() {
    // `call $make` pushes a value, `call $noisy` runs above it, and `i32.eqz`
    // then consumes the value. The decoder must not move the producing call
    // past the noisy one, so it spills through a scratch local.
    let module = decode(
        r#"(module
            (func $noisy)
            (func $make (result i32) (i32.const 5))
            (func (result i32)
                call $make
                call $noisy
                i32.eqz))"#,
    );
    let func = module.functions.values().nth(2).unwrap();
    assert_eq!(func.locals.len(), 1, "one scratch local:\n{}", func.display());
    let ExprData::Block { list, .. } = &func.dfg[func.body] else {
        panic!("expected a statement list:\n{}", func.display());
    };
    assert!(
        matches!(func.dfg[list[0]], ExprData::LocalSet { tee: false, .. }),
        "the producing call is stored first:\n{}",
        func.display()
    );
    assert!(matches!(func.dfg[list[1]], ExprData::Call { .. }));
    reencode(&module);
}

#[test]
fn constants_move_past_statements_without_spilling() {
    let module = decode(
        r#"(module
            (func $noisy)
            (func (result i32)
                i32.const 1
                call $noisy
                i32.const 2
                i32.add))"#,
    );
    let func = module.functions.values().nth(1).unwrap();
    assert!(func.locals.is_empty(), "{}", func.display());
    let ExprData::Block { list, .. } = &func.dfg[func.body] else {
        panic!("expected a statement list:\n{}", func.display());
    };
    assert!(matches!(func.dfg[list[0]], ExprData::Call { .. }));
    assert!(matches!(func.dfg[list[1]], ExprData::Binary { .. }));
    reencode(&module);
}

#[test]
fn code_after_a_trap_is_still_materialized() {
    let module = decode(
        r#"(module
            (func
                unreachable
                i32.const 1
                drop))"#,
    );
    let func = module.functions.values().next().unwrap();
    let ExprData::Block { list, .. } = &func.dfg[func.body] else {
        panic!("expected a statement list:\n{}", func.display());
    };
    assert!(matches!(func.dfg[list[0]], ExprData::Unreachable));
    assert!(
        matches!(func.dfg[list[1]], ExprData::Drop { .. }),
        "dead code is kept for later passes:\n{}",
        func.display()
    );
    reencode(&module);
}

#[test]
fn polymorphic_pops_synthesize_traps() {
    let module = decode(
        r#"(module
            (func (result i32)
                unreachable
                i32.add))"#,
    );
    let func = module.functions.values().next().unwrap();
    let ExprData::Binary { left, right, .. } = func.dfg[func.body] else {
        panic!("expected the add to be materialized:\n{}", func.display());
    };
    assert!(matches!(func.dfg[left], ExprData::Unreachable));
    assert!(matches!(func.dfg[right], ExprData::Unreachable));
    reencode(&module);
}

#[test]
fn calls_to_imports_use_the_import_space() {
    let module = decode(
        r#"(module
            (import "env" "f" (func $f (result i32)))
            (func (result i32) (call $f)))"#,
    );
    let func = module.functions.values().next().unwrap();
    assert!(
        matches!(func.dfg[func.body], ExprData::CallImport { import: 0, .. }),
        "{}",
        func.display()
    );
    reencode(&module);
}

#[test]
fn whole_module_sections_survive_a_round_trip() {
    let wat = r#"(module
        (import "env" "print" (func $print (param i32)))
        (import "env" "base" (global $base i32))
        (memory 2 4)
        (table 4 funcref)
        (global $counter (mut i32) (i32.const 41))
        (elem (global.get $base) $start $start)
        (data (i32.const 16) "prune")
        (func $start (global.set $counter (i32.const 42)))
        (start $start)
        (export "go" (func $start))
        (export "mem" (memory 0)))"#;
    let module = decode(wat);

    assert_eq!(module.imports.len(), 2);
    assert!(matches!(module.imports[0].kind, ImportKind::Func(_)));
    assert_eq!(module.memories[0].limits.min, 2);
    assert_eq!(module.memories[0].limits.max, Some(4));
    assert_eq!(module.tables[0].limits.min, 4);
    assert_eq!(
        module.globals[0].init,
        InitExpr::Const(Literal::I32(41))
    );
    assert_eq!(module.elem_segments[0].entries, vec![1, 1]);
    assert_eq!(module.data_segments[0].data, b"prune");
    assert_eq!(module.start, Some(1));
    assert_eq!(module.exports.len(), 2);

    // The round trip is stable from the first re-encode onwards.
    let binary = reencode(&module);
    let again = decode_module(&binary).expect("re-encoded module must decode");
    assert_eq!(reencode(&again), binary);
}

#[test]
fn post_mvp_features_are_rejected() {
    let binary = wat::parse_str(
        r#"(module (func (result i32 i32) (i32.const 1) (i32.const 2)))"#,
    )
    .unwrap();
    let error = decode_module(&binary)
        .err()
        .expect("multi-value results must be rejected");
    match error {
        Error::Unsupported(message) => {
            assert!(message.contains("multiple results"), "{message}");
        }
        other => panic!("expected an unsupported-feature error, got {other}"),
    }
}
