//! Black-box end-to-end scenarios driving the public `Parser`/`Cfg` API
//! straight through to SSA form, with no intermediate AST to inspect.

use smplc::frontend::Parser;
use smplc::ir::{Binding, BlockKind, Op, Operand};

fn parse(src: &str) -> (smplc::ir::Cfg, bool) {
    let parser = Parser::new(src, 0);
    let (cfg, diagnostics, had_error) = parser.parse();
    (cfg, had_error || diagnostics.has_errors())
}

fn block_of_kind(cfg: &smplc::ir::Cfg, kind: BlockKind) -> &smplc::ir::BasicBlock {
    cfg.blocks()
        .iter()
        .find(|b| b.kind == kind)
        .unwrap_or_else(|| panic!("no {kind:?} block in the parsed CFG"))
}

#[test]
fn pure_constant_folding_collapses_to_a_single_const() {
    let (cfg, had_error) = parse("main var x; { let x <- 2 + 3 * 4 } .");
    assert!(!had_error);

    assert_eq!(cfg.pool().len(), 2);
    let value = cfg.instruction(smplc::ir::InstrId(1));
    assert_eq!(value.op, Op::Const);
    assert_eq!(value.a, Operand::Literal(14));
    assert_eq!(cfg.instruction(smplc::ir::InstrId(2)).op, Op::End);

    let root = &cfg.blocks()[0];
    assert_eq!(root.symtable.get("x"), Some(&Binding::Value(smplc::ir::InstrId(1))));
}

#[test]
fn repeated_expression_is_common_subexpression_eliminated() {
    let src = "main var a, b, x, y; \
               { let a <- call InputNum(); let b <- call InputNum(); \
                 let x <- a+b; let y <- a+b } .";
    let (cfg, had_error) = parse(src);
    assert!(!had_error);

    assert_eq!(cfg.pool().len(), 4);
    let root = &cfg.blocks()[0];
    let x = root.symtable.get("x").copied();
    let y = root.symtable.get("y").copied();
    assert_eq!(x, y);
    assert_eq!(x, Some(Binding::Value(smplc::ir::InstrId(3))));
    assert_eq!(cfg.instruction(smplc::ir::InstrId(3)).op, Op::Add);
}

#[test]
fn if_else_merges_through_a_phi() {
    let src = "main var x; \
               { let x <- 1; \
                 if x == 1 then let x <- 2 else let x <- 3 fi } .";
    let (cfg, had_error) = parse(src);
    assert!(!had_error);

    assert_eq!(cfg.pool().len(), 9);

    let phi = cfg.instruction(smplc::ir::InstrId(5));
    assert_eq!(phi.op, Op::Phi);
    assert_eq!(phi.a, Operand::Instr(smplc::ir::InstrId(4)));
    assert_eq!(phi.b, Operand::Instr(smplc::ir::InstrId(7)));

    // the then-arm must close with an unconditional jump over the else-arm,
    // not just fall through into it
    let then_bra = cfg.instruction(smplc::ir::InstrId(6));
    assert_eq!(then_bra.op, Op::Bra);
    assert_eq!(then_bra.a, Operand::Instr(smplc::ir::InstrId(5)));

    let branch = cfg.instruction(smplc::ir::InstrId(3));
    assert_eq!(branch.op, Op::Bne);
    assert_eq!(branch.b, Operand::Instr(smplc::ir::InstrId(8)));

    let join = block_of_kind(&cfg, BlockKind::Join);
    assert_eq!(join.symtable.get("x"), Some(&Binding::Value(smplc::ir::InstrId(5))));
}

#[test]
fn if_then_arm_with_no_assignment_still_closes_with_a_bra() {
    // the then-arm here contributes no scalar assignment of its own (so no
    // φ exists yet when its closing jump is emitted), and the else-arm's
    // assignment only creates that φ afterwards — both the skip-branch and
    // the then-arm's own BRA must end up waiting on the join simultaneously.
    let src = "main var x; \
               { let x <- 1; \
                 if x == 1 then call OutputNum(x) else let x <- 3 fi } .";
    let (cfg, had_error) = parse(src);
    assert!(!had_error);

    let write = cfg.instruction(smplc::ir::InstrId(4));
    assert_eq!(write.op, Op::Write);

    let then_bra = cfg.instruction(smplc::ir::InstrId(5));
    assert_eq!(then_bra.op, Op::Bra);
    assert_eq!(then_bra.a, Operand::Instr(smplc::ir::InstrId(7)));

    let phi = cfg.instruction(smplc::ir::InstrId(7));
    assert_eq!(phi.op, Op::Phi);
    assert_eq!(phi.a, Operand::Instr(smplc::ir::InstrId(1)));
    assert_eq!(phi.b, Operand::Instr(smplc::ir::InstrId(6)));

    let branch = cfg.instruction(smplc::ir::InstrId(3));
    assert_eq!(branch.op, Op::Bne);
    assert_eq!(branch.b, Operand::Instr(smplc::ir::InstrId(8)));
}

#[test]
fn while_loop_inserts_phi_and_propagates_the_rename() {
    let src = "main var i; { let i <- call InputNum(); while i < 10 do let i <- i + 1 od } .";
    let (cfg, had_error) = parse(src);
    assert!(!had_error);

    // 8 instructions from the loop itself, plus the trailing END.
    assert_eq!(cfg.pool().len(), 9);

    let phi = cfg.instruction(smplc::ir::InstrId(7));
    assert_eq!(phi.op, Op::Phi);
    assert_eq!(phi.a, Operand::Instr(smplc::ir::InstrId(1)));
    assert_eq!(phi.b, Operand::Instr(smplc::ir::InstrId(6)));

    // the CMP inside WHILE_JOIN was rewritten to consume the phi, not the
    // pre-loop entry value
    let cmp = cfg.instruction(smplc::ir::InstrId(3));
    assert_eq!(cmp.op, Op::Cmp);
    assert_eq!(cmp.a, Operand::Instr(smplc::ir::InstrId(7)));

    // and so was the body's own `i + 1`, now self-referential through the phi
    let add = cfg.instruction(smplc::ir::InstrId(6));
    assert_eq!(add.op, Op::Add);
    assert_eq!(add.a, Operand::Instr(smplc::ir::InstrId(7)));

    let back_edge = cfg.instruction(smplc::ir::InstrId(8));
    assert_eq!(back_edge.op, Op::Bra);
    assert_eq!(back_edge.a, Operand::Instr(smplc::ir::InstrId(7)));

    let while_join = block_of_kind(&cfg, BlockKind::WhileJoin);
    assert_eq!(while_join.symtable.get("i"), Some(&Binding::Value(smplc::ir::InstrId(7))));
    let follow = block_of_kind(&cfg, BlockKind::Follow);
    assert_eq!(follow.symtable.get("i"), Some(&Binding::Value(smplc::ir::InstrId(7))));
}

#[test]
fn array_store_inside_a_branch_kills_cse_for_later_loads() {
    let src = "main var x, y; array [5] a; \
               { let x <- a[0]; \
                 if x == 1 then let a[0] <- 2 fi; \
                 let y <- a[0] } .";
    let (cfg, had_error) = parse(src);
    assert!(!had_error);

    assert_eq!(cfg.pool().len(), 19);

    let load1 = cfg.instruction(smplc::ir::InstrId(7));
    let load2 = cfg.instruction(smplc::ir::InstrId(18));
    assert_eq!(load1.op, Op::Load);
    assert_eq!(load2.op, Op::Load);
    assert_ne!(load1.a, load2.a, "the post-branch load must not reuse the pre-branch ADDA");

    // the join's own address computation had to be rebuilt from scratch,
    // since a KILL sits at the front of its memory dominating chain
    let adda2 = cfg.instruction(smplc::ir::InstrId(17));
    assert_eq!(adda2.op, Op::Adda);

    let branch = cfg.instruction(smplc::ir::InstrId(10));
    assert_eq!(branch.op, Op::Bne);
    assert_eq!(branch.b, Operand::Instr(smplc::ir::InstrId(13)));

    // the then-arm's own closing jump, straight to the join's KILL
    let then_bra = cfg.instruction(smplc::ir::InstrId(14));
    assert_eq!(then_bra.op, Op::Bra);
    assert_eq!(then_bra.a, Operand::Instr(smplc::ir::InstrId(13)));

    let join = block_of_kind(&cfg, BlockKind::Join);
    assert_eq!(join.symtable.get("y"), Some(&Binding::Value(smplc::ir::InstrId(18))));
}

#[test]
fn uninitialized_read_warns_and_substitutes_zero() {
    let src = "main var x, y; { let y <- x + 1 } .";
    let parser = Parser::new(src, 0);
    let (cfg, diagnostics, had_error) = parser.parse();
    assert!(!had_error);
    assert!(diagnostics.has_errors() == false);

    // `x` was never assigned, so it folds as CONST 0 rather than emitting a
    // real read of anything
    let root = &cfg.blocks()[0];
    match root.symtable.get("y") {
        Some(Binding::Value(id)) => {
            assert_eq!(cfg.const_value(*id), Some(1));
        }
        other => panic!("expected y bound to a value, found {other:?}"),
    }
}

#[test]
fn undeclared_identifier_is_a_syntax_error() {
    let (_cfg, had_error) = parse("main { let z <- 1 } .");
    assert!(had_error);
}
