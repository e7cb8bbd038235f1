use kth_script::machine::{
    hash_iter_op_cost_factor, InterpreterErrorCode, Program, RuleFork, Ruleset,
    EMPTY_TRANSACTION,
};
use kth_script::opcodes::{OP_1, OP_ENDIF, OP_IF, OP_NOP};
use kth_script::Script;

const GALOIS_CHAIN: RuleFork = RuleFork::bch_through(RuleFork::BCH_GALOIS);

fn evaluate(script: &Script, forks: RuleFork) -> Result<(), InterpreterErrorCode> {
    let mut program = Program::with_transaction(script, &EMPTY_TRANSACTION, 0, forks);
    program.evaluate().map_err(|e| e.code)
}

fn asm(s: &str) -> Script {
    Script::from_asm(s).unwrap()
}

#[test]
fn operation_count_limit() {
    let ok = Script::from_bytes(&[OP_NOP; 201]);
    assert_eq!(evaluate(&ok, RuleFork::NO_RULES), Ok(()));

    let over = Script::from_bytes(&[OP_NOP; 202]);
    let mut program = Program::with_transaction(&over, &EMPTY_TRANSACTION, 0, RuleFork::NO_RULES);
    let err = program.evaluate().unwrap_err();
    assert_eq!(err.code, InterpreterErrorCode::InvalidOperationCount);
    assert_eq!(program.operation_count(), 202);
    assert_eq!(program.position(), 202);
}

#[test]
fn pushes_are_not_counted() {
    let mut code = vec![OP_1; 50];
    code.extend([OP_NOP; 201]);
    assert_eq!(evaluate(&Script::from_bytes(&code), RuleFork::NO_RULES), Ok(()));

    code.push(OP_NOP);
    let script = Script::from_bytes(&code);
    let mut program = Program::with_transaction(&script, &EMPTY_TRANSACTION, 0, RuleFork::NO_RULES);
    let err = program.evaluate().unwrap_err();
    assert_eq!(err.code, InterpreterErrorCode::InvalidOperationCount);
    assert_eq!(program.operation_count(), 202);
    assert_eq!(program.position(), 252);
}

#[test]
fn conditional_depth_boundary() {
    let nested = |depth: usize| {
        let mut code = [OP_1, OP_IF].repeat(depth);
        code.extend(vec![OP_ENDIF; depth]);
        Script::from_bytes(&code)
    };
    assert_eq!(evaluate(&nested(100), GALOIS_CHAIN), Ok(()));
    assert_eq!(
        evaluate(&nested(101), GALOIS_CHAIN),
        Err(InterpreterErrorCode::ConditionalStackDepth)
    );
}

#[test]
fn push_size_limit_before_vm_limits() {
    let ok = asm(&"ab".repeat(520));
    assert_eq!(evaluate(&ok, RuleFork::NO_RULES), Ok(()));

    let over = asm(&"ab".repeat(521));
    assert_eq!(
        evaluate(&over, RuleFork::NO_RULES),
        Err(InterpreterErrorCode::InvalidPushDataSize)
    );
    assert_eq!(evaluate(&over, RuleFork::BCH_GALOIS), Ok(()));
}

#[test]
fn element_size_limit_under_vm_limits() {
    let forks = GALOIS_CHAIN;
    // 0x2710 = 10000, 0x2711 = 10001.
    assert_eq!(evaluate(&asm("OP_0 1027 OP_NUM2BIN"), forks), Ok(()));
    assert_eq!(
        evaluate(&asm("OP_0 1127 OP_NUM2BIN"), forks),
        Err(InterpreterErrorCode::InvalidPushDataSize)
    );
}

#[test]
fn hash_iteration_budget() {
    // 520-byte element hashed with HASH256: 2 + ceil((520 + 8) / 64) = 11
    // iterations per hash against a budget of (100 + 41) / 2 = 70.
    let mut asm_text = "ab".repeat(520);
    for _ in 0..8 {
        asm_text.push_str(" OP_DUP OP_HASH256 OP_DROP");
    }
    let script = asm(&asm_text);
    let forks = GALOIS_CHAIN | RuleFork::VM_LIMITS_STANDARD;
    let mut program = Program::with_transaction(&script, &EMPTY_TRANSACTION, 0, forks);
    program.initialize_script_limits(100);

    let err = program.evaluate().unwrap_err();
    assert_eq!(err.code, InterpreterErrorCode::TooManyHashIters);
    assert_eq!(program.metrics().hash_digest_iterations(), 77);
    // Six hashes fit (66); the seventh HASH256 (operation 20) crosses.
    assert_eq!(program.position(), 21);
}

#[test]
fn limits_fail_open_without_budgets() {
    let mut asm_text = "ab".repeat(520);
    for _ in 0..8 {
        asm_text.push_str(" OP_DUP OP_HASH256 OP_DROP");
    }
    let script = asm(&asm_text);
    let mut program =
        Program::with_transaction(&script, &EMPTY_TRANSACTION, 0, RuleFork::BCH_GALOIS);
    program.evaluate().unwrap();
    assert_eq!(program.metrics().hash_digest_iterations(), 88);
    assert!(!program.metrics().is_over_hash_iters_limit());
    assert!(!program.metrics().is_over_op_cost_limit(false));
}

#[test]
fn no_accounting_before_vm_limits() {
    let script = asm("OP_1 OP_DUP OP_HASH256 OP_DROP");
    let mut program =
        Program::with_transaction(&script, &EMPTY_TRANSACTION, 0, RuleFork::BCH_GAUSS);
    program.initialize_script_limits(100);
    program.evaluate().unwrap();
    assert!(!program.metrics().has_valid_script_limits());
    assert_eq!(program.metrics().op_cost(), 0);
    assert_eq!(program.metrics().hash_digest_iterations(), 0);
}

#[test]
fn hash_iteration_cost_factors() {
    assert_eq!(hash_iter_op_cost_factor(true), 192);
    assert_eq!(hash_iter_op_cost_factor(false), 64);
}

fn four_hundred_pushes() -> Script {
    Script::from_bytes(&[OP_1; 400])
}

#[test]
fn op_cost_limit_is_inert_by_default() {
    // 400 pushes cost 101 each: 40400 against a budget of 41 * 800 = 32800.
    let script = four_hundred_pushes();
    let mut program = Program::with_transaction(&script, &EMPTY_TRANSACTION, 0, GALOIS_CHAIN);
    program.initialize_script_limits(0);
    program.evaluate().unwrap();
    assert_eq!(program.metrics().op_cost(), 40_400);
    assert!(program.metrics().is_over_op_cost_limit(false));
}

#[test]
fn op_cost_limit_when_enforced() {
    let script = four_hundred_pushes();
    let mut program = Program::with_transaction(&script, &EMPTY_TRANSACTION, 0, GALOIS_CHAIN)
        .with_ruleset(Ruleset::bch().with_op_cost_limit(true));
    program.initialize_script_limits(0);
    let err = program.evaluate().unwrap_err();
    assert_eq!(err.code, InterpreterErrorCode::OpCostLimit);
    // 324 * 101 = 32724 fits; the 325th push crosses.
    assert_eq!(program.position(), 325);
    assert_eq!(program.metrics().op_cost(), 32_825);
}

#[test]
fn galois_alone_leaves_earlier_upgrades_off() {
    let mul = asm("OP_2 OP_3 OP_MUL OP_6 OP_EQUAL");
    assert_eq!(
        evaluate(&mul, RuleFork::BCH_GALOIS),
        Err(InterpreterErrorCode::OpDisabled)
    );
    assert_eq!(evaluate(&mul, GALOIS_CHAIN), Ok(()));
}
