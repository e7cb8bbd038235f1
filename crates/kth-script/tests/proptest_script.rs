use proptest::prelude::*;

use kth_script::machine::{
    calculate_hash_iters, InterpreterErrorCode, Program, RuleFork, ScriptNumber, EMPTY_TRANSACTION,
};
use kth_script::opcodes::*;
use kth_script::Script;

/// Opcodes that never touch signatures or the transaction.
fn arbitrary_opcode() -> impl Strategy<Value = u8> {
    prop::sample::select(vec![
        OP_0, OP_1, OP_2, OP_3, OP_16, OP_1NEGATE, OP_NOP, OP_IF, OP_NOTIF, OP_ELSE, OP_ENDIF,
        OP_VERIFY, OP_DUP, OP_DROP, OP_SWAP, OP_OVER, OP_ROT, OP_PICK, OP_ROLL, OP_TOALTSTACK,
        OP_FROMALTSTACK, OP_DEPTH, OP_SIZE, OP_EQUAL, OP_ADD, OP_SUB, OP_NOT, OP_1ADD,
        OP_SHA256, OP_HASH160, OP_CAT, OP_SPLIT,
    ])
}

fn run(bytes: &[u8], forks: RuleFork) -> (Result<(), InterpreterErrorCode>, Vec<Vec<u8>>, u64) {
    let script = Script::from_bytes(bytes);
    let mut program = Program::with_transaction(&script, &EMPTY_TRANSACTION, 0, forks);
    let result = program.evaluate().map_err(|e| e.code);
    let iterations = program.metrics().hash_digest_iterations();
    (result, program.into_stack().into_items(), iterations)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn evaluation_is_deterministic(code in prop::collection::vec(arbitrary_opcode(), 0..64)) {
        let forks = RuleFork::BCH_MONOLITH | RuleFork::BCH_GALOIS;
        prop_assert_eq!(run(&code, forks), run(&code, forks));
    }

    #[test]
    fn stack_stays_within_limit(code in prop::collection::vec(arbitrary_opcode(), 0..200)) {
        let (result, stack, _) = run(&code, RuleFork::BCH_MONOLITH);
        if result.is_ok() {
            prop_assert!(stack.len() <= kth_script::machine::MAX_STACK_SIZE);
        }
    }

    #[test]
    fn unbalanced_conditionals_fail(depth in 1usize..20, executed in any::<bool>()) {
        let mut code = vec![if executed { OP_1 } else { OP_0 }, OP_IF];
        code.extend(std::iter::repeat(OP_1).take(depth));
        let (result, _, _) = run(&code, RuleFork::NO_RULES);
        prop_assert_eq!(result, Err(InterpreterErrorCode::InvalidStackScope));
    }

    #[test]
    fn hash_iterations_follow_block_count(len in 0u64..20_000, two_round in any::<bool>()) {
        let iterations = calculate_hash_iters(len, two_round);
        prop_assert_eq!(iterations, u64::from(two_round) + 1 + (len + 8 + 63) / 64);
        prop_assert!(iterations >= 2);
    }

    #[test]
    fn single_hash_counts_message_blocks(data in prop::collection::vec(any::<u8>(), 1..520)) {
        let mut script = Script::new();
        script.append_push_data(&data).unwrap();
        script.append_opcodes(&[OP_SHA256]).unwrap();
        let (result, _, iterations) = run(script.to_bytes(), RuleFork::BCH_GALOIS);
        prop_assert_eq!(result, Ok(()));
        prop_assert_eq!(iterations, calculate_hash_iters(data.len() as u64, false));
    }

    #[test]
    fn script_number_encoding_is_minimal(val in any::<i64>()) {
        let bytes = ScriptNumber::new(val).to_bytes();
        let parsed = ScriptNumber::from_bytes(&bytes, 9, true).unwrap();
        prop_assert_eq!(parsed.to_i64(), val);
    }
}
