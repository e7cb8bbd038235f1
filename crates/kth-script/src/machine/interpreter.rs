//! The interpreter driver: the per-operation checks and opcode dispatch.

use tracing::trace;

use crate::opcodes::*;
use crate::operation::Operation;

use super::config::{MAX_CONDITIONAL_STACK_DEPTH, OPCODE_COST};
use super::error::{InterpreterError, InterpreterErrorCode};
use super::ops_crypto::HashType;
use super::program::Program;

/// Stateless driver over a [`Program`].
pub struct Interpreter;

impl Interpreter {
    /// Run every operation of the program's script.
    ///
    /// Stops at the first failing operation. Succeeds only when the script
    /// ends with every IF closed.
    pub fn run(program: &mut Program<'_>) -> Result<(), InterpreterError> {
        if !program.is_valid() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidScript,
                "script is undecodable or larger than the max script size".to_string(),
            ));
        }

        while let Some(op) = program.next_operation() {
            if let Err(e) = Self::step(op, program) {
                trace!(
                    code = %e.code,
                    opcode = op.name(),
                    position = program.position() - 1,
                    "script evaluation failed: {}",
                    e
                );
                return Err(e);
            }
        }

        if !program.closed() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidStackScope,
                "end of script reached in conditional execution".to_string(),
            ));
        }
        Ok(())
    }

    /// Execute one operation without the driver's limit checks.
    pub fn run_operation(op: &Operation, program: &mut Program<'_>) -> Result<(), InterpreterError> {
        Self::run_op(op, program)
    }

    fn step(op: &Operation, program: &mut Program<'_>) -> Result<(), InterpreterError> {
        let max_element_size = program.max_script_element_size();
        if op.is_oversized(max_element_size) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidPushDataSize,
                format!(
                    "element size {} exceeds max allowed size {}",
                    op.data.len(),
                    max_element_size
                ),
            ));
        }

        if op.is_disabled(program.rules()) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::OpDisabled,
                format!("attempt to execute disabled opcode {}", op.name()),
            ));
        }

        if !program.increment_operation_count(op) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidOperationCount,
                format!("exceeded max operation limit of {}", super::MAX_COUNTED_OPS),
            ));
        }

        let vm_limits = program.is_chip_vm_limits_enabled();
        if vm_limits {
            program.metrics_mut().add_op_cost(OPCODE_COST);
        }

        if !program.if_(op) {
            return Ok(());
        }

        Self::run_op(op, program)?;

        if program.is_stack_overflow() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidStackSize,
                format!(
                    "combined stack size {} > max allowed {}",
                    program.stack().len() + program.alternate().len(),
                    super::MAX_STACK_SIZE
                ),
            ));
        }

        if vm_limits {
            Self::check_vm_limits(program)?;
        }
        Ok(())
    }

    fn check_vm_limits(program: &Program<'_>) -> Result<(), InterpreterError> {
        let metrics = program.metrics();
        if metrics.is_over_hash_iters_limit() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::TooManyHashIters,
                format!(
                    "{} hash digest iterations exceed the input budget",
                    metrics.hash_digest_iterations()
                ),
            ));
        }

        let rules = program.rules();
        if rules.enforce_op_cost_limit && metrics.is_over_op_cost_limit(rules.vm_limits_standard) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::OpCostLimit,
                format!(
                    "op cost {} exceeds the input budget",
                    metrics.composite_op_cost(rules.vm_limits_standard)
                ),
            ));
        }

        if program.conditional_stack_size() > MAX_CONDITIONAL_STACK_DEPTH {
            return Err(InterpreterError::new(
                InterpreterErrorCode::ConditionalStackDepth,
                format!(
                    "conditional nesting exceeds the max depth of {}",
                    MAX_CONDITIONAL_STACK_DEPTH
                ),
            ));
        }
        Ok(())
    }

    fn run_op(op: &Operation, program: &mut Program<'_>) -> Result<(), InterpreterError> {
        let rules = *program.rules();
        match op.code {
            // Push value
            OP_0 => {
                program.push(Vec::new());
                Ok(())
            }
            OP_DATA_1..=OP_PUSHDATA4 => program.op_push_data(op),
            OP_1NEGATE => program.op_push_number(-1),
            OP_1..=OP_16 => program.op_push_number(i64::from(op.code - OP_1) + 1),

            // Flow control
            OP_NOP | OP_NOP1 | OP_NOP4..=OP_NOP10 => Ok(()),
            OP_RESERVED | OP_VER | OP_RESERVED1 | OP_RESERVED2 => op_reserved(op),
            OP_IF => program.op_if(false),
            OP_NOTIF => program.op_if(true),
            OP_ELSE => program.condition_mut().negate(),
            OP_ENDIF => program.condition_mut().close(),
            OP_VERIFY => program.abstract_verify(op, InterpreterErrorCode::Verify),
            OP_RETURN => Err(InterpreterError::new(
                InterpreterErrorCode::OpReturn,
                "script returned early".to_string(),
            )),
            OP_CHECKLOCKTIMEVERIFY if rules.bip65 => program.op_check_locktime_verify(),
            OP_CHECKSEQUENCEVERIFY if rules.bip112 => program.op_check_sequence_verify(),
            OP_NOP2 | OP_NOP3 => Ok(()),

            // Stack
            OP_TOALTSTACK => program.op_to_alt_stack(),
            OP_FROMALTSTACK => program.op_from_alt_stack(),
            OP_2DROP => program.primary_mut().drop_n(2),
            OP_2DUP => program.op_copy(2, |s| s.dup_n(2)),
            OP_3DUP => program.op_copy(3, |s| s.dup_n(3)),
            OP_2OVER => program.op_copy(2, |s| s.over_n(2)),
            OP_2ROT => program.primary_mut().rot_n(2),
            OP_2SWAP => program.primary_mut().swap_n(2),
            OP_IFDUP => program.op_ifdup(),
            OP_DEPTH => program.op_depth(),
            OP_DROP => program.primary_mut().drop_n(1),
            OP_DUP => program.op_copy(1, |s| s.dup_n(1)),
            OP_NIP => program.primary_mut().nip(1).map(drop),
            OP_OVER => program.op_copy(1, |s| s.over_n(1)),
            OP_PICK => program.op_pick(),
            OP_ROLL => program.op_roll(),
            OP_ROT => program.primary_mut().rot_n(1),
            OP_SWAP => program.primary_mut().swap_n(1),
            OP_TUCK => program.op_copy(1, |s| s.tuck()),

            // Splice and bitwise logic
            OP_CAT => program.op_cat(),
            OP_SPLIT => program.op_split(),
            OP_NUM2BIN => program.op_num2bin(),
            OP_BIN2NUM => program.op_bin2num(),
            OP_SIZE => program.op_size(),
            OP_AND => program.op_bitwise(|a, b| a & b),
            OP_OR => program.op_bitwise(|a, b| a | b),
            OP_XOR => program.op_bitwise(|a, b| a ^ b),
            OP_EQUAL => program.op_equal(),
            OP_EQUALVERIFY => {
                program.op_equal()?;
                program.abstract_verify(op, InterpreterErrorCode::EqualVerify)
            }
            OP_REVERSEBYTES if rules.phonon => program.op_reverse_bytes(),
            OP_VERIF | OP_VERNOTIF | OP_INVERT | OP_2MUL | OP_2DIV | OP_LSHIFT | OP_RSHIFT => {
                op_disabled(op)
            }

            // Arithmetic
            OP_1ADD => program.op_unary_int(|m| {
                m.incr();
            }),
            OP_1SUB => program.op_unary_int(|m| {
                m.decr();
            }),
            OP_NEGATE => program.op_unary_int(|m| {
                m.neg();
            }),
            OP_ABS => program.op_unary_int(|m| {
                m.abs();
            }),
            OP_NOT => program.op_unary_int(|m| {
                let v = i64::from(m.is_zero());
                m.set(v);
            }),
            OP_0NOTEQUAL => program.op_unary_int(|m| {
                let v = i64::from(!m.is_zero());
                m.set(v);
            }),
            OP_ADD => program.op_add(),
            OP_SUB => program.op_sub(),
            OP_MUL => program.op_mul(),
            OP_DIV => program.op_div(),
            OP_MOD => program.op_mod(),
            OP_BOOLAND => program.op_bool_binop(|a, b| !a.is_zero() && !b.is_zero()),
            OP_BOOLOR => program.op_bool_binop(|a, b| !a.is_zero() || !b.is_zero()),
            OP_NUMEQUAL => program.op_bool_binop(|a, b| a.equal(b)),
            OP_NUMEQUALVERIFY => {
                program.op_bool_binop(|a, b| a.equal(b))?;
                program.abstract_verify(op, InterpreterErrorCode::NumEqualVerify)
            }
            OP_NUMNOTEQUAL => program.op_bool_binop(|a, b| !a.equal(b)),
            OP_LESSTHAN => program.op_bool_binop(|a, b| a.less_than(b)),
            OP_GREATERTHAN => program.op_bool_binop(|a, b| a.greater_than(b)),
            OP_LESSTHANOREQUAL => program.op_bool_binop(|a, b| a.less_than_or_equal(b)),
            OP_GREATERTHANOREQUAL => program.op_bool_binop(|a, b| a.greater_than_or_equal(b)),
            OP_MIN => program.op_min_max(true),
            OP_MAX => program.op_min_max(false),
            OP_WITHIN => program.op_within(),

            // Crypto
            OP_RIPEMD160 => program.op_hash(HashType::Ripemd160),
            OP_SHA1 => program.op_hash(HashType::Sha1),
            OP_SHA256 => program.op_hash(HashType::Sha256),
            OP_HASH160 => program.op_hash(HashType::Hash160),
            OP_HASH256 => program.op_hash(HashType::Hash256),
            OP_CODESEPARATOR => {
                program.set_jump_register();
                Ok(())
            }
            OP_CHECKSIG => program.op_checksig(),
            OP_CHECKSIGVERIFY => {
                program.op_checksig()?;
                program.abstract_verify(op, InterpreterErrorCode::CheckSigVerify)
            }
            OP_CHECKMULTISIG => program.op_checkmultisig(),
            OP_CHECKMULTISIGVERIFY => {
                program.op_checkmultisig()?;
                program.abstract_verify(op, InterpreterErrorCode::CheckMultiSigVerify)
            }
            OP_CHECKDATASIG if rules.magnetic_anomaly => program.op_check_data_sig(),
            OP_CHECKDATASIGVERIFY if rules.magnetic_anomaly => {
                program.op_check_data_sig()?;
                program.abstract_verify(op, InterpreterErrorCode::CheckDataSigVerify)
            }

            // Native introspection
            OP_INPUTINDEX..=OP_OUTPUTBYTECODE if rules.gauss => program.op_introspection(op.code),

            _ => Err(InterpreterError::new(
                InterpreterErrorCode::BadOpcode,
                format!("attempt to execute invalid opcode {}", op.name()),
            )),
        }
    }
}

fn op_reserved(op: &Operation) -> Result<(), InterpreterError> {
    Err(InterpreterError::new(
        InterpreterErrorCode::OpReserved,
        format!("attempt to execute reserved opcode {}", op.name()),
    ))
}

fn op_disabled(op: &Operation) -> Result<(), InterpreterError> {
    Err(InterpreterError::new(
        InterpreterErrorCode::OpDisabled,
        format!("attempt to execute disabled opcode {}", op.name()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{result_code, RuleFork, EMPTY_TRANSACTION};
    use crate::Script;

    fn run_with(asm: &str, forks: RuleFork) -> Result<Vec<Vec<u8>>, InterpreterError> {
        let script = Script::from_asm(asm).unwrap();
        let mut program = Program::with_transaction(&script, &EMPTY_TRANSACTION, 0, forks);
        program.evaluate()?;
        Ok(program.into_stack().into_items())
    }

    fn code_of(asm: &str, forks: RuleFork) -> InterpreterErrorCode {
        result_code(&run_with(asm, forks))
    }

    #[test]
    fn test_arithmetic_script() {
        let stack = run_with("OP_2 OP_3 OP_ADD OP_5 OP_EQUAL", RuleFork::NO_RULES).unwrap();
        assert_eq!(stack, vec![vec![1]]);
    }

    #[test]
    fn test_empty_script_succeeds() {
        assert_eq!(code_of("", RuleFork::NO_RULES), InterpreterErrorCode::Success);
    }

    #[test]
    fn test_invalid_script() {
        let script = Script::from_bytes(&[OP_PUSHDATA1, 0x05, 0x01]);
        let mut program = Program::new(&script);
        assert_eq!(
            program.evaluate().unwrap_err().code,
            InterpreterErrorCode::InvalidScript
        );
    }

    #[test]
    fn test_unbalanced_conditionals() {
        assert_eq!(
            code_of("OP_1 OP_IF", RuleFork::NO_RULES),
            InterpreterErrorCode::InvalidStackScope
        );
        assert_eq!(
            code_of("OP_ENDIF", RuleFork::NO_RULES),
            InterpreterErrorCode::InvalidStackScope
        );
        assert_eq!(
            code_of("OP_ELSE", RuleFork::NO_RULES),
            InterpreterErrorCode::InvalidStackScope
        );
    }

    #[test]
    fn test_branches() {
        let stack = run_with("OP_0 OP_IF OP_2 OP_ELSE OP_3 OP_ENDIF", RuleFork::NO_RULES).unwrap();
        assert_eq!(stack, vec![vec![3]]);
        let stack = run_with("OP_0 OP_NOTIF OP_2 OP_ELSE OP_3 OP_ENDIF", RuleFork::NO_RULES).unwrap();
        assert_eq!(stack, vec![vec![2]]);
    }

    #[test]
    fn test_unexecuted_branch_skips_bad_opcodes() {
        assert_eq!(
            code_of("OP_0 OP_IF OP_RETURN OP_RESERVED OP_ENDIF OP_1", RuleFork::NO_RULES),
            InterpreterErrorCode::Success
        );
    }

    #[test]
    fn test_disabled_opcode_fails_in_unexecuted_branch() {
        assert_eq!(
            code_of("OP_0 OP_IF OP_2MUL OP_ENDIF OP_1", RuleFork::NO_RULES),
            InterpreterErrorCode::OpDisabled
        );
        assert_eq!(
            code_of("OP_0 OP_IF OP_VERIF OP_ENDIF OP_1", RuleFork::NO_RULES),
            InterpreterErrorCode::OpDisabled
        );
    }

    #[test]
    fn test_reserved_and_return() {
        assert_eq!(
            code_of("OP_RESERVED", RuleFork::NO_RULES),
            InterpreterErrorCode::OpReserved
        );
        assert_eq!(
            code_of("OP_1 OP_RETURN", RuleFork::NO_RULES),
            InterpreterErrorCode::OpReturn
        );
    }

    #[test]
    fn test_verify() {
        assert_eq!(
            code_of("OP_1 OP_VERIFY OP_1", RuleFork::NO_RULES),
            InterpreterErrorCode::Success
        );
        assert_eq!(
            code_of("OP_0 OP_VERIFY", RuleFork::NO_RULES),
            InterpreterErrorCode::Verify
        );
        assert_eq!(
            code_of("OP_1 OP_2 OP_EQUALVERIFY", RuleFork::NO_RULES),
            InterpreterErrorCode::EqualVerify
        );
    }

    #[test]
    fn test_fork_gated_opcodes() {
        assert_eq!(
            code_of("OP_1 OP_REVERSEBYTES", RuleFork::NO_RULES),
            InterpreterErrorCode::BadOpcode
        );
        assert_eq!(
            code_of("OP_1 OP_REVERSEBYTES", RuleFork::BCH_PHONON),
            InterpreterErrorCode::Success
        );
        assert_eq!(
            code_of("OP_INPUTINDEX", RuleFork::NO_RULES),
            InterpreterErrorCode::BadOpcode
        );
        assert_eq!(
            code_of("OP_1 OP_1 OP_CAT", RuleFork::NO_RULES),
            InterpreterErrorCode::OpDisabled
        );
        assert_eq!(
            code_of("OP_1 OP_1 OP_CAT", RuleFork::BCH_MONOLITH),
            InterpreterErrorCode::Success
        );
    }

    #[test]
    fn test_nop2_is_nop_before_bip65() {
        assert_eq!(
            code_of("OP_1 OP_NOP2", RuleFork::NO_RULES),
            InterpreterErrorCode::Success
        );
    }

    #[test]
    fn test_minimal_push_under_graviton() {
        let script = Script::from_bytes(&[OP_PUSHDATA1, 0x01, 0x07]);
        let mut legacy = Program::new(&script);
        assert!(legacy.evaluate().is_ok());

        let mut graviton =
            Program::with_transaction(&script, &EMPTY_TRANSACTION, 0, RuleFork::BCH_GRAVITON);
        assert_eq!(
            graviton.evaluate().unwrap_err().code,
            InterpreterErrorCode::MinimalData
        );
    }

    #[test]
    fn test_op_cost_charged_for_skipped_operations() {
        let script = Script::from_asm("OP_0 OP_IF OP_NOP OP_NOP OP_ENDIF").unwrap();
        let mut program =
            Program::with_transaction(&script, &EMPTY_TRANSACTION, 0, RuleFork::BCH_GALOIS);
        program.evaluate().unwrap();
        assert_eq!(program.metrics().op_cost(), 5 * OPCODE_COST);
    }

    #[test]
    fn test_stack_overflow() {
        let mut asm = String::new();
        for _ in 0..1001 {
            asm.push_str("OP_1 ");
        }
        assert_eq!(
            code_of(&asm, RuleFork::NO_RULES),
            InterpreterErrorCode::InvalidStackSize
        );
    }

    #[test]
    fn test_conditional_depth_under_vm_limits() {
        let mut asm = String::new();
        for _ in 0..101 {
            asm.push_str("OP_1 OP_IF ");
        }
        assert_eq!(
            code_of(&asm, RuleFork::BCH_GALOIS),
            InterpreterErrorCode::ConditionalStackDepth
        );
        assert_eq!(
            code_of(&asm, RuleFork::NO_RULES),
            InterpreterErrorCode::InvalidStackScope
        );
    }

    #[test]
    fn test_run_operation_skips_driver_checks() {
        let script = Script::new();
        let mut program = Program::new(&script);
        program
            .evaluate_operation(&Operation::from_opcode(OP_7))
            .unwrap();
        assert_eq!(program.stack().items(), &[vec![7]]);
        assert_eq!(program.operation_count(), 0);
    }
}
