//! Push and flow control operations.

use crate::operation::Operation;

use super::config::{
    LOCKTIME_THRESHOLD, MAX_CHECK_LOCKTIME_VERIFY_NUMBER_SIZE,
    MAX_CHECK_SEQUENCE_VERIFY_NUMBER_SIZE, MAX_INPUT_SEQUENCE, RELATIVE_LOCKTIME_DISABLE_BIT,
    RELATIVE_LOCKTIME_MASK, RELATIVE_LOCKTIME_MIN_VERSION, RELATIVE_LOCKTIME_TIME_LOCKED_BIT,
};
use super::error::{InterpreterError, InterpreterErrorCode};
use super::program::Program;
use super::scriptnum::ScriptNumber;
use super::stack::as_bool;

impl<'a> Program<'a> {
    pub(crate) fn op_push_data(&mut self, op: &Operation) -> Result<(), InterpreterError> {
        if self.rules().minimal_data() && !op.is_minimal_push() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::MinimalData,
                format!(
                    "{} byte push encoded with {} is not minimal",
                    op.data.len(),
                    op.name()
                ),
            ));
        }
        self.push(op.data.clone());
        Ok(())
    }

    pub(crate) fn op_push_number(&mut self, value: i64) -> Result<(), InterpreterError> {
        self.push(ScriptNumber::new(value).to_bytes());
        Ok(())
    }

    /// OP_IF and OP_NOTIF. Inside an unexecuted branch nothing is popped
    /// and the new branch is unexecuted too.
    pub(crate) fn op_if(&mut self, negate: bool) -> Result<(), InterpreterError> {
        let mut value = false;
        if self.succeeded() {
            let top = self.pop()?;
            value = as_bool(&top) != negate;
        }
        self.condition_mut().open(value);
        Ok(())
    }

    pub(crate) fn abstract_verify(
        &mut self,
        op: &Operation,
        code: InterpreterErrorCode,
    ) -> Result<(), InterpreterError> {
        let verified = self.primary_mut().pop_bool()?;
        if !verified {
            return Err(InterpreterError::new(code, format!("{} failed", op.name())));
        }
        Ok(())
    }

    pub(crate) fn op_check_locktime_verify(&mut self) -> Result<(), InterpreterError> {
        let lock_time = self.top_number_sized(MAX_CHECK_LOCKTIME_VERIFY_NUMBER_SIZE)?;
        if lock_time.is_negative() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NegativeLockTime,
                format!("negative lock time: {}", lock_time.to_i64()),
            ));
        }

        let context = self.context();
        let tx_lock_time = i64::from(context.lock_time());
        verify_lock_time(tx_lock_time, LOCKTIME_THRESHOLD, lock_time.to_i64())?;

        if context.input_sequence(self.input_index()) == MAX_INPUT_SEQUENCE {
            return Err(InterpreterError::new(
                InterpreterErrorCode::UnsatisfiedLockTime,
                "transaction input is finalized".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn op_check_sequence_verify(&mut self) -> Result<(), InterpreterError> {
        let stack_sequence = self.top_number_sized(MAX_CHECK_SEQUENCE_VERIFY_NUMBER_SIZE)?;
        if stack_sequence.is_negative() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NegativeLockTime,
                format!("negative sequence: {}", stack_sequence.to_i64()),
            ));
        }

        let sequence = stack_sequence.to_i64();
        if sequence & i64::from(RELATIVE_LOCKTIME_DISABLE_BIT) != 0 {
            return Ok(());
        }

        let context = self.context();
        if context.tx_version() < RELATIVE_LOCKTIME_MIN_VERSION {
            return Err(InterpreterError::new(
                InterpreterErrorCode::UnsatisfiedLockTime,
                format!("invalid transaction version: {}", context.tx_version()),
            ));
        }

        let tx_sequence = i64::from(context.input_sequence(self.input_index()));
        if tx_sequence & i64::from(RELATIVE_LOCKTIME_DISABLE_BIT) != 0 {
            return Err(InterpreterError::new(
                InterpreterErrorCode::UnsatisfiedLockTime,
                format!(
                    "transaction sequence has sequence locktime disabled bit set: 0x{:x}",
                    tx_sequence
                ),
            ));
        }

        let mask = i64::from(RELATIVE_LOCKTIME_TIME_LOCKED_BIT | RELATIVE_LOCKTIME_MASK);
        verify_lock_time(
            tx_sequence & mask,
            i64::from(RELATIVE_LOCKTIME_TIME_LOCKED_BIT),
            sequence & mask,
        )
    }
}

/// Compare a script lock time against the transaction's: both must be of
/// the same kind (height or time) and the script's must not be later.
pub(crate) fn verify_lock_time(
    tx_lock_time: i64,
    threshold: i64,
    lock_time: i64,
) -> Result<(), InterpreterError> {
    if (tx_lock_time < threshold) != (lock_time < threshold) {
        return Err(InterpreterError::new(
            InterpreterErrorCode::UnsatisfiedLockTime,
            format!(
                "mismatched locktime types -- tx locktime {}, stack locktime {}",
                tx_lock_time, lock_time
            ),
        ));
    }
    if lock_time > tx_lock_time {
        return Err(InterpreterError::new(
            InterpreterErrorCode::UnsatisfiedLockTime,
            format!(
                "locktime requirement not satisfied -- locktime is greater than the transaction locktime: {} > {}",
                lock_time, tx_lock_time
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kth_primitives::hash::HashDigest;

    use crate::machine::{result_code, RuleFork, TxContext};
    use crate::Script;

    struct LockTimeTx {
        lock_time: u32,
        version: u32,
        sequence: u32,
    }

    impl TxContext for LockTimeTx {
        fn verify_signature(
            &self,
            _full_sig: &[u8],
            _pub_key: &[u8],
            _sub_script: &Script,
            _input_idx: usize,
            _value: u64,
            _forks: RuleFork,
        ) -> Result<bool, InterpreterError> {
            Ok(false)
        }

        fn verify_data_signature(
            &self,
            _sig: &[u8],
            _pub_key: &[u8],
            _digest: &HashDigest,
        ) -> Result<bool, InterpreterError> {
            Ok(false)
        }

        fn lock_time(&self) -> u32 {
            self.lock_time
        }

        fn tx_version(&self) -> u32 {
            self.version
        }

        fn input_sequence(&self, _input_idx: usize) -> u32 {
            self.sequence
        }
    }

    fn run(asm: &str, tx: &LockTimeTx, forks: RuleFork) -> InterpreterErrorCode {
        let script = Script::from_asm(asm).unwrap();
        let mut program = Program::with_transaction(&script, tx, 0, forks);
        result_code(&program.evaluate())
    }

    #[test]
    fn test_verify_lock_time() {
        assert!(verify_lock_time(100, LOCKTIME_THRESHOLD, 99).is_ok());
        assert!(verify_lock_time(100, LOCKTIME_THRESHOLD, 100).is_ok());
        assert!(verify_lock_time(100, LOCKTIME_THRESHOLD, 101).is_err());
        assert!(verify_lock_time(600_000_000, LOCKTIME_THRESHOLD, 100).is_err());
        assert!(verify_lock_time(100, LOCKTIME_THRESHOLD, 600_000_000).is_err());
    }

    #[test]
    fn test_check_locktime_verify() {
        let tx = LockTimeTx {
            lock_time: 1000,
            version: 1,
            sequence: 0,
        };
        // 0x64 = 100, 0xe803 = 1000, 0xe903 = 1001
        assert_eq!(
            run("64 OP_CHECKLOCKTIMEVERIFY", &tx, RuleFork::BIP65_RULE),
            InterpreterErrorCode::Success
        );
        assert_eq!(
            run("e803 OP_CHECKLOCKTIMEVERIFY", &tx, RuleFork::BIP65_RULE),
            InterpreterErrorCode::Success
        );
        assert_eq!(
            run("e903 OP_CHECKLOCKTIMEVERIFY", &tx, RuleFork::BIP65_RULE),
            InterpreterErrorCode::UnsatisfiedLockTime
        );
        assert_eq!(
            run("OP_1NEGATE OP_CHECKLOCKTIMEVERIFY", &tx, RuleFork::BIP65_RULE),
            InterpreterErrorCode::NegativeLockTime
        );
        assert_eq!(
            run("OP_CHECKLOCKTIMEVERIFY", &tx, RuleFork::BIP65_RULE),
            InterpreterErrorCode::InvalidStackOperation
        );
        assert_eq!(
            run("e903 OP_CHECKLOCKTIMEVERIFY", &tx, RuleFork::NO_RULES),
            InterpreterErrorCode::Success
        );
    }

    #[test]
    fn test_check_locktime_verify_final_input() {
        let tx = LockTimeTx {
            lock_time: 1000,
            version: 1,
            sequence: MAX_INPUT_SEQUENCE,
        };
        assert_eq!(
            run("64 OP_CHECKLOCKTIMEVERIFY", &tx, RuleFork::BIP65_RULE),
            InterpreterErrorCode::UnsatisfiedLockTime
        );
    }

    #[test]
    fn test_check_sequence_verify() {
        let tx = LockTimeTx {
            lock_time: 0,
            version: 2,
            sequence: 10,
        };
        assert_eq!(
            run("OP_10 OP_CHECKSEQUENCEVERIFY", &tx, RuleFork::BIP112_RULE),
            InterpreterErrorCode::Success
        );
        assert_eq!(
            run("OP_11 OP_CHECKSEQUENCEVERIFY", &tx, RuleFork::BIP112_RULE),
            InterpreterErrorCode::UnsatisfiedLockTime
        );

        let old = LockTimeTx { version: 1, ..tx };
        assert_eq!(
            run("OP_10 OP_CHECKSEQUENCEVERIFY", &old, RuleFork::BIP112_RULE),
            InterpreterErrorCode::UnsatisfiedLockTime
        );
    }

    #[test]
    fn test_check_sequence_verify_disable_bit() {
        let tx = LockTimeTx {
            lock_time: 0,
            version: 1,
            sequence: 0,
        };
        // 0x0000008000 = 1 << 31 as a five-byte number.
        assert_eq!(
            run("0000008000 OP_CHECKSEQUENCEVERIFY", &tx, RuleFork::BIP112_RULE),
            InterpreterErrorCode::Success
        );
    }

    #[test]
    fn test_if_pops_only_when_executing() {
        let script = Script::from_asm("OP_0 OP_IF OP_1 OP_IF OP_ENDIF OP_ENDIF").unwrap();
        let mut program = Program::new(&script);
        program.evaluate().unwrap();
        assert!(program.stack().is_empty());
    }
}
