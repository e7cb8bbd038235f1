//! The consensus script machine.
//!
//! A [`Program`] holds the state of one script evaluation; the stateless
//! [`Interpreter`] drives it one operation at a time and classifies every
//! failure with an [`InterpreterErrorCode`]. Which historical rules apply is
//! selected by a [`RuleFork`] mask resolved against a runtime [`Ruleset`].
//!
//! # Architecture
//!
//! The machine does not depend on a transaction type. Callers provide a
//! [`TxContext`] implementation that verifies signatures and exposes the
//! transaction fields needed by lock-time and introspection opcodes.
//!
//! # Example
//!
//! ```ignore
//! use kth_script::machine::{Program, RuleFork};
//! use kth_script::Script;
//!
//! let script = Script::from_asm("OP_2 OP_3 OP_ADD OP_5 OP_EQUAL")?;
//! let mut program = Program::new(&script);
//! program.evaluate()?;
//! assert!(program.stack_true(false));
//! ```

pub mod config;
pub mod error;
pub mod interpreter;
pub mod metrics;
pub mod program;
pub mod rule_fork;
pub mod script_limits;
pub mod scriptnum;
pub mod stack;
pub mod verify;

mod ops_arithmetic;
mod ops_crypto;
mod ops_data;
mod ops_flow;
mod ops_introspection;
mod ops_stack;

pub use config::*;
pub use error::{is_error_code, result_code, InterpreterError, InterpreterErrorCode};
pub use interpreter::Interpreter;
pub use metrics::Metrics;
pub use program::{Program, ScriptVersion};
pub use rule_fork::{ActiveRules, RuleFork};
pub use script_limits::{calculate_hash_iters, hash_iter_op_cost_factor, ScriptLimits};
pub use scriptnum::ScriptNumber;
pub use stack::{ConditionStack, Stack};
pub use verify::verify;

use kth_primitives::hash::HashDigest;

use crate::Script;

/// Transaction context: signature verification and the transaction fields
/// scripts can observe.
///
/// Only the first five methods are required; introspection data defaults to
/// unavailable.
pub trait TxContext {
    /// Verify an endorsement against a public key for the given input.
    ///
    /// `full_sig` includes the sighash flag byte at the end and
    /// `sub_script` is the part of the running script covered by the
    /// signature. Returns Ok(true) if valid, Ok(false) if invalid.
    fn verify_signature(
        &self,
        full_sig: &[u8],
        pub_key: &[u8],
        sub_script: &Script,
        input_idx: usize,
        value: u64,
        forks: RuleFork,
    ) -> Result<bool, InterpreterError>;

    /// Verify a signature over a message digest (OP_CHECKDATASIG).
    fn verify_data_signature(
        &self,
        sig: &[u8],
        pub_key: &[u8],
        digest: &HashDigest,
    ) -> Result<bool, InterpreterError>;

    fn lock_time(&self) -> u32;

    fn tx_version(&self) -> u32;

    fn input_sequence(&self, input_idx: usize) -> u32;

    fn input_count(&self) -> usize {
        0
    }

    fn output_count(&self) -> usize {
        0
    }

    /// Unlocking script of an input.
    fn input_script(&self, _input_idx: usize) -> Option<&Script> {
        None
    }

    /// Previous transaction hash and output index spent by an input.
    fn outpoint(&self, _input_idx: usize) -> Option<(HashDigest, u32)> {
        None
    }

    /// Value and locking script of the output spent by an input.
    fn utxo(&self, _input_idx: usize) -> Option<(u64, &Script)> {
        None
    }

    /// Value and locking script of an output.
    fn output(&self, _output_idx: usize) -> Option<(u64, &Script)> {
        None
    }
}

/// The context of programs that run without a transaction.
///
/// Every signature fails to verify and every field reads as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyTransaction;

pub static EMPTY_TRANSACTION: EmptyTransaction = EmptyTransaction;

impl TxContext for EmptyTransaction {
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
        0
    }

    fn tx_version(&self) -> u32 {
        0
    }

    fn input_sequence(&self, _input_idx: usize) -> u32 {
        0
    }
}
