//! Result codes produced by the script machine.

use std::fmt;

/// Classification of every way an evaluation can end.
///
/// The driver loop produces the structural and resource-limit codes; the
/// opcode handlers produce the rest. All share one code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterpreterErrorCode {
    Success,

    // Driver loop.
    InvalidScript,
    InvalidPushDataSize,
    OpDisabled,
    InvalidOperationCount,
    InvalidStackSize,
    TooManyHashIters,
    OpCostLimit,
    ConditionalStackDepth,
    InvalidStackScope,

    // Flow control.
    OpReserved,
    BadOpcode,
    Verify,
    OpReturn,
    InvalidStackOperation,

    // Numbers.
    NumberTooBig,
    NumberTooSmall,
    NumberOverflow,
    MinimalData,
    DivideByZero,
    InvalidSplitRange,
    InvalidOperandSize,
    ImpossibleEncoding,

    // Verify variants.
    EqualVerify,
    NumEqualVerify,
    CheckSigVerify,
    CheckMultiSigVerify,
    CheckDataSigVerify,

    // Signatures and keys.
    InvalidPubKeyCount,
    InvalidSignatureCount,
    SigNullDummy,
    NullFail,
    InvalidSigHashType,
    IllegalForkId,
    SigTooShort,
    SigTooLong,
    SigInvalidSeqId,
    SigInvalidDataLen,
    SigMissingSTypeId,
    SigMissingSLen,
    SigInvalidSLen,
    SigInvalidRIntId,
    SigZeroRLen,
    SigNegativeR,
    SigTooMuchRPadding,
    SigInvalidSIntId,
    SigZeroSLen,
    SigNegativeS,
    SigTooMuchSPadding,
    SigHighS,
    SigBadLength,
    PubKeyType,

    // Lock times.
    NegativeLockTime,
    UnsatisfiedLockTime,

    // Introspection.
    ContextUnavailable,
    InvalidTxInputIndex,
    InvalidTxOutputIndex,

    // Input verification.
    EvalFalse,
    EmptyStack,
    CleanStack,
    NotPushOnly,
    ScriptTooBig,
    InvalidScriptEmbed,
}

impl fmt::Display for InterpreterErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A script machine error with an error code and description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{description}")]
pub struct InterpreterError {
    pub code: InterpreterErrorCode,
    pub description: String,
}

impl InterpreterError {
    pub fn new(code: InterpreterErrorCode, description: String) -> Self {
        InterpreterError { code, description }
    }
}

/// Check if an error has a specific error code.
pub fn is_error_code(err: &InterpreterError, code: InterpreterErrorCode) -> bool {
    err.code == code
}

/// Collapse an evaluation result into its code.
pub fn result_code<T>(result: &Result<T, InterpreterError>) -> InterpreterErrorCode {
    match result {
        Ok(_) => InterpreterErrorCode::Success,
        Err(e) => e.code,
    }
}
