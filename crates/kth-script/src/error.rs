/// Error types for script operations.
///
/// Covers script construction, ASM parsing, encoding/decoding failures and
/// rule set configuration problems. Evaluation failures are reported through
/// [`crate::machine::InterpreterError`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Invalid opcode data encountered during ASM parsing.
    #[error("invalid opcode data")]
    InvalidOpcodeData,

    /// Attempted to append a push data opcode without its payload.
    #[error("use append_push_data for push data funcs: {0}")]
    InvalidOpcodeType(String),

    /// Push payload length does not match the push opcode.
    #[error("push data of {len} bytes cannot be encoded with {opcode}")]
    InvalidPushEncoding { opcode: String, len: usize },

    /// Push data exceeds what a PUSHDATA4 can carry.
    #[error("data too big")]
    DataTooBig,

    /// Invalid hex string.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Rule set configuration could not be parsed.
    #[error("invalid ruleset: {0}")]
    Config(#[from] serde_json::Error),
}
