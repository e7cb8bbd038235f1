//! Bitcoin Script type - a sequence of opcodes and data pushes.
//!
//! A `Script` keeps its raw bytes together with the operations decoded from
//! them. Decoding happens once at construction; a script whose final push
//! is truncated is kept but marked invalid, and the machine refuses to run it.

use std::fmt;

use crate::opcodes::*;
use crate::operation::{decode_operations, Operation};
use crate::ScriptError;

/// A decoded script.
#[derive(Clone, PartialEq, Eq)]
pub struct Script {
    bytes: Vec<u8>,
    operations: Vec<Operation>,
    valid: bool,
}

impl Script {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Create a new empty script.
    pub fn new() -> Self {
        Script {
            bytes: Vec::new(),
            operations: Vec::new(),
            valid: true,
        }
    }

    /// Create a script from raw bytes, decoding its operations.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let (operations, valid) = decode_operations(bytes);
        Script {
            bytes: bytes.to_vec(),
            operations,
            valid,
        }
    }

    /// Create a script from a hex-encoded string.
    ///
    /// # Arguments
    /// * `hex_str` - A hex string (e.g. "76a914...88ac").
    ///
    /// # Returns
    /// The decoded `Script`, or an error if the hex is invalid.
    pub fn from_hex(hex_str: &str) -> Result<Self, ScriptError> {
        let bytes = hex::decode(hex_str).map_err(|e| ScriptError::InvalidHex(e.to_string()))?;
        Ok(Script::from_bytes(&bytes))
    }

    /// Create a script from a sequence of operations.
    pub fn from_operations(operations: Vec<Operation>) -> Self {
        let bytes = operations.iter().flat_map(|op| op.to_bytes()).collect();
        Script {
            bytes,
            operations,
            valid: true,
        }
    }

    /// Create a script from an ASM string.
    ///
    /// Parses space-separated tokens where known opcodes (e.g. "OP_DUP") are
    /// emitted directly and hex strings are treated as minimal data pushes.
    ///
    /// # Returns
    /// A `Script`, or an error if any token is invalid.
    pub fn from_asm(asm: &str) -> Result<Self, ScriptError> {
        let mut script = Script::new();
        for section in asm.split_whitespace() {
            if let Some(opcode) = string_to_opcode(section) {
                script.append_opcodes(&[opcode])?;
            } else {
                script.append_push_data_hex(section)?;
            }
        }
        Ok(script)
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Encode the script as a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Convert the script to its ASM representation.
    ///
    /// Returns an empty string for scripts that failed to decode.
    pub fn to_asm(&self) -> String {
        if !self.valid {
            return String::new();
        }
        self.operations
            .iter()
            .map(Operation::to_asm_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Return a reference to the underlying bytes.
    pub fn to_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Return the length of the script in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the script is empty (zero bytes).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Return the decoded operations.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Return true if every byte decoded into an operation.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    // -----------------------------------------------------------------------
    // Script classification
    // -----------------------------------------------------------------------

    /// Return true if the script contains only push operations.
    pub fn is_push_only(&self) -> bool {
        self.valid && self.operations.iter().all(Operation::is_push)
    }

    /// Check if this is a Pay-to-Script-Hash (P2SH) output script.
    ///
    /// Pattern: OP_HASH160 <20 bytes> OP_EQUAL
    pub fn is_pay_to_script_hash(&self) -> bool {
        let b = &self.bytes;
        b.len() == 23 && b[0] == OP_HASH160 && b[1] == OP_DATA_20 && b[22] == OP_EQUAL
    }

    /// Return true if no input can ever satisfy this script.
    pub fn is_unspendable(&self) -> bool {
        self.bytes.first() == Some(&OP_RETURN) || self.bytes.len() > crate::machine::MAX_SCRIPT_SIZE
    }

    /// Return a copy of the script without canonical pushes of `data` and
    /// without OP_CODESEPARATOR (legacy signature-hash subscript).
    pub fn without_pushes_of(&self, data: &[u8]) -> Script {
        let operations = self
            .operations
            .iter()
            .filter(|op| op.code != OP_CODESEPARATOR)
            .filter(|op| data.is_empty() || !(op.is_canonical_push() && op.data == data))
            .cloned()
            .collect();
        Script::from_operations(operations)
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    /// Append data bytes to the script as a minimal push.
    ///
    /// # Returns
    /// `Ok(())` on success, or an error if the data is too large.
    pub fn append_push_data(&mut self, data: &[u8]) -> Result<(), ScriptError> {
        if data.len() > u32::MAX as usize {
            return Err(ScriptError::DataTooBig);
        }
        self.append_operation(Operation::push(data.to_vec()));
        Ok(())
    }

    /// Append hex-encoded data to the script as a minimal push.
    pub fn append_push_data_hex(&mut self, hex_str: &str) -> Result<(), ScriptError> {
        let data = hex::decode(hex_str).map_err(|_| ScriptError::InvalidOpcodeData)?;
        self.append_push_data(&data)
    }

    /// Append raw opcodes to the script.
    ///
    /// Rejects push data opcodes (OP_DATA_1..OP_PUSHDATA4); use
    /// `append_push_data` for those.
    pub fn append_opcodes(&mut self, opcodes: &[u8]) -> Result<(), ScriptError> {
        for &op in opcodes {
            if (OP_DATA_1..=OP_PUSHDATA4).contains(&op) {
                return Err(ScriptError::InvalidOpcodeType(
                    opcode_to_string(op).to_string(),
                ));
            }
        }
        for &op in opcodes {
            self.append_operation(Operation::from_opcode(op));
        }
        Ok(())
    }

    fn append_operation(&mut self, op: Operation) {
        self.bytes.extend_from_slice(&op.to_bytes());
        if self.valid {
            self.operations.push(op);
        } else {
            *self = Script::from_bytes(&self.bytes);
        }
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Script {
    /// Display the script as a lowercase hex string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl serde::Serialize for Script {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Script {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
