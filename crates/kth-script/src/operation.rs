//! Parsed script operations.
//!
//! An operation is either a bare opcode or a push opcode together with the
//! bytes it pushes. Scripts are decoded into operations once; the machine
//! only ever sees this representation.

use std::fmt;

use crate::machine::ActiveRules;
use crate::opcodes::*;
use crate::ScriptError;

/// A single decoded script instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// The opcode byte value.
    pub code: u8,
    /// The data payload of push opcodes (empty for non-push opcodes).
    pub data: Vec<u8>,
}

impl Operation {
    /// Create an operation, checking the payload against the opcode.
    pub fn new(code: u8, data: Vec<u8>) -> Result<Self, ScriptError> {
        let fits = match code {
            OP_DATA_1..=OP_DATA_75 => data.len() == code as usize,
            OP_PUSHDATA1 => data.len() <= u8::MAX as usize,
            OP_PUSHDATA2 => data.len() <= u16::MAX as usize,
            OP_PUSHDATA4 => data.len() <= u32::MAX as usize,
            _ => data.is_empty(),
        };
        if !fits {
            return Err(ScriptError::InvalidPushEncoding {
                opcode: opcode_to_string(code).to_string(),
                len: data.len(),
            });
        }
        Ok(Operation { code, data })
    }

    /// Create a bare (non-push) operation.
    pub fn from_opcode(code: u8) -> Self {
        Operation { code, data: Vec::new() }
    }

    /// Create the minimal push of `data`.
    ///
    /// Empty data and single bytes 1..=16 or 0x81 use the small-integer
    /// opcodes; everything else uses the shortest direct or PUSHDATA form.
    pub fn push(data: Vec<u8>) -> Self {
        let code = minimal_opcode_from_data(&data);
        if code == OP_0 || code == OP_1NEGATE || (OP_1..=OP_16).contains(&code) {
            return Operation::from_opcode(code);
        }
        Operation { code, data }
    }

    /// Return the human-readable name of this opcode.
    pub fn name(&self) -> &'static str {
        opcode_to_string(self.code)
    }

    /// Return true if this opcode pushes a value (OP_0..=OP_16).
    pub fn is_push(&self) -> bool {
        is_push(self.code)
    }

    /// Return true for OP_1..OP_16.
    pub fn is_positive(&self) -> bool {
        (OP_1..=OP_16).contains(&self.code)
    }

    /// Return true for a witness-version opcode (OP_0 or OP_1..OP_16).
    pub fn is_version(&self) -> bool {
        self.code == OP_0 || self.is_positive()
    }

    /// Return true if this opcode counts toward the operation limit.
    pub fn is_counted(&self) -> bool {
        self.code > OP_16
    }

    /// Return true if this opcode is a conditional flow control opcode.
    ///
    /// Conditionals run even inside an unexecuted branch so that nesting
    /// is tracked.
    pub fn is_conditional(&self) -> bool {
        matches!(
            self.code,
            OP_IF | OP_NOTIF | OP_ELSE | OP_ENDIF | OP_VERIF | OP_VERNOTIF
        )
    }

    /// Return true if the push data exceeds `max_element_size` bytes.
    pub fn is_oversized(&self, max_element_size: usize) -> bool {
        self.data.len() > max_element_size
    }

    /// Return true if this opcode is disabled under the given rules.
    ///
    /// A disabled opcode fails the script even in an unexecuted branch.
    pub fn is_disabled(&self, rules: &ActiveRules) -> bool {
        match self.code {
            OP_VERIF | OP_VERNOTIF | OP_INVERT | OP_2MUL | OP_2DIV | OP_LSHIFT | OP_RSHIFT => true,
            OP_CAT | OP_SPLIT | OP_NUM2BIN | OP_BIN2NUM | OP_AND | OP_OR | OP_XOR | OP_DIV
            | OP_MOD => !rules.monolith,
            OP_MUL => !rules.gauss,
            _ => false,
        }
    }

    /// Return true if this push uses the smallest possible encoding.
    pub fn is_minimal_push(&self) -> bool {
        if !self.is_push() || self.code == OP_RESERVED {
            return true;
        }
        if self.code == OP_0 || self.code == OP_1NEGATE || (OP_1..=OP_16).contains(&self.code) {
            return true;
        }
        self.code == minimal_opcode_from_data(&self.data)
    }

    /// Return true if the push is the canonical encoding of its payload
    /// (used when stripping signatures from a signature-hash subscript).
    pub fn is_canonical_push(&self) -> bool {
        let len = self.data.len();
        match self.code {
            OP_DATA_1..=OP_DATA_75 => !(len == 1 && self.data[0] <= 16),
            OP_PUSHDATA1 => len >= OP_PUSHDATA1 as usize,
            OP_PUSHDATA2 => len > 0xff,
            OP_PUSHDATA4 => len > 0xffff,
            _ => true,
        }
    }

    /// Return the number of bytes this operation occupies in a script.
    pub fn serialized_size(&self) -> usize {
        let prefix = match self.code {
            OP_PUSHDATA1 => 1,
            OP_PUSHDATA2 => 2,
            OP_PUSHDATA4 => 4,
            _ => 0,
        };
        1 + prefix + self.data.len()
    }

    /// Serialize back to script bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        out.push(self.code);
        match self.code {
            OP_PUSHDATA1 => out.push(self.data.len() as u8),
            OP_PUSHDATA2 => out.extend_from_slice(&(self.data.len() as u16).to_le_bytes()),
            OP_PUSHDATA4 => out.extend_from_slice(&(self.data.len() as u32).to_le_bytes()),
            _ => {}
        }
        out.extend_from_slice(&self.data);
        out
    }

    /// Render the operation as an ASM token: hex for data pushes, the
    /// mnemonic otherwise.
    pub fn to_asm_string(&self) -> String {
        if self.code > OP_0 && self.code <= OP_PUSHDATA4 {
            return hex::encode(&self.data);
        }
        self.name().to_string()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_asm_string())
    }
}

/// Return true if the opcode pushes a value (OP_0..=OP_16).
pub fn is_push(code: u8) -> bool {
    code <= OP_16
}

/// Return the smallest opcode able to push `data`.
pub fn minimal_opcode_from_data(data: &[u8]) -> u8 {
    if data.is_empty() {
        return OP_0;
    }
    if data.len() == 1 {
        if (1..=16).contains(&data[0]) {
            return OP_1 + data[0] - 1;
        }
        if data[0] == 0x81 {
            return OP_1NEGATE;
        }
    }
    opcode_from_size(data.len())
}

/// Return the push opcode (without small-integer substitution) for a
/// payload of `size` bytes.
pub fn opcode_from_size(size: usize) -> u8 {
    if size == 0 {
        OP_0
    } else if size <= OP_DATA_75 as usize {
        size as u8
    } else if size <= u8::MAX as usize {
        OP_PUSHDATA1
    } else if size <= u16::MAX as usize {
        OP_PUSHDATA2
    } else {
        OP_PUSHDATA4
    }
}

/// Decode raw script bytes into operations.
///
/// Returns the operations decoded so far and whether the whole byte stream
/// was consumed; a truncated push stops decoding.
pub fn decode_operations(bytes: &[u8]) -> (Vec<Operation>, bool) {
    let mut ops = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let code = bytes[pos];
        let (header, length) = match code {
            OP_DATA_1..=OP_DATA_75 => (1, code as usize),
            OP_PUSHDATA1 => match bytes.get(pos + 1) {
                Some(&n) => (2, n as usize),
                None => return (ops, false),
            },
            OP_PUSHDATA2 => match bytes.get(pos + 1..pos + 3) {
                Some(b) => (3, u16::from_le_bytes([b[0], b[1]]) as usize),
                None => return (ops, false),
            },
            OP_PUSHDATA4 => match bytes.get(pos + 1..pos + 5) {
                Some(b) => (5, u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize),
                None => return (ops, false),
            },
            _ => (1, 0),
        };

        let start = pos + header;
        let end = match start.checked_add(length) {
            Some(end) if end <= bytes.len() => end,
            _ => return (ops, false),
        };
        ops.push(Operation {
            code,
            data: bytes[start..end].to_vec(),
        });
        pos = end;
    }

    (ops, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{ActiveRules, Currency, RuleFork, Ruleset};

    #[test]
    fn test_decode_operations() {
        let bytes = [OP_DUP, OP_HASH160, 0x02, 0xab, 0xcd, OP_PUSHDATA1, 0x01, 0xff, OP_CHECKSIG];
        let (ops, valid) = decode_operations(&bytes);
        assert!(valid);
        assert_eq!(ops.len(), 5);
        assert_eq!(ops[2].data, vec![0xab, 0xcd]);
        assert_eq!(ops[3].code, OP_PUSHDATA1);
        assert_eq!(ops[3].data, vec![0xff]);
        let rebuilt: Vec<u8> = ops.iter().flat_map(|op| op.to_bytes()).collect();
        assert_eq!(rebuilt, bytes.to_vec());
    }

    #[test]
    fn test_decode_truncated_push() {
        let (ops, valid) = decode_operations(&[OP_1, 0x05, 0x01, 0x02]);
        assert!(!valid);
        assert_eq!(ops.len(), 1);

        let (_, valid) = decode_operations(&[OP_PUSHDATA2, 0x01]);
        assert!(!valid);

        let (_, valid) = decode_operations(&[OP_PUSHDATA4, 0xff, 0xff, 0xff, 0xff]);
        assert!(!valid);
    }

    #[test]
    fn test_op_return_does_not_swallow_tail() {
        let (ops, valid) = decode_operations(&[OP_RETURN, OP_1, OP_2]);
        assert!(valid);
        assert_eq!(ops.len(), 3);
        assert!(ops[0].data.is_empty());
    }

    #[test]
    fn test_new_checks_payload() {
        assert!(Operation::new(OP_DATA_1 + 1, vec![1, 2]).is_ok());
        assert!(Operation::new(OP_DATA_1 + 1, vec![1]).is_err());
        assert!(Operation::new(OP_DUP, vec![1]).is_err());
        assert!(Operation::new(OP_PUSHDATA1, vec![0; 256]).is_err());
    }

    #[test]
    fn test_minimal_push() {
        assert_eq!(Operation::push(vec![]).code, OP_0);
        assert_eq!(Operation::push(vec![5]).code, OP_5);
        assert_eq!(Operation::push(vec![0x81]).code, OP_1NEGATE);
        assert_eq!(Operation::push(vec![0x00]).code, 1);
        assert_eq!(Operation::push(vec![0; 76]).code, OP_PUSHDATA1);
        assert_eq!(Operation::push(vec![0; 256]).code, OP_PUSHDATA2);

        assert!(Operation::push(vec![7; 80]).is_minimal_push());
        let padded = Operation::new(OP_PUSHDATA1, vec![7; 10]).unwrap();
        assert!(!padded.is_minimal_push());
        let small = Operation::new(OP_DATA_1, vec![3]).unwrap();
        assert!(!small.is_minimal_push());
        assert!(!small.is_canonical_push());
    }

    #[test]
    fn test_is_oversized() {
        let op = Operation::push(vec![0; 520]);
        assert!(!op.is_oversized(520));
        assert!(op.is_oversized(519));
    }

    #[test]
    fn test_is_disabled_by_rules() {
        let legacy = ActiveRules::new(&Ruleset::new(Currency::Bch), RuleFork::NO_RULES);
        let monolith = ActiveRules::new(&Ruleset::new(Currency::Bch), RuleFork::BCH_MONOLITH);
        let btc = ActiveRules::new(&Ruleset::new(Currency::Btc), RuleFork::ALL_RULES);

        let cat = Operation::from_opcode(OP_CAT);
        assert!(cat.is_disabled(&legacy));
        assert!(!cat.is_disabled(&monolith));
        assert!(cat.is_disabled(&btc));

        let mul = Operation::from_opcode(OP_MUL);
        assert!(mul.is_disabled(&monolith));
        let gauss = ActiveRules::new(&Ruleset::new(Currency::Bch), RuleFork::BCH_GAUSS);
        assert!(!mul.is_disabled(&gauss));

        for code in [OP_2MUL, OP_2DIV, OP_INVERT, OP_LSHIFT, OP_RSHIFT, OP_VERIF] {
            let all = ActiveRules::new(&Ruleset::new(Currency::Bch), RuleFork::ALL_RULES);
            assert!(Operation::from_opcode(code).is_disabled(&all));
        }
        assert!(!Operation::from_opcode(OP_DUP).is_disabled(&legacy));
    }

    #[test]
    fn test_counted() {
        assert!(!Operation::from_opcode(OP_16).is_counted());
        assert!(!Operation::from_opcode(OP_RESERVED).is_counted());
        assert!(Operation::from_opcode(OP_NOP).is_counted());
    }

    #[test]
    fn test_version_opcodes() {
        assert!(Operation::from_opcode(OP_0).is_version());
        assert!(!Operation::from_opcode(OP_0).is_positive());
        assert!(Operation::from_opcode(OP_16).is_positive());
        assert!(!Operation::from_opcode(OP_1NEGATE).is_version());
        assert!(!Operation::from_opcode(OP_RESERVED).is_version());
    }
}
