//! Script number arithmetic with consensus encoding rules.
//!
//! Numbers on the stack are little-endian byte arrays with the sign in the
//! most significant bit of the last byte. Operands are bounded by the
//! program's maximum integer size; results are range-checked by the caller
//! before they are pushed back.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use super::error::{InterpreterError, InterpreterErrorCode};

/// A script number backed by a big integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptNumber {
    pub val: BigInt,
}

impl ScriptNumber {
    pub fn new(val: i64) -> Self {
        ScriptNumber {
            val: BigInt::from(val),
        }
    }

    /// Parse a stack item into a number.
    ///
    /// `max_len` is the largest operand accepted in bytes and
    /// `require_minimal` rejects padded encodings.
    pub fn from_bytes(
        bb: &[u8],
        max_len: usize,
        require_minimal: bool,
    ) -> Result<Self, InterpreterError> {
        if bb.len() > max_len {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NumberTooBig,
                format!(
                    "numeric value is {} bytes which exceeds the max allowed of {}",
                    bb.len(),
                    max_len
                ),
            ));
        }

        if require_minimal {
            check_minimal_data_encoding(bb)?;
        }

        let Some((&last, _)) = bb.split_last() else {
            return Ok(ScriptNumber { val: BigInt::zero() });
        };

        let mut magnitude = bb.to_vec();
        let negative = last & 0x80 != 0;
        if let Some(top) = magnitude.last_mut() {
            *top &= 0x7f;
        }
        let mut val = BigInt::from_bytes_le(num_bigint::Sign::Plus, &magnitude);
        if negative {
            val = -val;
        }
        Ok(ScriptNumber { val })
    }

    /// Serialize to the minimal little-endian sign-magnitude encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.val.is_zero() {
            return vec![];
        }

        let negative = self.val.is_negative();
        let (_, mut result) = self.val.abs().to_bytes_le();

        let last = result.len() - 1;
        if result[last] & 0x80 != 0 {
            result.push(if negative { 0x80 } else { 0x00 });
        } else if negative {
            result[last] |= 0x80;
        }
        result
    }

    /// Length of the minimal encoding in bytes.
    pub fn byte_len(&self) -> usize {
        self.to_bytes().len()
    }

    pub fn add(&mut self, other: &ScriptNumber) -> &mut Self {
        self.val = &self.val + &other.val;
        self
    }

    pub fn sub(&mut self, other: &ScriptNumber) -> &mut Self {
        self.val = &self.val - &other.val;
        self
    }

    pub fn mul(&mut self, other: &ScriptNumber) -> &mut Self {
        self.val = &self.val * &other.val;
        self
    }

    /// Truncating division. The divisor must be non-zero.
    pub fn div(&mut self, other: &ScriptNumber) -> &mut Self {
        let (q, _) = self.val.div_rem(&other.val);
        self.val = q;
        self
    }

    /// Truncating remainder, sign follows the dividend. The divisor must be
    /// non-zero.
    pub fn modulo(&mut self, other: &ScriptNumber) -> &mut Self {
        let (_, r) = self.val.div_rem(&other.val);
        self.val = r;
        self
    }

    pub fn incr(&mut self) -> &mut Self {
        self.val += BigInt::one();
        self
    }

    pub fn decr(&mut self) -> &mut Self {
        self.val -= BigInt::one();
        self
    }

    pub fn neg(&mut self) -> &mut Self {
        self.val = -&self.val;
        self
    }

    pub fn abs(&mut self) -> &mut Self {
        if self.val.is_negative() {
            self.val = -&self.val;
        }
        self
    }

    pub fn set(&mut self, i: i64) -> &mut Self {
        self.val = BigInt::from(i);
        self
    }

    pub fn is_zero(&self) -> bool {
        self.val.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.val.is_negative()
    }

    pub fn less_than(&self, other: &ScriptNumber) -> bool {
        self.val < other.val
    }

    pub fn less_than_int(&self, i: i64) -> bool {
        self.val < BigInt::from(i)
    }

    pub fn less_than_or_equal(&self, other: &ScriptNumber) -> bool {
        self.val <= other.val
    }

    pub fn greater_than(&self, other: &ScriptNumber) -> bool {
        self.val > other.val
    }

    pub fn greater_than_int(&self, i: i64) -> bool {
        self.val > BigInt::from(i)
    }

    pub fn greater_than_or_equal(&self, other: &ScriptNumber) -> bool {
        self.val >= other.val
    }

    pub fn equal(&self, other: &ScriptNumber) -> bool {
        self.val == other.val
    }

    pub fn equal_int(&self, i: i64) -> bool {
        self.val == BigInt::from(i)
    }

    /// True if the value lies in `(i64::MIN, i64::MAX]`, the 64-bit
    /// integer range where negation cannot overflow.
    pub fn is_valid_64_bit(&self) -> bool {
        matches!(self.val.to_i64(), Some(v) if v != i64::MIN)
    }

    /// Convert to i32, clamping to [i32::MIN, i32::MAX] on overflow.
    pub fn to_i32(&self) -> i32 {
        match self.val.to_i64() {
            Some(v) => v.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            None if self.val.is_positive() => i32::MAX,
            None => i32::MIN,
        }
    }

    /// Convert to i64, clamping to [i64::MIN, i64::MAX] on overflow.
    pub fn to_i64(&self) -> i64 {
        match self.val.to_i64() {
            Some(v) => v,
            None if self.val.is_positive() => i64::MAX,
            None => i64::MIN,
        }
    }
}

/// Minimally encode a byte array (used by OP_BIN2NUM).
pub fn minimally_encode(data: &[u8]) -> Vec<u8> {
    let Some(&last) = data.last() else {
        return vec![];
    };

    if last & 0x7f != 0 {
        return data.to_vec();
    }

    if data.len() == 1 {
        return vec![];
    }

    if data[data.len() - 2] & 0x80 != 0 {
        return data.to_vec();
    }

    let mut data = data.to_vec();
    let mut i = data.len() - 1;
    while i > 0 {
        if data[i - 1] != 0 {
            if data[i - 1] & 0x80 != 0 {
                data[i] = last;
                data.truncate(i + 1);
            } else {
                data[i - 1] |= last;
                data.truncate(i);
            }
            return data;
        }
        i -= 1;
    }

    vec![]
}

/// Check that a byte array uses minimal data encoding.
pub fn check_minimal_data_encoding(v: &[u8]) -> Result<(), InterpreterError> {
    let Some(&last) = v.last() else {
        return Ok(());
    };

    if last & 0x7f == 0 && (v.len() == 1 || v[v.len() - 2] & 0x80 == 0) {
        return Err(InterpreterError::new(
            InterpreterErrorCode::MinimalData,
            format!("numeric value encoded as {:02x?} is not minimally encoded", v),
        ));
    }

    Ok(())
}
