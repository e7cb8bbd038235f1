//! Splice, bitwise and equality operations.

use super::error::{InterpreterError, InterpreterErrorCode};
use super::program::Program;
use super::scriptnum::{minimally_encode, ScriptNumber};

impl<'a> Program<'a> {
    pub(crate) fn op_cat(&mut self) -> Result<(), InterpreterError> {
        let b = self.pop()?;
        let mut a = self.pop()?;
        let max = self.max_script_element_size();
        if a.len() + b.len() > max {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidPushDataSize,
                format!(
                    "concatenated size {} exceeds max allowed size {}",
                    a.len() + b.len(),
                    max
                ),
            ));
        }
        a.extend_from_slice(&b);
        self.push(a);
        Ok(())
    }

    pub(crate) fn op_split(&mut self) -> Result<(), InterpreterError> {
        let n = self.pop_number()?;
        let data = self.pop()?;
        if n.is_negative() || n.greater_than_int(data.len() as i64) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidSplitRange,
                format!(
                    "split position {} is outside [0, {}]",
                    n.to_i64(),
                    data.len()
                ),
            ));
        }
        let mut left = data;
        let right = left.split_off(n.to_i64() as usize);
        self.push(left);
        self.push(right);
        Ok(())
    }

    pub(crate) fn op_num2bin(&mut self) -> Result<(), InterpreterError> {
        let size = self.pop_number()?;
        let max = self.max_script_element_size();
        if size.is_negative() || size.greater_than_int(max as i64) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidPushDataSize,
                format!("requested size {} is outside [0, {}]", size.to_i64(), max),
            ));
        }
        let size = size.to_i64() as usize;

        let mut bytes = minimally_encode(&self.pop()?);
        if bytes.len() > size {
            return Err(InterpreterError::new(
                InterpreterErrorCode::ImpossibleEncoding,
                format!("cannot fit {} bytes into {}", bytes.len(), size),
            ));
        }

        if bytes.len() < size {
            let mut sign = 0x00;
            if let Some(last) = bytes.last_mut() {
                sign = *last & 0x80;
                *last &= 0x7f;
            }
            bytes.resize(size - 1, 0x00);
            bytes.push(sign);
        }
        self.push(bytes);
        Ok(())
    }

    pub(crate) fn op_bin2num(&mut self) -> Result<(), InterpreterError> {
        let bytes = minimally_encode(&self.pop()?);
        if bytes.len() > self.max_integer_size() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NumberTooBig,
                format!(
                    "script numbers are limited to {} bytes",
                    self.max_integer_size()
                ),
            ));
        }
        self.push(bytes);
        Ok(())
    }

    pub(crate) fn op_size(&mut self) -> Result<(), InterpreterError> {
        let size = ScriptNumber::new(self.stack().top()?.len() as i64);
        self.push_number(&size)
    }

    pub(crate) fn op_bitwise(&mut self, f: fn(u8, u8) -> u8) -> Result<(), InterpreterError> {
        let b = self.pop()?;
        let a = self.pop()?;
        if a.len() != b.len() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidOperandSize,
                format!("operand sizes differ: {} and {}", a.len(), b.len()),
            ));
        }
        let c: Vec<u8> = a.iter().zip(b.iter()).map(|(&x, &y)| f(x, y)).collect();
        self.push(c);
        Ok(())
    }

    pub(crate) fn op_equal(&mut self) -> Result<(), InterpreterError> {
        let a = self.pop()?;
        let b = self.pop()?;
        self.push_bool(a == b);
        Ok(())
    }

    pub(crate) fn op_reverse_bytes(&mut self) -> Result<(), InterpreterError> {
        let mut data = self.pop()?;
        data.reverse();
        self.push(data);
        Ok(())
    }
}
