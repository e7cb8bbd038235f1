//! Native transaction introspection.

use crate::opcodes::*;

use super::error::{InterpreterError, InterpreterErrorCode};
use super::program::Program;
use super::scriptnum::ScriptNumber;

fn unavailable(what: &str, idx: usize) -> InterpreterError {
    InterpreterError::new(
        InterpreterErrorCode::ContextUnavailable,
        format!("{} of index {} is not available", what, idx),
    )
}

impl<'a> Program<'a> {
    pub(crate) fn op_introspection(&mut self, code: u8) -> Result<(), InterpreterError> {
        let context = self.context();
        match code {
            OP_INPUTINDEX => self.push_number(&ScriptNumber::new(self.input_index() as i64)),
            OP_ACTIVEBYTECODE => {
                let active = self.subscript();
                self.push_element(active.to_bytes().to_vec())
            }
            OP_TXVERSION => self.push_number(&ScriptNumber::new(i64::from(context.tx_version()))),
            OP_TXINPUTCOUNT => self.push_number(&ScriptNumber::new(context.input_count() as i64)),
            OP_TXOUTPUTCOUNT => {
                self.push_number(&ScriptNumber::new(context.output_count() as i64))
            }
            OP_TXLOCKTIME => self.push_number(&ScriptNumber::new(i64::from(context.lock_time()))),
            OP_UTXOVALUE => {
                let idx = self.pop_input_index()?;
                let (value, _) = context.utxo(idx).ok_or_else(|| unavailable("utxo", idx))?;
                self.push_number(&ScriptNumber::new(value as i64))
            }
            OP_UTXOBYTECODE => {
                let idx = self.pop_input_index()?;
                let (_, script) = context.utxo(idx).ok_or_else(|| unavailable("utxo", idx))?;
                self.push_element(script.to_bytes().to_vec())
            }
            OP_OUTPOINTTXHASH => {
                let idx = self.pop_input_index()?;
                let (hash, _) = context
                    .outpoint(idx)
                    .ok_or_else(|| unavailable("outpoint", idx))?;
                self.push(hash.to_vec());
                Ok(())
            }
            OP_OUTPOINTINDEX => {
                let idx = self.pop_input_index()?;
                let (_, index) = context
                    .outpoint(idx)
                    .ok_or_else(|| unavailable("outpoint", idx))?;
                self.push_number(&ScriptNumber::new(i64::from(index)))
            }
            OP_INPUTBYTECODE => {
                let idx = self.pop_input_index()?;
                let script = context
                    .input_script(idx)
                    .ok_or_else(|| unavailable("input script", idx))?;
                self.push_element(script.to_bytes().to_vec())
            }
            OP_INPUTSEQUENCENUMBER => {
                let idx = self.pop_input_index()?;
                self.push_number(&ScriptNumber::new(i64::from(context.input_sequence(idx))))
            }
            OP_OUTPUTVALUE => {
                let idx = self.pop_output_index()?;
                let (value, _) = context
                    .output(idx)
                    .ok_or_else(|| unavailable("output", idx))?;
                self.push_number(&ScriptNumber::new(value as i64))
            }
            OP_OUTPUTBYTECODE => {
                let idx = self.pop_output_index()?;
                let (_, script) = context
                    .output(idx)
                    .ok_or_else(|| unavailable("output", idx))?;
                self.push_element(script.to_bytes().to_vec())
            }
            _ => Err(InterpreterError::new(
                InterpreterErrorCode::BadOpcode,
                format!("0x{:02x} is not an introspection opcode", code),
            )),
        }
    }

    fn pop_input_index(&mut self) -> Result<usize, InterpreterError> {
        let count = self.context().input_count();
        let idx = self.pop_number()?;
        if idx.is_negative() || !idx.less_than_int(count as i64) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidTxInputIndex,
                format!(
                    "input index {} is outside [0, {})",
                    idx.to_i64(),
                    count
                ),
            ));
        }
        Ok(idx.to_i64() as usize)
    }

    fn pop_output_index(&mut self) -> Result<usize, InterpreterError> {
        let count = self.context().output_count();
        let idx = self.pop_number()?;
        if idx.is_negative() || !idx.less_than_int(count as i64) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidTxOutputIndex,
                format!(
                    "output index {} is outside [0, {})",
                    idx.to_i64(),
                    count
                ),
            ));
        }
        Ok(idx.to_i64() as usize)
    }

    /// Push a script-sized item, failing if it exceeds the element size.
    fn push_element(&mut self, data: Vec<u8>) -> Result<(), InterpreterError> {
        let max = self.max_script_element_size();
        if data.len() > max {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidPushDataSize,
                format!("element size {} exceeds max allowed size {}", data.len(), max),
            ));
        }
        self.push(data);
        Ok(())
    }
}
