//! Stack manipulation operations.
//!
//! Under VM limits only copies are charged; moving items around is free.

use super::error::InterpreterError;
use super::program::Program;
use super::scriptnum::ScriptNumber;
use super::stack::{as_bool, Stack};

impl<'a> Program<'a> {
    pub(crate) fn op_to_alt_stack(&mut self) -> Result<(), InterpreterError> {
        let data = self.pop()?;
        self.alternate_mut().push(data);
        Ok(())
    }

    pub(crate) fn op_from_alt_stack(&mut self) -> Result<(), InterpreterError> {
        let data = self.alternate_mut().pop()?;
        self.primary_mut().push(data);
        Ok(())
    }

    /// Run a copying stack operation, then charge the `copies` new items.
    pub(crate) fn op_copy(
        &mut self,
        copies: usize,
        f: impl FnOnce(&mut Stack) -> Result<(), InterpreterError>,
    ) -> Result<(), InterpreterError> {
        f(self.primary_mut())?;
        self.tally_top(copies);
        Ok(())
    }

    pub(crate) fn op_ifdup(&mut self) -> Result<(), InterpreterError> {
        let top = self.stack().top()?;
        if as_bool(top) {
            let copy = top.to_vec();
            self.push(copy);
        }
        Ok(())
    }

    pub(crate) fn op_depth(&mut self) -> Result<(), InterpreterError> {
        let depth = ScriptNumber::new(self.stack().len() as i64);
        self.push_number(&depth)
    }

    pub(crate) fn op_pick(&mut self) -> Result<(), InterpreterError> {
        let idx = self.pop_index()?;
        self.op_copy(1, |s| s.pick(idx))
    }

    pub(crate) fn op_roll(&mut self) -> Result<(), InterpreterError> {
        let idx = self.pop_index()?;
        self.primary_mut().roll(idx)
    }
}
