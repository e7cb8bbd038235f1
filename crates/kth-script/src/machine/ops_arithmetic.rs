//! Numeric operations.

use super::error::{InterpreterError, InterpreterErrorCode};
use super::program::Program;
use super::scriptnum::ScriptNumber;

impl<'a> Program<'a> {
    pub(crate) fn op_unary_int(
        &mut self,
        f: impl FnOnce(&mut ScriptNumber),
    ) -> Result<(), InterpreterError> {
        let mut m = self.pop_number()?;
        f(&mut m);
        self.push_number(&m)
    }

    pub(crate) fn op_add(&mut self) -> Result<(), InterpreterError> {
        let mut v0 = self.pop_number()?;
        let v1 = self.pop_number()?;
        v0.add(&v1);
        self.push_number(&v0)
    }

    pub(crate) fn op_sub(&mut self) -> Result<(), InterpreterError> {
        let v0 = self.pop_number()?;
        let mut v1 = self.pop_number()?;
        v1.sub(&v0);
        self.push_number(&v1)
    }

    pub(crate) fn op_mul(&mut self) -> Result<(), InterpreterError> {
        self.tally_operand_product()?;
        let mut n1 = self.pop_number()?;
        let n2 = self.pop_number()?;
        n1.mul(&n2);
        self.push_number(&n1)
    }

    pub(crate) fn op_div(&mut self) -> Result<(), InterpreterError> {
        self.tally_operand_product()?;
        let b = self.pop_number()?;
        let mut a = self.pop_number()?;
        if b.is_zero() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::DivideByZero,
                "divide by zero".to_string(),
            ));
        }
        a.div(&b);
        self.push_number(&a)
    }

    pub(crate) fn op_mod(&mut self) -> Result<(), InterpreterError> {
        self.tally_operand_product()?;
        let b = self.pop_number()?;
        let mut a = self.pop_number()?;
        if b.is_zero() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::DivideByZero,
                "mod by zero".to_string(),
            ));
        }
        a.modulo(&b);
        self.push_number(&a)
    }

    pub(crate) fn op_bool_binop(
        &mut self,
        f: impl FnOnce(&ScriptNumber, &ScriptNumber) -> bool,
    ) -> Result<(), InterpreterError> {
        let b = self.pop_number()?;
        let a = self.pop_number()?;
        self.push_bool(f(&a, &b));
        Ok(())
    }

    pub(crate) fn op_min_max(&mut self, min: bool) -> Result<(), InterpreterError> {
        let b = self.pop_number()?;
        let a = self.pop_number()?;
        let pick_a = if min { a.less_than(&b) } else { a.greater_than(&b) };
        self.push_number(if pick_a { &a } else { &b })
    }

    pub(crate) fn op_within(&mut self) -> Result<(), InterpreterError> {
        let max = self.pop_number()?;
        let min = self.pop_number()?;
        let x = self.pop_number()?;
        self.push_bool(min.less_than_or_equal(&x) && x.less_than(&max));
        Ok(())
    }

    /// Under VM limits, charge the product of the two operand sizes.
    fn tally_operand_product(&mut self) -> Result<(), InterpreterError> {
        if !self.is_chip_vm_limits_enabled() {
            return Ok(());
        }
        let stack = self.stack();
        stack.require(2)?;
        let cost = stack.peek(0)?.len() as u64 * stack.peek(1)?.len() as u64;
        self.metrics_mut().add_op_cost(cost);
        Ok(())
    }
}
