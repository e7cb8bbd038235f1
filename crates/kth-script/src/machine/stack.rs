//! Operand and condition stacks.

use super::error::{InterpreterError, InterpreterErrorCode};

/// Convert a stack item to a boolean (negative zero is false).
pub fn as_bool(t: &[u8]) -> bool {
    for (i, &b) in t.iter().enumerate() {
        if b != 0 {
            return !(i == t.len() - 1 && b == 0x80);
        }
    }
    false
}

/// Convert a boolean to its stack encoding.
pub fn from_bool(v: bool) -> Vec<u8> {
    if v {
        vec![1]
    } else {
        vec![]
    }
}

fn invalid_index(idx: usize, len: usize) -> InterpreterError {
    InterpreterError::new(
        InterpreterErrorCode::InvalidStackOperation,
        format!("index {} is invalid for stack size {}", idx, len),
    )
}

/// A stack of byte vectors; the top is the back of the vector.
///
/// Indexes passed to `peek`/`nip`/`pick`/`roll` count down from the top,
/// so index 0 is the top item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    items: Vec<Vec<u8>>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<Vec<u8>>) -> Self {
        Stack { items }
    }

    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.items.len() {
            self.items.reserve(capacity - self.items.len());
        }
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items bottom to top.
    pub fn items(&self) -> &[Vec<u8>] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Vec<u8>> {
        self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn push(&mut self, data: Vec<u8>) {
        self.items.push(data);
    }

    pub fn push_bool(&mut self, val: bool) {
        self.items.push(from_bool(val));
    }

    pub fn pop(&mut self) -> Result<Vec<u8>, InterpreterError> {
        self.items.pop().ok_or_else(|| invalid_index(0, 0))
    }

    pub fn pop_bool(&mut self) -> Result<bool, InterpreterError> {
        Ok(as_bool(&self.pop()?))
    }

    pub fn top(&self) -> Result<&[u8], InterpreterError> {
        self.peek(0)
    }

    pub fn peek(&self, idx: usize) -> Result<&[u8], InterpreterError> {
        let len = self.items.len();
        if idx >= len {
            return Err(invalid_index(idx, len));
        }
        Ok(&self.items[len - idx - 1])
    }

    /// Remove and return the item `idx` places below the top.
    pub fn nip(&mut self, idx: usize) -> Result<Vec<u8>, InterpreterError> {
        let len = self.items.len();
        if idx >= len {
            return Err(invalid_index(idx, len));
        }
        Ok(self.items.remove(len - idx - 1))
    }

    /// Fail unless at least `n` items are present.
    pub fn require(&self, n: usize) -> Result<(), InterpreterError> {
        if self.items.len() < n {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidStackOperation,
                format!("operation needs {} items, stack has {}", n, self.items.len()),
            ));
        }
        Ok(())
    }

    pub fn drop_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        self.require(n)?;
        self.items.truncate(self.items.len() - n);
        Ok(())
    }

    /// Copy the top `n` items, preserving order.
    pub fn dup_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        self.require(n)?;
        let start = self.items.len() - n;
        self.items.extend_from_within(start..);
        Ok(())
    }

    /// Move the third group of `n` items to the top.
    pub fn rot_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        self.require(3 * n)?;
        let start = self.items.len() - 3 * n;
        self.items[start..].rotate_left(n);
        Ok(())
    }

    /// Swap the top two groups of `n` items.
    pub fn swap_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        self.require(2 * n)?;
        let start = self.items.len() - 2 * n;
        self.items[start..].rotate_left(n);
        Ok(())
    }

    /// Copy the second group of `n` items to the top.
    pub fn over_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        self.require(2 * n)?;
        let start = self.items.len() - 2 * n;
        self.items.extend_from_within(start..start + n);
        Ok(())
    }

    pub fn pick(&mut self, idx: usize) -> Result<(), InterpreterError> {
        let item = self.peek(idx)?.to_vec();
        self.items.push(item);
        Ok(())
    }

    pub fn roll(&mut self, idx: usize) -> Result<(), InterpreterError> {
        let item = self.nip(idx)?;
        self.items.push(item);
        Ok(())
    }

    /// Copy the top item below the second item.
    pub fn tuck(&mut self) -> Result<(), InterpreterError> {
        self.require(2)?;
        let top = self.peek(0)?.to_vec();
        let at = self.items.len() - 2;
        self.items.insert(at, top);
        Ok(())
    }
}

/// Nested IF/NOTIF execution state.
///
/// Tracks the number of false entries so `succeeded` is constant time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionStack {
    stack: Vec<bool>,
    false_count: usize,
}

impl ConditionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.stack.len() {
            self.stack.reserve(capacity - self.stack.len());
        }
    }

    pub fn capacity(&self) -> usize {
        self.stack.capacity()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn open(&mut self, value: bool) {
        if !value {
            self.false_count += 1;
        }
        self.stack.push(value);
    }

    /// Flip the innermost branch (OP_ELSE).
    pub fn negate(&mut self) -> Result<(), InterpreterError> {
        let top = self.stack.last_mut().ok_or_else(unbalanced)?;
        if *top {
            self.false_count += 1;
        } else {
            self.false_count -= 1;
        }
        *top = !*top;
        Ok(())
    }

    /// Close the innermost branch (OP_ENDIF).
    pub fn close(&mut self) -> Result<(), InterpreterError> {
        let value = self.stack.pop().ok_or_else(unbalanced)?;
        if !value {
            self.false_count -= 1;
        }
        Ok(())
    }

    /// True when every IF has been closed.
    pub fn closed(&self) -> bool {
        self.stack.is_empty()
    }

    /// True when every open branch is being executed.
    pub fn succeeded(&self) -> bool {
        self.false_count == 0
    }
}

fn unbalanced() -> InterpreterError {
    InterpreterError::new(
        InterpreterErrorCode::InvalidStackScope,
        "conditional without a matching IF".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(items: &[u8]) -> Stack {
        Stack::from_items(items.iter().map(|b| vec![*b]).collect())
    }

    fn flat(s: &Stack) -> Vec<u8> {
        s.items().iter().map(|i| i[0]).collect()
    }

    #[test]
    fn test_as_bool() {
        assert!(!as_bool(&[]));
        assert!(!as_bool(&[0x00]));
        assert!(!as_bool(&[0x80]));
        assert!(as_bool(&[0x01]));
        assert!(as_bool(&[0x00, 0x01]));
        assert!(!as_bool(&[0x00, 0x00]));
        assert!(!as_bool(&[0x00, 0x80]));
        assert!(as_bool(&[0x80, 0x00]));
    }

    #[test]
    fn test_stack_basic_ops() {
        let mut s = Stack::new();
        s.push(vec![1, 2, 3]);
        s.push(vec![4, 5]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.top().unwrap(), &[4, 5]);
        assert_eq!(s.pop().unwrap(), vec![4, 5]);
        assert_eq!(s.len(), 1);
        s.clear();
        assert!(s.pop().is_err());
    }

    #[test]
    fn test_group_ops() {
        let mut s = stack(&[1, 2]);
        s.dup_n(2).unwrap();
        assert_eq!(flat(&s), vec![1, 2, 1, 2]);

        let mut s = stack(&[1, 2, 3, 4, 5, 6]);
        s.rot_n(2).unwrap();
        assert_eq!(flat(&s), vec![3, 4, 5, 6, 1, 2]);

        let mut s = stack(&[1, 2, 3]);
        s.rot_n(1).unwrap();
        assert_eq!(flat(&s), vec![2, 3, 1]);

        let mut s = stack(&[1, 2, 3, 4]);
        s.swap_n(2).unwrap();
        assert_eq!(flat(&s), vec![3, 4, 1, 2]);

        let mut s = stack(&[1, 2, 3, 4]);
        s.over_n(2).unwrap();
        assert_eq!(flat(&s), vec![1, 2, 3, 4, 1, 2]);

        let mut s = stack(&[1, 2]);
        s.tuck().unwrap();
        assert_eq!(flat(&s), vec![2, 1, 2]);
    }

    #[test]
    fn test_pick_roll() {
        let mut s = stack(&[1, 2, 3]);
        s.pick(2).unwrap();
        assert_eq!(flat(&s), vec![1, 2, 3, 1]);
        s.roll(3).unwrap();
        assert_eq!(flat(&s), vec![2, 3, 1, 1]);
        assert!(s.pick(4).is_err());
    }

    #[test]
    fn test_underflow() {
        let mut s = stack(&[1]);
        assert!(s.swap_n(1).is_err());
        assert!(s.dup_n(2).is_err());
        assert_eq!(
            s.drop_n(2).unwrap_err().code,
            InterpreterErrorCode::InvalidStackOperation
        );
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_condition_stack() {
        let mut c = ConditionStack::new();
        assert!(c.closed() && c.succeeded());
        c.open(true);
        c.open(false);
        assert!(!c.succeeded());
        c.negate().unwrap();
        assert!(c.succeeded());
        c.negate().unwrap();
        c.close().unwrap();
        assert!(c.succeeded());
        assert_eq!(c.depth(), 1);
        c.close().unwrap();
        assert!(c.closed());
        assert!(c.close().is_err());
        assert!(c.negate().is_err());
    }
}
