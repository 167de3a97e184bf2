//! Hardware stack.
//!
//! Grows downward from the top of its array. The stack pointer indexes the
//! most recently pushed word; it equals the capacity when the stack is
//! empty and 0 when it is full.

use crate::cpu::STACK_SIZE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bounded LIFO of machine words.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    words: Vec<u32>,
    sp: usize,
}

impl Stack {
    /// Create an empty stack of [`STACK_SIZE`] words.
    pub fn new() -> Self {
        Self::with_capacity(STACK_SIZE)
    }

    /// Create an empty stack holding at most `capacity` words.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity],
            sp: capacity,
        }
    }

    /// Clear the stack and move the pointer back to the top.
    pub fn reset(&mut self) {
        self.words.fill(0);
        self.sp = self.words.len();
    }

    /// Push a word. Fails without touching the stack when it is full.
    pub fn push(&mut self, value: u32) -> Result<(), StackError> {
        if self.sp == 0 {
            return Err(StackError::Full {
                capacity: self.capacity(),
            });
        }
        self.sp -= 1;
        self.words[self.sp] = value;
        Ok(())
    }

    /// Pop a word. An empty stack yields 0 and stays empty.
    pub fn pop(&mut self) -> u32 {
        if self.is_empty() {
            return 0;
        }
        let value = self.words[self.sp];
        self.sp += 1;
        value
    }

    /// Current stack pointer.
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Number of words on the stack.
    pub fn len(&self) -> usize {
        self.words.len() - self.sp
    }

    pub fn is_empty(&self) -> bool {
        self.sp == self.words.len()
    }

    pub fn is_full(&self) -> bool {
        self.sp == 0
    }

    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    /// Number of words that can still be pushed.
    pub fn free(&self) -> usize {
        self.sp
    }

    /// Stacked words, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words[self.sp..].iter().copied()
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("sp", &self.sp)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Errors that can occur during stack operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("stack overflow: all {capacity} words in use")]
    Full { capacity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_pop_returns_default() {
        let mut stack = Stack::with_capacity(4);
        assert_eq!(stack.pop(), 0);
        assert!(stack.is_empty());
        assert_eq!(stack.sp(), 4);
    }

    #[test]
    fn test_full_push_fails_without_mutation() {
        let mut stack = Stack::with_capacity(2);
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert!(stack.is_full());

        let before = stack.clone();
        assert_eq!(stack.push(3), Err(StackError::Full { capacity: 2 }));
        assert_eq!(stack, before);

        assert_eq!(stack.pop(), 2);
        assert_eq!(stack.pop(), 1);
        assert_eq!(stack.pop(), 0);
    }

    #[test]
    fn test_grows_downward() {
        let mut stack = Stack::with_capacity(8);
        stack.push(10).unwrap();
        assert_eq!(stack.sp(), 7);
        stack.push(20).unwrap();
        assert_eq!(stack.sp(), 6);
        assert_eq!(stack.iter().collect::<Vec<_>>(), vec![20, 10]);
    }

    #[test]
    fn test_reset() {
        let mut stack = Stack::new();
        stack.push(5).unwrap();
        stack.reset();
        assert!(stack.is_empty());
        assert_eq!(stack.len(), 0);
        assert_eq!(stack.capacity(), STACK_SIZE);
    }

    proptest! {
        #[test]
        fn prop_lifo_order(values in proptest::collection::vec(any::<u32>(), 0..64)) {
            let mut stack = Stack::with_capacity(64);
            for &v in &values {
                prop_assert!(stack.push(v).is_ok());
            }
            prop_assert_eq!(stack.len(), values.len());

            let popped: Vec<u32> = (0..values.len()).map(|_| stack.pop()).collect();
            let reversed: Vec<u32> = values.iter().rev().copied().collect();
            prop_assert_eq!(popped, reversed);
            prop_assert!(stack.is_empty());
        }
    }
}
