//! Bracket balance check run over the raw selector bytes before parsing.

use crate::core::SelectorError;

/// Verify that every `[` is closed by a matching `]` in the right order.
///
/// Non-ASCII input is not interpreted; only the two bracket bytes matter.
pub fn check_bracket_pairs(input: &[u8]) -> Result<(), SelectorError> {
    let mut stack: Vec<u8> = Vec::new();
    for &byte in input {
        match byte {
            b'[' => stack.push(byte),
            b']' => match stack.pop() {
                Some(b'[') => {}
                _ => return Err(SelectorError::UnmatchedBrackets),
            },
            _ => {}
        }
    }

    if stack.is_empty() {
        Ok(())
    } else {
        Err(SelectorError::UnmatchedBrackets)
    }
}
