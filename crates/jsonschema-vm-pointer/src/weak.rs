use std::fmt;

use crate::pointer::Pointer;
use crate::token::{Token, WeakToken};

/// A non-owning JSON Pointer used as a live traversal cursor.
///
/// The evaluator keeps two of these (the evaluate path and the instance
/// location), growing them on every descent and trimming them on the way
/// back. Tokens borrow from the compiled template and from the instance
/// document, both of which outlive any single evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeakPointer<'a> {
    tokens: Vec<WeakToken<'a>>,
}

impl<'a> WeakPointer<'a> {
    pub fn new() -> Self {
        WeakPointer { tokens: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> &[WeakToken<'a>] {
        &self.tokens
    }

    pub fn push(&mut self, token: WeakToken<'a>) {
        self.tokens.push(token);
    }

    /// Appends every token of `pointer`, borrowing its property names.
    /// Returns how many tokens were appended, which is what the caller must
    /// later hand to [`WeakPointer::pop_back`].
    pub fn extend_from(&mut self, pointer: &'a Pointer) -> usize {
        for token in pointer.tokens() {
            self.tokens.push(token.as_weak());
        }
        pointer.len()
    }

    /// Removes the last `count` tokens.
    pub fn pop_back(&mut self, count: usize) {
        debug_assert!(count <= self.tokens.len());
        self.tokens.truncate(self.tokens.len() - count);
    }

    /// The last token, if any.
    pub fn back(&self) -> Option<WeakToken<'a>> {
        self.tokens.last().copied()
    }

    pub fn starts_with(&self, prefix: &Pointer) -> bool {
        let prefix_tokens: &[Token] = prefix.tokens();
        prefix_tokens.len() <= self.tokens.len()
            && prefix_tokens
                .iter()
                .zip(&self.tokens)
                .all(|(own, weak)| own == weak)
    }

    /// An owning copy of the current path.
    pub fn to_pointer(&self) -> Pointer {
        self.tokens.iter().map(|token| token.to_token()).collect()
    }

    /// An owning copy of the current path without its last token.
    pub fn to_parent_pointer(&self) -> Pointer {
        match self.tokens.split_last() {
            Some((_, rest)) => rest.iter().map(|token| token.to_token()).collect(),
            None => Pointer::new(),
        }
    }
}

impl fmt::Display for WeakPointer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            match token {
                WeakToken::Property(name) => write!(f, "/{}", crate::escape_component(name))?,
                WeakToken::Index(index) => write!(f, "/{index}")?,
            }
        }
        Ok(())
    }
}
