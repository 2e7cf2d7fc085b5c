use std::fmt;
use std::sync::OnceLock;

use crate::token::{Token, WeakToken};
use crate::weak::WeakPointer;
use crate::{unescape_component, PointerError};

/// An owning JSON Pointer path.
///
/// This is the storable flavor: annotation-store keys, the location
/// metadata stamped on compiled steps, and mask entries are all `Pointer`s.
/// The evaluation cursor itself is a [`WeakPointer`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pointer {
    tokens: Vec<Token>,
}

/// The empty pointer, for steps that contribute no path of their own.
pub fn empty_pointer() -> &'static Pointer {
    static EMPTY: OnceLock<Pointer> = OnceLock::new();
    EMPTY.get_or_init(Pointer::new)
}

impl Pointer {
    pub fn new() -> Self {
        Pointer { tokens: Vec::new() }
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Pointer { tokens }
    }

    /// Parse a JSON Pointer string.
    ///
    /// Every component becomes a [`Token::Property`]; whether a component
    /// addresses an array index can only be decided against a document, so
    /// that disambiguation is left to the lookup site.
    ///
    /// ```
    /// use jsonschema_vm_pointer::Pointer;
    ///
    /// assert!(Pointer::parse("").unwrap().is_empty());
    /// let p = Pointer::parse("/a~1b/c").unwrap();
    /// assert_eq!(p.to_string(), "/a~1b/c");
    /// assert!(Pointer::parse("no-slash").is_err());
    /// ```
    pub fn parse(pointer: &str) -> Result<Self, PointerError> {
        if pointer.is_empty() {
            return Ok(Pointer::new());
        }
        if !pointer.starts_with('/') {
            return Err(PointerError::MissingSlash(pointer.to_string()));
        }
        Ok(Pointer {
            tokens: pointer[1..]
                .split('/')
                .map(|component| Token::Property(unescape_component(component)))
                .collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    pub fn pop(&mut self) -> Option<Token> {
        self.tokens.pop()
    }

    /// The last token, if any.
    pub fn back(&self) -> Option<&Token> {
        self.tokens.last()
    }

    /// Everything but the last token. The initial of the empty pointer is
    /// the empty pointer.
    pub fn initial(&self) -> Pointer {
        match self.tokens.split_last() {
            Some((_, rest)) => Pointer {
                tokens: rest.to_vec(),
            },
            None => Pointer::new(),
        }
    }

    /// This pointer followed by every token of `suffix`.
    pub fn concat(&self, suffix: &Pointer) -> Pointer {
        let mut tokens = Vec::with_capacity(self.tokens.len() + suffix.tokens.len());
        tokens.extend_from_slice(&self.tokens);
        tokens.extend_from_slice(&suffix.tokens);
        Pointer { tokens }
    }

    /// This pointer with one more token appended.
    pub fn join(&self, token: impl Into<Token>) -> Pointer {
        let mut tokens = Vec::with_capacity(self.tokens.len() + 1);
        tokens.extend_from_slice(&self.tokens);
        tokens.push(token.into());
        Pointer { tokens }
    }

    pub fn starts_with(&self, prefix: &Pointer) -> bool {
        prefix.tokens.len() <= self.tokens.len()
            && self.tokens[..prefix.tokens.len()] == prefix.tokens[..]
    }

    /// Prefix test against the live cursor, without materializing it.
    pub fn starts_with_weak(&self, prefix: &WeakPointer<'_>) -> bool {
        let prefix_tokens: &[WeakToken<'_>] = prefix.tokens();
        prefix_tokens.len() <= self.tokens.len()
            && self.tokens[..prefix_tokens.len()]
                .iter()
                .zip(prefix_tokens)
                .all(|(own, weak)| own == weak)
    }

    /// Renders as a URI fragment (`#/a/b`), for keyword locations.
    pub fn to_fragment(&self) -> String {
        format!("#{self}")
    }
}

impl FromIterator<Token> for Pointer {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Pointer {
            tokens: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{token}")?;
        }
        Ok(())
    }
}
