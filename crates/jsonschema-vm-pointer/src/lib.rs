//! JSON Pointer (RFC 6901) paths in two flavors.
//!
//! The schema evaluator needs the same path in two shapes:
//!
//! - [`Pointer`] owns its tokens. It is `Eq + Hash + Ord` and is what gets
//!   stored: annotation-store keys, the location metadata stamped on
//!   compiled steps, and mask entries.
//! - [`WeakPointer`] borrows its tokens from pointers and documents that
//!   outlive it. It is the live cursor an evaluation grows and shrinks
//!   thousands of times per call, so it never copies a property name.
//!
//! Unlike a plain string path, a token distinguishes object properties from
//! array indexes, so `/foo/0` into `{"foo": {"0": 1}}` and into
//! `{"foo": [1]}` are different paths.
//!
//! # Example
//!
//! ```
//! use jsonschema_vm_pointer::{Pointer, Token, WeakPointer};
//!
//! let owned = Pointer::from_tokens(vec![Token::from("a/b"), Token::from(2)]);
//! assert_eq!(owned.to_string(), "/a~1b/2");
//!
//! let mut cursor = WeakPointer::new();
//! cursor.extend_from(&owned);
//! assert!(cursor.starts_with(&owned));
//! assert_eq!(cursor.to_pointer(), owned);
//! ```

use thiserror::Error;

mod pointer;
mod token;
mod weak;

pub use pointer::{empty_pointer, Pointer};
pub use token::{Token, WeakToken};
pub use weak::WeakPointer;

/// Errors produced when parsing a JSON Pointer string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointerError {
    #[error("a non-empty JSON Pointer must start with '/': {0}")]
    MissingSlash(String),
}

/// Unescapes a JSON Pointer path component.
///
/// Per RFC 6901, `~1` is replaced with `/` and `~0` is replaced with `~`.
pub fn unescape_component(component: &str) -> String {
    if !component.contains('~') {
        return component.to_string();
    }
    // Order matters: ~1 must be replaced before ~0
    component.replace("~1", "/").replace("~0", "~")
}

/// Escapes a JSON Pointer path component.
///
/// Per RFC 6901, `/` is replaced with `~1` and `~` is replaced with `~0`.
pub fn escape_component(component: &str) -> String {
    if !component.contains('/') && !component.contains('~') {
        return component.to_string();
    }
    // Order matters: ~ must be escaped before /
    component.replace('~', "~0").replace('/', "~1")
}

/// Builds a [`Pointer`] out of property and index literals.
///
/// ```
/// use jsonschema_vm_pointer::{pointer, Pointer, Token};
///
/// let p: Pointer = pointer!["properties", "foo"];
/// assert_eq!(p.to_string(), "/properties/foo");
/// assert_eq!(pointer![], Pointer::new());
/// ```
#[macro_export]
macro_rules! pointer {
    () => { $crate::Pointer::new() };
    ($($token:expr),+ $(,)?) => {
        $crate::Pointer::from_tokens(vec![$($crate::Token::from($token)),+])
    };
}
