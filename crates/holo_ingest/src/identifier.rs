//! Validated SQL identifiers for user-supplied table and column names.
//!
//! An [`Identifier`] is the only value accepted by identifier slots of the SQL
//! builder. Construction enforces the `[A-Za-z0-9_]+` alphabet and PostgreSQL's
//! identifier length so that names round-trip through the catalog unchanged.

use std::borrow::Borrow;
use std::fmt;

/// Longest identifier PostgreSQL stores without truncation (`NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Reason a raw name was rejected as an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierError {
    /// Name has no characters.
    Empty,
    /// Name contains a character outside `[A-Za-z0-9_]`.
    IllegalCharacter(char),
    /// Name is longer than [`MAX_IDENTIFIER_BYTES`].
    TooLong(usize),
}

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name is empty"),
            Self::IllegalCharacter(ch) => write!(f, "character {ch:?} is not allowed"),
            Self::TooLong(len) => write!(
                f,
                "name is {len} bytes long, at most {MAX_IDENTIFIER_BYTES} are allowed"
            ),
        }
    }
}

impl std::error::Error for IdentifierError {}

/// Table or column name that passed identifier validation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Validates `raw` and wraps it as an identifier.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        if raw.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if let Some(ch) = raw
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_'))
        {
            return Err(IdentifierError::IllegalCharacter(ch));
        }
        // Decision: check length after the alphabet so every accepted byte is ASCII
        // and byte length equals character length.
        if raw.len() > MAX_IDENTIFIER_BYTES {
            return Err(IdentifierError::TooLong(raw.len()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Wraps a compile-time name that is known to be inside the identifier alphabet.
    pub(crate) fn from_static(name: &'static str) -> Self {
        debug_assert!(Self::parse(name).is_ok(), "invalid static identifier {name}");
        Self(name.to_string())
    }

    /// Returns the unquoted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name as a double-quoted SQL identifier.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}
