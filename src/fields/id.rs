//! Field identifiers.
//!
//! The set of fields is fixed at process start: `f1` through `fN`. Anything
//! outside that set is rejected as invalid input.

use super::error::{FieldError, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub const DEFAULT_FIELD_COUNT: u8 = 12;
pub const MAX_FIELD_COUNT: u8 = 64;

/// Identifier keyword accepted by `reset` to address every field.
pub const ALL_FIELDS: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldId(u8);

impl FieldId {
    #[must_use]
    pub fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

impl FromStr for FieldId {
    type Err = FieldError;

    /// Syntactic parse only; membership in a [`FieldSet`] is checked by
    /// [`FieldSet::parse`].
    fn from_str(value: &str) -> Result<Self> {
        let digits = value
            .strip_prefix('f')
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| FieldError::invalid(format!("unknown field id: {value}")))?;
        // "f01" is not the same slot as "f1"
        if digits.starts_with('0') {
            return Err(FieldError::invalid(format!("unknown field id: {value}")));
        }
        digits
            .parse::<u8>()
            .map(FieldId)
            .map_err(|_| FieldError::invalid(format!("unknown field id: {value}")))
    }
}

impl TryFrom<String> for FieldId {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FieldId> for String {
    fn from(id: FieldId) -> Self {
        id.to_string()
    }
}

/// The fixed, enumerable set of known fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSet {
    count: u8,
}

impl Default for FieldSet {
    fn default() -> Self {
        Self {
            count: DEFAULT_FIELD_COUNT,
        }
    }
}

impl FieldSet {
    /// # Errors
    /// Returns `InvalidInput` if `count` is zero or above [`MAX_FIELD_COUNT`].
    pub fn new(count: u8) -> Result<Self> {
        if count == 0 || count > MAX_FIELD_COUNT {
            return Err(FieldError::invalid(format!(
                "field count must be between 1 and {MAX_FIELD_COUNT}, got {count}"
            )));
        }
        Ok(Self { count })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.count)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub fn contains(&self, id: FieldId) -> bool {
        (1..=self.count).contains(&id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = FieldId> {
        (1..=self.count).map(FieldId)
    }

    /// Parse and check membership.
    ///
    /// # Errors
    /// Returns `InvalidInput` for malformed ids and ids outside the set.
    pub fn parse(&self, value: &str) -> Result<FieldId> {
        let id: FieldId = value.trim().parse()?;
        if self.contains(id) {
            Ok(id)
        } else {
            Err(FieldError::invalid(format!("unknown field id: {value}")))
        }
    }
}
