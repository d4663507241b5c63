//! Field validation for registry input.
//!
//! Messages read like `"Name can't be blank"`: the field label followed by
//! the complaint. Every check for a record runs before anything is written.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use admiral_core::ID_LENGTH;
use serde::Serialize;

/// Maximum length of names.
pub const NAME_MAX_LENGTH: usize = 36;

/// Field-level validation failures, keyed by camelCase field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    /// Create an empty set of errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded against a field.
    #[must_use]
    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    /// All failures, by field.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    /// `Ok(())` if nothing failed, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one failure was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Require a non-blank value.
    pub fn presence(&mut self, field: &str, value: Option<&str>) {
        if value.map_or(true, |v| v.trim().is_empty()) {
            self.add(field, format!("{} can't be blank", label(field)));
        }
    }

    /// Limit the length of a value, if present.
    pub fn max_length(&mut self, field: &str, value: Option<&str>, maximum: usize) {
        if let Some(value) = value {
            if value.chars().count() > maximum {
                self.add(
                    field,
                    format!("{} is too long (maximum is {maximum} characters)", label(field)),
                );
            }
        }
    }

    /// Require an exact length, if present.
    pub fn exact_length(&mut self, field: &str, value: Option<&str>, length: usize) {
        if let Some(value) = value {
            if value.chars().count() != length {
                self.add(
                    field,
                    format!(
                        "{} is the wrong length (should be {length} characters)",
                        label(field)
                    ),
                );
            }
        }
    }

    /// Require a present, 36-character identifier.
    pub fn id(&mut self, field: &str, value: Option<&str>) {
        self.presence(field, value);
        self.exact_length(field, value, ID_LENGTH);
    }

    /// Parse a value that passed its other checks.
    ///
    /// Returns `None` without recording anything when the value is absent or
    /// the field already failed.
    pub fn parse<T: FromStr>(&mut self, field: &str, value: Option<&str>) -> Option<T> {
        if !self.field(field).is_empty() {
            return None;
        }
        let parsed = value?.parse().ok();
        if parsed.is_none() {
            self.add(field, format!("{} is not a valid identifier", label(field)));
        }
        parsed
    }

    /// Require a count that fits in a `u32`, if present.
    pub fn count(&mut self, field: &str, value: Option<i64>) {
        self.count_at_most(field, value, u32::MAX);
    }

    /// Require a count between 0 and `max`, if present.
    pub fn count_at_most(&mut self, field: &str, value: Option<i64>, max: u32) {
        if let Some(value) = value {
            if value < 0 {
                self.add(
                    field,
                    format!("{} must be greater than or equal to 0", label(field)),
                );
            } else if value > i64::from(max) {
                self.add(
                    field,
                    format!("{} must be less than or equal to {max}", label(field)),
                );
            }
        }
    }

    /// Require a present count.
    pub fn required_count(&mut self, field: &str, value: Option<i64>) {
        if value.is_none() {
            self.add(field, format!("{} can't be blank", label(field)));
        }
        self.count(field, value);
    }

    /// Bound the number of items in a list.
    pub fn item_count(&mut self, field: &str, count: usize, minimum: usize, maximum: usize) {
        if count < minimum {
            self.add(
                field,
                format!("{} is too short (minimum is {minimum})", label(field)),
            );
        } else if count > maximum {
            self.add(
                field,
                format!("{} is too long (maximum is {maximum})", label(field)),
            );
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.values().flatten().map(String::as_str).collect();
        f.write_str(&messages.join("; "))
    }
}

/// `unitFiles` becomes `Unit files`.
fn label(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 2);
    for (i, c) in field.chars().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            out.push(' ');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
