//! Text primitives shared across the roster crates.
//!
//! Clinic exports are hand-typed, so identifiers and names arrive with stray padding and
//! doubled spaces. Everything that takes part in identity matching goes through
//! [`normalise_whitespace`] first, and anything that must never be blank is carried as a
//! [`NonEmptyText`].

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string type that guarantees non-empty content.
///
/// The input is normalised with [`normalise_whitespace`] during construction, so two
/// values that differ only in padding or internal spacing compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] if the normalised input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let normalised = normalise_whitespace(input.as_ref());
        if normalised.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(normalised))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Trims the input and collapses every internal run of whitespace to a single space.
///
/// Case is preserved: matching on names is exact apart from spacing.
pub fn normalise_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds the `<base>-<position>` identifier used when one identifier has to be split
/// across several people. `position` is 1-based.
pub fn suffixed_id(base: &str, position: usize) -> String {
    format!("{base}-{position}")
}
