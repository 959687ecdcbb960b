//! URL slugs for products, brands, categories and attributes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// Nothing usable was left after normalization.
    #[error("slug cannot be empty")]
    Empty,
    /// The slug is longer than [`Slug::MAX_LENGTH`].
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The slug contains characters other than `a-z`, `0-9` and `-`.
    #[error("slug may only contain lowercase letters, digits and dashes")]
    InvalidCharacters,
}

/// A lowercase, dash-separated URL segment such as `blue-widget-2`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Maximum slug length.
    pub const MAX_LENGTH: usize = 120;

    /// Build a slug from a display name.
    ///
    /// ```
    /// use emporium_core::Slug;
    ///
    /// let slug = Slug::from_name("  Café Crème -- 500g!").unwrap();
    /// assert_eq!(slug.as_str(), "caf-cr-me-500g");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] when the name has no ASCII letters or digits.
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        let mut pending_dash = false;

        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }

        if out.is_empty() {
            return Err(SlugError::Empty);
        }
        out.truncate(Self::MAX_LENGTH);
        let trimmed = out.trim_end_matches('-').to_owned();
        Ok(Self(trimmed))
    }

    /// Parse an already-formed slug, rejecting anything `from_name` would change.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] when the input is empty, too long or malformed.
    pub fn parse(input: &str) -> Result<Self, SlugError> {
        if input.is_empty() {
            return Err(SlugError::Empty);
        }
        if input.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        let valid_chars = input
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_chars || input.starts_with('-') || input.ends_with('-') || input.contains("--")
        {
            return Err(SlugError::InvalidCharacters);
        }
        Ok(Self(input.to_owned()))
    }

    /// Use `explicit` when present and non-blank, otherwise derive from `name`.
    ///
    /// # Errors
    ///
    /// Propagates the error from [`Slug::parse`] or [`Slug::from_name`].
    pub fn explicit_or_from(explicit: Option<&str>, name: &str) -> Result<Self, SlugError> {
        match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => Self::parse(slug),
            None => Self::from_name(name),
        }
    }

    /// The slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_collapses_separators() {
        assert_eq!(
            Slug::from_name("Trail Runner  X/2").unwrap().as_str(),
            "trail-runner-x-2"
        );
        assert_eq!(Slug::from_name("--Hello--").unwrap().as_str(), "hello");
    }

    #[test]
    fn test_from_name_empty() {
        assert_eq!(Slug::from_name("!!!"), Err(SlugError::Empty));
        assert_eq!(Slug::from_name(""), Err(SlugError::Empty));
    }

    #[test]
    fn test_from_name_truncates() {
        let slug = Slug::from_name(&"a ".repeat(200)).unwrap();
        assert!(slug.as_str().len() <= Slug::MAX_LENGTH);
        assert!(!slug.as_str().ends_with('-'));
    }

    #[test]
    fn test_parse_strict() {
        assert!(Slug::parse("red-shoe").is_ok());
        assert_eq!(Slug::parse("Red-Shoe"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("red--shoe"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("-red"), Err(SlugError::InvalidCharacters));
    }

    #[test]
    fn test_explicit_or_from() {
        assert_eq!(
            Slug::explicit_or_from(Some("custom"), "Ignored Name")
                .unwrap()
                .as_str(),
            "custom"
        );
        assert_eq!(
            Slug::explicit_or_from(Some("  "), "Derived Name")
                .unwrap()
                .as_str(),
            "derived-name"
        );
        assert_eq!(
            Slug::explicit_or_from(None, "Derived").unwrap().as_str(),
            "derived"
        );
    }
}
