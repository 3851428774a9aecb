//! Self-validating value objects.
//!
//! Every constructor runs [`ValueObject::validate`] before handing out an
//! instance, and deserialization goes through the same constructors, so an
//! invalid value cannot be observed. Equality is structural.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValidationError;

/// Construction-time invariant shared by all value objects
pub trait ValueObject: Sized {
    fn validate(&self) -> Result<(), ValidationError>;

    /// Run `validate` and return the instance only if it passes
    fn validated(self) -> Result<Self, ValidationError> {
        self.validate()?;
        Ok(self)
    }
}

/// Platform-imposed shape of an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdFormat {
    /// Any non-empty string
    Any,

    /// ASCII digits only (Pinterest pins, tweets)
    Numeric,

    /// `[A-Za-z0-9_-]+` (Instagram shortcodes, Unsplash ids)
    Slug,

    /// A slug of exactly this many characters (YouTube video ids)
    FixedSlug(usize),
}

impl IdFormat {
    pub fn check(&self, field: &str, value: &str) -> Result<(), ValidationError> {
        let is_slug_char = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';

        match *self {
            IdFormat::Any => Ok(()),
            IdFormat::Numeric => {
                if value.chars().all(|c| c.is_ascii_digit()) {
                    Ok(())
                } else {
                    Err(ValidationError::new(field, format!("'{}' must be numeric", value)))
                }
            }
            IdFormat::Slug => {
                if value.chars().all(is_slug_char) {
                    Ok(())
                } else {
                    Err(ValidationError::new(
                        field,
                        format!("'{}' may only contain letters, digits, '_' and '-'", value),
                    ))
                }
            }
            IdFormat::FixedSlug(len) => {
                IdFormat::Slug.check(field, value)?;
                if value.chars().count() == len {
                    Ok(())
                } else {
                    Err(ValidationError::new(
                        field,
                        format!("'{}' must be exactly {} characters", value, len),
                    ))
                }
            }
        }
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must be a non-empty string"));
    }
    Ok(())
}

macro_rules! string_value {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                Self(value.into()).validated()
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

string_value!(
    /// Platform-scoped identifier of a captured artifact
    ContentId
);

string_value!(
    /// Identifier of the originating account
    OwnerId
);

string_value!(
    /// Absolute http(s) URL of a remote media resource
    MediaUrl
);

string_value!(
    /// Where the consumer stored a downloaded file
    LocalPath
);

impl ValueObject for ContentId {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("id", &self.0)
    }
}

impl ContentId {
    /// Build an id that must also satisfy a platform format
    pub fn with_format(value: impl Into<String>, format: IdFormat) -> Result<Self, ValidationError> {
        let id = Self::new(value)?;
        format.check("id", id.as_str())?;
        Ok(id)
    }
}

impl ValueObject for OwnerId {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("ownerId", &self.0)
    }
}

impl ValueObject for MediaUrl {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("url", &self.0)?;
        let rest = self
            .0
            .strip_prefix("https://")
            .or_else(|| self.0.strip_prefix("http://"))
            .ok_or_else(|| ValidationError::new("url", format!("'{}' is not an http(s) URL", self.0)))?;

        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.is_empty() || rest.chars().any(char::is_whitespace) {
            return Err(ValidationError::new("url", format!("'{}' is not a valid URL", self.0)));
        }
        Ok(())
    }
}

impl ValueObject for LocalPath {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("localPath", &self.0)?;
        if self.0.contains('\0') {
            return Err(ValidationError::new("localPath", "must not contain NUL bytes"));
        }
        Ok(())
    }
}

/// Correlates events across the extension / job-queue boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CorrelationId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDimensions")]
pub struct Dimensions {
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct RawDimensions {
    width: u32,
    height: u32,
}

impl TryFrom<RawDimensions> for Dimensions {
    type Error = ValidationError;

    fn try_from(raw: RawDimensions) -> Result<Self, Self::Error> {
        Self::new(raw.width, raw.height)
    }
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Result<Self, ValidationError> {
        Self { width, height }.validated()
    }

    /// Build from optional raw numbers; both or neither must be present
    pub fn from_raw(width: Option<i64>, height: Option<i64>) -> Result<Option<Self>, ValidationError> {
        match (width, height) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(ValidationError::missing("height")),
            (None, Some(_)) => Err(ValidationError::missing("width")),
            (Some(w), Some(h)) => {
                let width = u32::try_from(w)
                    .map_err(|_| ValidationError::new("width", format!("{} is out of range", w)))?;
                let height = u32::try_from(h)
                    .map_err(|_| ValidationError::new("height", format!("{} is out of range", h)))?;
                Self::new(width, height).map(Some)
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

impl ValueObject for Dimensions {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.width == 0 {
            return Err(ValidationError::new("width", "must be positive"));
        }
        if self.height == 0 {
            return Err(ValidationError::new("height", "must be positive"));
        }
        Ok(())
    }
}

/// Normalized hashtag set: no leading '#', lowercase, first occurrence wins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.as_ref().trim().trim_start_matches('#').to_lowercase();
            if !tag.is_empty() && !normalized.contains(&tag) {
                normalized.push(tag);
            }
        }
        Self(normalized)
    }

    /// Pull `#hashtags` out of free text
    pub fn from_text(text: &str) -> Self {
        Self::new(
            text.split_whitespace()
                .filter(|word| word.starts_with('#'))
                .map(|word| word.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_')),
        )
    }

    pub fn contains(&self, tag: &str) -> bool {
        let tag = tag.trim_start_matches('#').to_lowercase();
        self.0.contains(&tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Union with another set, keeping this set's order first
    pub fn merged(&self, other: &Tags) -> Self {
        Self::new(self.iter().chain(other.iter()))
    }
}

impl From<Vec<String>> for Tags {
    fn from(value: Vec<String>) -> Self {
        Self::new(value)
    }
}

impl From<Tags> for Vec<String> {
    fn from(value: Tags) -> Self {
        value.0
    }
}

/// Convert a raw counter, rejecting negatives by field name
pub fn counter(field: &str, raw: Option<i64>) -> Result<u64, ValidationError> {
    match raw {
        None => Ok(0),
        Some(n) if n < 0 => Err(ValidationError::new(field, format!("{} must not be negative", n))),
        Some(n) => Ok(n as u64),
    }
}

/// Require an optional raw string, naming the field when absent
pub fn required(field: &str, raw: Option<String>) -> Result<String, ValidationError> {
    match raw {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ValidationError::missing(field)),
    }
}

/// Parse an optional raw URL, re-targeting errors at `field`
pub fn optional_url(field: &str, raw: Option<String>) -> Result<Option<MediaUrl>, ValidationError> {
    raw.map(|url| MediaUrl::new(url).map_err(|e| e.for_field(field)))
        .transpose()
}

/// Parse a required raw URL
pub fn required_url(field: &str, raw: Option<String>) -> Result<MediaUrl, ValidationError> {
    MediaUrl::new(required(field, raw)?).map_err(|e| e.for_field(field))
}

/// Reject text longer than `max` characters
pub fn bounded_text(field: &str, text: &str, max: usize) -> Result<(), ValidationError> {
    let len = text.chars().count();
    if len > max {
        return Err(ValidationError::new(
            field,
            format!("{} characters exceeds the limit of {}", len, max),
        ));
    }
    Ok(())
}
