//! Stage identifiers.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Caller-chosen name of a stage.
///
/// Three names are reserved: [`StageName::START`] is the implicit root every
/// graph begins from, [`StageName::END`] is the terminal join point, and
/// [`StageName::FINAL`] tags the finalizer invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageName(String);

impl StageName {
    /// Name of the implicit root stage. Always satisfied once the run starts.
    pub const START: &'static str = "start";
    /// Name of the terminal stage.
    pub const END: &'static str = "end";
    /// Tag passed to the finalizer.
    pub const FINAL: &'static str = "final";

    /// Creates a stage name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The `start` marker.
    #[must_use]
    pub fn start() -> Self {
        Self::new(Self::START)
    }

    /// The `end` stage.
    #[must_use]
    pub fn end() -> Self {
        Self::new(Self::END)
    }

    /// The `final` tag.
    #[must_use]
    pub fn final_tag() -> Self {
        Self::new(Self::FINAL)
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the `start` marker.
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.0 == Self::START
    }

    /// Returns true for any of the reserved names.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        matches!(self.0.as_str(), Self::START | Self::END | Self::FINAL)
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StageName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for StageName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&String> for StageName {
    fn from(name: &String) -> Self {
        Self(name.clone())
    }
}

impl From<&StageName> for StageName {
    fn from(name: &StageName) -> Self {
        name.clone()
    }
}

impl AsRef<str> for StageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
