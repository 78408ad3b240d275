use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A list name in canonical form: ASCII alphanumerics only, first character
/// upper case, the rest lower case, never empty.
///
/// Lists are addressed by this key both when they are created and when they
/// are looked up, so every raw name has to pass through [`normalize`] first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListName(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidListName {
    #[error("list name {0:?} contains no letters or digits")]
    Empty(String),
    #[error("list name {0:?} is not in normalized form")]
    NotNormalized(String),
}

/// Canonicalizes user input into a [`ListName`].
pub fn normalize(raw: &str) -> Result<ListName, InvalidListName> {
    let kept: String = raw.chars().filter(char::is_ascii_alphanumeric).collect();

    let mut chars = kept.chars();
    let Some(first) = chars.next() else {
        return Err(InvalidListName::Empty(raw.to_owned()));
    };

    let mut name = String::with_capacity(kept.len());
    name.push(first.to_ascii_uppercase());
    name.push_str(&chars.as_str().to_ascii_lowercase());
    Ok(ListName(name))
}

impl ListName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ListName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ListName {
    type Err = InvalidListName;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        normalize(raw)
    }
}

// Stored names must already be canonical; anything else means the document
// was written by something other than this crate.
impl TryFrom<String> for ListName {
    type Error = InvalidListName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let name = normalize(&value)?;
        if name.0 != value {
            return Err(InvalidListName::NotNormalized(value));
        }
        Ok(name)
    }
}

impl From<ListName> for String {
    fn from(name: ListName) -> Self {
        name.0
    }
}
