use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

/// User written text of a post or comment. Never empty and never surrounded by
/// whitespace.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Content(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Content was empty after trimming")]
pub struct EmptyContentError;

impl Content {
    /// Trims `text`, returning `None` if nothing is left.
    #[must_use]
    pub fn new(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for Content {
    type Error = EmptyContentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(EmptyContentError)
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Content::new(&inner)
            .ok_or_else(|| Error::invalid_value(Unexpected::Str(&inner), &"non-empty content"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::content::{Content, EmptyContentError};

    #[test]
    fn blank_text_is_rejected() {
        assert_eq!(Content::new(""), None);
        assert_eq!(Content::new("   \n\t"), None);
        assert_eq!(Content::try_from(" "), Err(EmptyContentError));
    }

    #[test]
    fn text_is_trimmed() {
        assert_eq!(Content::new("  hello ").unwrap().get(), "hello");
    }
}
