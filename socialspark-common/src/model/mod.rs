pub mod comment;
pub mod content;
pub mod like;
pub mod post;
pub mod user;

use crate::{
    model::{content::EmptyContentError, user::InvalidUserHandleError},
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::NonPositiveDurationError,
};
use derive_where::derive_where;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

/// Rendered in front of provisional keys. Server ids are plain numbers, so the
/// two never collide.
pub const PROVISIONAL_KEY_PREFIX: &str = "tmp-";

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserHandle(#[from] InvalidUserHandleError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    EmptyContent(#[from] EmptyContentError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct SocialsparkEpoch;
impl Epoch for SocialsparkEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type SocialsparkSnowflake = Snowflake<SocialsparkEpoch>;
pub type SocialsparkSnowflakeGenerator = SnowflakeGenerator<SocialsparkEpoch>;

/// A server assigned identifier.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(SocialsparkSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: SocialsparkSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> SocialsparkSnowflake {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(u64::from_str(s)?.into())
    }
}

impl<Marker> From<SocialsparkSnowflake> for Id<Marker> {
    fn from(value: SocialsparkSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(SocialsparkSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

/// A client assigned identifier for an entity that the server has not
/// confirmed yet. Only meaningful within the session that created it.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ProvisionalId<Marker>(u64, PhantomData<Marker>);

impl<Marker> ProvisionalId<Marker> {
    #[must_use]
    pub fn new(sequence: u64) -> Self {
        Self(sequence, PhantomData)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Where an entity lives in the store: either under a provisional id while its
/// creation is in flight, or under its server id.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Key<Marker> {
    Provisional(ProvisionalId<Marker>),
    Confirmed(Id<Marker>),
}

impl<Marker> Key<Marker> {
    #[must_use]
    pub fn is_provisional(self) -> bool {
        matches!(self, Key::Provisional(_))
    }

    #[must_use]
    pub fn confirmed(self) -> Option<Id<Marker>> {
        match self {
            Key::Confirmed(id) => Some(id),
            Key::Provisional(_) => None,
        }
    }
}

impl<Marker> From<Id<Marker>> for Key<Marker> {
    fn from(value: Id<Marker>) -> Self {
        Key::Confirmed(value)
    }
}

impl<Marker> From<ProvisionalId<Marker>> for Key<Marker> {
    fn from(value: ProvisionalId<Marker>) -> Self {
        Key::Provisional(value)
    }
}

impl<Marker> Display for Key<Marker> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Provisional(id) => write!(f, "{PROVISIONAL_KEY_PREFIX}{}", id.get()),
            Key::Confirmed(id) => Display::fmt(id, f),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Invalid entity key {key:?}: {source}")]
pub struct InvalidKeyError {
    key: String,
    source: ParseIntError,
}

impl<Marker> FromStr for Key<Marker> {
    type Err = InvalidKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |source| InvalidKeyError {
            key: s.to_owned(),
            source,
        };

        match s.strip_prefix(PROVISIONAL_KEY_PREFIX) {
            Some(sequence) => Ok(Key::Provisional(ProvisionalId::new(
                sequence.parse().map_err(invalid)?,
            ))),
            None => Ok(Key::Confirmed(s.parse().map_err(invalid)?)),
        }
    }
}

impl<Marker> Serialize for Key<Marker> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de, Marker> Deserialize<'de> for Key<Marker> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        inner.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, Key, ProvisionalId, post::PostMarker};

    #[test]
    fn key_display_keeps_namespaces_apart() {
        let provisional: Key<PostMarker> = ProvisionalId::new(7).into();
        let confirmed: Key<PostMarker> = Id::from(7).into();

        assert_eq!(provisional.to_string(), "tmp-7");
        assert_eq!(confirmed.to_string(), "7");
        assert_ne!(provisional, confirmed);
    }

    #[test]
    fn key_parses_both_forms() {
        assert_eq!(
            "tmp-12".parse::<Key<PostMarker>>(),
            Ok(Key::Provisional(ProvisionalId::new(12)))
        );
        assert_eq!(
            "4096".parse::<Key<PostMarker>>(),
            Ok(Key::Confirmed(Id::from(4096)))
        );
        assert!("tmp-".parse::<Key<PostMarker>>().is_err());
        assert!("post-3".parse::<Key<PostMarker>>().is_err());
    }

    #[test]
    fn key_serializes_as_string() {
        let key: Key<PostMarker> = ProvisionalId::new(3).into();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"tmp-3\"");
        assert_eq!(serde_json::from_str::<Key<PostMarker>>(&json).unwrap(), key);
    }
}
