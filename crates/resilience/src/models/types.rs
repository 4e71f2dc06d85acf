use std::borrow::Cow;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Provider identifier - mostly static constants ("cdc", "who", ...)
pub type ProviderId = Cow<'static, str>;

/// One entry of a fallback chain.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum SourceId {
    /// A live collaborator, queried directly.
    Provider(ProviderId),
    /// The most recent cached result across collaborators.
    Cache,
    /// A synthesized zero-valued result.
    Placeholder,
}

impl SourceId {
    pub fn provider(id: impl Into<ProviderId>) -> Self {
        Self::Provider(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Provider(id) => id.as_ref(),
            Self::Cache => "cache",
            Self::Placeholder => "placeholder",
        }
    }

    /// Whether this entry names the given provider.
    pub fn is_provider(&self, provider: &str) -> bool {
        matches!(self, Self::Provider(id) if id.as_ref() == provider)
    }
}

impl FromStr for SourceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "cache" => Self::Cache,
            "placeholder" => Self::Placeholder,
            other => Self::Provider(Cow::Owned(other.to_string())),
        })
    }
}

impl From<&'static str> for SourceId {
    fn from(s: &'static str) -> Self {
        match s {
            "cache" => Self::Cache,
            "placeholder" => Self::Placeholder,
            other => Self::Provider(Cow::Borrowed(other)),
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_else(|never| match never {}))
    }
}
