//! Video identifier.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An 11-character token identifying a third-party video, e.g. a YouTube ID.
///
/// Matches `[A-Za-z0-9_-]{11}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VideoIdError {
    #[error("videoID must be exactly 11 characters, got {0}")]
    WrongLength(usize),
    #[error("videoID contains characters outside [A-Za-z0-9_-]")]
    InvalidCharacters,
}

impl VideoId {
    /// Validate and wrap a video ID token.
    pub fn parse(s: impl Into<String>) -> Result<Self, VideoIdError> {
        let s = s.into();
        if s.len() != 11 {
            return Err(VideoIdError::WrongLength(s.len()));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(VideoIdError::InvalidCharacters);
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VideoId {
    type Err = VideoIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_token() {
        assert!(VideoId::parse("jNQXAC9IVRw").is_ok());
        assert!(VideoId::parse("bdq-IYxhByw").is_ok());
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            VideoId::parse("short"),
            Err(VideoIdError::WrongLength(5))
        );
    }

    #[test]
    fn rejects_invalid_characters() {
        assert_eq!(
            VideoId::parse("abc def ghij"),
            Err(VideoIdError::WrongLength(12))
        );
        assert_eq!(
            VideoId::parse("abc def!ghi"),
            Err(VideoIdError::InvalidCharacters)
        );
    }
}
