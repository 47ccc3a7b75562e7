//!
//! Engine API version negotiation.
//!
//! The engine reports its version as `MAJOR.MINOR.PATCH` followed by a
//! release letter and optional free text, e.g. `11.0.5A` or
//! `11.0.6B reference build`. Versions order by the numeric triple and then
//! by the letter.
//!

use std::cmp::Ordering;
use std::fmt;

use crate::error::BridgeError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub release: char,
}

/// Oldest engine this layer talks to.
pub const MIN_SUPPORTED: ApiVersion = ApiVersion {
    major: 11,
    minor: 0,
    patch: 5,
    release: 'A',
};

/// Capability tier derived from the engine version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeatureLevel {
    /// Exactly the minimum supported release.
    Base = 1,
    /// Any newer release.
    Current = 2,
}

impl ApiVersion {
    pub fn parse(text: &str) -> Result<ApiVersion, BridgeError> {
        let malformed = || BridgeError::MalformedVersion(text.to_string());
        let head = text.split_whitespace().next().ok_or_else(malformed)?;

        let mut parts = head.splitn(3, '.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(malformed)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(malformed)?;
        let last = parts.next().ok_or_else(malformed)?;

        let digits = last.find(|c: char| !c.is_ascii_digit()).unwrap_or(last.len());
        let patch = last[..digits].parse().map_err(|_| malformed())?;
        let release = last[digits..]
            .chars()
            .next()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('A');

        Ok(ApiVersion {
            major,
            minor,
            patch,
            release,
        })
    }

    pub fn is_supported(&self) -> bool {
        *self >= MIN_SUPPORTED
    }

    pub fn feature_level(&self) -> Option<FeatureLevel> {
        match self.cmp(&MIN_SUPPORTED) {
            Ordering::Less => None,
            Ordering::Equal => Some(FeatureLevel::Base),
            Ordering::Greater => Some(FeatureLevel::Current),
        }
    }

    /// Parses `text` and rejects versions older than `MIN_SUPPORTED`.
    pub fn require_supported(text: &str) -> Result<ApiVersion, BridgeError> {
        let version = ApiVersion::parse(text)?;
        if !version.is_supported() {
            return Err(BridgeError::UnsupportedVersion {
                found: version.to_string(),
                required: MIN_SUPPORTED.to_string(),
            });
        }
        Ok(version)
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, self.release).cmp(&(
            other.major,
            other.minor,
            other.patch,
            other.release,
        ))
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}{}", self.major, self.minor, self.patch, self.release)
    }
}
