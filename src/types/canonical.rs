//! Canonical references of the form `url` or `url|version`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::resolver::ResolveError;

/// A parsed canonical reference to a Questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Canonical {
    url: String,
    version: Option<String>,
}

impl Canonical {
    pub fn new(url: impl Into<String>, version: Option<String>) -> Self {
        Self {
            url: url.into(),
            version: version.filter(|v| !v.is_empty()),
        }
    }

    pub fn parse(value: &str) -> Result<Self, ResolveError> {
        value.parse()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Whether a document with the given url and version satisfies this reference.
    ///
    /// An unversioned reference accepts any version of the url.
    pub fn matches(&self, url: Option<&str>, version: Option<&str>) -> bool {
        if url != Some(self.url.as_str()) {
            return false;
        }
        match &self.version {
            Some(pinned) => version == Some(pinned.as_str()),
            None => true,
        }
    }

    /// Whether this reference, as written, may resolve to the document
    /// published under `resolved`.
    ///
    /// Urls must be equal. An unversioned reference accepts any version; a
    /// pinned one only the same version. The wildcard applies to `self` only:
    /// an unversioned `resolved` is a document without a version, not "any".
    pub fn refers_to(&self, resolved: &Canonical) -> bool {
        self.url == resolved.url
            && match &self.version {
                Some(pinned) => resolved.version.as_ref() == Some(pinned),
                None => true,
            }
    }
}

impl FromStr for Canonical {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (url, version) = match trimmed.split_once('|') {
            Some((url, version)) => (url.trim(), Some(version.trim().to_string())),
            None => (trimmed, None),
        };

        if url.is_empty() {
            return Err(ResolveError::InvalidCanonical {
                value: s.to_string(),
            });
        }

        Ok(Self::new(url, version))
    }
}

impl fmt::Display for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}|{}", self.url, version),
            None => f.write_str(&self.url),
        }
    }
}

impl Serialize for Canonical {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Canonical {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Order business versions: dotted numeric segments compare numerically,
/// anything else lexically; a missing version sorts lowest.
pub fn compare_versions(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let mut left = a.split('.');
            let mut right = b.split('.');
            loop {
                match (left.next(), right.next()) {
                    (None, None) => return Ordering::Equal,
                    (None, Some(_)) => return Ordering::Less,
                    (Some(_), None) => return Ordering::Greater,
                    (Some(l), Some(r)) => {
                        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                            (Ok(l), Ok(r)) => l.cmp(&r),
                            _ => l.cmp(r),
                        };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                }
            }
        }
    }
}
