//! Registry operations a host may serve
//!
//! Capabilities form a small flag set over pull, resolve and push. A host
//! block that does not list capabilities may serve every operation.

use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::error::HostsError;

/// Set of operations an endpoint is allowed to serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HostCapabilities(u8);

impl HostCapabilities {
    /// Fetch blobs and manifests by digest
    pub const PULL: Self = Self(1 << 0);
    /// Resolve a reference (tag) to a digest
    pub const RESOLVE: Self = Self(1 << 1);
    /// Upload blobs and manifests
    pub const PUSH: Self = Self(1 << 2);

    const NAMED: [(&'static str, Self); 3] = [
        ("pull", Self::PULL),
        ("resolve", Self::RESOLVE),
        ("push", Self::PUSH),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(Self::PULL.0 | Self::RESOLVE.0 | Self::PUSH.0)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Look up a single capability by its exact (case-sensitive) name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, cap)| *cap)
    }

    /// Combine a list of capability names into a flag set
    ///
    /// `host` is only used to give errors their context.
    pub fn from_names<I, S>(host: &str, names: I) -> Result<Self, HostsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut caps = Self::empty();
        for name in names {
            let name = name.as_ref();
            caps |= Self::from_name(name).ok_or_else(|| HostsError::UnknownCapability {
                host: host.to_string(),
                capability: name.to_string(),
            })?;
        }
        Ok(caps)
    }

    /// Names of the capabilities in this set, in pull/resolve/push order
    pub fn names(&self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(_, cap)| self.contains(*cap))
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Read the `capabilities` field of a host block
///
/// An absent field grants every capability; an explicit empty array grants none.
pub(crate) fn parse_capabilities(
    host: &str,
    value: Option<&toml::Value>,
) -> Result<HostCapabilities, HostsError> {
    const EXPECTED: &str = "an array of capability names";

    let Some(value) = value else {
        return Ok(HostCapabilities::all());
    };
    let items = value
        .as_array()
        .ok_or_else(|| HostsError::field_type(host, "capabilities", EXPECTED, value))?;

    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let name = item
            .as_str()
            .ok_or_else(|| HostsError::field_type(host, "capabilities", EXPECTED, item))?;
        names.push(name);
    }
    HostCapabilities::from_names(host, names)
}

impl BitOr for HostCapabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for HostCapabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for HostCapabilities {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for HostCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        write!(f, "{}", self.names().join(","))
    }
}

impl Serialize for HostCapabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}
