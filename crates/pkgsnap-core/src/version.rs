use std::cmp::Ordering;
use std::fmt;

use anyhow::{anyhow, Context, Result};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

/// A package version that remembers how it was spelled.
///
/// Repository and record versions are frequently shorter than full semver
/// (`2.3`), so parsing pads missing numeric components. Comparison uses the
/// padded value; display and identifiers use the original text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageVersion {
    raw: String,
    parsed: Version,
}

impl PackageVersion {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("version must not be empty"));
        }

        let parsed = match Version::parse(trimmed) {
            Ok(version) => version,
            Err(_) => {
                let padded = pad_version(trimmed)
                    .ok_or_else(|| anyhow!("invalid package version: {trimmed}"))?;
                Version::parse(&padded)
                    .with_context(|| format!("invalid package version: {trimmed}"))?
            }
        };

        Ok(Self {
            raw: trimmed.to_string(),
            parsed,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn semver(&self) -> &Version {
        &self.parsed
    }

    pub fn satisfies(&self, requirement: &VersionReq) -> bool {
        requirement.matches(&self.parsed)
    }

    /// Requirement that only this exact version satisfies.
    pub fn exact_requirement(&self) -> VersionReq {
        VersionReq {
            comparators: vec![semver::Comparator {
                op: semver::Op::Exact,
                major: self.parsed.major,
                minor: Some(self.parsed.minor),
                patch: Some(self.parsed.patch),
                pre: self.parsed.pre.clone(),
            }],
        }
    }
}

fn pad_version(raw: &str) -> Option<String> {
    let (core, rest) = match raw.find(['-', '+']) {
        Some(index) => raw.split_at(index),
        None => (raw, ""),
    };
    let parts = core.split('.').collect::<Vec<_>>();
    if parts.is_empty()
        || parts.len() > 3
        || parts
            .iter()
            .any(|part| part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(rest);
    Some(padded)
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.parsed == other.parsed
    }
}

impl Eq for PackageVersion {}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parsed.cmp(&other.parsed)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for PackageVersion {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PackageVersion> for String {
    fn from(value: PackageVersion) -> Self {
        value.raw
    }
}
