use glob::{MatchOptions, Pattern};
use pkgsnap_core::PkgSnapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Install,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobFlags {
    pub dry_run: bool,
    /// An installed package counts as satisfying a target when its version
    /// is at least the requested one, instead of exactly equal.
    pub version_test: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStyle {
    /// Shell-style wildcards against `name-version` and `name`.
    Glob,
    /// The target text must equal `name-version` or `name`.
    Exact,
}

#[derive(Debug, Clone)]
pub struct JobTarget {
    raw: String,
    pattern: Pattern,
}

impl JobTarget {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `name` or `name-version` is selected by this target.
    pub fn matches(&self, name: &str, version: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.pattern.matches_with(name, options)
            || self
                .pattern
                .matches_with(&format!("{name}-{version}"), options)
    }
}

/// One installation request: the targets and flags for a single
/// solve/apply cycle. Built fresh for every attempt.
#[derive(Debug, Clone)]
pub struct JobSet {
    kind: JobKind,
    flags: JobFlags,
    targets: Vec<JobTarget>,
}

impl JobSet {
    pub fn new(kind: JobKind, flags: JobFlags) -> Self {
        Self {
            kind,
            flags,
            targets: Vec::new(),
        }
    }

    /// Appends targets in order; duplicates are kept. Nothing is added when
    /// any target is not a valid pattern.
    pub fn add<I, S>(&mut self, style: MatchStyle, targets: I) -> Result<(), PkgSnapError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for target in targets {
            let raw = target.as_ref();
            if raw.trim().is_empty() {
                return Err(PkgSnapError::parse("empty package target"));
            }
            let pattern = match style {
                MatchStyle::Glob => Pattern::new(raw)
                    .map_err(|err| PkgSnapError::parse(format!("invalid target '{raw}': {err}")))?,
                MatchStyle::Exact => Pattern::new(&Pattern::escape(raw))
                    .map_err(|err| PkgSnapError::parse(format!("invalid target '{raw}': {err}")))?,
            };
            parsed.push(JobTarget {
                raw: raw.to_string(),
                pattern,
            });
        }
        self.targets.extend(parsed);
        Ok(())
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn flags(&self) -> JobFlags {
        self.flags
    }

    pub fn targets(&self) -> &[JobTarget] {
        &self.targets
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
