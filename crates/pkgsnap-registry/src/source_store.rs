use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One `[[sources]]` entry of `sources.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySourceRecord {
    pub name: String,
    /// Repository root. Relative locations are resolved against the
    /// directory holding `sources.toml`.
    pub location: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default = "source_enabled_default")]
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RegistrySourceStore {
    repos_root: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct SourcesFile {
    version: Option<u32>,
    #[serde(default)]
    sources: Vec<RegistrySourceRecord>,
}

const SOURCES_FILE_VERSION: u32 = 1;

impl RegistrySourceStore {
    pub fn new(repos_root: impl Into<PathBuf>) -> Self {
        Self {
            repos_root: repos_root.into(),
        }
    }

    pub fn sources_file_path(&self) -> PathBuf {
        self.repos_root.join("sources.toml")
    }

    /// Configured sources ordered by priority, then name. A missing
    /// `sources.toml` means no sources.
    pub fn list_sources(&self) -> Result<Vec<RegistrySourceRecord>> {
        let path = self.sources_file_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed reading sources: {}", path.display()));
            }
        };

        let mut sources = parse_sources_file(&content)
            .with_context(|| format!("failed parsing sources: {}", path.display()))?;
        sort_sources(&mut sources);
        Ok(sources)
    }

    pub fn resolve_location(&self, source: &RegistrySourceRecord) -> PathBuf {
        let location = Path::new(&source.location);
        if location.is_absolute() {
            location.to_path_buf()
        } else {
            self.repos_root.join(location)
        }
    }
}

fn parse_sources_file(content: &str) -> Result<Vec<RegistrySourceRecord>> {
    let file: SourcesFile = toml::from_str(content)?;
    if let Some(version) = file.version {
        if version != SOURCES_FILE_VERSION {
            anyhow::bail!(
                "unsupported sources file version {version} (expected {SOURCES_FILE_VERSION})"
            );
        }
    }

    let mut seen = std::collections::HashSet::new();
    for source in &file.sources {
        validate_source_name(&source.name)?;
        if source.location.trim().is_empty() {
            anyhow::bail!("source '{}' has an empty location", source.name);
        }
        if !seen.insert(source.name.as_str()) {
            anyhow::bail!("duplicate source name '{}'", source.name);
        }
    }
    Ok(file.sources)
}

pub(crate) fn sort_sources(sources: &mut [RegistrySourceRecord]) {
    sources.sort_by(|left, right| {
        left.priority
            .cmp(&right.priority)
            .then_with(|| left.name.cmp(&right.name))
    });
}

pub(crate) fn validate_source_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_lowercase() || first.is_ascii_digit())
        && name
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');
    if !valid {
        anyhow::bail!("invalid source name: '{name}'");
    }
    Ok(())
}

fn source_enabled_default() -> bool {
    true
}
