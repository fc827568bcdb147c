use std::io::{self, Write};

use serde_json::Value;

use crate::{PackageId, PkgSnapError};

/// Ordered list of package identifiers captured at one point in time.
///
/// Order and duplicates are kept exactly as produced so that a restore
/// replays the same targets in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    packages: Vec<PackageId>,
}

impl Snapshot {
    pub fn new(packages: Vec<PackageId>) -> Self {
        Self { packages }
    }

    pub fn packages(&self) -> &[PackageId] {
        &self.packages
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageId> {
        self.packages.iter()
    }
}

impl FromIterator<PackageId> for Snapshot {
    fn from_iter<T: IntoIterator<Item = PackageId>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Parses a snapshot document.
///
/// The top level must be an array and every element a string; anything else
/// rejects the whole document.
pub fn parse_snapshot(source: &str) -> Result<Snapshot, PkgSnapError> {
    let value: Value = serde_json::from_str(source)
        .map_err(|err| PkgSnapError::parse(format!("invalid document: {err}")))?;

    let Value::Array(elements) = value else {
        return Err(PkgSnapError::parse(format!(
            "expected an array of package identifiers, found {}",
            describe_value(&value)
        )));
    };

    let mut packages = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        match element {
            Value::String(raw) => packages.push(PackageId::new(raw)),
            other => {
                return Err(PkgSnapError::parse(format!(
                    "element {index} is {}, expected a string",
                    describe_value(&other)
                )));
            }
        }
    }

    Ok(Snapshot::new(packages))
}

/// Writes `snapshot` as a JSON array followed by a newline.
///
/// Durability of the sink (sync and close) is the caller's concern.
pub fn write_snapshot<W: Write>(snapshot: &Snapshot, mut sink: W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut sink, &snapshot.packages).map_err(io::Error::from)?;
    sink.write_all(b"\n")?;
    sink.flush()
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
