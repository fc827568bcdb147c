mod registry_index;
mod source_store;

pub use registry_index::{ConfiguredRegistryIndex, RegistryIndex};
pub use source_store::{RegistrySourceRecord, RegistrySourceStore};
