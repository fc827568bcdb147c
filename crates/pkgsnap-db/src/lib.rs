mod cache;
mod database;
mod fs_utils;
mod layout;
mod lock;
mod records;
mod snapshot;

pub use cache::{reconcile_cache, CacheReport};
pub use database::{AccessMode, PackageDb};
pub use fs_utils::write_file_durably;
pub use layout::{default_root, DatabaseLayout};
pub use lock::DbLock;
pub use records::{InstallReason, InstallRecord};
pub use snapshot::read_installed;
