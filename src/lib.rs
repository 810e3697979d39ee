//! HBNB object store: typed records kept in memory under `<Class>.<id>` keys,
//! persisted as one JSON document, driven by a line-oriented console.

pub mod codec;
pub mod console;
pub mod key;
pub mod record;
pub mod store;
pub mod types;

pub type Result<T> = anyhow::Result<T>;

pub use codec::{Decoded, SkippedRecord};
pub use console::{CommandError, Console, Flow};
pub use key::{composite_key, key_tag, split_key};
pub use record::Record;
pub use store::{
    DEFAULT_STORE_FILE, ObjectStore, ReloadReport, derive_store_path, ensure_parent_dirs,
};
pub use types::TypeTag;
