//! Local-disk thumbnail storage: path layout, image/title read and write,
//! latest-thumbnail lookup, and the last-used index touched on every
//! successful read.

pub mod error;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use store::{ThumbnailRead, ThumbnailStore, IMAGE_EXT, LAST_USED_KEY, META_EXT, MIN_IMAGE_BYTES};
