//! Voxel state file (`.ccst`) reading and writing.

pub mod format;
pub mod load;
pub mod save;

pub use cascade_core::error::FormatError;
pub use format::{StateHeader, HEADER_SIZE, MAGIC};
pub use load::{decode, load};
pub use save::{encode, save};
