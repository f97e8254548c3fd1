//! Filesystem helpers.

pub mod fs;

pub use fs::ensure_dir_exists;
