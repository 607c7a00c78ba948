//! Workspace filesystem adapter.

pub mod file_store;
pub mod walk;

pub use file_store::LocalFileStore;
