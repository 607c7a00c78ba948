//! File-backed state kept between runs.
//!
//! | Adapter            | File                            |
//! |--------------------|---------------------------------|
//! | [`JsonCacheStore`] | `.cohort/subagent-cache.json`   |
//! | [`JsonMemoryStore`]| `.cohort/memory.json`           |

pub mod cache_store;
mod json_file;
pub mod memory_store;

pub use cache_store::JsonCacheStore;
pub use memory_store::JsonMemoryStore;
