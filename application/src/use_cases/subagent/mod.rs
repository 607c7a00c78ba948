//! Subagent invocation: model routing, JSON parsing with corrective retries
//! and the shared cache for idempotent roles.

pub mod cache;
pub mod caller;

pub use cache::{SubagentCache, cache_key};
pub use caller::{SubagentCall, SubagentCaller, SubagentError, SubagentResponse};
