//! Subagent roles and their structured outputs.
//!
//! Six reasoning roles participate in a run. Each returns exactly one JSON
//! object, which is extracted from the raw model text by
//! [`parsing::extract_json_object`] and decoded into the role's schema type
//! from [`outputs`].

pub mod outputs;
pub mod parsing;
pub mod role;
