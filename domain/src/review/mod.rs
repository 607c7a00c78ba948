//! Review gating: coder escalation, critic re-review and the accept/reject
//! decision taken before any change is applied.

pub mod gate;

pub use gate::{GateDecision, GateInput, decide};
