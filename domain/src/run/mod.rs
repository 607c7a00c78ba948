//! Run-level domain: status derivation, failure categories,
//! clarification gating and continuation packets.

pub mod clarification;
pub mod continuation;
pub mod failure;
pub mod status;
