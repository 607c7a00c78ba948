//! Model conversation messages.

pub mod entities;
