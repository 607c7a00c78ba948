//! Progress reporting

pub mod reporter;

pub use reporter::{ProgressReporter, SimpleProgress, format_event_line};
