//! Logging infrastructure: structured run-event logging.
//!
//! Provides [`JsonlRunLogger`], a JSONL file writer that implements
//! the [`RunEventLogger`](cohort_application::RunEventLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlRunLogger;
