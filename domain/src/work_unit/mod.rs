//! Work unit domain.
//!
//! A run's goal is decomposed into [`entities::WorkUnit`]s connected by
//! `depends_on` edges. [`graph`] holds the pure graph algorithms
//! (normalization, cycle extraction, dependency revision) and
//! [`board::UnitBoard`] tracks the mutable per-unit execution state the
//! scheduler owns.

pub mod board;
pub mod entities;
pub mod graph;
pub mod plan_parser;
