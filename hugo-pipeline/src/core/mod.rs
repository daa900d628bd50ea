//! Deterministic, pure logic: options, layout, sample sources, and planning.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod options;
pub mod plan;
pub mod sample_code;
