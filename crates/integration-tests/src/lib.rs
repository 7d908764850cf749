//! quorum/crates/integration-tests/src/lib.rs
//!
//! Cross-crate behavioral tests wiring the real services to the
//! in-memory adapters. All tests live under `tests/`; this library
//! target exists only so cargo treats the crate as a package.
