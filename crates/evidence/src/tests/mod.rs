//! Crate-level tests that exercise the pipeline across module boundaries.
