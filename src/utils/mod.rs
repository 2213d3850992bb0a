//! Utility functions
//!
//! Process-level helpers shared by the binary and tests.

pub mod logging;
