//! Course progress tracking and badge awards for a learning platform.
//!
//! The [`domain`] module holds the progress pipeline and the ports it
//! depends on. [`outbound`] provides the PostgreSQL and in-memory adapters,
//! and [`config`] loads runtime settings for the `lms-progress` binary.

pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
