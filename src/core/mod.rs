//! Core types for the suite pipeline: builder, context, and error handling.

pub mod builder;
pub mod context;
pub mod error;

pub use builder::SuiteBuilder;
pub use context::{Context, RunMode};
pub use error::{Error, Result};
