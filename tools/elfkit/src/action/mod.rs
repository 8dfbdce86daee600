//! Implementations of the [`Action`][action]s.
//!
//! [action]: crate::cli::Action

pub mod generate;
pub mod parse;
