//! Data models for the team directory.

mod member;

pub use member::*;
