//! Live adapters for real external interactions.

pub mod github;
pub mod mirror;
