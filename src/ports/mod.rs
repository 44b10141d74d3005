//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the reachability engine and an
//! external system (the hosting API, local `git` mirrors).
//! Implementations live in `src/adapters/`.

pub mod source;
pub mod workflows;

pub use source::{branch_ref, tag_ref, OpenFuture, RepositorySource, SourceFuture, SourceProvider};
pub use workflows::{FetchFuture, WorkflowFetcher};
