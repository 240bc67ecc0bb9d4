//! Mirror selection and HTTP retrieval of definition artifacts.
//!
//! # Key Features
//!
//! - **Trait-abstracted client**: [`HttpClient`] keeps the pipeline
//!   testable without a network; [`MirrorClient`] is the reqwest-backed
//!   production implementation
//! - **Run-scoped mirror selection**: candidates are probed once with a
//!   short timeout and the winner is fixed for the whole run
//! - **Per-artifact failure scope**: a bad status or transport error
//!   fails one artifact's sub-chain, never the run

pub use self::artifact::{ArtifactDescriptor, ArtifactKind, DbType};
pub use self::error::FetchError;
pub use reqwest::StatusCode;
pub use self::http::{HttpClient, MirrorClient, Timeouts, USER_AGENT};
pub use self::mirror::select_mirror;

mod artifact;
mod error;
mod http;
mod mirror;

pub type Result<T> = std::result::Result<T, FetchError>;
