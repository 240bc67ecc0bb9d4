//! Error types for cvdmirror-cvd.

use thiserror::Error;

/// Structural failures that abort parsing of a definition file outright.
#[derive(Debug, Error)]
pub enum CvdError {
    #[error("definition truncated: {len} bytes is shorter than the {header_len}-byte header")]
    Truncated { len: usize, header_len: usize },

    #[error("bad definition header: {found} delimited fields, need at least {min}")]
    BadHeader { found: usize, min: usize },
}

/// Per-field defects accumulated while tokenizing a header.
///
/// None of these abort the parse; admission policy decides what to do
/// with a header that carries problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderProblem {
    #[error("unrecognized magic tag `{0}`")]
    BadMagic(String),

    #[error("bad creation time `{0}`")]
    BadTime(String),

    #[error("field `{field}` is not a non-negative integer: `{value}`")]
    BadInteger { field: &'static str, value: String },

    #[error("missing header field `{0}`")]
    MissingField(&'static str),
}
