//! ClamAV CVD container format: header parsing and integrity validation.
//!
//! A definition file is a fixed 512-byte ASCII header (colon-delimited,
//! space-padded) followed by a variable-length binary body. This crate
//! splits the two, tokenizes the header, and checks the body against the
//! header's integrity claims.
//!
//! # Key Features
//!
//! - **Collect-all-errors parsing**: per-field failures accumulate into
//!   [`CvdHeader::problems`] instead of aborting, so every defect in a
//!   malformed header is visible at once
//! - **Binding checksum**: MD5 over the body only, compared against the
//!   header claim
//! - **Advisory signature**: the vendor's RSA-style scheme, isolated in
//!   [`dsig`] so it can be replaced or disabled without touching parsing

pub use self::error::{CvdError, HeaderProblem};
pub use self::header::{CvdFile, CvdHeader, HEADER_LEN, MAGIC, split};
pub use self::validate::{ValidationReport, body_digest, validate};

pub mod dsig;
mod error;
mod header;
mod validate;
