//! Integrity validation of a definition body against its header claims.

use crate::dsig;
use crate::header::CvdHeader;

/// Outcome of validating one (header, body) pair. Transient; consumed
/// by the admit-or-reject decision and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Binding: a false value must block cache admission.
    pub md5_valid: bool,
    pub md5_computed: String,
    /// Advisory only. The signature scheme is a best-effort
    /// reconstruction; never conflate this with `md5_valid`.
    pub dsig_valid: bool,
    pub dsig_decoded: String,
}

/// Lowercase hex MD5 of the body. The header is excluded from the
/// digest.
pub fn body_digest(body: &[u8]) -> String {
    format!("{:x}", md5::compute(body))
}

/// Compare the body digest and the recovered signature against the
/// header's claims. Comparison is case-sensitive.
pub fn validate(header: &CvdHeader, body: &[u8]) -> ValidationReport {
    let md5_computed = body_digest(body);
    let md5_valid = md5_computed == header.md5_hex;

    let (dsig_decoded, dsig_valid) = match dsig::recover_digest(&header.dsig_blob) {
        Ok(decoded) => {
            let ok = decoded == md5_computed;
            (decoded, ok)
        }
        Err(_) => (String::new(), false),
    };

    ValidationReport { md5_valid, md5_computed, dsig_valid, dsig_decoded }
}
