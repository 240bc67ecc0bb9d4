//! Fixed-length header splitting and tokenization.

use chrono::{DateTime, FixedOffset};

use crate::error::{CvdError, HeaderProblem};

/// Every definition file starts with exactly this many bytes of header.
pub const HEADER_LEN: usize = 512;

/// Magic tag carried in the first header field.
pub const MAGIC: &str = "ClamAV-VDB";

/// Fewer delimited fields than this is a structural failure.
const MIN_FIELDS: usize = 3;

/// `07 Mar 2017 08-02 -0500`
const TIME_FORMAT: &str = "%d %b %Y %H-%M %z";

/// Split raw definition bytes into the 512-byte header and the body.
pub fn split(raw: &[u8]) -> Result<(&[u8], &[u8]), CvdError> {
    if raw.len() < HEADER_LEN {
        return Err(CvdError::Truncated { len: raw.len(), header_len: HEADER_LEN });
    }
    Ok(raw.split_at(HEADER_LEN))
}

/// The parsed fields of a definition header.
///
/// Field parse failures do not abort the parse; they land in
/// [`problems`](Self::problems) with the affected field zeroed or unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CvdHeader {
    pub creation_time: Option<DateTime<FixedOffset>>,
    pub version: u32,
    pub signatures: u32,
    pub functionality_level: u32,
    pub md5_hex: String,
    pub dsig_blob: String,
    pub builder: String,
    /// Creation time in epoch seconds, from the old file format. Optional.
    pub stime: Option<u64>,
    pub problems: Vec<HeaderProblem>,
}

/// A definition file split into its parsed header and binary body.
#[derive(Debug, Clone)]
pub struct CvdFile {
    pub header: CvdHeader,
    pub body: Vec<u8>,
}

impl CvdFile {
    /// Parse raw bytes into header and body.
    ///
    /// Structural failures (truncated input, too few header fields)
    /// return an error; per-field defects accumulate in the header's
    /// problem list.
    pub fn parse(raw: &[u8]) -> Result<Self, CvdError> {
        let (head, body) = split(raw)?;
        let header = CvdHeader::parse(head)?;
        Ok(Self { header, body: body.to_vec() })
    }
}

impl CvdHeader {
    /// Tokenize a 512-byte header on `:` and sub-parse each field.
    pub fn parse(head: &[u8]) -> Result<Self, CvdError> {
        let text = String::from_utf8_lossy(head);
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() < MIN_FIELDS {
            return Err(CvdError::BadHeader { found: parts.len(), min: MIN_FIELDS });
        }

        let mut h = CvdHeader::default();

        if let Some(magic) = field(&parts, 0, "magic", &mut h.problems)
            && magic != MAGIC
        {
            h.problems.push(HeaderProblem::BadMagic(magic.to_string()));
        }

        if let Some(time) = field(&parts, 1, "creation-time", &mut h.problems) {
            match DateTime::parse_from_str(time, TIME_FORMAT) {
                Ok(t) => h.creation_time = Some(t),
                Err(_) => h.problems.push(HeaderProblem::BadTime(time.to_string())),
            }
        }

        h.version = parse_uint(&parts, 2, "version", &mut h.problems);
        h.signatures = parse_uint(&parts, 3, "signature-count", &mut h.problems);
        h.functionality_level = parse_uint(&parts, 4, "functionality-level", &mut h.problems);

        if let Some(md5) = field(&parts, 5, "md5", &mut h.problems) {
            h.md5_hex = md5.to_string();
        }
        if let Some(dsig) = field(&parts, 6, "dsig", &mut h.problems) {
            h.dsig_blob = dsig.to_string();
        }
        if let Some(builder) = field(&parts, 7, "builder", &mut h.problems) {
            h.builder = builder.to_string();
        }

        // trailing epoch timestamp is optional (old file format)
        if let Some(stime) = parts.get(8).map(|s| s.trim())
            && !stime.is_empty()
        {
            match stime.parse::<u64>() {
                Ok(t) => h.stime = Some(t),
                Err(_) => h.problems.push(HeaderProblem::BadInteger {
                    field: "stime",
                    value: stime.to_string(),
                }),
            }
        }

        Ok(h)
    }
}

/// Positional field access; absence is a problem, not an abort.
fn field<'a>(
    parts: &[&'a str],
    idx: usize,
    name: &'static str,
    problems: &mut Vec<HeaderProblem>,
) -> Option<&'a str> {
    match parts.get(idx) {
        Some(s) => Some(s.trim()),
        None => {
            problems.push(HeaderProblem::MissingField(name));
            None
        }
    }
}

/// Non-negative decimal field; any failure yields 0 plus a problem.
fn parse_uint(
    parts: &[&str],
    idx: usize,
    name: &'static str,
    problems: &mut Vec<HeaderProblem>,
) -> u32 {
    let Some(s) = field(parts, idx, name, problems) else {
        return 0;
    };
    match s.parse::<u32>() {
        Ok(v) => v,
        Err(_) => {
            problems.push(HeaderProblem::BadInteger { field: name, value: s.to_string() });
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REAL_FIELDS: &str = "ClamAV-VDB:07 Mar 2017 08-02 -0500:23182:1741572:63:c1537143239006af01e814a4dcd58a48:QC2ZncCPK0AzfYPW8OKvde9GFOO1HyH5qbozl9JZbmlOmZnSV55zWaP9yH9tXiS+JmZWA1277X6pBeTHPCcaqUDakke4W58duZ5mavDGJoWekl3q/5RgVeAg39cM1X4zNf6gER8G+HIWDUka0sRQWal1KXAb1UWkFoKsbHVqgVi:neo:1488891746";

    fn padded(fields: &str) -> Vec<u8> {
        let mut head = fields.as_bytes().to_vec();
        head.resize(HEADER_LEN, b' ');
        head
    }

    #[test]
    fn parses_real_header() {
        let h = CvdHeader::parse(&padded(REAL_FIELDS)).unwrap();
        assert!(h.problems.is_empty(), "{:?}", h.problems);
        assert_eq!(h.version, 23182);
        assert_eq!(h.signatures, 1741572);
        assert_eq!(h.functionality_level, 63);
        assert_eq!(h.md5_hex, "c1537143239006af01e814a4dcd58a48");
        assert_eq!(h.builder, "neo");
        assert_eq!(h.stime, Some(1488891746));
        let t = h.creation_time.expect("creation time");
        assert_eq!(t.timestamp(), 1488891720);
    }

    #[test]
    fn too_few_fields_is_structural() {
        let err = CvdHeader::parse(&padded("ClamAV-VDB")).unwrap_err();
        assert!(matches!(err, CvdError::BadHeader { found: 1, .. }));
    }

    #[test]
    fn short_input_is_truncated() {
        let err = CvdFile::parse(b"ClamAV-VDB:too:short").unwrap_err();
        assert!(matches!(err, CvdError::Truncated { len: 20, .. }));
    }

    #[test]
    fn bad_fields_accumulate_without_aborting() {
        let h = CvdHeader::parse(&padded("ClamAV-VDB:not a time:abc:1741572:-1:md5:sig:neo"))
            .unwrap();
        assert_eq!(h.creation_time, None);
        assert_eq!(h.version, 0);
        assert_eq!(h.signatures, 1741572);
        assert_eq!(h.functionality_level, 0);
        assert_eq!(h.builder, "neo");
        assert_eq!(
            h.problems,
            vec![
                HeaderProblem::BadTime("not a time".into()),
                HeaderProblem::BadInteger { field: "version", value: "abc".into() },
                HeaderProblem::BadInteger { field: "functionality-level", value: "-1".into() },
            ]
        );
    }

    #[test]
    fn missing_trailing_fields_are_problems() {
        let h = CvdHeader::parse(&padded("ClamAV-VDB:07 Mar 2017 08-02 -0500:23182")).unwrap();
        assert_eq!(h.version, 23182);
        assert!(h.problems.contains(&HeaderProblem::MissingField("signature-count")));
        assert!(h.problems.contains(&HeaderProblem::MissingField("builder")));
        assert_eq!(h.stime, None);
    }

    #[test]
    fn wrong_magic_is_a_problem() {
        let h = CvdHeader::parse(&padded("ClamAV-XYZ:07 Mar 2017 08-02 -0500:1:2:3:m:s:b"))
            .unwrap();
        assert_eq!(h.problems, vec![HeaderProblem::BadMagic("ClamAV-XYZ".into())]);
    }

    #[test]
    fn splits_body_after_fixed_header() {
        let mut raw = padded(REAL_FIELDS);
        raw.extend_from_slice(b"binary definition body");
        let file = CvdFile::parse(&raw).unwrap();
        assert_eq!(file.body, b"binary definition body");
    }
}
