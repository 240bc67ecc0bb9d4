//! Artifact naming: database types, full/incremental kinds, URL and
//! cache-key derivation.

use std::fmt;

/// The fixed set of definition databases a run mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    Main,
    Bytecode,
    Daily,
}

impl DbType {
    pub const ALL: [DbType; 3] = [DbType::Main, DbType::Bytecode, DbType::Daily];

    pub fn as_str(self) -> &'static str {
        match self {
            DbType::Main => "main",
            DbType::Bytecode => "bytecode",
            DbType::Daily => "daily",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A `.cvd` file: 512-byte header plus signature body.
    Full,
    /// A `.cdiff` patch. Opaque; carries no CVD framing.
    Incremental,
}

/// One artifact to fetch: where from, and how to treat the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub db_type: DbType,
    pub kind: ArtifactKind,
    pub version: Option<u32>,
    pub url: String,
}

impl ArtifactDescriptor {
    /// Full definition: `<base>/<type>.cvd`.
    pub fn full(base: &str, db_type: DbType) -> Self {
        Self {
            db_type,
            kind: ArtifactKind::Full,
            version: None,
            url: format!("{}/{}.cvd", base.trim_end_matches('/'), db_type),
        }
    }

    /// Incremental patch for a known version: `<base>/<type>-<version>.cdiff`.
    pub fn incremental(base: &str, db_type: DbType, version: u32) -> Self {
        Self {
            db_type,
            kind: ArtifactKind::Incremental,
            version: Some(version),
            url: format!("{}/{}-{}.cdiff", base.trim_end_matches('/'), db_type, version),
        }
    }

    /// Cache key: the URL path with the leading separator stripped.
    pub fn filename(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}
