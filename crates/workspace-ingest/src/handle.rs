//! Handle syntax, prefix recognition and equivalence.
//!
//! A handle can be written as `hdl:11142/00-ABC` or through the resolver
//! proxy (`https://hdl.handle.net/11142/00-ABC`, optionally with an `hdl:`
//! segment). All forms of the same handle are equivalent; comparison is
//! ASCII case-insensitive as handle names are.

use crate::error::{IngestError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Matches every accepted handle spelling, capturing prefix and suffix.
static HANDLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:hdl:|https?://hdl\.handle\.net/(?:hdl:)?)([^/\s]+)/(\S+)$").unwrap()
});

/// Handle operations the engine depends on.
pub trait HandleUtil: Send + Sync {
    /// Whether `uri` is written as a handle.
    fn is_handle_shaped(&self, uri: &str) -> bool;

    /// Whether `uri` is a handle under one of the archive's own prefixes.
    fn is_known_prefix(&self, uri: &str) -> bool;

    /// Whether two handle spellings denote the same handle.
    ///
    /// Fails when either side is not a handle.
    fn equivalent(&self, a: &str, b: &str) -> Result<bool>;

    /// Canonical `hdl:PREFIX/SUFFIX` spelling of a handle.
    fn canonicalize(&self, uri: &str) -> Result<String>;
}

/// A parsed handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub prefix: String,
    pub suffix: String,
}

impl Handle {
    /// Parse any accepted handle spelling.
    pub fn parse(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        let captures = HANDLE_PATTERN
            .captures(trimmed)
            .ok_or_else(|| IngestError::InvalidHandle(uri.to_string()))?;

        let suffix = urlencoding::decode(&captures[2])
            .map_err(|_| IngestError::InvalidHandle(uri.to_string()))?
            .into_owned();

        Ok(Self {
            prefix: captures[1].to_string(),
            suffix,
        })
    }

    /// `hdl:PREFIX/SUFFIX`
    pub fn to_hdl_uri(&self) -> String {
        format!("hdl:{}/{}", self.prefix, self.suffix)
    }

    fn comparison_key(&self) -> String {
        self.to_hdl_uri().to_ascii_lowercase()
    }
}

/// Default [`HandleUtil`] driven by a list of known prefixes.
#[derive(Debug, Clone)]
pub struct HandleRules {
    known_prefixes: Vec<String>,
}

impl HandleRules {
    pub fn new(known_prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            known_prefixes: known_prefixes.into_iter().map(Into::into).collect(),
        }
    }
}

impl HandleUtil for HandleRules {
    fn is_handle_shaped(&self, uri: &str) -> bool {
        HANDLE_PATTERN.is_match(uri.trim())
    }

    fn is_known_prefix(&self, uri: &str) -> bool {
        match Handle::parse(uri) {
            Ok(handle) => self
                .known_prefixes
                .iter()
                .any(|p| p.eq_ignore_ascii_case(&handle.prefix)),
            Err(_) => false,
        }
    }

    fn equivalent(&self, a: &str, b: &str) -> Result<bool> {
        let a = Handle::parse(a)?;
        let b = Handle::parse(b)?;
        Ok(a.comparison_key() == b.comparison_key())
    }

    fn canonicalize(&self, uri: &str) -> Result<String> {
        Ok(Handle::parse(uri)?.to_hdl_uri())
    }
}
