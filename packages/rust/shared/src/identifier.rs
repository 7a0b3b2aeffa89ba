//! arXiv submission identifiers.
//!
//! Accepts full URLs (`/abs/`, `/pdf/`, `/html/`, `/e-print/`, ...), `arXiv:` prefixed
//! ids and bare ids, in both the current `YYMM.NNNNN` scheme and the pre-2007
//! `archive/YYMMNNN` scheme.
//!
//! Version policy: an explicit `vN` suffix is preserved and becomes part of
//! the cache key. A reference without a version stays version-less; the
//! fetcher then receives whatever arXiv serves as latest, and that bundle
//! stays pinned in the cache until it is purged.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ArxivFlatError, Result};

/// URL path segments that precede an identifier on arxiv.org.
const PATH_PREFIXES: &[&str] = &["abs", "pdf", "html", "e-print", "src", "format"];

static NEW_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{4}\.\d{4,5})(?:v(\d+))?$").expect("valid regex")
});

static OLD_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z]+(?:-[a-z]+)*)(?:\.([a-z]{2}))?/(\d{7})(?:v(\d+))?$")
        .expect("valid regex")
});

/// Normalized identifier of one arXiv submission, optionally versioned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubmissionId {
    base: String,
    version: Option<u32>,
}

impl SubmissionId {
    /// Extract a canonical identifier from a URL or bare reference.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let candidate = extract_candidate(trimmed)
            .ok_or_else(|| ArxivFlatError::invalid_reference(trimmed))?;
        parse_bare(&candidate).ok_or_else(|| ArxivFlatError::invalid_reference(trimmed))
    }

    /// The identifier without its version suffix.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The explicit version, if the reference carried one.
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Directory-safe form used as the cache key (`/` becomes `_`).
    pub fn cache_key(&self) -> String {
        self.to_string().replace('/', "_")
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(v) => write!(f, "{}v{v}", self.base),
            None => f.write_str(&self.base),
        }
    }
}

impl FromStr for SubmissionId {
    type Err = ArxivFlatError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SubmissionId {
    type Error = ArxivFlatError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SubmissionId> for String {
    fn from(id: SubmissionId) -> Self {
        id.to_string()
    }
}

/// Reduce a URL or prefixed reference to the bare identifier text.
fn extract_candidate(input: &str) -> Option<String> {
    if input.is_empty() {
        return None;
    }

    if input.contains("://") {
        let url = Url::parse(input).ok()?;
        return candidate_from_url(&url);
    }

    let lower = input.to_ascii_lowercase();
    if lower.starts_with("arxiv.org/") || lower.contains(".arxiv.org/") {
        let url = Url::parse(&format!("https://{input}")).ok()?;
        return candidate_from_url(&url);
    }

    let bare = if lower.starts_with("arxiv:") {
        &input["arxiv:".len()..]
    } else {
        input
    };
    Some(bare.trim().to_string())
}

fn candidate_from_url(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    if host != "arxiv.org" && !host.ends_with(".arxiv.org") {
        return None;
    }

    let path = url.path().trim_matches('/');
    let (prefix, rest) = path.split_once('/')?;
    if !PATH_PREFIXES.contains(&prefix) {
        return None;
    }

    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".pdf").unwrap_or(rest);
    Some(rest.to_string())
}

fn parse_bare(candidate: &str) -> Option<SubmissionId> {
    if let Some(caps) = NEW_STYLE.captures(candidate) {
        return Some(SubmissionId {
            base: caps[1].to_string(),
            version: parse_version(caps.get(2).map(|m| m.as_str()))?,
        });
    }

    if let Some(caps) = OLD_STYLE.captures(candidate) {
        // The subject class is not part of the identifier: math.GT/0309136
        // and math/0309136 are the same submission.
        let archive = caps[1].to_ascii_lowercase();
        return Some(SubmissionId {
            base: format!("{archive}/{}", &caps[3]),
            version: parse_version(caps.get(4).map(|m| m.as_str()))?,
        });
    }

    None
}

/// `None` on overflow, `Some(None)` when no version was given.
fn parse_version(raw: Option<&str>) -> Option<Option<u32>> {
    match raw {
        Some(digits) => digits.parse().ok().map(Some),
        None => Some(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SubmissionId {
        SubmissionId::parse(s).unwrap_or_else(|e| panic!("{s}: {e}"))
    }

    #[test]
    fn urls_and_bare_ids_agree() {
        let expected = id("2301.12003");
        for input in [
            "https://arxiv.org/abs/2301.12003",
            "http://arxiv.org/abs/2301.12003/",
            "https://arxiv.org/pdf/2301.12003",
            "https://arxiv.org/pdf/2301.12003.pdf",
            "https://export.arxiv.org/abs/2301.12003",
            "https://arxiv.org/e-print/2301.12003",
            "arxiv.org/abs/2301.12003",
            "arXiv:2301.12003",
            "  2301.12003 \n",
            "https://arxiv.org/abs/2301.12003?context=cs#section",
        ] {
            assert_eq!(id(input), expected, "{input}");
        }
        assert_eq!(expected.to_string(), "2301.12003");
    }

    #[test]
    fn explicit_version_is_preserved() {
        let v2 = id("https://arxiv.org/pdf/2301.12003v2.pdf");
        assert_eq!(v2.to_string(), "2301.12003v2");
        assert_eq!(v2.version(), Some(2));
        assert_eq!(v2.base(), "2301.12003");
        assert_eq!(id("arXiv:2301.12003V2"), v2);
        assert_ne!(v2, id("2301.12003"));
        assert_eq!(id("2301.12003").version(), None);
    }

    #[test]
    fn old_style_ids() {
        let old = id("https://arxiv.org/abs/hep-th/9901001");
        assert_eq!(old.to_string(), "hep-th/9901001");
        assert_eq!(old.cache_key(), "hep-th_9901001");
        assert_eq!(id("hep-th/9901001"), old);

        let classed = id("arxiv.org/abs/math.gt/0309136v1");
        assert_eq!(classed, id("math/0309136v1"));
        assert_eq!(classed.to_string(), "math/0309136v1");
        assert_eq!(id("https://arxiv.org/abs/math.GT/0309136"), id("math/0309136"));
        assert_eq!(id("math.GT/0309136").cache_key(), "math_0309136");
    }

    #[test]
    fn html_urls_are_accepted() {
        assert_eq!(id("https://arxiv.org/html/2301.12003v1"), id("2301.12003v1"));
        assert_eq!(id("https://arxiv.org/html/2301.12003"), id("2301.12003"));
    }

    #[test]
    fn five_digit_sequence_numbers() {
        assert_eq!(id("2401.00001").to_string(), "2401.00001");
    }

    #[test]
    fn rejects_unrecognizable_input() {
        for input in [
            "",
            "   ",
            "not an arxiv id",
            "doi:10.1234/example",
            "https://example.com/abs/2301.12003",
            "https://arxiv.org/list/cs.LG/recent",
            "2301.123",
            "2301.12003v",
        ] {
            let err = SubmissionId::parse(input).unwrap_err();
            assert!(matches!(err, ArxivFlatError::InvalidReference { .. }), "{input}");
        }
    }

    #[test]
    fn serde_uses_canonical_string() {
        let v = id("2301.12003v3");
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"2301.12003v3\"");
        let back: SubmissionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
