//! The tab a session controls.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::RegexSet;
use url::Url;

use crate::identifiers::TargetId;

// ============================================================================
// Constants
// ============================================================================

/// URL schemes the debugger usually cannot attach to.
static UNSUPPORTED_URLS: LazyLock<Option<RegexSet>> = LazyLock::new(|| {
    RegexSet::new([
        r"^chrome://",
        r"^chrome-extension://",
        r"^about:",
        r"^file://",
        r"^view-source:",
        r"^devtools:",
    ])
    .ok()
});

// ============================================================================
// Target
// ============================================================================

/// A controlled tab: id, current URL and the origin derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    id: TargetId,
    url: Option<String>,
    origin: Option<String>,
}

impl Target {
    /// Creates a target with an optional URL.
    #[must_use]
    pub fn new(id: TargetId, url: Option<String>) -> Self {
        let origin = url.as_deref().and_then(origin_of);
        Self { id, url, origin }
    }

    /// Returns the target ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &TargetId {
        &self.id
    }

    /// Returns the last known URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Returns the origin (`scheme://host[:port]`) of the last known URL.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Records a navigation.
    pub fn set_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        self.origin = origin_of(&url);
        self.url = Some(url);
    }

    /// Returns `true` if the URL uses a scheme the debugger usually rejects.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        self.url.as_deref().is_some_and(is_unsupported_url)
    }
}

/// Returns `true` for internal or local URLs the debugger usually rejects.
#[must_use]
pub fn is_unsupported_url(url: &str) -> bool {
    UNSUPPORTED_URLS
        .as_ref()
        .is_some_and(|set| set.is_match(url))
}

fn origin_of(url: &str) -> Option<String> {
    let origin = Url::parse(url).ok()?.origin();
    origin
        .is_tuple()
        .then(|| origin.ascii_serialization())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> TargetId {
        TargetId::new("T1").expect("valid target id")
    }

    #[test]
    fn test_origin_derivation() {
        let target = Target::new(id(), Some("https://example.com:8443/a/b?q=1".to_string()));
        assert_eq!(target.origin(), Some("https://example.com:8443"));
    }

    #[test]
    fn test_opaque_origin_is_none() {
        let target = Target::new(id(), Some("about:blank".to_string()));
        assert_eq!(target.origin(), None);
        assert!(target.is_unsupported());
    }

    #[test]
    fn test_set_url_updates_origin() {
        let mut target = Target::new(id(), None);
        assert_eq!(target.origin(), None);

        target.set_url("http://localhost:3000/");
        assert_eq!(target.url(), Some("http://localhost:3000/"));
        assert_eq!(target.origin(), Some("http://localhost:3000"));
    }

    #[test]
    fn test_unsupported_urls() {
        assert!(is_unsupported_url("chrome://settings"));
        assert!(is_unsupported_url("chrome-extension://abc/panel.html"));
        assert!(is_unsupported_url("file:///tmp/x.html"));
        assert!(is_unsupported_url("view-source:https://a.b"));
        assert!(is_unsupported_url("devtools://devtools/bundled"));
        assert!(!is_unsupported_url("https://chrome.com"));
    }
}
