//! Failure signatures in fetch tool output.
//!
//! The fetch tool reports remote failures only as free text, so each output
//! line is matched on its own against known markers.

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// HTTP status markers meaning the remote rejected the current approach.
/// Matched case-sensitively.
const REJECTION_MARKERS: &[&str] = &[
    "HTTP Error 403",
    "HTTP Error 404",
    "HTTP Error 412",
    "HTTP Error 429",
];

/// A failure signature recognised in one output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTag {
    /// Forbidden / not found / precondition failed / too many requests.
    RateLimitOrAuthError,
    /// The browser cookie store could not be copied or decrypted.
    CookieLockError,
}

/// Set of [`OutputTag`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputTags {
    pub rate_limit_or_auth: bool,
    pub cookie_lock: bool,
}

impl OutputTags {
    pub fn contains(&self, tag: OutputTag) -> bool {
        match tag {
            OutputTag::RateLimitOrAuthError => self.rate_limit_or_auth,
            OutputTag::CookieLockError => self.cookie_lock,
        }
    }

    pub fn insert(&mut self, tag: OutputTag) {
        match tag {
            OutputTag::RateLimitOrAuthError => self.rate_limit_or_auth = true,
            OutputTag::CookieLockError => self.cookie_lock = true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.rate_limit_or_auth && !self.cookie_lock
    }

    pub fn iter(&self) -> impl Iterator<Item = OutputTag> + '_ {
        [OutputTag::RateLimitOrAuthError, OutputTag::CookieLockError]
            .into_iter()
            .filter(move |tag| self.contains(*tag))
    }
}

impl BitOr for OutputTags {
    type Output = OutputTags;

    fn bitor(self, rhs: OutputTags) -> OutputTags {
        OutputTags {
            rate_limit_or_auth: self.rate_limit_or_auth || rhs.rate_limit_or_auth,
            cookie_lock: self.cookie_lock || rhs.cookie_lock,
        }
    }
}

impl BitOrAssign for OutputTags {
    fn bitor_assign(&mut self, rhs: OutputTags) {
        *self = *self | rhs;
    }
}

impl FromIterator<OutputTag> for OutputTags {
    fn from_iter<I: IntoIterator<Item = OutputTag>>(iter: I) -> Self {
        let mut tags = OutputTags::default();
        for tag in iter {
            tags.insert(tag);
        }
        tags
    }
}

/// Classifies a single output line. Pure; independent of any other line.
pub fn classify_line(line: &str) -> OutputTags {
    let mut tags = OutputTags::default();

    if REJECTION_MARKERS.iter().any(|marker| line.contains(marker)) {
        tags.insert(OutputTag::RateLimitOrAuthError);
    }

    let lower = line.to_lowercase();
    let copy_failed = lower.contains("could not copy") && lower.contains("cookie");
    if copy_failed || lower.contains("failed to decrypt") {
        tags.insert(OutputTag::CookieLockError);
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_404_is_rejection() {
        let tags = classify_line("ERROR: [generic] Unable to download webpage: HTTP Error 404: Not Found");
        assert!(tags.contains(OutputTag::RateLimitOrAuthError));
        assert!(!tags.contains(OutputTag::CookieLockError));
    }

    #[test]
    fn test_other_rejection_markers() {
        for line in [
            "HTTP Error 403: Forbidden",
            "HTTP Error 412: Precondition Failed",
            "HTTP Error 429: Too Many Requests",
        ] {
            assert!(classify_line(line).rate_limit_or_auth, "{line}");
        }
    }

    #[test]
    fn test_http_marker_is_case_sensitive() {
        assert!(classify_line("http error 404: not found").is_empty());
        assert!(classify_line("HTTP ERROR 403").is_empty());
    }

    #[test]
    fn test_server_errors_are_not_rejections() {
        assert!(classify_line("HTTP Error 500: Internal Server Error").is_empty());
    }

    #[test]
    fn test_cookie_copy_failure() {
        let tags = classify_line("ERROR: Could not copy Chrome cookie database. See issue #7271");
        assert!(tags.contains(OutputTag::CookieLockError));
        assert!(!tags.rate_limit_or_auth);
    }

    #[test]
    fn test_cookie_phrases_case_insensitive() {
        assert!(classify_line("COULD NOT COPY the COOKIE store").cookie_lock);
        assert!(classify_line("Failed To Decrypt with DPAPI").cookie_lock);
    }

    #[test]
    fn test_copy_failure_without_cookie_is_ignored() {
        assert!(classify_line("could not copy file to destination").is_empty());
    }

    #[test]
    fn test_combined_cookie_line() {
        let tags = classify_line("ERROR: could not copy cookie database, Failed to decrypt");
        assert!(tags.cookie_lock);
    }

    #[test]
    fn test_plain_progress_line_has_no_tags() {
        assert!(classify_line("[download]  42.5% of 10.00MiB at 1.00MiB/s ETA 00:05").is_empty());
        assert!(classify_line("").is_empty());
    }

    #[test]
    fn test_union_accumulates() {
        let mut tags = OutputTags::default();
        tags |= classify_line("HTTP Error 403: Forbidden");
        tags |= classify_line("[download] Destination: video.mp4");
        tags |= classify_line("failed to decrypt cookie");
        assert_eq!(
            tags.iter().collect::<Vec<_>>(),
            vec![OutputTag::RateLimitOrAuthError, OutputTag::CookieLockError]
        );
    }

    #[test]
    fn test_from_iterator() {
        let tags: OutputTags = [OutputTag::CookieLockError].into_iter().collect();
        assert!(tags.cookie_lock);
        assert!(!tags.rate_limit_or_auth);
    }
}
