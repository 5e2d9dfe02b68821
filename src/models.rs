use serde::{Deserialize, Serialize};

/// One record per checked anchor.
///
/// `status == 0` signals a transport or DNS failure; the message then
/// lives in `error`. A link counts as broken when the status is 400 or
/// above, or when `error` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkResult {
    /// Page containing the anchor
    pub source_url: String,

    /// Fully-resolved absolute URL that was checked
    pub target_url: String,

    /// HTTP status; 0 on transport failure
    pub status: u16,

    /// Human-readable message, empty on success
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    /// True when the target host differs from the seed host
    pub is_external: bool,
}

impl LinkResult {
    pub fn is_broken(&self) -> bool {
        self.status >= 400 || !self.error.is_empty()
    }
}

impl std::fmt::Display for LinkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.error.is_empty() {
            write!(f, "{} -> {} [{}]", self.source_url, self.target_url, self.status)
        } else {
            write!(
                f,
                "{} -> {} [{}: {}]",
                self.source_url, self.target_url, self.status, self.error
            )
        }
    }
}
