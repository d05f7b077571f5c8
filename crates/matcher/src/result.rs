//! Comparison outcome

use std::fmt;

use serde::Serialize;

/// Verdict of one comparison
///
/// A failed match is a value, not an error: callers choose whether to
/// raise, log or ignore it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// True if the values matched
    pub passed: bool,
    /// Description of the first divergence; empty on success
    pub message: String,
    /// Path of the first divergence, e.g. `root.items[2]`
    pub path: Option<String>,
}

impl MatchResult {
    /// Successful match
    pub fn pass() -> Self {
        MatchResult {
            passed: true,
            message: String::new(),
            path: None,
        }
    }

    /// Failed match at `path`
    pub fn fail(path: impl Into<String>, message: impl Into<String>) -> Self {
        MatchResult {
            passed: false,
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Returns true if the values matched
    pub fn is_pass(&self) -> bool {
        self.passed
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed {
            f.write_str("match")
        } else {
            f.write_str(&self.message)
        }
    }
}
