//! Identifiers shared between the wire protocol and the storage layer.
//!
//! `DocumentId` and `UserId` are newtypes over `i64` so they cannot be
//! accidentally swapped with an ordinary integer at a call site.
//! `ClientId` stays an opaque string: it is minted by the client
//! (`${userId}-${epochMs}-${random}`-shaped) and the core never parses it,
//! only compares it for equality.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable document identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier resolved from a verified token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque, globally-unique-per-connection client identifier.
///
/// New one per reconnect; the core treats it as an unparsed token so it
/// never rejects an otherwise-valid client for not matching the suggested
/// `${userId}-${epochMs}-${random}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        ClientId(s)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The fixed round-robin cursor-color palette (§4.4 step 5).
pub const COLOR_PALETTE: [&str; 8] = [
    "#e06c75", "#98c379", "#e5c07b", "#61afef", "#c678dd", "#56b6c2", "#d19a66", "#be5046",
];

/// Monotonic, shared, low-contention color assignment counter.
#[derive(Debug, Default)]
pub struct ColorAssigner {
    next: std::sync::atomic::AtomicUsize,
}

impl ColorAssigner {
    pub fn new() -> Self {
        Self {
            next: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Assign the next color in round-robin order.
    pub fn assign(&self) -> &'static str {
        let idx = self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        COLOR_PALETTE[idx % COLOR_PALETTE.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_assigner_round_robins() {
        let assigner = ColorAssigner::new();
        let first_round: Vec<&str> = (0..8).map(|_| assigner.assign()).collect();
        assert_eq!(first_round, COLOR_PALETTE.to_vec());
        // ninth assignment wraps back to the first color
        assert_eq!(assigner.assign(), COLOR_PALETTE[0]);
    }

    #[test]
    fn document_id_display() {
        assert_eq!(DocumentId(42).to_string(), "42");
    }
}
