//! Document Envelope
//!
//! Every persisted document is wrapped in an envelope that names its root
//! kind and the format version it was written with.

use serde::{Deserialize, Serialize};

/// Version written into new documents.
pub const CURRENT_DOCUMENT_VERSION: u32 = 170;

/// Oldest version that can still be loaded.
pub const MINIMUM_DOCUMENT_VERSION: u32 = 150;

/// Root kind of a persisted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    #[serde(rename = "SOCIETY_FILE")]
    Society,
    #[serde(rename = "DISTRIBUTION_FILE")]
    Distribution,
    #[serde(rename = "BATCH_FILE")]
    Batch,
    #[serde(rename = "MULTIBATCH_FILE")]
    MultiBatch,
}

impl DocumentKind {
    /// Root tag as it appears in the file.
    pub fn tag(&self) -> &'static str {
        match self {
            DocumentKind::Society => "SOCIETY_FILE",
            DocumentKind::Distribution => "DISTRIBUTION_FILE",
            DocumentKind::Batch => "BATCH_FILE",
            DocumentKind::MultiBatch => "MULTIBATCH_FILE",
        }
    }

    /// Looks up a kind by its root tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "SOCIETY_FILE" => Some(DocumentKind::Society),
            "DISTRIBUTION_FILE" => Some(DocumentKind::Distribution),
            "BATCH_FILE" => Some(DocumentKind::Batch),
            "MULTIBATCH_FILE" => Some(DocumentKind::MultiBatch),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A versioned document wrapping a body of type `T`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub root: DocumentKind,
    pub version: u32,
    pub body: T,
}

impl<T> Envelope<T> {
    /// Wraps a body with the current version.
    pub fn new(root: DocumentKind, body: T) -> Self {
        Self {
            root,
            version: CURRENT_DOCUMENT_VERSION,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for kind in [
            DocumentKind::Society,
            DocumentKind::Distribution,
            DocumentKind::Batch,
            DocumentKind::MultiBatch,
        ] {
            assert_eq!(DocumentKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(DocumentKind::from_tag("NOT_A_FILE"), None);
    }

    #[test]
    fn test_envelope_serializes_root_tag() {
        let env = Envelope::new(DocumentKind::Batch, 7u32);
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"root\":\"BATCH_FILE\""));
        assert!(json.contains("\"version\":170"));
    }
}
