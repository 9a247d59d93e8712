//! Documents
//!
//! Societies, distributions, batches and grids are saved as JSON envelopes
//! naming their root kind and format version. Loading checks, in order,
//! that the text parses, that the root kind matches and that the version is
//! recent enough; only then is the body decoded. Nothing is modified unless
//! every check passes, since a load returns a fresh value.

use std::fs;
use std::path::Path;

use laputa_report::{DocumentKind, Envelope, MINIMUM_DOCUMENT_VERSION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::BatchSimulation;
use crate::distribution::Distribution;
use crate::multibatch::MultiBatch;
use crate::society::Society;

/// Errors raised while reading or writing a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to access document: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("expected a {expected} document, found {found}")]
    WrongRoot { expected: DocumentKind, found: String },

    #[error("document version {version} is older than the oldest supported version {minimum}")]
    TooOld { version: u32, minimum: u32 },
}

/// Envelope with the body left undecoded until the header checks pass.
#[derive(Deserialize)]
struct RawEnvelope {
    root: String,
    version: u32,
    body: serde_json::Value,
}

/// A value that can be saved as a document.
pub trait Document: Serialize + DeserializeOwned {
    const KIND: DocumentKind;

    /// Rebuilds derived state after decoding.
    fn after_load(&mut self) {}
}

impl Document for Society {
    const KIND: DocumentKind = DocumentKind::Society;

    fn after_load(&mut self) {
        for p in self.people.iter_mut() {
            if let Some(params) = p.parameters.as_mut() {
                params.renormalise();
            }
        }
        for l in self.links.values_mut() {
            if let Some(params) = l.parameters.as_mut() {
                params.renormalise();
            }
        }
        self.recalculate_listeners();
    }
}

impl Document for Distribution {
    const KIND: DocumentKind = DocumentKind::Distribution;

    fn after_load(&mut self) {
        self.renormalise();
    }
}

impl Document for BatchSimulation {
    const KIND: DocumentKind = DocumentKind::Batch;

    fn after_load(&mut self) {
        for setup in self.setups.iter_mut() {
            setup.renormalise();
        }
    }
}

impl Document for MultiBatch {
    const KIND: DocumentKind = DocumentKind::MultiBatch;

    fn after_load(&mut self) {
        for batch in self.batches.iter_mut() {
            batch.after_load();
        }
    }
}

/// Serializes `doc` in an envelope carrying the current version.
pub fn to_json<D: Document>(doc: &D) -> Result<String, DocumentError> {
    Ok(serde_json::to_string_pretty(&Envelope::new(D::KIND, doc))?)
}

/// Decodes a document, checking root kind and version first.
pub fn from_json<D: Document>(text: &str) -> Result<D, DocumentError> {
    let raw: RawEnvelope = serde_json::from_str(text)?;
    if raw.root != D::KIND.tag() {
        return Err(DocumentError::WrongRoot {
            expected: D::KIND,
            found: raw.root,
        });
    }
    if raw.version < MINIMUM_DOCUMENT_VERSION {
        return Err(DocumentError::TooOld {
            version: raw.version,
            minimum: MINIMUM_DOCUMENT_VERSION,
        });
    }
    let mut doc: D = serde_json::from_value(raw.body)?;
    doc.after_load();
    Ok(doc)
}

pub fn save<D: Document>(path: impl AsRef<Path>, doc: &D) -> Result<(), DocumentError> {
    let path = path.as_ref();
    fs::write(path, to_json(doc)?)?;
    tracing::debug!(path = %path.display(), kind = %D::KIND, "document saved");
    Ok(())
}

pub fn load<D: Document>(path: impl AsRef<Path>) -> Result<D, DocumentError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let doc = from_json(&text)?;
    tracing::debug!(path = %path.display(), kind = %D::KIND, "document loaded");
    Ok(doc)
}

/// Reads only the root kind of a document.
pub fn peek_kind(text: &str) -> Result<Option<DocumentKind>, DocumentError> {
    let raw: RawEnvelope = serde_json::from_str(text)?;
    Ok(DocumentKind::from_tag(&raw.root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::context::SimContext;
    use crate::setup::SocietySetup;
    use laputa_report::CURRENT_DOCUMENT_VERSION;

    #[test]
    fn test_society_document_rebuilds_listeners() {
        let soc = Society::generate(&SocietySetup::default(), &mut SimContext::from_seed(1));
        let text = to_json(&soc).unwrap();
        assert!(text.contains("\"SOCIETY_FILE\""));
        let back: Society = from_json(&text).unwrap();
        assert_eq!(back.len(), soc.len());
        assert_eq!(back.links.len(), soc.links.len());
        for (a, b) in back.people.iter().zip(&soc.people) {
            assert_eq!(a.n_listeners, b.n_listeners);
            assert_eq!(a.n_sources, b.n_sources);
            assert_eq!(a.belief, b.belief);
        }
    }

    #[test]
    fn test_wrong_root_is_rejected() {
        let text = to_json(&Distribution::default()).unwrap();
        match from_json::<Society>(&text) {
            Err(DocumentError::WrongRoot { expected, found }) => {
                assert_eq!(expected, DocumentKind::Society);
                assert_eq!(found, "DISTRIBUTION_FILE");
            }
            other => panic!("unexpected {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_old_version_is_rejected() {
        let mut soc = Society::new();
        soc.add_inquirer(0.0, 0.0, None, &mut SimContext::from_seed(2));
        let text = to_json(&soc)
            .unwrap()
            .replace(&CURRENT_DOCUMENT_VERSION.to_string(), "140");
        assert!(matches!(
            from_json::<Society>(&text),
            Err(DocumentError::TooOld {
                version: 140,
                minimum: MINIMUM_DOCUMENT_VERSION
            })
        ));
    }

    #[test]
    fn test_root_checked_before_version() {
        let text = r#"{"root": "SOMETHING_ELSE", "version": 1, "body": {}}"#;
        assert!(matches!(
            from_json::<Distribution>(text),
            Err(DocumentError::WrongRoot { .. })
        ));
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(matches!(
            from_json::<Distribution>("not json"),
            Err(DocumentError::Parse(_))
        ));
    }

    #[test]
    fn test_freeform_renormalised_on_load() {
        let mut d = Distribution::default();
        d.freeform.set_values(vec![2.0, 2.0, 2.0]);
        let back: Distribution = from_json(&to_json(&d).unwrap()).unwrap();
        assert!(back.freeform.values().iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_batch_document_keeps_configuration() {
        let mut batch = BatchSimulation::new();
        batch.trials = 7;
        batch.stages = 2;
        batch.steps[1] = 9;
        batch.setups[1].vary_links = true;
        let back: BatchSimulation = from_json(&to_json(&batch).unwrap()).unwrap();
        assert_eq!(back.trials, 7);
        assert_eq!(back.stages, 2);
        assert_eq!(back.steps[1], 9);
        assert!(back.setups[1].vary_links);
        assert_eq!(peek_kind(&to_json(&batch).unwrap()).unwrap(), Some(DocumentKind::Batch));
    }

    #[test]
    fn test_inquirer_fields_survive() {
        let mut soc = Society::new();
        let i = soc.add_inquirer(5.0, 6.0, None, &mut SimContext::from_seed(3));
        soc.people[i].belief = Amount::new(0.625);
        soc.people[i].name = "Gulliver".to_string();
        let back: Society = from_json(&to_json(&soc).unwrap()).unwrap();
        assert_eq!(back.people[0].belief.v(), 0.625);
        assert_eq!(back.people[0].name, "Gulliver");
        assert_eq!((back.people[0].x, back.people[0].y), (5.0, 6.0));
    }
}
