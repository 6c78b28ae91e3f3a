//! Text-safe encoding of inter-stage artifacts
//!
//! An artifact is wrapped in an [`Envelope`] that records its kind and
//! format version, serialized with bincode, and base64-encoded so it can
//! cross a channel that only accepts text.

use crate::error::{PipelineError, Result};
use crate::models::{ScaledMatrix, Table};
use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope format version written by this build
pub const FORMAT_VERSION: u16 = 1;

/// Kind tag carried by every encoded artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Table,
    ScaledMatrix,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Table => write!(f, "table"),
            ArtifactKind::ScaledMatrix => write!(f, "scaled-matrix"),
        }
    }
}

/// Values that can travel between stages as encoded artifacts
pub trait Artifact: Serialize + DeserializeOwned {
    const KIND: ArtifactKind;
}

impl Artifact for Table {
    const KIND: ArtifactKind = ArtifactKind::Table;
}

impl Artifact for ScaledMatrix {
    const KIND: ArtifactKind = ArtifactKind::ScaledMatrix;
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    kind: ArtifactKind,
    format_version: u16,
    payload: Vec<u8>,
}

/// Encode an artifact into a base64 string
pub fn encode<A: Artifact>(value: &A) -> Result<String> {
    let envelope = Envelope {
        kind: A::KIND,
        format_version: FORMAT_VERSION,
        payload: bincode::serialize(value)?,
    };
    let bytes = bincode::serialize(&envelope)?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// Decode an artifact previously produced by [`encode`]
pub fn decode<A: Artifact>(text: &str) -> Result<A> {
    let bytes = general_purpose::STANDARD.decode(text.trim())?;
    let envelope: Envelope = bincode::deserialize(&bytes)?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(PipelineError::ArtifactVersion {
            expected: FORMAT_VERSION,
            found: envelope.format_version,
        });
    }
    if envelope.kind != A::KIND {
        return Err(PipelineError::ArtifactKindMismatch {
            expected: A::KIND.to_string(),
            found: envelope.kind.to_string(),
        });
    }

    Ok(bincode::deserialize(&envelope.payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample_table() -> Table {
        let mut table = Table::new(vec!["cpu_percent".to_string(), "host".to_string()]);
        table.push_raw(["91.5", "node-a"]);
        table.push_raw(["", "node-b"]);
        table
    }

    #[test]
    fn test_encoded_artifact_is_text_safe() {
        let encoded = encode(&sample_table()).unwrap();
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')));
        let decoded: Table = decode(&encoded).unwrap();
        assert_eq!(decoded, sample_table());
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let encoded = encode(&sample_table()).unwrap();
        let err = decode::<ScaledMatrix>(&encoded).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Artifact);
        assert!(err.to_string().contains("scaled-matrix"));
    }

    #[test]
    fn test_garbage_rejected() {
        let err = decode::<Table>("not base64 !!").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Artifact);
    }
}
