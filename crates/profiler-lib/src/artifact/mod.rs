//! Inter-stage artifacts
//!
//! This module provides:
//! - A self-describing, text-safe codec for stage outputs
//! - Artifact stores keyed by run id and stage name

mod codec;
mod store;

pub use codec::{decode, encode, Artifact, ArtifactKind, FORMAT_VERSION};
pub use store::{ArtifactKey, ArtifactStore, FsArtifactStore, MemoryArtifactStore};

pub(crate) use store::write_atomic;
