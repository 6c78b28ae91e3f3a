//! Artifact stores keyed by run id and stage name

use crate::error::{PipelineError, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

const ARTIFACT_EXTENSION: &str = "artifact";

/// Identifies one stage output of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    pub run_id: String,
    pub stage: String,
}

impl ArtifactKey {
    pub fn new(run_id: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            stage: stage.into(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.run_id, self.stage)
    }
}

/// Storage for encoded stage outputs
pub trait ArtifactStore: Send + Sync {
    /// Store an encoded artifact, replacing any previous value
    fn put(&self, key: &ArtifactKey, payload: &str) -> Result<()>;

    /// Fetch an encoded artifact
    fn get(&self, key: &ArtifactKey) -> Result<String>;

    /// List the artifacts recorded for a run, sorted by stage name
    fn list(&self, run_id: &str) -> Result<Vec<ArtifactKey>>;
}

/// In-process store used by tests and single-process runs
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: Mutex<HashMap<ArtifactKey, String>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<ArtifactKey, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, key: &ArtifactKey, payload: &str) -> Result<()> {
        self.entries().insert(key.clone(), payload.to_string());
        Ok(())
    }

    fn get(&self, key: &ArtifactKey) -> Result<String> {
        self.entries()
            .get(key)
            .cloned()
            .ok_or_else(|| PipelineError::ArtifactNotFound {
                key: key.to_string(),
            })
    }

    fn list(&self, run_id: &str) -> Result<Vec<ArtifactKey>> {
        let mut keys: Vec<ArtifactKey> = self
            .entries()
            .keys()
            .filter(|k| k.run_id == run_id)
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Filesystem store laid out as `<root>/<run_id>/<stage>.artifact`
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &ArtifactKey) -> Result<PathBuf> {
        for part in [&key.run_id, &key.stage] {
            if part.is_empty() || part.contains(['/', '\\']) || part == ".." {
                return Err(PipelineError::Config(format!(
                    "invalid artifact key component '{}'",
                    part
                )));
            }
        }
        Ok(self
            .root
            .join(&key.run_id)
            .join(format!("{}.{}", key.stage, ARTIFACT_EXTENSION)))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, key: &ArtifactKey, payload: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let store_err = |source| PipelineError::Store {
            key: key.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(store_err)?;
        }
        write_atomic(&path, payload.as_bytes()).map_err(store_err)?;
        debug!(key = %key, path = %path.display(), bytes = payload.len(), "Artifact stored");
        Ok(())
    }

    fn get(&self, key: &ArtifactKey) -> Result<String> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(payload) => Ok(payload),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PipelineError::ArtifactNotFound {
                    key: key.to_string(),
                })
            }
            Err(source) => Err(PipelineError::Store {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn list(&self, run_id: &str) -> Result<Vec<ArtifactKey>> {
        let dir = self.root.join(run_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| PipelineError::Store {
            key: run_id.to_string(),
            source,
        })?;

        let mut keys = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            if let Some(stage) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(ArtifactKey::new(run_id, stage));
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Write to a temp file, sync, then rename over the destination
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)
}
