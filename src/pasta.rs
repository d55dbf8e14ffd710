use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PastaError {
    #[error("The name of the pasta and the pasta itself cannot be empty")]
    Invalid,
    #[error("There is no pasta by that name")]
    NotFound(String),
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a JSON object of strings: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Named snippets persisted as a JSON object. Every mutation is written
/// through to disk.
#[derive(Debug)]
pub struct PastaStore {
    path: PathBuf,
    pastas: BTreeMap<String, String>,
}

impl PastaStore {
    /// A missing file is an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, PastaError> {
        let path = path.into();
        let pastas = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text).map_err(|source| PastaError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no pastas file yet, starting empty");
                BTreeMap::new()
            }
            Err(source) => return Err(PastaError::Io { path, source }),
        };
        Ok(Self { path, pastas })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.pastas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pastas.is_empty()
    }

    pub async fn add(&mut self, name: &str, text: &str) -> Result<(), PastaError> {
        if name.trim().is_empty() || text.trim().is_empty() {
            return Err(PastaError::Invalid);
        }
        self.pastas.insert(name.to_string(), text.to_string());
        self.save().await
    }

    /// Returns whether a pasta was removed.
    pub async fn remove(&mut self, name: &str) -> Result<bool, PastaError> {
        if self.pastas.remove(name).is_none() {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }

    pub fn get(&self, name: &str) -> Result<&str, PastaError> {
        self.pastas
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| PastaError::NotFound(name.to_string()))
    }

    /// Sorted.
    pub fn names(&self) -> Vec<&str> {
        self.pastas.keys().map(String::as_str).collect()
    }

    pub async fn save(&self) -> Result<(), PastaError> {
        let io_err = |source| PastaError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(&self.pastas).map_err(|source| {
            PastaError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        tracing::debug!(path = %self.path.display(), count = self.pastas.len(), "saved pastas");
        Ok(())
    }
}
