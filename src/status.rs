//! Runtime state: every readiness record currently in the runtime directory.
//!
//! Orchestration reads the runtime directory back into one map of assertions
//! and gates on required keys being affirmed (`tv == "Y"`). Files that cannot be
//! read or parsed are skipped, since other writers may share the directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::record::{Assertion, TruthValue};

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("Failed to read runtime directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Merged assertions from all records in a runtime directory, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeState {
    entries: BTreeMap<String, Assertion>,
}

impl RuntimeState {
    /// Read every `*.json` record in `dir`.
    ///
    /// Files are merged in name order; a key present in several files keeps the
    /// value from the last one.
    pub async fn scan(dir: &Path) -> Result<Self, StatusError> {
        let read_dir_error = |source| StatusError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir).await.map_err(read_dir_error)?;
        while let Some(entry) = read_dir.next_entry().await.map_err(read_dir_error)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();

        let mut state = Self::default();
        for path in files {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable record"
                    );
                    continue;
                }
            };
            match serde_json::from_str::<BTreeMap<String, Assertion>>(&contents) {
                Ok(record) => {
                    for (key, assertion) in record {
                        tracing::debug!(
                            file = %path.display(),
                            %key,
                            tv = ?assertion.tv,
                            "Loaded assertion"
                        );
                        state.entries.insert(key, assertion);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping malformed record");
                }
            }
        }

        Ok(state)
    }

    pub fn get(&self, key: &str) -> Option<&Assertion> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Assertion)> {
        self.entries.iter().map(|(key, assertion)| (key.as_str(), assertion))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Required keys that are absent or not affirmed
    pub fn missing<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|key| {
                self.get(key)
                    .map(|assertion| assertion.tv != TruthValue::Y)
                    .unwrap_or(true)
            })
            .map(String::as_str)
            .collect()
    }
}
