//! Readiness records: write-once JSON marker files in the shared runtime directory.
//!
//! Each record maps one fixed key to a prompt/response assertion, for example
//!
//! ```json
//! {
//!   "mongodb_status": {
//!     "prompt": "Is MongoDB connected?",
//!     "response": ["yes"],
//!     "tv": "Y"
//!   }
//! }
//! ```
//!
//! Records are only ever written on confirmed success. A failed component leaves
//! no file behind; its exit status carries the failure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The single response value a successful assertion carries
pub const AFFIRMATIVE_RESPONSE: &str = "yes";

/// Truth value of an assertion.
///
/// Components in this crate only ever write `Y`. `N` and `U` appear in records
/// written by external orchestration tooling sharing the runtime directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TruthValue {
    Y,
    N,
    U,
}

/// A prompt and its recorded response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub prompt: String,
    pub response: Vec<String>,
    pub tv: TruthValue,
}

impl Assertion {
    /// An assertion answered "yes"
    pub fn affirmed(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            response: vec![AFFIRMATIVE_RESPONSE.to_string()],
            tv: TruthValue::Y,
        }
    }
}

/// The components that report readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Mongodb,
    Api,
    Client,
}

impl RecordKind {
    pub fn key(self) -> &'static str {
        match self {
            RecordKind::Mongodb => "mongodb_status",
            RecordKind::Api => "api_ready",
            RecordKind::Client => "client_ready",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            RecordKind::Mongodb => "Is MongoDB connected?",
            RecordKind::Api => "Is API ready?",
            RecordKind::Client => "Is client ready?",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            RecordKind::Mongodb => "mongodb_status.json",
            RecordKind::Api => "api_status.json",
            RecordKind::Client => "client_status.json",
        }
    }
}

/// A complete readiness record: one key, one affirmed assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessRecord {
    kind: RecordKind,
    assertion: Assertion,
}

impl ReadinessRecord {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            assertion: Assertion::affirmed(kind.prompt()),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// The on-disk document shape: `{ "<key>": { prompt, response, tv } }`
    pub fn document(&self) -> BTreeMap<&'static str, &Assertion> {
        BTreeMap::from([(self.kind.key(), &self.assertion)])
    }

    /// Pretty-printed JSON with two-space indentation
    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string_pretty(&self.document())?)
    }
}

/// Writes one readiness record, once.
///
/// `write` consumes the writer, so a component holding a single
/// `RecordWriter` cannot write its record twice.
#[derive(Debug)]
pub struct RecordWriter {
    record: ReadinessRecord,
    path: PathBuf,
}

impl RecordWriter {
    /// Writer for `kind`'s file inside `runtime_dir`
    pub fn new(kind: RecordKind, runtime_dir: &Path) -> Self {
        Self {
            record: ReadinessRecord::new(kind),
            path: runtime_dir.join(kind.file_name()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hidden sibling of the final path; not picked up by `*.json` scans.
    fn staging_path(&self) -> PathBuf {
        let name = self.record.kind().file_name();
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    /// Serialize the record and write it, creating the runtime directory if needed.
    pub async fn write(self) -> Result<PathBuf, RecordError> {
        let json = self.record.to_json()?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RecordError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        // Readers polling the directory only ever see a complete file
        let staging = self.staging_path();
        if let Err(source) = tokio::fs::write(&staging, json).await {
            return Err(RecordError::Write {
                path: staging,
                source,
            });
        }
        if let Err(source) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(RecordError::Write {
                path: self.path.clone(),
                source,
            });
        }

        tracing::info!(
            key = self.record.kind().key(),
            path = %self.path.display(),
            "Readiness record written"
        );
        Ok(self.path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Failed to serialize readiness record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write readiness record {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mongodb_record_document() {
        let record = ReadinessRecord::new(RecordKind::Mongodb);
        let value: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "mongodb_status": {
                    "prompt": "Is MongoDB connected?",
                    "response": ["yes"],
                    "tv": "Y"
                }
            })
        );
    }

    #[test]
    fn test_record_uses_two_space_indent() {
        let json = ReadinessRecord::new(RecordKind::Api).to_json().unwrap();
        let expected = r#"{
  "api_ready": {
    "prompt": "Is API ready?",
    "response": [
      "yes"
    ],
    "tv": "Y"
  }
}"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn test_record_kind_file_names() {
        assert_eq!(RecordKind::Mongodb.file_name(), "mongodb_status.json");
        assert_eq!(RecordKind::Api.file_name(), "api_status.json");
        assert_eq!(RecordKind::Client.file_name(), "client_status.json");
    }

    #[test]
    fn test_truth_value_parses_unknown() {
        let assertion: Assertion =
            serde_json::from_str(r#"{"prompt":"Is it up?","response":[],"tv":"U"}"#).unwrap();
        assert_eq!(assertion.tv, TruthValue::U);
    }

    #[tokio::test]
    async fn test_writer_creates_runtime_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = dir.path().join("nested").join("runtime");
        let writer = RecordWriter::new(RecordKind::Client, &runtime);

        let path = writer.write().await.unwrap();

        assert_eq!(path, runtime.join("client_status.json"));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"client_ready\""));
        assert!(contents.contains("\"Is client ready?\""));
    }

    #[tokio::test]
    async fn test_writer_replaces_stale_record_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_status.json");
        std::fs::write(&path, "{ \"api_ready\": ").unwrap();

        RecordWriter::new(RecordKind::Api, dir.path())
            .write()
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            ReadinessRecord::new(RecordKind::Api).to_json().unwrap()
        );
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("api_status.json")]);
    }
}
