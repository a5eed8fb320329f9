//! Core types and errors for the bundle inspector.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while inspecting a bundle.
#[derive(Error, Debug)]
pub enum InspectorError {
    #[error("Bundle could not be parsed: {0}")]
    ParseFailure(String),

    #[error("No module registration structure found ({signatures_tried} path signatures tried)")]
    StructuralNotFound { signatures_tried: usize },

    #[error("Node span {start}..{end} is outside the bundle text ({len} bytes)")]
    InvalidSpan { start: usize, end: usize, len: usize },

    #[error("Invalid clue for module {module:?}: {reason}")]
    InvalidClue { module: String, reason: String },

    #[error("Invalid path signature {0:?}")]
    InvalidPathSignature(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Analysis worker failed: {0}")]
    WorkerError(String),
}

pub type Result<T> = std::result::Result<T, InspectorError>;

/// One module initializer recovered from a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// 1-based position in discovery order.
    pub id: usize,
    /// Predicted module name, empty when no clue matched.
    pub name: String,
    /// Source text of the initializer as it appears in the bundle.
    pub code: String,
    /// Provenance reference of the matched clue.
    #[serde(skip)]
    pub url: String,
    /// Whether the matched clue marks a polyfill.
    #[serde(skip)]
    pub polyfill: bool,
}

impl FunctionRecord {
    /// Whether a clue identified this function.
    pub fn is_identified(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Ordered list of recovered functions; serializes as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult {
    pub functions: Vec<FunctionRecord>,
}

impl AnalysisResult {
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Number of functions attributed to some module.
    pub fn identified_count(&self) -> usize {
        self.functions.iter().filter(|f| f.is_identified()).count()
    }

    /// Number of functions attributed to a polyfill.
    pub fn polyfill_count(&self) -> usize {
        self.functions.iter().filter(|f| f.polyfill).count()
    }

    /// Per-module function counts, in order of first appearance.
    pub fn module_counts(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for function in self.functions.iter().filter(|f| f.is_identified()) {
            match counts.iter_mut().find(|(name, _)| *name == function.name) {
                Some((_, count)) => *count += 1,
                None => counts.push((function.name.as_str(), 1)),
            }
        }
        counts
    }
}

/// An analysis result together with how it was obtained.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub result: AnalysisResult,
    /// Dotted form of the path signature that located the modules.
    pub signature: String,
    /// Recoverable diagnostics reported by the parser.
    pub parse_errors: usize,
    /// Whether the parser had to repair or truncate the bundle.
    pub salvaged: bool,
}

/// A bundle read from disk or stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleFile {
    /// Where the bundle came from (`-` for stdin).
    pub path: PathBuf,
    /// Full bundle text.
    pub content: String,
    /// SHA256 hash of the content for deduplication.
    pub content_hash: String,
}

impl BundleFile {
    pub fn new(path: impl Into<PathBuf>, content: String) -> Self {
        let content_hash = hex::encode(Sha256::digest(content.as_bytes()));
        Self {
            path: path.into(),
            content,
            content_hash,
        }
    }
}

/// Outcome of analyzing one bundle file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleReport {
    /// Input path as given on the command line.
    pub input: String,
    pub content_hash: String,
    /// Bundle size in bytes.
    pub bytes: usize,
    /// Path signature that located the modules, if any.
    pub signature: Option<String>,
    pub functions: AnalysisResult,
    /// Failure message when the bundle could not be analyzed.
    pub error: Option<String>,
    /// Analysis duration in seconds.
    pub duration_secs: f64,
}

impl BundleReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: usize, name: &str, polyfill: bool) -> FunctionRecord {
        FunctionRecord {
            id,
            name: name.to_string(),
            code: "function(){}".to_string(),
            url: String::new(),
            polyfill,
        }
    }

    #[test]
    fn test_result_serializes_as_array_of_three_fields() {
        let result = AnalysisResult {
            functions: vec![FunctionRecord {
                id: 1,
                name: "lodash".to_string(),
                code: "function(){}".to_string(),
                url: "https://lodash.com/".to_string(),
                polyfill: false,
            }],
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "id": 1, "name": "lodash", "code": "function(){}" }])
        );
    }

    #[test]
    fn test_module_counts_keep_first_appearance_order() {
        let result = AnalysisResult {
            functions: vec![
                record(1, "react module", false),
                record(2, "", false),
                record(3, "lodash", false),
                record(4, "react module", false),
                record(5, "regenerator-runtime", true),
            ],
        };

        assert_eq!(
            result.module_counts(),
            vec![("react module", 2), ("lodash", 1), ("regenerator-runtime", 1)]
        );
        assert_eq!(result.identified_count(), 4);
        assert_eq!(result.polyfill_count(), 1);
    }

    #[test]
    fn test_bundle_file_hash() {
        let a = BundleFile::new("a.js", "var a=1;".to_string());
        let b = BundleFile::new("b.js", "var a=1;".to_string());
        let c = BundleFile::new("c.js", "var a=2;".to_string());

        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }
}
