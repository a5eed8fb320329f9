//! bundle-inspector - Recover module structure from minified webpack bundles.
//!
//! This library inspects a bundled script without executing it:
//! - Parsing it with an error-tolerant JavaScript parser
//! - Locating the bundler's module registration table via path signatures
//! - Slicing out each packed module initializer
//! - Predicting which library each initializer came from using source clues
//!
//! # Example
//!
//! ```no_run
//! use bundle_inspector::Analyzer;
//!
//! let bundle = std::fs::read_to_string("main.js").unwrap();
//! let result = Analyzer::builtin().analyze(&bundle).unwrap();
//! for function in &result.functions {
//!     println!("{} {}", function.id, function.name);
//! }
//! ```

pub mod analyzer;
pub mod clues;
pub mod config;
pub mod locator;
pub mod notify;
pub mod parser;
pub mod types;

pub use analyzer::Analyzer;
pub use clues::{Clue, ProvenanceClue, SignatureMatcher};
pub use config::{AnalyzeConfig, Commands, Config};
pub use locator::{PathSegment, PathSignature, StructuralLocator};
pub use types::{
    AnalysisResult, BundleFile, BundleReport, FunctionRecord, Inspection, InspectorError, Result,
};

use std::sync::LazyLock;

static DEFAULT_ANALYZER: LazyLock<Analyzer> = LazyLock::new(Analyzer::builtin);

/// Analyze a bundle with the built-in signatures and clues.
pub fn analyze(bundle: &str) -> Result<AnalysisResult> {
    DEFAULT_ANALYZER.analyze(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_with_default_analyzer() {
        let bundle = r#"!function(e){}([function(e,t){var n="__lodash_placeholder__"}]);"#;
        let result = analyze(bundle).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.functions[0].id, 1);
        assert_eq!(result.functions[0].name, "lodash");
    }

    #[test]
    fn test_analyze_reports_not_found() {
        assert!(matches!(
            analyze("var a = 1;"),
            Err(InspectorError::StructuralNotFound { .. })
        ));
    }
}
