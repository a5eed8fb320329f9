//! Signature matching against the provenance clue database.
//!
//! Matching is a linear scan per function: cost grows with
//! `clues x source length`. Functions are independent, so a bundle's
//! functions can be matched across threads (see [`SignatureMatcher::predict_all`]).

pub mod database;

pub use database::{
    builtin_clues, load_clues, parse_clues, Clue, ClueRecord, IncludesRecord, ProvenanceClue,
};

use rayon::prelude::*;
use tracing::trace;

/// Predicts which library a function came from.
#[derive(Debug, Clone)]
pub struct SignatureMatcher {
    clues: Vec<ProvenanceClue>,
    unmatched: ProvenanceClue,
}

impl SignatureMatcher {
    /// Create a matcher over the given clues, in priority order.
    pub fn new(clues: Vec<ProvenanceClue>) -> Self {
        Self {
            clues,
            unmatched: ProvenanceClue::unmatched(),
        }
    }

    /// Matcher over the built-in database.
    pub fn builtin() -> Self {
        Self::new(builtin_clues())
    }

    pub fn clues(&self) -> &[ProvenanceClue] {
        &self.clues
    }

    /// First clue satisfied by `source`, or the empty clue.
    pub fn predict(&self, source: &str) -> &ProvenanceClue {
        match self.clues.iter().find(|clue| clue.includes.is_match(source)) {
            Some(clue) => {
                trace!("Matched {} on {:?}", clue.module, clue.includes.as_str());
                clue
            }
            None => &self.unmatched,
        }
    }

    /// Predict every source, keeping input order.
    pub fn predict_all<'s>(&'s self, sources: &[&str], parallel: bool) -> Vec<&'s ProvenanceClue> {
        if parallel {
            sources.par_iter().map(|s| self.predict(s)).collect()
        } else {
            sources.iter().map(|s| self.predict(s)).collect()
        }
    }
}

impl Default for SignatureMatcher {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_lodash() {
        let matcher = SignatureMatcher::builtin();
        let clue = matcher.predict(r#"function(n,t,r){var e="__lodash_placeholder__",u=1}"#);
        assert_eq!(clue.module, "lodash");
        assert_eq!(clue.url, "https://lodash.com/");
    }

    #[test]
    fn test_predict_first_listed_wins() {
        let matcher = SignatureMatcher::new(vec![
            ProvenanceClue::literal("first", "shared", ""),
            ProvenanceClue::literal("second", "shared", ""),
        ]);
        assert_eq!(matcher.predict("x shared y").module, "first");
    }

    #[test]
    fn test_vague_clue_only_as_fallback() {
        let matcher = SignatureMatcher::builtin();
        let react_only = r#"function(e){throw Error("https://reactjs.org/docs/error-decoder.html?invariant="+e)}"#;
        assert_eq!(matcher.predict(react_only).module, "react module");

        let redux = format!("{} parentSub.addNestedSub", react_only);
        assert_eq!(matcher.predict(&redux).module, "react-redux");
    }

    #[test]
    fn test_predict_unmatched() {
        let matcher = SignatureMatcher::builtin();
        let clue = matcher.predict("function(e,t){t.exports=42}");
        assert!(clue.is_unmatched());
        assert_eq!(clue.module, "");
        assert_eq!(clue.url, "");
        assert_eq!(clue.includes.as_str(), "");
        assert!(!clue.polyfill);
    }

    #[test]
    fn test_duplicate_module_names_allowed() {
        let matcher = SignatureMatcher::new(vec![
            ProvenanceClue::literal("module-clue", "alpha", ""),
            ProvenanceClue::literal("module-clue", "beta", ""),
        ]);
        assert_eq!(matcher.predict("beta").module, "module-clue");
        assert_eq!(matcher.predict("alpha").module, "module-clue");
    }

    #[test]
    fn test_predict_polyfill_flag() {
        let matcher = SignatureMatcher::builtin();
        let clue = matcher.predict(r#"throw new Error("Generator is already running")"#);
        assert_eq!(clue.module, "regenerator-runtime");
        assert!(clue.polyfill);
    }

    #[test]
    fn test_predict_all_parallel_keeps_order() {
        let matcher = SignatureMatcher::builtin();
        let sources = vec![
            "PrestigioTablet",
            "nothing here",
            "__preactattr_",
            "localeData().monthsShort",
        ];

        let sequential: Vec<_> = matcher
            .predict_all(&sources, false)
            .iter()
            .map(|c| c.module.clone())
            .collect();
        let parallel: Vec<_> = matcher
            .predict_all(&sources, true)
            .iter()
            .map(|c| c.module.clone())
            .collect();

        assert_eq!(sequential, vec!["mobile-detect", "", "preact", "moment"]);
        assert_eq!(sequential, parallel);
    }
}
