//! Provenance clue database.
//!
//! A clue is a fragment of source known to appear in exactly one library.
//! Order matters: matching is first-hit, so precise clues come first and
//! the vague ones are kept at the end of [`builtin_clues`].

use crate::types::{InspectorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a clue is tested against function source.
#[derive(Debug, Clone)]
pub enum Clue {
    /// Plain substring containment.
    Literal(String),
    /// Regular expression search.
    Pattern(Regex),
}

impl Clue {
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Clue::Literal(needle) => text.contains(needle.as_str()),
            Clue::Pattern(re) => re.is_match(text),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Clue::Literal(needle) => needle,
            Clue::Pattern(re) => re.as_str(),
        }
    }
}

/// A library signature.
#[derive(Debug, Clone)]
pub struct ProvenanceClue {
    /// Predicted module name. Several clues may share one name.
    pub module: String,
    pub includes: Clue,
    /// Where the module comes from, possibly empty.
    pub url: String,
    pub polyfill: bool,
}

impl ProvenanceClue {
    pub fn literal(module: &str, includes: &str, url: &str) -> Self {
        Self {
            module: module.to_string(),
            includes: Clue::Literal(includes.to_string()),
            url: url.to_string(),
            polyfill: false,
        }
    }

    pub fn pattern(module: &str, pattern: &str, url: &str) -> Result<Self> {
        let re = Regex::new(pattern).map_err(|e| InspectorError::InvalidClue {
            module: module.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            module: module.to_string(),
            includes: Clue::Pattern(re),
            url: url.to_string(),
            polyfill: false,
        })
    }

    pub fn as_polyfill(mut self) -> Self {
        self.polyfill = true;
        self
    }

    /// Clue returned when nothing matched: every field empty.
    pub fn unmatched() -> Self {
        Self::literal("", "", "")
    }

    pub fn is_unmatched(&self) -> bool {
        self.module.is_empty()
    }

    pub fn to_record(&self) -> ClueRecord {
        ClueRecord {
            module: self.module.clone(),
            includes: match &self.includes {
                Clue::Literal(s) => IncludesRecord::Literal(s.clone()),
                Clue::Pattern(re) => IncludesRecord::Pattern {
                    pattern: re.as_str().to_string(),
                },
            },
            url: self.url.clone(),
            polyfill: self.polyfill,
        }
    }
}

/// Serialized shape of a clue's predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncludesRecord {
    Literal(String),
    Pattern { pattern: String },
}

/// Serialized clue, as found in clue files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClueRecord {
    pub module: String,
    pub includes: IncludesRecord,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub polyfill: bool,
}

impl TryFrom<ClueRecord> for ProvenanceClue {
    type Error = InspectorError;

    fn try_from(record: ClueRecord) -> Result<Self> {
        if record.module.trim().is_empty() {
            return Err(InspectorError::InvalidClue {
                module: record.module,
                reason: "module name is empty".to_string(),
            });
        }

        let clue = match record.includes {
            // An empty needle would match every function
            IncludesRecord::Literal(needle) if needle.is_empty() => {
                return Err(InspectorError::InvalidClue {
                    module: record.module,
                    reason: "literal clue is empty".to_string(),
                });
            }
            IncludesRecord::Literal(needle) => {
                ProvenanceClue::literal(&record.module, &needle, &record.url)
            }
            IncludesRecord::Pattern { pattern } => {
                ProvenanceClue::pattern(&record.module, &pattern, &record.url)?
            }
        };

        Ok(if record.polyfill { clue.as_polyfill() } else { clue })
    }
}

/// Parse a JSON clue file body.
pub fn parse_clues(json: &str) -> Result<Vec<ProvenanceClue>> {
    let records: Vec<ClueRecord> = serde_json::from_str(json)?;
    records.into_iter().map(ProvenanceClue::try_from).collect()
}

/// Load clues from a JSON file.
pub fn load_clues(path: &Path) -> Result<Vec<ProvenanceClue>> {
    let content = std::fs::read_to_string(path)?;
    parse_clues(&content)
}

/// The built-in clue database, in priority order.
pub fn builtin_clues() -> Vec<ProvenanceClue> {
    use ProvenanceClue as C;

    let mut clues = vec![
        C::literal(
            "bluebird",
            "prototype.disableTrampolineIfNecessary",
            "https://github.com/petkaantonov/bluebird",
        )
        .as_polyfill(),
        C {
            module: "bn".to_string(),
            includes: Clue::Pattern(Regex::new(r"67108864\s?&\s?67108863").unwrap()),
            url: "https://github.com/indutny/bn.js/".to_string(),
            polyfill: false,
        },
    ];

    clues.extend([
        C::literal(
            "character-entities",
            "CapitalDifferentialD:",
            "https://www.npmjs.com/package/character-entities",
        ),
        C::literal(
            "corejs/promise",
            "Promise can't be resolved itself",
            "https://github.com/zloirock/core-js/blob/master/packages/core-js/modules/es.promise.js",
        )
        .as_polyfill(),
        C::literal(
            "elliptic",
            "prototype._getEndoRoots",
            "https://github.com/indutny/elliptic",
        ),
        C::literal(
            "emotion",
            r#"querySelectorAll("style[data-emotion-""#,
            "https://github.com/emotion-js/emotion",
        ),
        C::literal(
            "fingerprint2",
            "getWebglVendorAndRenderer",
            "https://github.com/Valve/fingerprintjs2/",
        ),
        C::literal(
            "i18next",
            "options.overloadTranslationOptionHandler",
            "https://www.i18next.com/",
        ),
        C::literal(
            "immutable-js",
            "Expected Array or iterable object of values, or keyed object",
            "https://github.com/immutable-js/immutable-js",
        ),
        C::literal("lodash", "__lodash_placeholder__", "https://lodash.com/"),
        C::literal(
            "marked",
            r#"Error("Infinite loop on byte: ""#,
            "https://github.com/markedjs/marked",
        ),
        C::literal(
            "mobile-detect",
            "PrestigioTablet",
            "http://hgoebl.github.io/mobile-detect.js/",
        ),
        C::literal("moment", "localeData().monthsShort", "https://momentjs.com/"),
        C::literal("next/route", r#"Error("Cannot update unavailable route:"#, ""),
        C::literal(
            "next/client/index",
            r#"emit("before-reactdom-render""#,
            "https://github.com/zeit/next.js/blob/canary/packages/next/client/index.js",
        ),
        C::literal(
            "node/buffer",
            r#"Error("If encoding is specified then the first argument must be a string")"#,
            "",
        ),
        C::literal(
            "node/url",
            r#""Parameter 'url' must be a string, not ""#,
            "https://github.com/nodejs/node/blob/master/lib/url.js",
        ),
        C::literal(
            "nprogress",
            "nprogress-custom-parent",
            "https://github.com/rstacruz/nprogress",
        ),
        C::literal(
            "popmotion",
            "are of different format, or a value might have changed value",
            "https://popmotion.io/",
        ),
        C::literal("preact", "__preactattr_", "https://preactjs.com/"),
        C::literal(
            "raven-js",
            "Error: Raven has already been configured",
            "https://www.npmjs.com/package/raven-js",
        ),
        C::literal(
            "react-aria-modal",
            "react-aria-modal instances should have",
            "https://github.com/davidtheclark/react-aria-modal",
        ),
        C::literal(
            "react-i18Next",
            "getI18nTranslate.bind",
            "https://react.i18next.com/",
        ),
        C::literal(
            "react-helmet",
            "convertReactPropstoHtmlAttributes",
            "https://github.com/nfl/react-helmet",
        ),
        C::literal(
            "react-intl",
            "pluralRuleFunction:function",
            "https://github.com/formatjs/react-intl",
        ),
        C::literal(
            "react-redux",
            "parentSub.addNestedSub",
            "https://react-redux.js.org/",
        ),
        C::literal(
            "regenerator-runtime",
            r#"Error("Generator is already running")"#,
            "https://www.npmjs.com/package/regenerator-runtime",
        )
        .as_polyfill(),
        C::literal(
            "styled-jsx/stylesheet",
            "StyleSheet: illegal rule:",
            "https://github.com/zeit/styled-jsx",
        ),
        C::literal(
            "whatwg-fetch",
            r#"searchParams:"URLSearchParams""#,
            "https://www.npmjs.com/package/whatwg-fetch",
        )
        .as_polyfill(),
        // Vague clues, keep last
        // Emitted by Babel's class transform, so it shows up in app code too
        C::literal(
            "possible application code",
            "this hasn't been initialised - super() hasn't been called",
            "",
        ),
        C::literal(
            "react module",
            "https://reactjs.org/docs/error-decoder.html?invariant=",
            "",
        ),
    ]);

    clues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_database_shape() {
        let clues = builtin_clues();
        assert_eq!(clues.len(), 31);
        assert_eq!(clues[0].module, "bluebird");
        assert_eq!(clues[1].module, "bn");
        assert!(matches!(clues[1].includes, Clue::Pattern(_)));
        assert!(clues[1].includes.is_match("r=67108864&67108863"));
        assert_eq!(
            clues.iter().filter(|c| matches!(c.includes, Clue::Pattern(_))).count(),
            1
        );
        assert_eq!(clues[clues.len() - 2].module, "possible application code");
        assert_eq!(clues[clues.len() - 1].module, "react module");

        let polyfills: Vec<_> = clues.iter().filter(|c| c.polyfill).map(|c| c.module.as_str()).collect();
        assert_eq!(
            polyfills,
            vec!["bluebird", "corejs/promise", "regenerator-runtime", "whatwg-fetch"]
        );
    }

    #[test]
    fn test_literal_and_pattern_clues() {
        let literal = Clue::Literal("CapitalDifferentialD:".to_string());
        assert!(literal.is_match(r#"{CapitalDifferentialD:"ⅅ",Cap:"∩"}"#));
        assert!(!literal.is_match("CapitalDifferentialD"));

        let pattern = Clue::Pattern(Regex::new(r"67108864\s?&\s?67108863").unwrap());
        assert!(pattern.is_match("t=67108864 & 67108863"));
        assert!(pattern.is_match("t=67108864&67108863"));
        assert!(!pattern.is_match("t=67108864  &  67108863"));
    }

    #[test]
    fn test_parse_clue_file() {
        let json = r#"[
            { "module": "acme-ui", "includes": "acme-ui-root", "url": "https://acme.dev" },
            { "module": "acme-math", "includes": { "pattern": "0x5f3759df" }, "polyfill": true }
        ]"#;

        let clues = parse_clues(json).unwrap();
        assert_eq!(clues.len(), 2);
        assert!(matches!(&clues[0].includes, Clue::Literal(s) if s == "acme-ui-root"));
        assert_eq!(clues[0].url, "https://acme.dev");
        assert!(matches!(clues[1].includes, Clue::Pattern(_)));
        assert!(clues[1].polyfill);
        assert_eq!(clues[1].url, "");
    }

    #[test]
    fn test_reject_invalid_clues() {
        let empty = r#"[{ "module": "x", "includes": "" }]"#;
        assert!(matches!(
            parse_clues(empty),
            Err(InspectorError::InvalidClue { .. })
        ));

        let bad_regex = r#"[{ "module": "x", "includes": { "pattern": "(" } }]"#;
        assert!(matches!(
            parse_clues(bad_regex),
            Err(InspectorError::InvalidClue { .. })
        ));

        let unnamed = r#"[{ "module": " ", "includes": "abc" }]"#;
        assert!(parse_clues(unnamed).is_err());

        assert!(matches!(
            parse_clues("{}"),
            Err(InspectorError::JsonError(_))
        ));
    }

    #[test]
    fn test_record_round_trip_keeps_order() {
        let records: Vec<ClueRecord> = builtin_clues().iter().map(|c| c.to_record()).collect();
        let json = serde_json::to_string(&records).unwrap();
        let reparsed = parse_clues(&json).unwrap();

        let names: Vec<_> = reparsed.iter().map(|c| c.module.clone()).collect();
        let expected: Vec<_> = builtin_clues().iter().map(|c| c.module.clone()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_load_clues_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clues.json");
        std::fs::write(&path, r#"[{ "module": "acme", "includes": "ACME_MARKER" }]"#).unwrap();

        let clues = load_clues(&path).unwrap();
        assert_eq!(clues[0].module, "acme");
    }
}
