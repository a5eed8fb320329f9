//! Structural locator: finds the module registration structure in a tree.
//!
//! Each [`PathSignature`] is interpreted against the typed tree one segment
//! at a time. The first signature that ends on a non-empty node or property
//! list wins.

pub mod signatures;

pub use signatures::{PathSegment, PathSignature, BUILTIN_PATH_SIGNATURES};

use crate::parser::{SyntaxNode, Value};
use crate::types::{InspectorError, Result};
use tracing::{debug, trace};

/// Module entries found by a path signature.
#[derive(Debug, Clone)]
pub struct LocatedModules<'t> {
    /// Position of the winning signature in the locator's list.
    pub signature_index: usize,
    pub signature: &'t PathSignature,
    /// Entries in source order, holes removed.
    pub entries: Vec<&'t SyntaxNode>,
}

/// Where a partially resolved path currently points.
#[derive(Debug, Clone, Copy)]
enum Cursor<'t> {
    Node(&'t SyntaxNode),
    Value(&'t Value),
}

impl<'t> Cursor<'t> {
    fn step(self, segment: &PathSegment) -> Option<Cursor<'t>> {
        match (self, segment) {
            (Cursor::Node(node), PathSegment::Field(name)) => node.field(name).map(Cursor::Value),
            (Cursor::Value(Value::Node(node)), PathSegment::Field(name)) => {
                node.field(name).map(Cursor::Value)
            }
            (Cursor::Value(Value::NodeList(items)), PathSegment::Index(i)) => {
                items.get(*i)?.as_ref().map(Cursor::Node)
            }
            (Cursor::Value(Value::PropertyList(items)), PathSegment::Index(i)) => {
                items.get(*i).map(Cursor::Node)
            }
            _ => None,
        }
    }
}

/// Tries an ordered list of path signatures against a syntax tree.
#[derive(Debug, Clone)]
pub struct StructuralLocator {
    signatures: Vec<PathSignature>,
}

impl StructuralLocator {
    /// Create a locator over the given signatures, tried in order.
    pub fn new(signatures: Vec<PathSignature>) -> Self {
        Self { signatures }
    }

    /// Locator over the built-in signature list.
    pub fn builtin() -> Self {
        Self::new(PathSignature::builtin())
    }

    pub fn signatures(&self) -> &[PathSignature] {
        &self.signatures
    }

    /// Length of the longest signature.
    pub fn max_depth(&self) -> usize {
        self.signatures.iter().map(|s| s.len()).max().unwrap_or(0)
    }

    /// Find the module entries of `tree`.
    ///
    /// Returns [`InspectorError::StructuralNotFound`] when no signature
    /// resolves to a non-empty list.
    pub fn locate<'t>(&'t self, tree: &'t SyntaxNode) -> Result<LocatedModules<'t>> {
        for (index, signature) in self.signatures.iter().enumerate() {
            let Some(entries) = resolve(tree, signature) else {
                continue;
            };

            debug!(
                "Located {} module entries via {}",
                entries.len(),
                signature
            );
            return Ok(LocatedModules {
                signature_index: index,
                signature,
                entries,
            });
        }

        Err(InspectorError::StructuralNotFound {
            signatures_tried: self.signatures.len(),
        })
    }
}

impl Default for StructuralLocator {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Walk one signature, returning its non-empty entry list.
fn resolve<'t>(tree: &'t SyntaxNode, signature: &PathSignature) -> Option<Vec<&'t SyntaxNode>> {
    let mut cursor = Cursor::Node(tree);
    for (depth, segment) in signature.segments().iter().enumerate() {
        match cursor.step(segment) {
            Some(next) => cursor = next,
            None => {
                trace!("{} missed at segment {} ({})", signature, depth, segment);
                return None;
            }
        }
    }

    let entries: Vec<&SyntaxNode> = match cursor {
        Cursor::Value(Value::NodeList(items)) => items.iter().flatten().collect(),
        Cursor::Value(Value::PropertyList(items)) => items.iter().collect(),
        Cursor::Value(other) => {
            trace!("{} resolved to a {}, not a list", signature, other.describe());
            return None;
        }
        Cursor::Node(node) => {
            trace!("{} resolved to a {} node, not a list", signature, node.kind);
            return None;
        }
    };

    if entries.is_empty() {
        trace!("{} resolved to an empty list", signature);
        return None;
    }

    Some(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{BundleParser, Span};

    fn leaf(kind: &'static str, start: usize, end: usize) -> SyntaxNode {
        SyntaxNode::new(kind, Span::new(start, end))
    }

    fn list(items: Vec<SyntaxNode>) -> Value {
        Value::NodeList(items.into_iter().map(Some).collect())
    }

    fn sig(path: &str) -> PathSignature {
        path.parse().unwrap()
    }

    /// `Program { body: [ExpressionStatement { expression }] }`
    fn program_with(expression: SyntaxNode) -> SyntaxNode {
        let stmt = leaf("ExpressionStatement", 0, 100).with("expression", Value::node(expression));
        leaf("Program", 0, 100).with("body", list(vec![stmt]))
    }

    #[test]
    fn test_locate_earliest_signature_wins() {
        // Both signatures resolve; the first listed wins
        let call = leaf("CallExpression", 0, 100)
            .with("arguments", list(vec![leaf("ArrayExpression", 1, 50).with(
                "elements",
                list(vec![leaf("FunctionExpression", 2, 10)]),
            )]))
            .with("callee", Value::node(leaf("Identifier", 0, 1).with(
                "elements",
                list(vec![leaf("FunctionExpression", 60, 70), leaf("FunctionExpression", 71, 80)]),
            )));
        let tree = program_with(call);

        let locator = StructuralLocator::new(vec![
            sig("body.0.expression.arguments.0.elements"),
            sig("body.0.expression.callee.elements"),
        ]);
        let located = locator.locate(&tree).unwrap();
        assert_eq!(located.signature_index, 0);
        assert_eq!(located.entries.len(), 1);
        assert_eq!(located.entries[0].span, Span::new(2, 10));

        let reversed = StructuralLocator::new(vec![
            sig("body.0.expression.callee.elements"),
            sig("body.0.expression.arguments.0.elements"),
        ]);
        let located = reversed.locate(&tree).unwrap();
        assert_eq!(located.signature_index, 0);
        assert_eq!(located.entries.len(), 2);
    }

    #[test]
    fn test_locate_falls_back_past_missing_and_scalar() {
        let call = leaf("CallExpression", 0, 100)
            .with("name", Value::str("x"))
            .with("arguments", list(vec![leaf("ObjectExpression", 1, 40).with(
                "properties",
                Value::PropertyList(vec![leaf("Property", 2, 20), leaf("Property", 21, 39)]),
            )]));
        let tree = program_with(call);

        let locator = StructuralLocator::new(vec![
            sig("body.0.expression.right.arguments.0.elements"),
            sig("body.0.expression.name"),
            sig("body.0.expression"),
            sig("body.0.expression.arguments.0.properties"),
        ]);
        let located = locator.locate(&tree).unwrap();
        assert_eq!(located.signature_index, 3);
        let spans: Vec<_> = located.entries.iter().map(|n| n.span).collect();
        assert_eq!(spans, vec![Span::new(2, 20), Span::new(21, 39)]);
    }

    #[test]
    fn test_locate_filters_holes() {
        let array = leaf("ArrayExpression", 0, 30).with(
            "elements",
            Value::NodeList(vec![
                None,
                Some(leaf("FunctionExpression", 2, 10)),
                None,
                Some(leaf("FunctionExpression", 12, 20)),
            ]),
        );
        let tree = program_with(leaf("CallExpression", 0, 30).with("arguments", list(vec![array])));

        let locator = StructuralLocator::new(vec![sig("body.0.expression.arguments.0.elements")]);
        let located = locator.locate(&tree).unwrap();
        assert_eq!(located.entries.len(), 2);
    }

    #[test]
    fn test_index_into_hole_misses() {
        let array = leaf("ArrayExpression", 0, 30).with("elements", Value::NodeList(vec![None]));
        let tree = program_with(leaf("CallExpression", 0, 30).with("arguments", list(vec![array])));

        let locator = StructuralLocator::new(vec![sig("body.0.expression.arguments.0.elements.0.body")]);
        assert!(locator.locate(&tree).is_err());
    }

    #[test]
    fn test_empty_list_is_not_a_match() {
        let empty = leaf("ArrayExpression", 0, 2).with("elements", Value::NodeList(vec![None, None]));
        let tree = program_with(leaf("CallExpression", 0, 30).with("arguments", list(vec![empty])));

        let locator = StructuralLocator::new(vec![sig("body.0.expression.arguments.0.elements")]);
        let err = locator.locate(&tree).unwrap_err();
        assert!(matches!(
            err,
            InspectorError::StructuralNotFound { signatures_tried: 1 }
        ));
    }

    #[test]
    fn test_field_on_list_misses() {
        let tree = program_with(leaf("CallExpression", 0, 30));
        let locator = StructuralLocator::new(vec![sig("body.length")]);
        assert!(locator.locate(&tree).is_err());
    }

    #[test]
    fn test_builtin_locates_object_bundle() {
        let source = "(function(e){return e})({12:function(e,t){t.a=1},7:function(e){}});";
        let tree = BundleParser::default().parse(source).unwrap().tree;

        let locator = StructuralLocator::builtin();
        let located = locator.locate(&tree).unwrap();
        assert_eq!(
            located.signature.to_string(),
            "body.0.expression.arguments.0.properties"
        );

        let codes: Vec<&str> = located
            .entries
            .iter()
            .map(|n| &source[n.span.start..n.span.end])
            .collect();
        assert_eq!(codes, vec!["12:function(e,t){t.a=1}", "7:function(e){}"]);
    }

    #[test]
    fn test_builtin_locates_jsonp_chunk() {
        let source = "(window.webpackJsonp=window.webpackJsonp||[]).push([[3],[function(e,t){},,function(e){}]]);";
        let tree = BundleParser::default().parse(source).unwrap().tree;

        let locator = StructuralLocator::builtin();
        let located = locator.locate(&tree).unwrap();
        assert_eq!(located.signature_index, 3);
        assert_eq!(located.entries.len(), 2);
    }

    #[test]
    fn test_builtin_locates_jsonp_object_chunk() {
        let source = "(window.webpackJsonp=window.webpackJsonp||[]).push([[1],{7:function(){},9:function(){}}]);";
        let tree = BundleParser::default().parse(source).unwrap().tree;

        let locator = StructuralLocator::builtin();
        let located = locator.locate(&tree).unwrap();
        assert_eq!(located.signature_index, 4);
        assert_eq!(
            located.signature.to_string(),
            "body.0.expression.arguments.0.elements.1.properties"
        );

        let codes: Vec<&str> = located
            .entries
            .iter()
            .map(|n| &source[n.span.start..n.span.end])
            .collect();
        assert_eq!(codes, vec!["7:function(){}", "9:function(){}"]);
    }

    #[test]
    fn test_builtin_locates_umd_wrapper() {
        let source = "e.exports=t(this,function(){var a=r([1],[function(){},function(){}])});";
        let tree = BundleParser::default().parse(source).unwrap().tree;

        let locator = StructuralLocator::builtin();
        let located = locator.locate(&tree).unwrap();
        assert_eq!(located.signature_index, 5);
        assert_eq!(
            located.signature.to_string(),
            "body.0.expression.right.arguments.1.body.body.0.declarations.0.init.arguments.1.elements"
        );

        let spans: Vec<Span> = located.entries.iter().map(|n| n.span).collect();
        assert_eq!(spans, vec![Span::new(41, 53), Span::new(54, 66)]);
        for span in spans {
            assert_eq!(&source[span.start..span.end], "function(){}");
        }
    }

    #[test]
    fn test_builtin_misses_plain_script() {
        let tree = BundleParser::default().parse("var a = 1; console.log(a);").unwrap().tree;
        let locator = StructuralLocator::builtin();
        let err = locator.locate(&tree).unwrap_err();
        assert!(matches!(
            err,
            InspectorError::StructuralNotFound { signatures_tried: 7 }
        ));
    }

    #[test]
    fn test_max_depth() {
        assert_eq!(StructuralLocator::builtin().max_depth(), 15);
        assert_eq!(StructuralLocator::new(vec![]).max_depth(), 0);
    }
}
