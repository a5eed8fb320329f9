//! Path signatures describing where bundlers put their module table.

use crate::types::{InspectorError, Result};
use std::fmt;
use std::str::FromStr;

/// Known locations of the module registration structure, tried in order.
pub const BUILTIN_PATH_SIGNATURES: &[&str] = &[
    // runtime call assigned to a name, e.g. `a=function(e){...}([...])`
    "body.0.expression.right.arguments.0.elements",
    // `!function(modules){...}([...])`
    "body.0.expression.argument.arguments.0.elements",
    // `(function(modules){...})({id: function(){}})`
    "body.0.expression.arguments.0.properties",
    // `(window.webpackJsonp=...).push([[chunkIds], [...]])`
    "body.0.expression.arguments.0.elements.1.elements",
    "body.0.expression.arguments.0.elements.1.properties",
    "body.0.expression.right.arguments.1.body.body.0.declarations.0.init.arguments.1.elements",
    // chunk push as the third top-level statement
    "body.2.expression.arguments.0.elements.1.properties",
];

/// One step of a path signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Named field of a node.
    Field(String),
    /// Position in a node or property list.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => f.write_str(name),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// An ordered sequence of segments from the tree root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSignature {
    segments: Vec<PathSegment>,
}

impl PathSignature {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The built-in signature list.
    pub fn builtin() -> Vec<PathSignature> {
        BUILTIN_PATH_SIGNATURES
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect()
    }
}

impl FromStr for PathSignature {
    type Err = InspectorError;

    /// Parse a dotted path such as `body.0.expression.arguments`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(InspectorError::InvalidPathSignature(s.to_string()));
        }

        let segments = trimmed
            .split('.')
            .map(|part| {
                if part.is_empty() {
                    return Err(InspectorError::InvalidPathSignature(s.to_string()));
                }
                Ok(match part.parse::<usize>() {
                    Ok(index) => PathSegment::Index(index),
                    Err(_) => PathSegment::Field(part.to_string()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { segments })
    }
}

impl fmt::Display for PathSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}
