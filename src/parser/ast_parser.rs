//! Error-tolerant bundle parser using oxc_parser.
//!
//! The oxc AST borrows from an arena that only lives for one parse, so the
//! parts of it that path signatures can reach are lowered into an owned
//! [`SyntaxNode`] tree before the arena is dropped.

use crate::parser::tree::{Scalar, Span, SyntaxNode, Value};
use crate::types::{InspectorError, Result};
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_parser::{ParseOptions, Parser};
use oxc_span::{GetSpan, SourceType};
use tracing::{debug, trace};

/// A bundle parsed into a syntax tree.
#[derive(Debug, Clone)]
pub struct ParsedBundle {
    pub tree: SyntaxNode,
    /// Recoverable diagnostics the parser reported and skipped over.
    pub errors: usize,
    /// Whether the bundle only parsed as an ES module.
    pub module: bool,
    /// Whether the tree came from a repaired or truncated copy of the text.
    /// Offsets still index the original bundle.
    pub salvaged: bool,
}

impl ParsedBundle {
    /// Number of top-level statements, directives included.
    pub fn statement_count(&self) -> usize {
        match self.tree.field("body") {
            Some(Value::NodeList(items)) => items.len(),
            _ => 0,
        }
    }
}

/// How far salvaging goes before the bundle is declared unparseable.
const MAX_REPAIRS: usize = 16;
const MAX_TRUNCATIONS: usize = 16;

/// A parse that oxc gave up on.
struct Aborted {
    message: String,
    /// Byte offset and length of the first diagnostic's label.
    label: Option<(usize, usize)>,
}

/// Parser for bundled scripts.
#[derive(Debug, Clone)]
pub struct BundleParser {
    /// Nodes deeper than this are lowered as childless leaves.
    max_depth: usize,
}

impl BundleParser {
    /// Create a parser that lowers the tree down to `max_depth` nodes.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Parse bundle text, first as a classic script and then as a module.
    ///
    /// When both attempts abort, the script is salvaged: offending tokens
    /// are blanked out, and failing that the text is cut back to its last
    /// complete top-level statement. Only an empty salvage is a
    /// [`InspectorError::ParseFailure`].
    pub fn parse(&self, content: &str) -> Result<ParsedBundle> {
        let script = match self.attempt(content, false) {
            Ok(parsed) => return Ok(parsed),
            Err(aborted) => aborted,
        };
        if let Ok(parsed) = self.attempt(content, true) {
            return Ok(parsed);
        }

        match self.salvage(content, &script) {
            Some(parsed) => Ok(parsed),
            None => Err(InspectorError::ParseFailure(script.message)),
        }
    }

    fn attempt(&self, content: &str, module: bool) -> std::result::Result<ParsedBundle, Aborted> {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(module);
        let options = ParseOptions {
            allow_return_outside_function: true,
            preserve_parens: false,
            ..ParseOptions::default()
        };

        let ret = Parser::new(&allocator, content, source_type)
            .with_options(options)
            .parse();

        if ret.panicked {
            trace!(
                "Parse as {} aborted after {} errors",
                if module { "module" } else { "script" },
                ret.errors.len()
            );
            let first = ret.errors.first();
            return Err(Aborted {
                message: first
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unrecoverable syntax error".to_string()),
                label: first
                    .and_then(|e| e.labels.as_ref())
                    .and_then(|labels| labels.first())
                    .map(|label| (label.offset(), label.len())),
            });
        }

        // Minified bundles routinely carry recoverable errors
        if !ret.errors.is_empty() {
            trace!("Parse had {} errors, continuing...", ret.errors.len());
        }

        let lowerer = Lowerer {
            max_depth: self.max_depth,
        };
        let tree = lowerer.program(&ret.program);
        debug!(
            "Parsed {} bytes as {} ({} top-level statements)",
            content.len(),
            if module { "module" } else { "script" },
            ret.program.body.len() + ret.program.directives.len()
        );

        Ok(ParsedBundle {
            tree,
            errors: ret.errors.len(),
            module,
            salvaged: false,
        })
    }

    fn salvage(&self, content: &str, aborted: &Aborted) -> Option<ParsedBundle> {
        let mut text = content.to_string();
        let mut label = aborted.label;

        for _ in 0..MAX_REPAIRS {
            let Some((start, end)) = label.and_then(|l| offending_token(&text, l)) else {
                break;
            };
            trace!("Blanking {:?} at {}", &text[start..end], start);
            blank(&mut text, start, end);

            match self.attempt(&text, false) {
                Ok(parsed) => return salvaged(parsed, "repaired", content.len()),
                Err(next) => label = next.label,
            }
        }

        let limit = label.map(|(offset, _)| offset).unwrap_or(text.len());
        for cut in statement_boundaries(&text)
            .into_iter()
            .rev()
            .filter(|&cut| cut <= limit)
            .take(MAX_TRUNCATIONS)
        {
            if let Some(parsed) = self
                .attempt(&text[..cut], false)
                .ok()
                .and_then(|parsed| salvaged(parsed, "truncated", cut))
            {
                return Some(parsed);
            }
        }

        None
    }
}

fn salvaged(mut parsed: ParsedBundle, how: &str, bytes: usize) -> Option<ParsedBundle> {
    if parsed.statement_count() == 0 {
        return None;
    }
    debug!(
        "Salvaged bundle ({}, {} bytes kept, {} top-level statements)",
        how,
        bytes,
        parsed.statement_count()
    );
    parsed.salvaged = true;
    Some(parsed)
}

/// Byte range of the token a diagnostic label points at. A zero-width
/// label points between tokens, so the next token is taken.
fn offending_token(text: &str, (offset, len): (usize, usize)) -> Option<(usize, usize)> {
    if offset >= text.len() || !text.is_char_boundary(offset) {
        return None;
    }
    if len > 0 {
        let end = (offset + len).min(text.len());
        if text.is_char_boundary(end) && !text[offset..end].trim().is_empty() {
            return Some((offset, end));
        }
    }

    let rest = &text[offset..];
    let skipped = rest.len() - rest.trim_start().len();
    let start = offset + skipped;
    let mut chars = text[start..].char_indices();
    let (_, first) = chars.next()?;
    let word = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    let width = if word(first) {
        chars
            .find(|&(_, c)| !word(c))
            .map(|(i, _)| i)
            .unwrap_or(text.len() - start)
    } else {
        first.len_utf8()
    };
    Some((start, start + width))
}

/// Overwrite a byte range with spaces, keeping newlines and every offset.
fn blank(text: &mut String, start: usize, end: usize) {
    let filler: String = text[start..end]
        .chars()
        .flat_map(|c| {
            let fill = if c == '\n' { '\n' } else { ' ' };
            std::iter::repeat(fill).take(c.len_utf8())
        })
        .collect();
    text.replace_range(start..end, &filler);
}

/// Offsets just past each `;`, `}` or newline at bracket depth zero.
///
/// Strings, template literals and comments are skipped. Regex literals are
/// not recognized, so a boundary can be wrong; callers re-parse to check.
fn statement_boundaries(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut boundaries = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    } else if bytes[i] == b'\n' && quote != b'`' {
                        break;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    boundaries.push(i + 1);
                }
            }
            b';' | b'\n' if depth == 0 => boundaries.push(i + 1),
            _ => {}
        }
        i += 1;
    }

    boundaries
}

impl Default for BundleParser {
    fn default() -> Self {
        Self::new(32)
    }
}

fn span_of(span: oxc_span::Span) -> Span {
    Span::new(span.start as usize, span.end as usize)
}

fn identifier(span: oxc_span::Span, name: &str) -> SyntaxNode {
    SyntaxNode::new("Identifier", span_of(span)).with("name", Value::str(name))
}

/// Translates oxc nodes into ESTree-shaped [`SyntaxNode`]s.
struct Lowerer {
    max_depth: usize,
}

impl Lowerer {
    fn program(&self, program: &Program<'_>) -> SyntaxNode {
        let body = self.body(&program.directives, &program.body, 1);
        SyntaxNode::new("Program", span_of(program.span)).with("body", body)
    }

    /// Directive prologue followed by statements, as ESTree lists them.
    fn body(&self, directives: &[Directive<'_>], statements: &[Statement<'_>], depth: usize) -> Value {
        let mut items = Vec::with_capacity(directives.len() + statements.len());
        items.extend(directives.iter().map(|d| Some(self.directive(d, depth))));
        items.extend(statements.iter().map(|s| Some(self.statement(s, depth))));
        Value::NodeList(items)
    }

    fn directive(&self, directive: &Directive<'_>, depth: usize) -> SyntaxNode {
        let node = SyntaxNode::new("ExpressionStatement", span_of(directive.span));
        if depth > self.max_depth {
            return node;
        }

        let literal = SyntaxNode::new("Literal", span_of(directive.expression.span))
            .with("value", Value::str(directive.expression.value.as_str()));
        node.with("expression", Value::node(literal))
            .with("directive", Value::str(directive.directive.as_str()))
    }

    fn statements(&self, statements: &[Statement<'_>], depth: usize) -> Value {
        Value::NodeList(
            statements
                .iter()
                .map(|s| Some(self.statement(s, depth)))
                .collect(),
        )
    }

    fn statement(&self, stmt: &Statement<'_>, depth: usize) -> SyntaxNode {
        let node = SyntaxNode::new(statement_kind(stmt), span_of(stmt.span()));
        if depth > self.max_depth {
            return node;
        }

        let next = depth + 1;
        match stmt {
            Statement::ExpressionStatement(s) => {
                node.with("expression", Value::node(self.expression(&s.expression, next)))
            }
            Statement::BlockStatement(b) => node.with("body", self.statements(&b.body, next)),
            Statement::ReturnStatement(r) => {
                node.with("argument", self.optional_expression(r.argument.as_ref(), next))
            }
            Statement::IfStatement(s) => node
                .with("test", Value::node(self.expression(&s.test, next)))
                .with("consequent", Value::node(self.statement(&s.consequent, next)))
                .with(
                    "alternate",
                    s.alternate
                        .as_ref()
                        .map(|alt| Value::node(self.statement(alt, next)))
                        .unwrap_or_else(Value::null),
                ),
            Statement::VariableDeclaration(d) => node.with(
                "declarations",
                Value::NodeList(
                    d.declarations
                        .iter()
                        .map(|v| Some(self.declarator(v, next)))
                        .collect(),
                ),
            ),
            Statement::FunctionDeclaration(f) => self.function(node, f, next),
            _ => node,
        }
    }

    fn declarator(&self, declarator: &VariableDeclarator<'_>, depth: usize) -> SyntaxNode {
        let node = SyntaxNode::new("VariableDeclarator", span_of(declarator.span));
        if depth > self.max_depth {
            return node;
        }

        node.with(
            "init",
            self.optional_expression(declarator.init.as_ref(), depth + 1),
        )
    }

    fn optional_expression(&self, expr: Option<&Expression<'_>>, depth: usize) -> Value {
        match expr {
            Some(e) => Value::node(self.expression(e, depth)),
            None => Value::null(),
        }
    }

    fn expression(&self, expr: &Expression<'_>, depth: usize) -> SyntaxNode {
        // ESTree has no node for parentheses
        if let Expression::ParenthesizedExpression(p) = expr {
            return self.expression(&p.expression, depth);
        }

        let span = span_of(expr.span());
        let node = SyntaxNode::new(expression_kind(expr), span);
        if depth > self.max_depth {
            return node;
        }

        let next = depth + 1;
        match expr {
            Expression::Identifier(id) => node.with("name", Value::str(id.name.as_str())),
            Expression::StringLiteral(s) => node.with("value", Value::str(s.value.as_str())),
            Expression::NumericLiteral(n) => node.with("value", Value::Scalar(Scalar::Number(n.value))),
            Expression::BooleanLiteral(b) => node.with("value", Value::Scalar(Scalar::Bool(b.value))),
            Expression::NullLiteral(_) => node.with("value", Value::null()),
            Expression::AssignmentExpression(a) => {
                node.with("right", Value::node(self.expression(&a.right, next)))
            }
            Expression::UnaryExpression(u) => {
                node.with("argument", Value::node(self.expression(&u.argument, next)))
            }
            Expression::AwaitExpression(a) => {
                node.with("argument", Value::node(self.expression(&a.argument, next)))
            }
            Expression::CallExpression(c) => node
                .with("callee", Value::node(self.expression(&c.callee, next)))
                .with("arguments", self.arguments(&c.arguments, span, next)),
            Expression::NewExpression(n) => node
                .with("callee", Value::node(self.expression(&n.callee, next)))
                .with("arguments", self.arguments(&n.arguments, span, next)),
            Expression::SequenceExpression(s) => node.with(
                "expressions",
                Value::NodeList(
                    s.expressions
                        .iter()
                        .map(|e| Some(self.expression(e, next)))
                        .collect(),
                ),
            ),
            Expression::ConditionalExpression(c) => node
                .with("test", Value::node(self.expression(&c.test, next)))
                .with("consequent", Value::node(self.expression(&c.consequent, next)))
                .with("alternate", Value::node(self.expression(&c.alternate, next))),
            Expression::LogicalExpression(l) => node
                .with("left", Value::node(self.expression(&l.left, next)))
                .with("right", Value::node(self.expression(&l.right, next))),
            Expression::BinaryExpression(b) => node
                .with("left", Value::node(self.expression(&b.left, next)))
                .with("right", Value::node(self.expression(&b.right, next))),
            Expression::StaticMemberExpression(m) => node
                .with("object", Value::node(self.expression(&m.object, next)))
                .with(
                    "property",
                    Value::node(identifier(m.property.span, m.property.name.as_str())),
                ),
            Expression::ComputedMemberExpression(m) => node
                .with("object", Value::node(self.expression(&m.object, next)))
                .with("property", Value::node(self.expression(&m.expression, next))),
            Expression::ArrayExpression(a) => node.with(
                "elements",
                Value::NodeList(
                    a.elements
                        .iter()
                        .map(|e| self.array_element(e, span, next))
                        .collect(),
                ),
            ),
            Expression::ObjectExpression(o) => node.with(
                "properties",
                Value::PropertyList(
                    o.properties
                        .iter()
                        .map(|p| self.property(p, next))
                        .collect(),
                ),
            ),
            Expression::FunctionExpression(f) => self.function(node, f, next),
            Expression::ArrowFunctionExpression(a) => {
                let body = match (a.expression, a.body.statements.first()) {
                    (true, Some(Statement::ExpressionStatement(s))) => {
                        self.expression(&s.expression, next)
                    }
                    _ => self.function_body(&a.body, next),
                };
                node.with("body", Value::node(body))
            }
            _ => node,
        }
    }

    fn function(&self, node: SyntaxNode, function: &Function<'_>, depth: usize) -> SyntaxNode {
        let id = match &function.id {
            Some(id) => Value::node(identifier(id.span, id.name.as_str())),
            None => Value::null(),
        };
        let body = match &function.body {
            Some(body) => Value::node(self.function_body(body, depth)),
            None => Value::null(),
        };
        node.with("id", id).with("body", body)
    }

    fn function_body(&self, body: &FunctionBody<'_>, depth: usize) -> SyntaxNode {
        let node = SyntaxNode::new("BlockStatement", span_of(body.span));
        if depth > self.max_depth {
            return node;
        }
        node.with(
            "body",
            self.body(&body.directives, &body.statements, depth + 1),
        )
    }

    fn arguments(&self, arguments: &[Argument<'_>], parent: Span, depth: usize) -> Value {
        Value::NodeList(
            arguments
                .iter()
                .map(|arg| {
                    Some(match arg {
                        Argument::SpreadElement(s) => self.spread(s, depth),
                        _ => match arg.as_expression() {
                            Some(e) => self.expression(e, depth),
                            None => SyntaxNode::new("Expression", parent),
                        },
                    })
                })
                .collect(),
        )
    }

    fn array_element(
        &self,
        element: &ArrayExpressionElement<'_>,
        parent: Span,
        depth: usize,
    ) -> Option<SyntaxNode> {
        match element {
            ArrayExpressionElement::Elision(_) => None,
            ArrayExpressionElement::SpreadElement(s) => Some(self.spread(s, depth)),
            _ => Some(match element.as_expression() {
                Some(e) => self.expression(e, depth),
                None => SyntaxNode::new("Expression", parent),
            }),
        }
    }

    fn spread(&self, spread: &SpreadElement<'_>, depth: usize) -> SyntaxNode {
        let node = SyntaxNode::new("SpreadElement", span_of(spread.span));
        if depth > self.max_depth {
            return node;
        }
        node.with(
            "argument",
            Value::node(self.expression(&spread.argument, depth + 1)),
        )
    }

    fn property(&self, property: &ObjectPropertyKind<'_>, depth: usize) -> SyntaxNode {
        match property {
            ObjectPropertyKind::ObjectProperty(p) => {
                let span = span_of(p.span);
                let node = SyntaxNode::new("Property", span);
                if depth > self.max_depth {
                    return node;
                }
                node.with("key", Value::node(self.property_key(&p.key, span, depth + 1)))
                    .with("value", Value::node(self.expression(&p.value, depth + 1)))
            }
            ObjectPropertyKind::SpreadProperty(s) => self.spread(s, depth),
        }
    }

    fn property_key(&self, key: &PropertyKey<'_>, parent: Span, depth: usize) -> SyntaxNode {
        match key {
            PropertyKey::StaticIdentifier(id) => identifier(id.span, id.name.as_str()),
            PropertyKey::PrivateIdentifier(id) => SyntaxNode::new("PrivateIdentifier", span_of(id.span))
                .with("name", Value::str(id.name.as_str())),
            _ => match key.as_expression() {
                Some(e) => self.expression(e, depth),
                None => SyntaxNode::new("Expression", parent),
            },
        }
    }
}

fn statement_kind(stmt: &Statement<'_>) -> &'static str {
    match stmt {
        Statement::ExpressionStatement(_) => "ExpressionStatement",
        Statement::BlockStatement(_) => "BlockStatement",
        Statement::ReturnStatement(_) => "ReturnStatement",
        Statement::IfStatement(_) => "IfStatement",
        Statement::VariableDeclaration(_) => "VariableDeclaration",
        Statement::FunctionDeclaration(_) => "FunctionDeclaration",
        Statement::EmptyStatement(_) => "EmptyStatement",
        Statement::ForStatement(_) => "ForStatement",
        Statement::WhileStatement(_) => "WhileStatement",
        Statement::TryStatement(_) => "TryStatement",
        Statement::ThrowStatement(_) => "ThrowStatement",
        Statement::SwitchStatement(_) => "SwitchStatement",
        _ => "Statement",
    }
}

fn expression_kind(expr: &Expression<'_>) -> &'static str {
    match expr {
        Expression::BooleanLiteral(_)
        | Expression::NullLiteral(_)
        | Expression::NumericLiteral(_)
        | Expression::StringLiteral(_)
        | Expression::RegExpLiteral(_)
        | Expression::BigIntLiteral(_) => "Literal",
        Expression::Identifier(_) => "Identifier",
        Expression::TemplateLiteral(_) => "TemplateLiteral",
        Expression::ThisExpression(_) => "ThisExpression",
        Expression::ArrayExpression(_) => "ArrayExpression",
        Expression::ObjectExpression(_) => "ObjectExpression",
        Expression::FunctionExpression(_) => "FunctionExpression",
        Expression::ArrowFunctionExpression(_) => "ArrowFunctionExpression",
        Expression::ClassExpression(_) => "ClassExpression",
        Expression::AssignmentExpression(_) => "AssignmentExpression",
        Expression::UnaryExpression(_) => "UnaryExpression",
        Expression::UpdateExpression(_) => "UpdateExpression",
        Expression::AwaitExpression(_) => "AwaitExpression",
        Expression::YieldExpression(_) => "YieldExpression",
        Expression::BinaryExpression(_) => "BinaryExpression",
        Expression::LogicalExpression(_) => "LogicalExpression",
        Expression::ConditionalExpression(_) => "ConditionalExpression",
        Expression::CallExpression(_) => "CallExpression",
        Expression::NewExpression(_) => "NewExpression",
        Expression::SequenceExpression(_) => "SequenceExpression",
        Expression::ParenthesizedExpression(_) => "ParenthesizedExpression",
        Expression::StaticMemberExpression(_)
        | Expression::ComputedMemberExpression(_)
        | Expression::PrivateFieldExpression(_) => "MemberExpression",
        _ => "Expression",
    }
}
