//! Owned model of a component declaration (the object literal handed to
//! `Polymer()`), lowered from the oxc AST plus the original source text.
//!
//! The legacy blocks the consolidator reads (`publish`, `observe`, `computed`)
//! come in many shapes. Lowering sorts every member value into one
//! `MemberValue` variant up front, so each consumer matches exhaustively
//! and the unexpected-shape branch is always an explicit error.
//!
//! Values the rewrite never needs to look inside (arrays, call expressions,
//! accessors, nested objects that are printed unchanged) are kept as their
//! source text, dedented so they can be re-indented wherever they land.

use crate::error::{Result, UpgradeError};
use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrowFunctionExpression, Expression, Function, ObjectExpression, ObjectPropertyKind,
    PropertyKey, PropertyKind,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use oxc_syntax::operator::UnaryOperator;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER_NAME: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODEL
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectLiteral {
    pub members: Vec<DeclarationMember>,
    /// Comments after the last member.
    pub trailing_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclarationMember {
    pub key: String,
    pub value: MemberValue,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberValue {
    Literal(Literal),
    Object(ObjectValue),
    Array(String),
    Function(FunctionValue),
    /// `get x() {}` / `set x(v) {}`, kept whole including the key.
    Accessor(String),
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Boolean(bool),
    Number(String),
    String(String),
    Null,
    Regex(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    /// `None` when the object has spread entries or computed keys.
    pub members: Option<Vec<DeclarationMember>>,
    /// Source text, when the object came from the input.
    pub raw: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// `key: function (...) {...}`
    Expression,
    /// `key(...) {...}`
    Method,
    /// `key: (...) => ...`
    Arrow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionValue {
    pub kind: FunctionKind,
    pub name: Option<String>,
    pub is_async: bool,
    pub is_generator: bool,
    pub params: Vec<String>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    /// Statements between the braces, one entry per line, relative indent.
    Block(Vec<String>),
    /// Concise arrow body.
    Expression(String),
    /// Block body kept exactly as written, braces included. Used when a
    /// string spans lines, since re-indenting would change its value.
    Verbatim(String),
}

impl ObjectLiteral {
    pub fn get(&self, key: &str) -> Option<&DeclarationMember> {
        self.members.iter().find(|m| m.key == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut DeclarationMember> {
        self.members.iter_mut().find(|m| m.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.members.iter().position(|m| m.key == key)
    }

    /// Removes every member named `key`, in source order.
    pub fn remove_all(&mut self, key: &str) -> Vec<DeclarationMember> {
        let (removed, kept) = std::mem::take(&mut self.members)
            .into_iter()
            .partition(|m| m.key == key);
        self.members = kept;
        removed
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.key.as_str())
    }

    pub fn push(&mut self, member: DeclarationMember) {
        self.members.push(member);
    }

    pub fn insert(&mut self, index: usize, member: DeclarationMember) {
        let index = index.min(self.members.len());
        self.members.insert(index, member);
    }
}

impl DeclarationMember {
    pub fn new(key: impl Into<String>, value: MemberValue) -> Self {
        Self {
            key: key.into(),
            value,
            leading_comments: vec![],
        }
    }

    pub fn with_comments(mut self, comments: Vec<String>) -> Self {
        self.leading_comments = comments;
        self
    }
}

impl MemberValue {
    pub fn string(value: impl Into<String>) -> Self {
        MemberValue::Literal(Literal::String(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        MemberValue::Literal(Literal::Boolean(value))
    }

    /// Reference to a global or identifier, printed as-is.
    pub fn identifier(name: impl Into<String>) -> Self {
        MemberValue::Other(name.into())
    }

    pub fn object(members: Vec<DeclarationMember>) -> Self {
        MemberValue::Object(ObjectValue {
            members: Some(members),
            raw: None,
        })
    }

    pub fn as_string_literal(&self) -> Option<&str> {
        match self {
            MemberValue::Literal(Literal::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, MemberValue::Function(_))
    }

    /// Short description used in shape errors.
    pub fn describe(&self) -> &'static str {
        match self {
            MemberValue::Literal(Literal::Boolean(_)) => "a boolean literal",
            MemberValue::Literal(Literal::Number(_)) => "a number literal",
            MemberValue::Literal(Literal::String(_)) => "a string literal",
            MemberValue::Literal(Literal::Null) => "null",
            MemberValue::Literal(Literal::Regex(_)) => "a regular expression",
            MemberValue::Object(_) => "an object literal",
            MemberValue::Array(_) => "an array literal",
            MemberValue::Function(_) => "a function",
            MemberValue::Accessor(_) => "an accessor",
            MemberValue::Other(_) => "an expression",
        }
    }

    /// Type constructor name implied by a default value, if any.
    pub fn inferred_type(&self) -> Option<&'static str> {
        match self {
            MemberValue::Object(_) => Some("Object"),
            MemberValue::Array(_) => Some("Array"),
            MemberValue::Literal(Literal::Boolean(_)) => Some("Boolean"),
            MemberValue::Literal(Literal::Number(_)) => Some("Number"),
            MemberValue::Literal(Literal::String(_)) => Some("String"),
            MemberValue::Literal(Literal::Null | Literal::Regex(_)) => None,
            MemberValue::Other(raw) if raw.starts_with("new Date(") => Some("Date"),
            MemberValue::Function(_) | MemberValue::Accessor(_) | MemberValue::Other(_) => None,
        }
    }

    /// Wraps object and array values in a factory so every instance gets its
    /// own copy. Other values are returned unchanged.
    pub fn into_factory(self) -> MemberValue {
        let raw = match &self {
            MemberValue::Array(raw) => raw.clone(),
            MemberValue::Object(object) => match &object.raw {
                Some(raw) => raw.clone(),
                None => print_value(&self, "", "  "),
            },
            _ => return self,
        };
        let mut lines: Vec<String> = raw.lines().map(str::to_string).collect();
        if let Some(first) = lines.first_mut() {
            first.insert_str(0, "return ");
        }
        if let Some(last) = lines.last_mut() {
            last.push(';');
        }
        MemberValue::Function(FunctionValue {
            kind: FunctionKind::Expression,
            name: None,
            is_async: false,
            is_generator: false,
            params: vec![],
            body: FunctionBody::Block(lines),
        })
    }
}

impl FunctionValue {
    /// Observer callbacks receive `(newValue, oldValue)` instead of
    /// `(oldValue, newValue)`. A lone parameter gets a placeholder in front.
    pub fn fix_observer_argument_order(&mut self) {
        match self.params.len() {
            0 => {}
            1 => self.params.insert(0, "_".to_string()),
            _ => self.params.swap(0, 1),
        }
    }

    /// Appends the statements of `other` to this body.
    pub fn append_body(&mut self, other: &FunctionBody) {
        let verbatim = matches!(self.body, FunctionBody::Verbatim(_)) || matches!(other, FunctionBody::Verbatim(_));
        if !verbatim {
            let mut lines = self.body.to_lines();
            lines.extend(other.to_lines());
            self.body = FunctionBody::Block(lines);
            return;
        }

        // A verbatim side is spliced as text so its strings stay intact.
        let head = self.body.braced();
        let tail = other.braced();
        let head = head.trim_end().strip_suffix('}').unwrap_or(&head).trim_end();
        let tail = tail.trim_start().strip_prefix('{').unwrap_or(&tail);
        self.body = FunctionBody::Verbatim(format!("{}{}", head, tail));
    }
}

impl FunctionBody {
    fn to_lines(&self) -> Vec<String> {
        match self {
            FunctionBody::Block(lines) => lines.clone(),
            FunctionBody::Expression(expr) => vec![format!("{};", expr)],
            FunctionBody::Verbatim(raw) => vec![raw.clone()],
        }
    }

    fn braced(&self) -> String {
        match self {
            FunctionBody::Verbatim(raw) => raw.clone(),
            FunctionBody::Block(_) | FunctionBody::Expression(_) => {
                print_body(&FunctionBody::Block(self.to_lines()), "", "  ")
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING FROM OXC
// ═══════════════════════════════════════════════════════════════════════════════

fn slice(source: &str, span: Span) -> &str {
    &source[span.start as usize..span.end as usize]
}

/// Parses `source` as a single object literal expression.
pub fn parse_object_literal(source: &str, context: &str) -> Result<ObjectLiteral> {
    let allocator = Allocator::default();
    let expr = Parser::new(&allocator, source, SourceType::default())
        .parse_expression()
        .map_err(|errors| UpgradeError::ScriptSyntax {
            origin: context.to_string(),
            message: format!("{:?}", errors),
        })?;
    let expr = match &expr {
        Expression::ParenthesizedExpression(paren) => &paren.expression,
        expr => expr,
    };
    match expr {
        Expression::ObjectExpression(object) => lower_object(object, source, context),
        _ => Err(UpgradeError::shape(
            context,
            "an object literal",
            lower_value(expr, false, source, 0, context).describe(),
        )),
    }
}

/// Lowers an object expression. Spread entries and computed keys are shape
/// errors here; callers that can tolerate them use `ObjectValue::members`.
pub fn lower_object(
    object: &ObjectExpression,
    source: &str,
    context: &str,
) -> Result<ObjectLiteral> {
    let mut members = vec![];
    let mut cursor = object.span.start as usize + 1;

    for property in &object.properties {
        let span = property.span();
        let gap = source.get(cursor..span.start as usize).unwrap_or("");
        let leading_comments = scan_comments(gap);
        cursor = span.end as usize;

        let ObjectPropertyKind::ObjectProperty(prop) = property else {
            return Err(UpgradeError::shape(
                context,
                "members with static keys",
                "a spread entry",
            ));
        };
        let key = if prop.computed {
            None
        } else {
            static_key(&prop.key)
        };
        let Some(key) = key else {
            return Err(UpgradeError::shape(
                context,
                "members with static keys",
                format!("computed key '{}'", slice(source, prop.key.span())),
            ));
        };

        let indent = line_indent(source, span.start as usize);
        let value = if matches!(prop.kind, PropertyKind::Get | PropertyKind::Set) {
            MemberValue::Accessor(dedent_tail(slice(source, span), indent))
        } else {
            lower_value(&prop.value, prop.method, source, indent, context)
        };

        members.push(DeclarationMember {
            key,
            value,
            leading_comments,
        });
    }

    let end = (object.span.end as usize).saturating_sub(1);
    let trailing_comments = source
        .get(cursor..end)
        .map(scan_comments)
        .unwrap_or_default();

    Ok(ObjectLiteral {
        members,
        trailing_comments,
    })
}

fn static_key(key: &PropertyKey) -> Option<String> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.to_string()),
        PropertyKey::StringLiteral(s) => Some(s.value.to_string()),
        PropertyKey::NumericLiteral(n) => Some(n.value.to_string()),
        _ => None,
    }
}

fn lower_value(
    expr: &Expression,
    method: bool,
    source: &str,
    indent: usize,
    context: &str,
) -> MemberValue {
    let raw = || dedent_tail(slice(source, expr.span()), indent);
    match expr {
        Expression::BooleanLiteral(b) => MemberValue::Literal(Literal::Boolean(b.value)),
        Expression::NumericLiteral(_) | Expression::BigIntLiteral(_) => {
            MemberValue::Literal(Literal::Number(raw()))
        }
        Expression::StringLiteral(s) => MemberValue::Literal(Literal::String(s.value.to_string())),
        Expression::NullLiteral(_) => MemberValue::Literal(Literal::Null),
        Expression::RegExpLiteral(_) => MemberValue::Literal(Literal::Regex(raw())),
        Expression::UnaryExpression(unary)
            if matches!(unary.operator, UnaryOperator::UnaryNegation)
                && matches!(unary.argument, Expression::NumericLiteral(_)) =>
        {
            MemberValue::Literal(Literal::Number(raw()))
        }
        Expression::ObjectExpression(object) => MemberValue::Object(ObjectValue {
            members: lower_object(object, source, context).ok().map(|o| o.members),
            raw: Some(raw()),
        }),
        Expression::ArrayExpression(_) => MemberValue::Array(raw()),
        Expression::FunctionExpression(func) => {
            let kind = if method {
                FunctionKind::Method
            } else {
                FunctionKind::Expression
            };
            MemberValue::Function(lower_function(func, kind, source))
        }
        Expression::ArrowFunctionExpression(arrow) => {
            MemberValue::Function(lower_arrow(arrow, source, indent))
        }
        _ => MemberValue::Other(raw()),
    }
}

fn lower_function(func: &Function, kind: FunctionKind, source: &str) -> FunctionValue {
    let body = match &func.body {
        Some(body) => lower_block(slice(source, body.span)),
        None => FunctionBody::Block(vec![]),
    };
    FunctionValue {
        kind,
        name: match kind {
            FunctionKind::Expression => func.id.as_ref().map(|id| id.name.to_string()),
            _ => None,
        },
        is_async: func.r#async,
        is_generator: func.generator,
        params: split_params(slice(source, func.params.span)),
        body,
    }
}

fn lower_arrow(arrow: &ArrowFunctionExpression, source: &str, indent: usize) -> FunctionValue {
    let body = match arrow.get_expression() {
        Some(expr) if arrow.expression => {
            FunctionBody::Expression(dedent_tail(slice(source, expr.span()), indent))
        }
        _ => lower_block(slice(source, arrow.body.span)),
    };
    FunctionValue {
        kind: FunctionKind::Arrow,
        name: None,
        is_async: arrow.r#async,
        is_generator: false,
        params: split_params(slice(source, arrow.params.span)),
        body,
    }
}

fn lower_block(text: &str) -> FunctionBody {
    if has_multiline_string(text) {
        return FunctionBody::Verbatim(text.to_string());
    }
    let inner = text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .unwrap_or(text);
    FunctionBody::Block(block_lines(inner))
}

/// Template literals and backslash line continuations.
fn has_multiline_string(text: &str) -> bool {
    text.contains('`') || text.contains("\\\n") || text.contains("\\\r\n")
}

/// Splits a block's inner text into lines with the common indent removed.
fn block_lines(inner: &str) -> Vec<String> {
    let mut lines = inner.split('\n');
    let first = lines.next().unwrap_or("").trim().to_string();
    let rest: Vec<&str> = lines.map(str::trim_end).collect();

    let common = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out = vec![];
    if !first.is_empty() {
        out.push(first);
    }
    for line in rest {
        if line.trim().is_empty() {
            out.push(String::new());
        } else {
            out.push(line.chars().skip(common).collect());
        }
    }
    while out.first().is_some_and(|l| l.is_empty()) {
        out.remove(0);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out
}

/// Splits a parameter list on top-level commas, dropping the parentheses.
fn split_params(text: &str) -> Vec<String> {
    let text = text.trim();
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text);

    let mut params = vec![];
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in inner.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => params.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    params.push(current);
    params
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Line and block comments in text that otherwise holds only separators.
fn scan_comments(gap: &str) -> Vec<String> {
    let mut comments = vec![];
    let mut rest = gap;
    while let Some(start) = rest.find('/') {
        let tail = &rest[start..];
        if tail.starts_with("//") {
            let end = tail.find('\n').unwrap_or(tail.len());
            comments.push(tail[..end].trim_end().to_string());
            rest = &tail[end..];
        } else if tail.starts_with("/*") {
            let end = tail.find("*/").map(|i| i + 2).unwrap_or(tail.len());
            comments.push(tail[..end].to_string());
            rest = &tail[end..];
        } else {
            rest = &tail[1..];
        }
    }
    comments
}

/// Width of the whitespace at the start of the line containing `offset`.
pub fn line_indent(source: &str, offset: usize) -> usize {
    let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    source[line_start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .count()
}

/// Removes up to `width` leading whitespace characters from every line but the first.
fn dedent_tail(text: &str, width: usize) -> String {
    let mut lines = text.split('\n');
    let mut out = lines.next().unwrap_or("").to_string();
    for line in lines {
        out.push('\n');
        let strip = line
            .chars()
            .take(width)
            .take_while(|c| *c == ' ' || *c == '\t')
            .count();
        out.push_str(&line[strip..]);
    }
    out
}

/// Prefixes every line but the first with `indent`.
fn indent_tail(text: &str, indent: &str) -> String {
    let mut lines = text.split('\n');
    let mut out = lines.next().unwrap_or("").to_string();
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str(indent);
        }
        out.push_str(line);
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRINTING
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_identifier_name(name: &str) -> bool {
    IDENTIFIER_NAME.is_match(name)
}

/// Single-quoted JavaScript string literal.
pub fn js_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn print_key(key: &str) -> String {
    if is_identifier_name(key) {
        key.to_string()
    } else {
        js_string_literal(key)
    }
}

/// Prints an object literal whose closing brace sits at `indent`.
pub fn print_object(
    members: &[DeclarationMember],
    trailing_comments: &[String],
    indent: &str,
    unit: &str,
) -> String {
    if members.is_empty() && trailing_comments.is_empty() {
        return "{}".to_string();
    }
    let inner = format!("{}{}", indent, unit);
    let mut out = String::from("{\n");
    for (i, member) in members.iter().enumerate() {
        for comment in &member.leading_comments {
            out.push_str(&inner);
            out.push_str(&indent_tail(comment, &inner));
            out.push('\n');
        }
        out.push_str(&inner);
        out.push_str(&print_member(member, &inner, unit));
        if i + 1 < members.len() {
            out.push(',');
        }
        out.push('\n');
    }
    for comment in trailing_comments {
        out.push_str(&inner);
        out.push_str(comment);
        out.push('\n');
    }
    out.push_str(indent);
    out.push('}');
    out
}

/// Prints one member without its indentation or trailing comma.
pub fn print_member(member: &DeclarationMember, indent: &str, unit: &str) -> String {
    let key = print_key(&member.key);
    match &member.value {
        MemberValue::Accessor(raw) => indent_tail(raw, indent),
        MemberValue::Function(func) if func.kind == FunctionKind::Method => {
            let mut out = String::new();
            if func.is_async {
                out.push_str("async ");
            }
            if func.is_generator {
                out.push('*');
            }
            out.push_str(&key);
            out.push('(');
            out.push_str(&func.params.join(", "));
            out.push_str(") ");
            out.push_str(&print_body(&func.body, indent, unit));
            out
        }
        value => format!("{}: {}", key, print_value(value, indent, unit)),
    }
}

/// Prints a value whose first line continues a line indented by `indent`.
pub fn print_value(value: &MemberValue, indent: &str, unit: &str) -> String {
    match value {
        MemberValue::Literal(literal) => match literal {
            Literal::Boolean(b) => b.to_string(),
            Literal::Number(raw) | Literal::Regex(raw) => raw.clone(),
            Literal::String(s) => js_string_literal(s),
            Literal::Null => "null".to_string(),
        },
        MemberValue::Object(object) => match (&object.raw, &object.members) {
            (Some(raw), _) => indent_tail(raw, indent),
            (None, Some(members)) => print_object(members, &[], indent, unit),
            (None, None) => "{}".to_string(),
        },
        MemberValue::Array(raw) | MemberValue::Other(raw) | MemberValue::Accessor(raw) => {
            indent_tail(raw, indent)
        }
        MemberValue::Function(func) => {
            let mut out = String::new();
            if func.is_async {
                out.push_str("async ");
            }
            match func.kind {
                FunctionKind::Arrow => {
                    out.push('(');
                    out.push_str(&func.params.join(", "));
                    out.push_str(") => ");
                }
                FunctionKind::Expression | FunctionKind::Method => {
                    out.push_str("function");
                    if func.is_generator {
                        out.push('*');
                    }
                    match &func.name {
                        Some(name) => {
                            out.push(' ');
                            out.push_str(name);
                        }
                        None => out.push(' '),
                    }
                    out.push('(');
                    out.push_str(&func.params.join(", "));
                    out.push_str(") ");
                }
            }
            out.push_str(&print_body(&func.body, indent, unit));
            out
        }
    }
}

fn print_body(body: &FunctionBody, indent: &str, unit: &str) -> String {
    match body {
        FunctionBody::Block(lines) if lines.is_empty() => "{\n".to_string() + indent + "}",
        FunctionBody::Block(lines) => {
            let mut out = String::from("{\n");
            for line in lines {
                if !line.is_empty() {
                    out.push_str(indent);
                    out.push_str(unit);
                    out.push_str(line);
                }
                out.push('\n');
            }
            out.push_str(indent);
            out.push('}');
            out
        }
        FunctionBody::Expression(text) => indent_tail(text, indent),
        FunctionBody::Verbatim(text) => text.clone(),
    }
}
