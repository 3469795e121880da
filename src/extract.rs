//! Binding extraction for template strings.
//!
//! A template string (attribute value or text node) is a sequence of literal
//! runs and mustache bindings. `[[expr]]` is a one-time binding, `{{expr}}` a
//! two-way binding. Inside a delimiter the expression may be followed by a
//! `|`-separated chain of filters, which is folded into nested calls:
//!
//! - `{{ a | upper }}` becomes `upper(a)`
//! - `{{ a | pad(2, ' ') }}` becomes `pad(a, 2, ' ')`
//!
//! Pieces are produced lazily, left to right. Concatenating the `raw` text of
//! every piece reproduces the input exactly.

#[derive(Debug, Clone, PartialEq)]
pub struct BindingExpression {
    /// Expression text after filter folding, ready to classify.
    pub expression: String,
    /// Filter names in application order.
    pub filters: Vec<String>,
    pub one_time: bool,
    /// The binding exactly as written, delimiters included.
    pub raw: String,
}

impl BindingExpression {
    /// Renders `expression` back inside the delimiters it was written with.
    pub fn wrap(&self, expression: &str) -> String {
        wrap_binding(expression, self.one_time)
    }
}

pub fn wrap_binding(expression: &str, one_time: bool) -> String {
    if one_time {
        format!("[[{}]]", expression)
    } else {
        format!("{{{{{}}}}}", expression)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindingPiece {
    Literal(String),
    Expression(BindingExpression),
}

impl BindingPiece {
    pub fn raw(&self) -> &str {
        match self {
            BindingPiece::Literal(text) => text,
            BindingPiece::Expression(expr) => &expr.raw,
        }
    }
}

/// Lazy iterator over the pieces of one template string.
pub struct BindingPieces<'a> {
    rest: &'a str,
}

pub fn extract(text: &str) -> BindingPieces<'_> {
    BindingPieces { rest: text }
}

impl<'a> Iterator for BindingPieces<'a> {
    type Item = BindingPiece;

    fn next(&mut self) -> Option<BindingPiece> {
        if self.rest.is_empty() {
            return None;
        }

        let Some((start, one_time)) = find_opener(self.rest) else {
            let literal = self.rest.to_string();
            self.rest = "";
            return Some(BindingPiece::Literal(literal));
        };

        if start > 0 {
            let literal = self.rest[..start].to_string();
            self.rest = &self.rest[start..];
            return Some(BindingPiece::Literal(literal));
        }

        let closer = if one_time { "]]" } else { "}}" };
        let Some(close) = self.rest[2..].find(closer) else {
            // Unterminated binding: everything left is literal text.
            let literal = self.rest.to_string();
            self.rest = "";
            return Some(BindingPiece::Literal(literal));
        };

        let end = 2 + close + 2;
        let raw = &self.rest[..end];
        let inner = &self.rest[2..2 + close];
        self.rest = &self.rest[end..];

        if inner.trim().is_empty() {
            return Some(BindingPiece::Literal(raw.to_string()));
        }

        let (expression, filters) = fold_filters(inner);
        Some(BindingPiece::Expression(BindingExpression {
            expression,
            filters,
            one_time,
            raw: raw.to_string(),
        }))
    }
}

/// Earliest binding opener in `text`. At a shared position `[[` wins.
fn find_opener(text: &str) -> Option<(usize, bool)> {
    let one_time = text.find("[[");
    let two_way = text.find("{{");
    match (one_time, two_way) {
        (Some(a), Some(b)) if a <= b => Some((a, true)),
        (Some(_), Some(b)) => Some((b, false)),
        (Some(a), None) => Some((a, true)),
        (None, Some(b)) => Some((b, false)),
        (None, None) => None,
    }
}

/// Returns the single binding when it spans the whole string.
pub fn full_binding(text: &str) -> Option<BindingExpression> {
    let mut pieces = extract(text);
    match (pieces.next(), pieces.next()) {
        (Some(BindingPiece::Expression(expr)), None) => Some(expr),
        _ => None,
    }
}

pub fn has_binding(text: &str) -> bool {
    extract(text).any(|piece| matches!(piece, BindingPiece::Expression(_)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILTER CHAINS
// ═══════════════════════════════════════════════════════════════════════════════

fn fold_filters(inner: &str) -> (String, Vec<String>) {
    let segments = split_top_level_pipes(inner);
    let mut segments = segments.into_iter();
    let mut current = segments.next().unwrap_or_default().trim().to_string();
    let mut filters = Vec::new();

    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        match split_call(segment) {
            Some((name, args)) => {
                filters.push(name.to_string());
                current = if args.trim().is_empty() {
                    format!("{}({})", name, current)
                } else {
                    format!("{}({}, {})", name, current, args.trim())
                };
            }
            None => {
                filters.push(segment.to_string());
                current = format!("{}({})", segment, current);
            }
        }
    }

    (current, filters)
}

/// Splits on `|` outside strings and brackets, leaving `||` intact.
fn split_top_level_pipes(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            current.push(c);
            if c == '\\' && i + 1 < chars.len() {
                current.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
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
            '|' if depth == 0 => {
                if chars.get(i + 1) == Some(&'|') {
                    current.push_str("||");
                    i += 2;
                    continue;
                }
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
        i += 1;
    }
    segments.push(current);
    segments
}

/// `name(args)` → `(name, args)` when the whole segment is one call.
fn split_call(segment: &str) -> Option<(&str, &str)> {
    let open = segment.find('(')?;
    if !segment.ends_with(')') {
        return None;
    }
    let name = segment[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.') {
        return None;
    }
    Some((name, &segment[open + 1..segment.len() - 1]))
}
