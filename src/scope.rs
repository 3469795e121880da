//! Free-identifier analysis for binding expressions.
//!
//! Walks a parsed expression with a stack of local scopes (arrow and function
//! parameters, inner declarations). Every identifier reference that is not
//! bound locally is a read of component state: its span is queued for
//! rewriting to `this.<name>` and the bare name is recorded as a dependency.
//!
//! Two positions are not dependencies:
//! - object-literal keys (`{key: value}` never visits `key` as a reference),
//! - the callee of a call whose callee is a bare identifier. The callee is
//!   still qualified with `this.` since it names a component method.

use oxc_ast::ast::{
    ArrowFunctionExpression, BindingIdentifier, CallExpression, Expression, Function,
    IdentifierReference, ObjectProperty,
};
use oxc_ast_visit::Visit;
use oxc_syntax::scope::ScopeFlags;
use std::collections::{BTreeSet, HashSet};

pub const INSTANCE_REFERENCE: &str = "this";

pub struct FreeIdentifierRewriter {
    scopes: Vec<HashSet<String>>,
    pub dependencies: BTreeSet<String>,
    pub replacements: Vec<(u32, u32, String)>,
}

impl FreeIdentifierRewriter {
    pub fn new() -> Self {
        Self {
            scopes: vec![],
            dependencies: BTreeSet::new(),
            replacements: vec![],
        }
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn qualify(&mut self, ident: &IdentifierReference, record: bool) {
        let name = ident.name.as_str();
        if self.is_local(name) {
            return;
        }
        self.replacements.push((
            ident.span.start,
            ident.span.end,
            format!("{}.{}", INSTANCE_REFERENCE, name),
        ));
        if record {
            self.dependencies.insert(name.to_string());
        }
    }

    /// Rewrites `source` (the text the visited expression was parsed from).
    pub fn apply(&self, source: &str) -> String {
        apply_replacements(source, &self.replacements)
    }
}

impl Default for FreeIdentifierRewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Visit<'a> for FreeIdentifierRewriter {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.qualify(ident, true);
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(ident.name.to_string());
        }
    }

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if prop.shorthand {
            if let Expression::Identifier(ident) = &prop.value {
                let name = ident.name.as_str();
                if !self.is_local(name) {
                    self.replacements.push((
                        prop.span.start,
                        prop.span.end,
                        format!("{}: {}.{}", name, INSTANCE_REFERENCE, name),
                    ));
                    self.dependencies.insert(name.to_string());
                }
                return;
            }
        }
        oxc_ast_visit::walk::walk_object_property(self, prop);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &call.callee {
            self.qualify(callee, false);
            for arg in &call.arguments {
                self.visit_argument(arg);
            }
            return;
        }
        oxc_ast_visit::walk::walk_call_expression(self, call);
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        self.scopes.push(HashSet::new());
        oxc_ast_visit::walk::walk_function(self, func, flags);
        self.scopes.pop();
    }

    fn visit_arrow_function_expression(&mut self, func: &ArrowFunctionExpression<'a>) {
        self.scopes.push(HashSet::new());
        oxc_ast_visit::walk::walk_arrow_function_expression(self, func);
        self.scopes.pop();
    }
}

/// Applies span replacements back to front so earlier offsets stay valid.
pub fn apply_replacements(source: &str, replacements: &[(u32, u32, String)]) -> String {
    let mut sorted: Vec<&(u32, u32, String)> = replacements.iter().collect();
    sorted.sort_by(|a, b| b.0.cmp(&a.0));

    let mut out = source.to_string();
    for (start, end, text) in sorted {
        out.replace_range(*start as usize..*end as usize, text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn rewrite(code: &str) -> (String, Vec<String>) {
        let allocator = Allocator::default();
        let expr = Parser::new(&allocator, code, SourceType::default())
            .parse_expression()
            .expect("expression should parse");
        let mut rewriter = FreeIdentifierRewriter::new();
        rewriter.visit_expression(&expr);
        (
            rewriter.apply(code),
            rewriter.dependencies.into_iter().collect(),
        )
    }

    #[test]
    fn test_member_properties_are_not_dependencies() {
        let (body, deps) = rewrite("user.name + ' ' + user.age");
        assert_eq!(body, "this.user.name + ' ' + this.user.age");
        assert_eq!(deps, vec!["user"]);
    }

    #[test]
    fn test_callee_is_qualified_but_not_a_dependency() {
        let (body, deps) = rewrite("format(a, b.c)");
        assert_eq!(body, "this.format(this.a, this.b.c)");
        assert_eq!(deps, vec!["a", "b"]);
    }

    #[test]
    fn test_object_keys_are_skipped() {
        let (body, deps) = rewrite("({key: value, short})");
        assert_eq!(body, "({key: this.value, short: this.short})");
        assert_eq!(deps, vec!["short", "value"]);
    }

    #[test]
    fn test_arrow_parameters_are_local() {
        let (body, deps) = rewrite("items.map(x => x + offset)");
        assert_eq!(body, "this.items.map(x => x + this.offset)");
        assert_eq!(deps, vec!["items", "offset"]);
    }

    #[test]
    fn test_computed_member_index_is_a_dependency() {
        let (body, deps) = rewrite("list[index]");
        assert_eq!(body, "this.list[this.index]");
        assert_eq!(deps, vec!["index", "list"]);
    }
}
