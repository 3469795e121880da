//! Binding expression classification and rewriting.
//!
//! An observable expression can be bound directly:
//!
//! - a bare identifier: `user`
//! - static member access on an observable base: `user.address.city`
//! - literal-indexed access on an observable base: `items[0]`, `map['key']`
//! - logical negation of an observable: `!loading`
//! - a call whose arguments are all observable: `format(user.name, locale)`
//!
//! Anything else is hoisted into a helper function on the component. The
//! helper takes the expression's free identifiers as parameters (sorted, so
//! signature and call sites agree regardless of traversal order) and returns
//! the expression with every free identifier read off `this`.
//!
//! Callees are trusted: a call is observable whenever its arguments are.

use crate::error::{Result, UpgradeError};
use crate::renamer::RenamableDeclaration;
use crate::scope::FreeIdentifierRewriter;
use oxc_allocator::Allocator;
use oxc_ast::ast::Expression;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::operator::UnaryOperator;

#[derive(Debug, Clone, PartialEq)]
pub enum Rewrite {
    /// Bind the expression as-is.
    Observable(String),
    /// Bind a call to a helper instead.
    Hoisted(HelperFunction),
}

/// Helper logic whose name has not been chosen yet.
#[derive(Debug, Clone, PartialEq)]
pub struct HelperFunction {
    pub params: Vec<String>,
    /// Returned expression, instance-qualified.
    pub body: String,
}

impl HelperFunction {
    pub fn named(self, working_name: impl Into<String>) -> RenamableDeclaration {
        RenamableDeclaration::new(working_name, self.params, self.body)
    }
}

fn parse_error(expression: &str, errors: impl std::fmt::Debug) -> UpgradeError {
    UpgradeError::ExpressionSyntax {
        expression: expression.to_string(),
        message: format!("{:?}", errors),
    }
}

pub fn classify(expression: &str) -> Result<bool> {
    let source = expression.trim();
    let allocator = Allocator::default();
    let expr = Parser::new(&allocator, source, SourceType::default())
        .parse_expression()
        .map_err(|errors| parse_error(source, errors))?;
    Ok(is_observable(&expr))
}

pub fn rewrite(expression: &str) -> Result<Rewrite> {
    let source = expression.trim();
    let allocator = Allocator::default();
    let expr = Parser::new(&allocator, source, SourceType::default())
        .parse_expression()
        .map_err(|errors| parse_error(source, errors))?;

    if is_observable(&expr) {
        return Ok(Rewrite::Observable(source.to_string()));
    }

    let mut rewriter = FreeIdentifierRewriter::new();
    rewriter.visit_expression(&expr);
    let body = rewriter.apply(source);

    Ok(Rewrite::Hoisted(HelperFunction {
        params: rewriter.dependencies.into_iter().collect(),
        body,
    }))
}

/// Parentheses are grouping only and never change the answer.
pub fn is_observable(expr: &Expression) -> bool {
    match expr {
        Expression::ParenthesizedExpression(paren) => is_observable(&paren.expression),
        Expression::Identifier(_) => true,
        Expression::StaticMemberExpression(member) => is_observable(&member.object),
        Expression::ComputedMemberExpression(member) => {
            is_literal_index(&member.expression) && is_observable(&member.object)
        }
        Expression::UnaryExpression(unary) => {
            matches!(unary.operator, UnaryOperator::LogicalNot) && is_observable(&unary.argument)
        }
        Expression::CallExpression(call) => call
            .arguments
            .iter()
            .all(|arg| arg.as_expression().is_some_and(is_observable)),
        _ => false,
    }
}

fn is_literal_index(expr: &Expression) -> bool {
    match expr {
        Expression::ParenthesizedExpression(paren) => is_literal_index(&paren.expression),
        Expression::NumericLiteral(_) | Expression::StringLiteral(_) => true,
        _ => false,
    }
}
