//! Identifier qualifier.
//!
//! Rewrites every free identifier of a script fragment into a read on the
//! evaluation context, `this.<name>`, and records the name as a dependency.
//! A read of the fragment's own key goes to the enclosing scope instead,
//! `this.$outer.<name>`, so a value may re-declare a name it consumes.
//!
//! The pass is lexical only. It keeps a stack of function and block scopes:
//! `var` and function declarations are hoisted to the nearest function scope,
//! `let`, `const` and `class` stay in their block, and parameters belong to
//! the function they open. Rewrites are collected as span insertions and
//! spliced into the original source text.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrowFunctionExpression, AssignmentTargetPropertyIdentifier, BindingPattern,
    BindingPatternKind, BlockStatement, CatchClause, Expression, ForInStatement, ForOfStatement,
    ForStatement, ForStatementInit, ForStatementLeft, FormalParameters, Function, FunctionType,
    IdentifierReference, ObjectProperty, Program, Statement, SwitchStatement, VariableDeclaration,
    VariableDeclarationKind,
};
use oxc_ast::visit::walk::{
    walk_arrow_function_expression, walk_block_statement, walk_catch_clause, walk_for_in_statement,
    walk_for_of_statement, walk_for_statement, walk_function, walk_object_property,
};
use oxc_ast::Visit;
use oxc_parser::{ParseOptions, Parser};
use oxc_span::{GetSpan, SourceType};
use oxc_syntax::scope::ScopeFlags;
use sinopia_carton::{phf_set, FxHashSet, PhfSet};
use sinopia_relief::keys::OUTER_PROPERTY;
use thiserror::Error;

/// Names that are never treated as free.
static ALWAYS_LOCAL: PhfSet<&'static str> = phf_set! {
    "__nn", "arguments",
};

/// Reasons a fragment cannot be qualified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QualifyError {
    #[error("{0}")]
    Parse(String),
    #[error("expected a function or arrow function literal")]
    NotAFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Function,
    Block,
}

#[derive(Debug)]
struct LexicalScope {
    kind: ScopeKind,
    names: FxHashSet<String>,
}

/// AST walker collecting the rewrites for one fragment.
pub struct Qualifier<'r> {
    scopes: Vec<LexicalScope>,
    /// (byte offset, inserted text), in visit order
    edits: Vec<(u32, String)>,
    references: &'r mut FxHashSet<String>,
    self_key: Option<&'r str>,
}

impl<'r> Qualifier<'r> {
    pub fn new(references: &'r mut FxHashSet<String>, self_key: Option<&'r str>) -> Self {
        Self {
            scopes: Vec::new(),
            edits: Vec::new(),
            references,
            self_key,
        }
    }

    /// Insert `text` at `offset` when the edits are applied.
    pub fn insert(&mut self, offset: u32, text: impl Into<String>) {
        self.edits.push((offset, text.into()));
    }

    /// Splice the collected insertions into `source`.
    pub fn apply(mut self, source: &str) -> String {
        // Stable: insertions at one offset keep their visit order.
        self.edits.sort_by_key(|(offset, _)| *offset);
        let extra: usize = self.edits.iter().map(|(_, t)| t.len()).sum();
        let mut out = String::with_capacity(source.len() + extra);
        let mut last = 0;
        for (offset, text) in &self.edits {
            let offset = (*offset as usize).min(source.len());
            out.push_str(&source[last..offset]);
            out.push_str(text);
            last = offset;
        }
        out.push_str(&source[last..]);
        out
    }

    fn is_local(&self, name: &str) -> bool {
        ALWAYS_LOCAL.contains(name) || self.scopes.iter().any(|s| s.names.contains(name))
    }

    /// Prefix for a free name, recording it as a reference.
    fn qualify_name(&mut self, name: &str) -> String {
        self.references.insert(name.to_string());
        if self.self_key == Some(name) {
            format!("this.{OUTER_PROPERTY}.")
        } else {
            String::from("this.")
        }
    }

    fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(LexicalScope {
            kind,
            names: FxHashSet::default(),
        });
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name.to_string());
        }
    }

    fn declare_in_function(&mut self, name: &str) {
        if let Some(scope) = self
            .scopes
            .iter_mut()
            .rev()
            .find(|s| s.kind == ScopeKind::Function)
        {
            scope.names.insert(name.to_string());
        }
    }

    fn declare_pattern(&mut self, pattern: &BindingPattern<'_>, hoisted: bool) {
        let mut names = Vec::new();
        collect_binding_names(pattern, &mut names);
        for name in names {
            if hoisted {
                self.declare_in_function(&name);
            } else {
                self.declare(&name);
            }
        }
    }

    fn declare_params(&mut self, params: &FormalParameters<'_>) {
        for param in &params.items {
            self.declare_pattern(&param.pattern, false);
        }
        if let Some(rest) = &params.rest {
            self.declare_pattern(&rest.argument, false);
        }
    }

    /// Hoist `var` and function declarations of a function body.
    fn hoist(&mut self, statements: &[Statement<'_>]) {
        for statement in statements {
            self.hoist_statement(statement);
        }
    }

    fn hoist_statement(&mut self, statement: &Statement<'_>) {
        match statement {
            Statement::VariableDeclaration(decl) => self.hoist_var(decl),
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    self.declare_in_function(id.name.as_str());
                }
            }
            Statement::BlockStatement(block) => self.hoist(&block.body),
            Statement::IfStatement(stmt) => {
                self.hoist_statement(&stmt.consequent);
                if let Some(alternate) = &stmt.alternate {
                    self.hoist_statement(alternate);
                }
            }
            Statement::ForStatement(stmt) => {
                if let Some(ForStatementInit::VariableDeclaration(decl)) = &stmt.init {
                    self.hoist_var(decl);
                }
                self.hoist_statement(&stmt.body);
            }
            Statement::ForInStatement(stmt) => {
                if let ForStatementLeft::VariableDeclaration(decl) = &stmt.left {
                    self.hoist_var(decl);
                }
                self.hoist_statement(&stmt.body);
            }
            Statement::ForOfStatement(stmt) => {
                if let ForStatementLeft::VariableDeclaration(decl) = &stmt.left {
                    self.hoist_var(decl);
                }
                self.hoist_statement(&stmt.body);
            }
            Statement::WhileStatement(stmt) => self.hoist_statement(&stmt.body),
            Statement::DoWhileStatement(stmt) => self.hoist_statement(&stmt.body),
            Statement::LabeledStatement(stmt) => self.hoist_statement(&stmt.body),
            Statement::TryStatement(stmt) => {
                self.hoist(&stmt.block.body);
                if let Some(handler) = &stmt.handler {
                    self.hoist(&handler.body.body);
                }
                if let Some(finalizer) = &stmt.finalizer {
                    self.hoist(&finalizer.body);
                }
            }
            Statement::SwitchStatement(stmt) => {
                for case in &stmt.cases {
                    self.hoist(&case.consequent);
                }
            }
            _ => {}
        }
    }

    fn hoist_var(&mut self, decl: &VariableDeclaration<'_>) {
        if decl.kind == VariableDeclarationKind::Var {
            for declarator in &decl.declarations {
                self.declare_pattern(&declarator.id, true);
            }
        }
    }

    /// Declare `let`, `const` and `class` bindings made directly in a block.
    fn declare_lexical(&mut self, statements: &[Statement<'_>]) {
        for statement in statements {
            match statement {
                Statement::VariableDeclaration(decl) => self.declare_lexical_decl(decl),
                Statement::ClassDeclaration(class) => {
                    if let Some(id) = &class.id {
                        self.declare(id.name.as_str());
                    }
                }
                _ => {}
            }
        }
    }

    fn declare_lexical_decl(&mut self, decl: &VariableDeclaration<'_>) {
        if decl.kind != VariableDeclarationKind::Var {
            for declarator in &decl.declarations {
                self.declare_pattern(&declarator.id, false);
            }
        }
    }

    /// Enter a function body scope for a list of statements.
    fn enter_body(&mut self, statements: &[Statement<'_>]) {
        self.hoist(statements);
        self.declare_lexical(statements);
    }
}

impl<'a> Visit<'a> for Qualifier<'_> {
    fn visit_program(&mut self, program: &Program<'a>) {
        self.push_scope(ScopeKind::Function);
        self.enter_body(&program.body);
        for statement in &program.body {
            self.visit_statement(statement);
        }
        self.pop_scope();
    }

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        let name = ident.name.as_str();
        if self.is_local(name) {
            return;
        }
        let prefix = self.qualify_name(name);
        self.insert(ident.span.start, prefix);
    }

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        // `{ a }` must become `{ a: this.a }`
        if prop.shorthand {
            if let Expression::Identifier(ident) = &prop.value {
                let name = ident.name.as_str();
                if !self.is_local(name) {
                    let prefix = self.qualify_name(name);
                    self.insert(ident.span.start, format!("{name}: {prefix}"));
                }
                return;
            }
        }
        walk_object_property(self, prop);
    }

    fn visit_assignment_target_property_identifier(
        &mut self,
        prop: &AssignmentTargetPropertyIdentifier<'a>,
    ) {
        // `({ a } = o)` must become `({ a: this.a } = o)`
        let name = prop.binding.name.as_str();
        if !self.is_local(name) {
            let prefix = self.qualify_name(name);
            self.insert(prop.binding.span.start, format!("{name}: {prefix}"));
        }
        if let Some(init) = &prop.init {
            self.visit_expression(init);
        }
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        self.push_scope(ScopeKind::Function);
        // A named function expression sees its own name.
        if func.r#type == FunctionType::FunctionExpression {
            if let Some(id) = &func.id {
                self.declare(id.name.as_str());
            }
        }
        self.declare_params(&func.params);
        if let Some(body) = &func.body {
            self.enter_body(&body.statements);
        }
        walk_function(self, func, flags);
        self.pop_scope();
    }

    fn visit_arrow_function_expression(&mut self, arrow: &ArrowFunctionExpression<'a>) {
        self.push_scope(ScopeKind::Function);
        self.declare_params(&arrow.params);
        if !arrow.expression {
            self.enter_body(&arrow.body.statements);
        }
        walk_arrow_function_expression(self, arrow);
        self.pop_scope();
    }

    fn visit_block_statement(&mut self, block: &BlockStatement<'a>) {
        self.push_scope(ScopeKind::Block);
        self.declare_lexical(&block.body);
        walk_block_statement(self, block);
        self.pop_scope();
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        self.push_scope(ScopeKind::Block);
        if let Some(ForStatementInit::VariableDeclaration(decl)) = &stmt.init {
            self.declare_lexical_decl(decl);
        }
        walk_for_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        self.push_scope(ScopeKind::Block);
        if let ForStatementLeft::VariableDeclaration(decl) = &stmt.left {
            self.declare_lexical_decl(decl);
        }
        walk_for_in_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        self.push_scope(ScopeKind::Block);
        if let ForStatementLeft::VariableDeclaration(decl) = &stmt.left {
            self.declare_lexical_decl(decl);
        }
        walk_for_of_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause<'a>) {
        self.push_scope(ScopeKind::Block);
        if let Some(param) = &clause.param {
            self.declare_pattern(&param.pattern, false);
        }
        walk_catch_clause(self, clause);
        self.pop_scope();
    }

    fn visit_switch_statement(&mut self, stmt: &SwitchStatement<'a>) {
        self.visit_expression(&stmt.discriminant);
        self.push_scope(ScopeKind::Block);
        for case in &stmt.cases {
            self.declare_lexical(&case.consequent);
        }
        walk_switch_statement_cases(self, stmt);
        self.pop_scope();
    }
}

/// Walk the cases of a switch without revisiting its discriminant.
fn walk_switch_statement_cases<'a>(qualifier: &mut Qualifier<'_>, stmt: &SwitchStatement<'a>) {
    for case in &stmt.cases {
        qualifier.visit_switch_case(case);
    }
}

/// Collect the names bound by a destructuring pattern.
fn collect_binding_names(pattern: &BindingPattern<'_>, names: &mut Vec<String>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(id) => names.push(id.name.to_string()),
        BindingPatternKind::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_names(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_names(&rest.argument, names);
            }
        }
        BindingPatternKind::ArrayPattern(arr) => {
            for element in arr.elements.iter().flatten() {
                collect_binding_names(element, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_names(&rest.argument, names);
            }
        }
        BindingPatternKind::AssignmentPattern(assign) => {
            collect_binding_names(&assign.left, names);
        }
    }
}

fn source_type() -> SourceType {
    SourceType::default().with_module(true)
}

fn first_error<E: ToString>(errors: &[E]) -> QualifyError {
    QualifyError::Parse(
        errors
            .first()
            .map(ToString::to_string)
            .unwrap_or_else(|| String::from("invalid script")),
    )
}

/// Parse `source` as exactly one expression.
///
/// The parser stops after the leading expression, so anything left over
/// (`f(); g()`, `let t = 1; t`) means the source is not a lone expression.
fn parse_lone_expression<'a>(
    allocator: &'a Allocator,
    source: &'a str,
) -> Option<Expression<'a>> {
    let expr = Parser::new(allocator, source, source_type())
        .parse_expression()
        .ok()?;
    (expr.span().end as usize >= source.trim_end().len()).then_some(expr)
}

/// Qualify a fragment in value-expression mode.
///
/// Returns the source of a zero-parameter function. A lone expression becomes
/// its return value; otherwise the fragment is read as statements and a final
/// top-level expression statement is turned into a `return`.
pub fn qualify_value(
    source: &str,
    self_key: Option<&str>,
    references: &mut FxHashSet<String>,
) -> Result<String, QualifyError> {
    let allocator = Allocator::default();

    if let Some(expr) = parse_lone_expression(&allocator, source) {
        let mut qualifier = Qualifier::new(references, self_key);
        qualifier.push_scope(ScopeKind::Function);
        qualifier.visit_expression(&expr);
        qualifier.pop_scope();
        let body = qualifier.apply(source);
        return Ok(format!("function () {{ return ({body}); }}"));
    }

    let ret = Parser::new(&allocator, source, source_type())
        .with_options(ParseOptions {
            allow_return_outside_function: true,
            ..ParseOptions::default()
        })
        .parse();
    if !ret.errors.is_empty() {
        return Err(first_error(&ret.errors));
    }
    let body = qualify_program(&ret.program, source, self_key, references);
    Ok(format!("function () {{\n{body}\n}}"))
}

/// Qualify a parsed statement list, turning a final top-level expression
/// statement into a `return`.
pub fn qualify_program(
    program: &Program<'_>,
    source: &str,
    self_key: Option<&str>,
    references: &mut FxHashSet<String>,
) -> String {
    let mut qualifier = Qualifier::new(references, self_key);
    if let Some(Statement::ExpressionStatement(last)) = program.body.last() {
        let span = last.expression.span();
        qualifier.insert(span.start, "return (");
        qualifier.visit_program(program);
        qualifier.insert(span.end, ")");
    } else {
        qualifier.visit_program(program);
    }
    qualifier.apply(source)
}

/// Qualify a fragment in function-literal mode.
///
/// The fragment must be exactly one function or arrow function expression,
/// optionally parenthesized. Its parameters are kept and its body rewritten.
pub fn qualify_function(
    source: &str,
    references: &mut FxHashSet<String>,
) -> Result<String, QualifyError> {
    let allocator = Allocator::default();
    let expr = Parser::new(&allocator, source, source_type())
        .parse_expression()
        .map_err(|errors| first_error(&errors))?;
    if (expr.span().end as usize) < source.trim_end().len() {
        return Err(QualifyError::NotAFunction);
    }

    let mut inner = &expr;
    while let Expression::ParenthesizedExpression(paren) = inner {
        inner = &paren.expression;
    }
    if !matches!(
        inner,
        Expression::FunctionExpression(_) | Expression::ArrowFunctionExpression(_)
    ) {
        return Err(QualifyError::NotAFunction);
    }

    let mut qualifier = Qualifier::new(references, None);
    qualifier.visit_expression(&expr);
    Ok(qualifier.apply(source))
}

/// Whether `source` is a single function or arrow function literal.
pub fn is_function_literal(source: &str) -> bool {
    let allocator = Allocator::default();
    let Some(expr) = parse_lone_expression(&allocator, source) else {
        return false;
    };
    let mut inner = &expr;
    while let Expression::ParenthesizedExpression(paren) = inner {
        inner = &paren.expression;
    }
    matches!(
        inner,
        Expression::FunctionExpression(_) | Expression::ArrowFunctionExpression(_)
    )
}

/// Wrap handler statements into a listener taking `event`.
pub fn handler_source(statements: &str) -> String {
    format!("function (event) {{\n{statements}\n}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(source: &str, self_key: Option<&str>) -> (String, Vec<String>) {
        let mut refs = FxHashSet::default();
        let out = qualify_value(source, self_key, &mut refs).unwrap();
        let mut refs: Vec<_> = refs.into_iter().collect();
        refs.sort();
        (out, refs)
    }

    #[test]
    fn test_expression() {
        let (out, refs) = value("a + b.c * a", None);
        assert_eq!(out, "function () { return (this.a + this.b.c * this.a); }");
        assert_eq!(refs, ["a", "b"]);
    }

    #[test]
    fn test_globals_are_qualified_too() {
        let (out, refs) = value("Math.max(x, 1)", None);
        assert_eq!(out, "function () { return (this.Math.max(this.x, 1)); }");
        assert_eq!(refs, ["Math", "x"]);
    }

    #[test]
    fn test_helper_is_local() {
        let (out, refs) = value("'n='+__nn((n))", None);
        assert_eq!(out, "function () { return ('n='+__nn((this.n))); }");
        assert_eq!(refs, ["n"]);
    }

    #[test]
    fn test_member_and_keys_untouched() {
        let (out, _) = value("({ k: v, [w]: 1 })", None);
        assert_eq!(out, "function () { return (({ k: this.v, [this.w]: 1 })); }");
    }

    #[test]
    fn test_shorthand_property() {
        let (out, refs) = value("({ a, b: 2 })", None);
        assert_eq!(out, "function () { return (({ a: this.a, b: 2 })); }");
        assert_eq!(refs, ["a"]);
    }

    #[test]
    fn test_self_key_reads_outer() {
        let (out, refs) = value("v + 1", Some("v"));
        assert_eq!(out, "function () { return (this.$outer.v + 1); }");
        assert_eq!(refs, ["v"]);
    }

    #[test]
    fn test_arrow_params_are_local() {
        let (out, refs) = value("items.map((x, i) => x * i + k)", None);
        assert_eq!(
            out,
            "function () { return (this.items.map((x, i) => x * i + this.k)); }"
        );
        assert_eq!(refs, ["items", "k"]);
    }

    #[test]
    fn test_statements_return_last_expression() {
        let (out, refs) = value("let t = a * 2; t + 1", None);
        assert_eq!(out, "function () {\nlet t = this.a * 2; return (t + 1)\n}");
        assert_eq!(refs, ["a"]);
    }

    #[test]
    fn test_var_in_nested_block_is_local_everywhere() {
        let (out, refs) = value("if (c) { var n = 1; } n", None);
        assert_eq!(out, "function () {\nif (this.c) { var n = 1; } return (n)\n}");
        assert_eq!(refs, ["c"]);
    }

    #[test]
    fn test_let_in_nested_block_escapes() {
        let (out, refs) = value("if (c) { let n = 1; } n", None);
        assert_eq!(
            out,
            "function () {\nif (this.c) { let n = 1; } return (this.n)\n}"
        );
        assert_eq!(refs, ["c", "n"]);

        let (out, refs) = value("{ const m = 1; m } m", None);
        assert_eq!(out, "function () {\n{ const m = 1; m } return (this.m)\n}");
        assert_eq!(refs, ["m"]);
    }

    #[test]
    fn test_function_declarations_hoist() {
        let (out, refs) = value("f(); function f() { return g; }", None);
        assert_eq!(out, "function () {\nf(); function f() { return this.g; }\n}");
        assert_eq!(refs, ["g"]);
    }

    #[test]
    fn test_loops_and_catch() {
        let (out, refs) = value(
            "let s = 0; for (let i = 0; i < n; i++) { s += i } try { s } catch (e) { e } s",
            None,
        );
        assert_eq!(
            out,
            "function () {\nlet s = 0; for (let i = 0; i < this.n; i++) { s += i } try { s } catch (e) { e } return (s)\n}"
        );
        assert_eq!(refs, ["n"]);
    }

    #[test]
    fn test_assignment_targets() {
        let (out, refs) = value("count = count + 1", None);
        assert_eq!(out, "function () { return (this.count = this.count + 1); }");
        assert_eq!(refs, ["count"]);
    }

    #[test]
    fn test_parse_error() {
        let mut refs = FxHashSet::default();
        assert!(matches!(
            qualify_value("a +", None, &mut refs),
            Err(QualifyError::Parse(_))
        ));
    }

    #[test]
    fn test_function_literal_mode() {
        let mut refs = FxHashSet::default();
        let out = qualify_function("(e) => { count++; log(e) }", &mut refs).unwrap();
        assert_eq!(out, "(e) => { this.count++; this.log(e) }");
        let mut sorted: Vec<_> = refs.iter().cloned().collect();
        sorted.sort();
        assert_eq!(sorted, ["count", "log"]);

        let out = qualify_function("function named(x) { return named(x) + y }", &mut refs).unwrap();
        assert_eq!(out, "function named(x) { return named(x) + this.y }");

        assert_eq!(
            qualify_function("a + b", &mut refs),
            Err(QualifyError::NotAFunction)
        );
        assert_eq!(
            qualify_function("function f(n) {} n", &mut refs),
            Err(QualifyError::NotAFunction)
        );
    }

    #[test]
    fn test_leading_expression_is_not_the_whole_fragment() {
        let (out, refs) = value("go(); a", None);
        assert_eq!(out, "function () {\nthis.go(); return (this.a)\n}");
        assert_eq!(refs, ["a", "go"]);

        let (out, refs) = value("function f(n) { return n } f(k)", None);
        assert_eq!(
            out,
            "function () {\nfunction f(n) { return n } return (f(this.k))\n}"
        );
        assert_eq!(refs, ["k"]);

        let (out, _) = value("a + 1  ", None);
        assert_eq!(out, "function () { return (this.a + 1  ); }");
    }

    #[test]
    fn test_not_null_helper_is_local() {
        assert!(ALWAYS_LOCAL.contains(sinopia_relief::keys::NOT_NULL_HELPER));
    }

    #[test]
    fn test_is_function_literal() {
        assert!(is_function_literal("(() => 1)"));
        assert!(is_function_literal("function () {}"));
        assert!(!is_function_literal("count++"));
        assert!(!is_function_literal("function f(n) {} n"));
        assert!(!is_function_literal("(() => 1); x"));
    }
}
