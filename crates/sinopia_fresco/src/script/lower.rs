//! Lowering from the OXC AST into the owned script tree.

use std::rc::Rc;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    self, Argument, ArrayExpressionElement, AssignmentOperator, BindingPattern,
    BindingPatternKind, ChainElement, Expression, ForStatementInit, ForStatementLeft,
    MemberExpression, ObjectPropertyKind, PropertyKey, PropertyKind, SimpleAssignmentTarget,
    Statement, VariableDeclarationKind,
};
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator};

use super::ast::{
    ArrayItem, AssignOp, DeclKind, Expr, FunctionDef, Name, Pattern, Prop, PropName, Stmt, Target,
};
use crate::error::EvalError;

type LowerResult<T> = Result<T, EvalError>;

fn name(s: &str) -> Name {
    Rc::from(s)
}

fn unsupported(what: &str) -> EvalError {
    EvalError::Unsupported(what.to_string())
}

/// Parse `source`, which must be one function or arrow function expression
/// (parentheses allowed), into a shareable function definition.
pub fn compile_function(source: &str) -> Result<Rc<FunctionDef>, EvalError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let expr = Parser::new(&allocator, source, source_type)
        .parse_expression()
        .map_err(|errors| {
            EvalError::Parse(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

    let mut expr = &expr;
    while let Expression::ParenthesizedExpression(paren) = expr {
        expr = &paren.expression;
    }
    match expr {
        Expression::FunctionExpression(func) => lower_function(func),
        Expression::ArrowFunctionExpression(arrow) => lower_arrow(arrow),
        _ => Err(EvalError::Parse(
            "evaluator is not a function expression".to_string(),
        )),
    }
}

fn lower_function(func: &ast::Function<'_>) -> LowerResult<Rc<FunctionDef>> {
    if func.r#async || func.generator {
        return Err(unsupported("async or generator function"));
    }
    let (params, rest) = lower_params(&func.params)?;
    let body = match &func.body {
        Some(body) => lower_statements(&body.statements)?,
        None => Vec::new(),
    };
    let mut hoisted = Vec::new();
    collect_var_names(&body, &mut hoisted);
    Ok(Rc::new(FunctionDef {
        name: func.id.as_ref().map(|id| name(id.name.as_str())),
        params,
        rest,
        body,
        hoisted,
        is_arrow: false,
    }))
}

fn lower_arrow(arrow: &ast::ArrowFunctionExpression<'_>) -> LowerResult<Rc<FunctionDef>> {
    if arrow.r#async {
        return Err(unsupported("async arrow function"));
    }
    let (params, rest) = lower_params(&arrow.params)?;
    let body = if arrow.expression {
        match arrow.body.statements.first() {
            Some(Statement::ExpressionStatement(stmt)) => {
                vec![Stmt::Return(Some(lower_expr(&stmt.expression)?))]
            }
            _ => Vec::new(),
        }
    } else {
        lower_statements(&arrow.body.statements)?
    };
    let mut hoisted = Vec::new();
    collect_var_names(&body, &mut hoisted);
    Ok(Rc::new(FunctionDef {
        name: None,
        params,
        rest,
        body,
        hoisted,
        is_arrow: true,
    }))
}

fn lower_params(
    params: &ast::FormalParameters<'_>,
) -> LowerResult<(Vec<Pattern>, Option<Pattern>)> {
    let items = params
        .items
        .iter()
        .map(|param| lower_pattern(&param.pattern))
        .collect::<LowerResult<Vec<_>>>()?;
    let rest = match &params.rest {
        Some(rest) => Some(lower_pattern(&rest.argument)?),
        None => None,
    };
    Ok((items, rest))
}

fn lower_pattern(pattern: &BindingPattern<'_>) -> LowerResult<Pattern> {
    Ok(match &pattern.kind {
        BindingPatternKind::BindingIdentifier(id) => Pattern::Ident(name(id.name.as_str())),
        BindingPatternKind::ObjectPattern(object) => {
            let props = object
                .properties
                .iter()
                .map(|prop| {
                    let key = lower_property_key(&prop.key, prop.computed)?;
                    Ok((key, lower_pattern(&prop.value)?))
                })
                .collect::<LowerResult<Vec<_>>>()?;
            let rest = match &object.rest {
                Some(rest) => Some(Box::new(lower_pattern(&rest.argument)?)),
                None => None,
            };
            Pattern::Object { props, rest }
        }
        BindingPatternKind::ArrayPattern(array) => {
            let items = array
                .elements
                .iter()
                .map(|item| item.as_ref().map(lower_pattern).transpose())
                .collect::<LowerResult<Vec<_>>>()?;
            let rest = match &array.rest {
                Some(rest) => Some(Box::new(lower_pattern(&rest.argument)?)),
                None => None,
            };
            Pattern::Array { items, rest }
        }
        BindingPatternKind::AssignmentPattern(assign) => Pattern::Default(
            Box::new(lower_pattern(&assign.left)?),
            lower_expr(&assign.right)?,
        ),
    })
}

fn lower_property_key(key: &PropertyKey<'_>, computed: bool) -> LowerResult<PropName> {
    if computed {
        let expr = key
            .as_expression()
            .ok_or_else(|| unsupported("private property key"))?;
        return Ok(PropName::Computed(lower_expr(expr)?));
    }
    key.static_name()
        .map(|key| PropName::Static(name(&key)))
        .ok_or_else(|| unsupported("property key"))
}

pub(crate) fn lower_statements(stmts: &[Statement<'_>]) -> LowerResult<Vec<Stmt>> {
    stmts.iter().map(lower_statement).collect()
}

fn lower_block(stmt: &Statement<'_>) -> LowerResult<Box<Stmt>> {
    lower_statement(stmt).map(Box::new)
}

fn decl_kind(kind: VariableDeclarationKind) -> LowerResult<DeclKind> {
    match kind {
        VariableDeclarationKind::Var => Ok(DeclKind::Var),
        VariableDeclarationKind::Let => Ok(DeclKind::Let),
        VariableDeclarationKind::Const => Ok(DeclKind::Const),
        _ => Err(unsupported("using declaration")),
    }
}

fn lower_declaration(decl: &ast::VariableDeclaration<'_>) -> LowerResult<Stmt> {
    let kind = decl_kind(decl.kind)?;
    let declarators = decl
        .declarations
        .iter()
        .map(|d| {
            let init = d.init.as_ref().map(lower_expr).transpose()?;
            Ok((lower_pattern(&d.id)?, init))
        })
        .collect::<LowerResult<Vec<_>>>()?;
    Ok(Stmt::Decl(kind, declarators))
}

/// Head of a `for…in` / `for…of` loop.
fn lower_for_left(left: &ForStatementLeft<'_>) -> LowerResult<(Option<DeclKind>, Pattern)> {
    if let ForStatementLeft::VariableDeclaration(decl) = left {
        let kind = decl_kind(decl.kind)?;
        let first = decl
            .declarations
            .first()
            .ok_or_else(|| unsupported("empty loop declaration"))?;
        return Ok((Some(kind), lower_pattern(&first.id)?));
    }
    let target = left
        .as_assignment_target()
        .and_then(|t| t.as_simple_assignment_target())
        .ok_or_else(|| unsupported("destructuring loop target"))?;
    Ok((None, Pattern::Target(lower_simple_target(target)?)))
}

fn lower_statement(stmt: &Statement<'_>) -> LowerResult<Stmt> {
    Ok(match stmt {
        Statement::EmptyStatement(_) | Statement::DebuggerStatement(_) => Stmt::Empty,
        Statement::ExpressionStatement(s) => Stmt::Expr(lower_expr(&s.expression)?),
        Statement::VariableDeclaration(decl) => lower_declaration(decl)?,
        Statement::FunctionDeclaration(func) => {
            let def = lower_function(func)?;
            let fn_name = def
                .name
                .clone()
                .ok_or_else(|| unsupported("anonymous function declaration"))?;
            Stmt::Function(fn_name, def)
        }
        Statement::ReturnStatement(s) => Stmt::Return(s.argument.as_ref().map(lower_expr).transpose()?),
        Statement::IfStatement(s) => Stmt::If(
            lower_expr(&s.test)?,
            lower_block(&s.consequent)?,
            s.alternate.as_ref().map(lower_block).transpose()?,
        ),
        Statement::BlockStatement(block) => Stmt::Block(lower_statements(&block.body)?),
        Statement::ForStatement(s) => {
            let init = match &s.init {
                None => None,
                Some(ForStatementInit::VariableDeclaration(decl)) => {
                    Some(Box::new(lower_declaration(decl)?))
                }
                Some(init) => {
                    let expr = init
                        .as_expression()
                        .ok_or_else(|| unsupported("loop initializer"))?;
                    Some(Box::new(Stmt::Expr(lower_expr(expr)?)))
                }
            };
            Stmt::For {
                init,
                test: s.test.as_ref().map(lower_expr).transpose()?,
                update: s.update.as_ref().map(lower_expr).transpose()?,
                body: lower_block(&s.body)?,
            }
        }
        Statement::ForOfStatement(s) => {
            if s.r#await {
                return Err(unsupported("for await"));
            }
            let (decl, pattern) = lower_for_left(&s.left)?;
            Stmt::ForOf {
                decl,
                pattern,
                iterable: lower_expr(&s.right)?,
                body: lower_block(&s.body)?,
            }
        }
        Statement::ForInStatement(s) => {
            let (decl, pattern) = lower_for_left(&s.left)?;
            Stmt::ForIn {
                decl,
                pattern,
                object: lower_expr(&s.right)?,
                body: lower_block(&s.body)?,
            }
        }
        Statement::WhileStatement(s) => Stmt::While(lower_expr(&s.test)?, lower_block(&s.body)?),
        Statement::DoWhileStatement(s) => {
            Stmt::DoWhile(lower_block(&s.body)?, lower_expr(&s.test)?)
        }
        Statement::BreakStatement(s) if s.label.is_none() => Stmt::Break,
        Statement::ContinueStatement(s) if s.label.is_none() => Stmt::Continue,
        Statement::ThrowStatement(s) => Stmt::Throw(lower_expr(&s.argument)?),
        Statement::TryStatement(s) => {
            let (param, handler) = match &s.handler {
                Some(clause) => (
                    clause
                        .param
                        .as_ref()
                        .map(|p| lower_pattern(&p.pattern))
                        .transpose()?,
                    Some(lower_statements(&clause.body.body)?),
                ),
                None => (None, None),
            };
            Stmt::Try {
                block: lower_statements(&s.block.body)?,
                param,
                handler,
                finalizer: s
                    .finalizer
                    .as_ref()
                    .map(|f| lower_statements(&f.body))
                    .transpose()?,
            }
        }
        Statement::SwitchStatement(s) => Stmt::Switch(
            lower_expr(&s.discriminant)?,
            s.cases
                .iter()
                .map(|case| {
                    Ok((
                        case.test.as_ref().map(lower_expr).transpose()?,
                        lower_statements(&case.consequent)?,
                    ))
                })
                .collect::<LowerResult<Vec<_>>>()?,
        ),
        Statement::BreakStatement(_) | Statement::ContinueStatement(_) => {
            return Err(unsupported("labelled jump"))
        }
        Statement::LabeledStatement(_) => return Err(unsupported("labelled statement")),
        Statement::ClassDeclaration(_) => return Err(unsupported("class declaration")),
        _ => return Err(unsupported("statement")),
    })
}

fn lower_args(args: &[Argument<'_>]) -> LowerResult<Vec<ArrayItem>> {
    args.iter()
        .map(|arg| match arg {
            Argument::SpreadElement(spread) => Ok(ArrayItem::Spread(lower_expr(&spread.argument)?)),
            _ => {
                let expr = arg
                    .as_expression()
                    .ok_or_else(|| unsupported("argument"))?;
                Ok(ArrayItem::Item(lower_expr(expr)?))
            }
        })
        .collect()
}

fn lower_member(member: &MemberExpression<'_>) -> LowerResult<Expr> {
    Ok(match member {
        MemberExpression::StaticMemberExpression(m) => Expr::Member {
            object: Box::new(lower_expr(&m.object)?),
            property: Box::new(PropName::Static(name(m.property.name.as_str()))),
            optional: m.optional,
        },
        MemberExpression::ComputedMemberExpression(m) => Expr::Member {
            object: Box::new(lower_expr(&m.object)?),
            property: Box::new(PropName::Computed(lower_expr(&m.expression)?)),
            optional: m.optional,
        },
        MemberExpression::PrivateFieldExpression(_) => return Err(unsupported("private field")),
    })
}

fn lower_call(call: &ast::CallExpression<'_>) -> LowerResult<Expr> {
    Ok(Expr::Call {
        callee: Box::new(lower_expr(&call.callee)?),
        args: lower_args(&call.arguments)?,
        optional: call.optional,
    })
}

fn lower_simple_target(target: &SimpleAssignmentTarget<'_>) -> LowerResult<Target> {
    if let SimpleAssignmentTarget::AssignmentTargetIdentifier(id) = target {
        return Ok(Target::Ident(name(id.name.as_str())));
    }
    let member = target
        .as_member_expression()
        .ok_or_else(|| unsupported("assignment target"))?;
    match lower_member(member)? {
        Expr::Member {
            object, property, ..
        } => Ok(Target::Member(*object, *property)),
        _ => Err(unsupported("assignment target")),
    }
}

fn assign_op(op: AssignmentOperator) -> AssignOp {
    use AssignmentOperator as A;
    match op {
        A::Assign => AssignOp::Assign,
        A::Addition => AssignOp::Binary(BinaryOperator::Addition),
        A::Subtraction => AssignOp::Binary(BinaryOperator::Subtraction),
        A::Multiplication => AssignOp::Binary(BinaryOperator::Multiplication),
        A::Division => AssignOp::Binary(BinaryOperator::Division),
        A::Remainder => AssignOp::Binary(BinaryOperator::Remainder),
        A::Exponential => AssignOp::Binary(BinaryOperator::Exponential),
        A::ShiftLeft => AssignOp::Binary(BinaryOperator::ShiftLeft),
        A::ShiftRight => AssignOp::Binary(BinaryOperator::ShiftRight),
        A::ShiftRightZeroFill => AssignOp::Binary(BinaryOperator::ShiftRightZeroFill),
        A::BitwiseOR => AssignOp::Binary(BinaryOperator::BitwiseOR),
        A::BitwiseXOR => AssignOp::Binary(BinaryOperator::BitwiseXOR),
        A::BitwiseAnd => AssignOp::Binary(BinaryOperator::BitwiseAnd),
        A::LogicalOr => AssignOp::Logical(LogicalOperator::Or),
        A::LogicalAnd => AssignOp::Logical(LogicalOperator::And),
        A::LogicalNullish => AssignOp::Logical(LogicalOperator::Coalesce),
    }
}

fn lower_expr(expr: &Expression<'_>) -> LowerResult<Expr> {
    Ok(match expr {
        Expression::BooleanLiteral(b) => Expr::Bool(b.value),
        Expression::NullLiteral(_) => Expr::Null,
        Expression::NumericLiteral(n) => Expr::Number(n.value),
        Expression::StringLiteral(s) => Expr::Str(name(s.value.as_str())),
        Expression::TemplateLiteral(t) => Expr::Template {
            quasis: t
                .quasis
                .iter()
                .map(|q| {
                    name(
                        q.value
                            .cooked
                            .as_ref()
                            .map_or(q.value.raw.as_str(), |c| c.as_str()),
                    )
                })
                .collect(),
            exprs: t
                .expressions
                .iter()
                .map(lower_expr)
                .collect::<LowerResult<_>>()?,
        },
        Expression::Identifier(id) => match id.name.as_str() {
            "undefined" => Expr::Undefined,
            other => Expr::Ident(name(other)),
        },
        Expression::ThisExpression(_) => Expr::This,
        Expression::ArrayExpression(array) => Expr::Array(
            array
                .elements
                .iter()
                .map(|el| match el {
                    ArrayExpressionElement::SpreadElement(spread) => {
                        Ok(ArrayItem::Spread(lower_expr(&spread.argument)?))
                    }
                    ArrayExpressionElement::Elision(_) => Ok(ArrayItem::Hole),
                    _ => {
                        let expr = el
                            .as_expression()
                            .ok_or_else(|| unsupported("array element"))?;
                        Ok(ArrayItem::Item(lower_expr(expr)?))
                    }
                })
                .collect::<LowerResult<_>>()?,
        ),
        Expression::ObjectExpression(object) => Expr::Object(
            object
                .properties
                .iter()
                .map(|prop| match prop {
                    ObjectPropertyKind::ObjectProperty(p) => {
                        if p.kind != PropertyKind::Init {
                            return Err(unsupported("getter or setter"));
                        }
                        Ok(Prop::KeyValue(
                            lower_property_key(&p.key, p.computed)?,
                            lower_expr(&p.value)?,
                        ))
                    }
                    ObjectPropertyKind::SpreadProperty(spread) => {
                        Ok(Prop::Spread(lower_expr(&spread.argument)?))
                    }
                })
                .collect::<LowerResult<_>>()?,
        ),
        Expression::FunctionExpression(func) => Expr::Function(lower_function(func)?),
        Expression::ArrowFunctionExpression(arrow) => Expr::Function(lower_arrow(arrow)?),
        Expression::UnaryExpression(u) => {
            Expr::Unary(u.operator, Box::new(lower_expr(&u.argument)?))
        }
        Expression::UpdateExpression(u) => Expr::Update {
            op: u.operator,
            prefix: u.prefix,
            target: Box::new(lower_simple_target(&u.argument)?),
        },
        Expression::BinaryExpression(b) => Expr::Binary(
            b.operator,
            Box::new(lower_expr(&b.left)?),
            Box::new(lower_expr(&b.right)?),
        ),
        Expression::LogicalExpression(l) => Expr::Logical(
            l.operator,
            Box::new(lower_expr(&l.left)?),
            Box::new(lower_expr(&l.right)?),
        ),
        Expression::ConditionalExpression(c) => Expr::Conditional(
            Box::new(lower_expr(&c.test)?),
            Box::new(lower_expr(&c.consequent)?),
            Box::new(lower_expr(&c.alternate)?),
        ),
        Expression::AssignmentExpression(a) => {
            let target = a
                .left
                .as_simple_assignment_target()
                .ok_or_else(|| unsupported("destructuring assignment"))?;
            Expr::Assign {
                op: assign_op(a.operator),
                target: Box::new(lower_simple_target(target)?),
                value: Box::new(lower_expr(&a.right)?),
            }
        }
        Expression::SequenceExpression(s) => Expr::Sequence(
            s.expressions
                .iter()
                .map(lower_expr)
                .collect::<LowerResult<_>>()?,
        ),
        Expression::ParenthesizedExpression(p) => lower_expr(&p.expression)?,
        Expression::CallExpression(call) => lower_call(call)?,
        Expression::ChainExpression(chain) => {
            let inner = match &chain.expression {
                ChainElement::CallExpression(call) => lower_call(call)?,
                element => {
                    let member = element
                        .as_member_expression()
                        .ok_or_else(|| unsupported("chain element"))?;
                    lower_member(member)?
                }
            };
            Expr::Chain(Box::new(inner))
        }
        Expression::StaticMemberExpression(_)
        | Expression::ComputedMemberExpression(_)
        | Expression::PrivateFieldExpression(_) => {
            let member = expr
                .as_member_expression()
                .ok_or_else(|| unsupported("member expression"))?;
            lower_member(member)?
        }
        Expression::NewExpression(_) => return Err(unsupported("new expression")),
        Expression::RegExpLiteral(_) => return Err(unsupported("regular expression")),
        Expression::BigIntLiteral(_) => return Err(unsupported("bigint")),
        Expression::AwaitExpression(_) | Expression::YieldExpression(_) => {
            return Err(unsupported("await or yield"))
        }
        _ => return Err(unsupported("expression")),
    })
}

fn collect_pattern_names(pattern: &Pattern, out: &mut Vec<Name>) {
    match pattern {
        Pattern::Ident(n) => out.push(n.clone()),
        Pattern::Object { props, rest } => {
            for (_, p) in props {
                collect_pattern_names(p, out);
            }
            if let Some(rest) = rest {
                collect_pattern_names(rest, out);
            }
        }
        Pattern::Array { items, rest } => {
            for p in items.iter().flatten() {
                collect_pattern_names(p, out);
            }
            if let Some(rest) = rest {
                collect_pattern_names(rest, out);
            }
        }
        Pattern::Default(p, _) => collect_pattern_names(p, out),
        Pattern::Target(_) => {}
    }
}

/// Collect `var` names of a function body, not descending into nested
/// functions.
fn collect_var_names(stmts: &[Stmt], out: &mut Vec<Name>) {
    for stmt in stmts {
        collect_var_names_in(stmt, out);
    }
}

fn collect_var_names_in(stmt: &Stmt, out: &mut Vec<Name>) {
    match stmt {
        Stmt::Decl(DeclKind::Var, decls) => {
            for (pattern, _) in decls {
                collect_pattern_names(pattern, out);
            }
        }
        Stmt::If(_, then, otherwise) => {
            collect_var_names_in(then, out);
            if let Some(otherwise) = otherwise {
                collect_var_names_in(otherwise, out);
            }
        }
        Stmt::Block(body) => collect_var_names(body, out),
        Stmt::For { init, body, .. } => {
            if let Some(init) = init {
                collect_var_names_in(init, out);
            }
            collect_var_names_in(body, out);
        }
        Stmt::ForOf {
            decl, pattern, body, ..
        }
        | Stmt::ForIn {
            decl, pattern, body, ..
        } => {
            if *decl == Some(DeclKind::Var) {
                collect_pattern_names(pattern, out);
            }
            collect_var_names_in(body, out);
        }
        Stmt::While(_, body) | Stmt::DoWhile(body, _) => collect_var_names_in(body, out),
        Stmt::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            collect_var_names(block, out);
            if let Some(handler) = handler {
                collect_var_names(handler, out);
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, out);
            }
        }
        Stmt::Switch(_, cases) => {
            for (_, body) in cases {
                collect_var_names(body, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_function_expression() {
        let def = compile_function("function () { return (this.x); }").unwrap();
        assert!(!def.is_arrow);
        assert!(def.params.is_empty());
        assert!(matches!(def.body.as_slice(), [Stmt::Return(Some(Expr::Member { .. }))]));
    }

    #[test]
    fn test_compile_arrow_with_expression_body() {
        let def = compile_function("((e) => this.count++)").unwrap();
        assert!(def.is_arrow);
        assert_eq!(def.params.len(), 1);
        assert!(matches!(def.body.as_slice(), [Stmt::Return(Some(Expr::Update { .. }))]));
    }

    #[test]
    fn test_var_names_are_hoisted() {
        let def = compile_function(
            "function () { if (a) { var x = 1; } for (var i of l) {} let y; function f() { var z; } }",
        )
        .unwrap();
        let hoisted: Vec<&str> = def.hoisted.iter().map(|n| &**n).collect();
        assert_eq!(hoisted, ["x", "i"]);
    }

    #[test]
    fn test_rejects_non_functions() {
        assert!(matches!(compile_function("1 + 2"), Err(EvalError::Parse(_))));
        assert!(matches!(compile_function("function ("), Err(EvalError::Parse(_))));
        assert!(matches!(
            compile_function("function () { return /x/; }"),
            Err(EvalError::Unsupported(_))
        ));
    }
}
