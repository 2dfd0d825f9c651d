//! Tree-walking interpreter for compiled evaluators.
//!
//! Scope reads and writes (`this.x` where `this` is a Scope accessor) go
//! through the [`Host`], which is how evaluators reach the dependency graph.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use sinopia_carton::FxHashMap;
use sinopia_relief::keys::NOT_NULL_HELPER;

use super::ast::{
    ArrayItem, AssignOp, BinaryOperator, DeclKind, Expr, FunctionDef, LogicalOperator, Name,
    Pattern, Prop, PropName, Stmt, Target, UnaryOperator, UpdateOperator,
};
use super::builtins::{self, Native};
use crate::error::{EvalError, EvalResult};
use crate::scope::ScopeId;
use crate::value::{JsValue, Properties};

/// Steps one interpreter run may take before giving up.
pub const STEP_BUDGET: u64 = 1_000_000;
const MAX_CALL_DEPTH: usize = 64;
/// Longest array or string an evaluator may grow in one step.
pub const MAX_LENGTH: usize = 1 << 24;

/// Checked length for array growth and string building.
pub(crate) fn checked_length(len: f64, what: &str) -> EvalResult<usize> {
    if len < 0.0 || len.fract() != 0.0 || !len.is_finite() {
        return Err(EvalError::Range(format!("Invalid {what}")));
    }
    if len > MAX_LENGTH as f64 {
        return Err(EvalError::Range(format!("{what} exceeds {MAX_LENGTH}")));
    }
    Ok(len as usize)
}

/// Access to the scope tree from inside evaluator code.
pub trait Host {
    /// Read `name` through the accessor of `scope`.
    fn get_property(&mut self, scope: ScopeId, name: &str) -> EvalResult<JsValue>;
    /// Write `name` through the accessor of `scope`.
    fn set_property(&mut self, scope: ScopeId, name: &str, value: JsValue) -> EvalResult<()>;
    /// Run a nested refresh starting at `scope`.
    fn refresh(&mut self, scope: ScopeId);
}

#[derive(Debug, Clone)]
struct Binding {
    value: JsValue,
    mutable: bool,
}

/// One level of lexical environment.
#[derive(Debug, Default)]
pub struct Frame {
    vars: FxHashMap<Name, Binding>,
    /// Set on function frames; arrows and blocks look further out.
    this: Option<JsValue>,
    parent: Option<Env>,
}

pub type Env = Rc<RefCell<Frame>>;

fn child(parent: &Env) -> Env {
    Rc::new(RefCell::new(Frame {
        parent: Some(parent.clone()),
        ..Frame::default()
    }))
}

/// Fresh copy of a loop frame, so closures see per-iteration bindings.
fn copy_frame(env: &Env) -> Env {
    let frame = env.borrow();
    Rc::new(RefCell::new(Frame {
        vars: frame.vars.clone(),
        this: frame.this.clone(),
        parent: frame.parent.clone(),
    }))
}

fn declare(env: &Env, name: &str, value: JsValue, mutable: bool) {
    env.borrow_mut()
        .vars
        .insert(Rc::from(name), Binding { value, mutable });
}

fn lookup(env: &Env, name: &str) -> Option<JsValue> {
    let mut current = env.clone();
    loop {
        let parent = {
            let frame = current.borrow();
            if let Some(binding) = frame.vars.get(name) {
                return Some(binding.value.clone());
            }
            frame.parent.clone()
        };
        current = parent?;
    }
}

fn assign(env: &Env, name: &str, value: JsValue) -> EvalResult<()> {
    let mut current = env.clone();
    loop {
        let parent = {
            let mut frame = current.borrow_mut();
            if let Some(binding) = frame.vars.get_mut(name) {
                if !binding.mutable {
                    return Err(EvalError::Type(
                        "Assignment to constant variable.".to_string(),
                    ));
                }
                binding.value = value;
                return Ok(());
            }
            frame.parent.clone()
        };
        current = parent.ok_or_else(|| EvalError::Reference(name.to_string()))?;
    }
}

fn this_of(env: &Env) -> JsValue {
    let mut current = env.clone();
    loop {
        let parent = {
            let frame = current.borrow();
            if let Some(this) = &frame.this {
                return this.clone();
            }
            frame.parent.clone()
        };
        match parent {
            Some(parent) => current = parent,
            None => return JsValue::Undefined,
        }
    }
}

/// Root environment every evaluator closes over.
fn base_env() -> Env {
    let env = Rc::new(RefCell::new(Frame::default()));
    declare(&env, NOT_NULL_HELPER, JsValue::native(Native::NotNull), false);
    env
}

/// A function value defined by script code.
#[derive(Debug)]
pub struct Closure {
    pub(crate) def: Rc<FunctionDef>,
    env: Env,
    /// Bound receiver. Arrows without one take `this` lexically.
    this: Option<JsValue>,
}

impl Closure {
    pub fn name(&self) -> Option<&str> {
        self.def.name.as_deref()
    }
}

/// Instantiate a compiled evaluator, optionally bound to a receiver.
pub fn instantiate(def: Rc<FunctionDef>, this: Option<JsValue>) -> JsValue {
    JsValue::Function(Rc::new(Closure {
        def,
        env: base_env(),
        this,
    }))
}

/// Call `func` with a fresh interpreter.
pub fn call_function<H: Host + ?Sized>(
    host: &mut H,
    func: &JsValue,
    this: JsValue,
    args: Vec<JsValue>,
) -> EvalResult<JsValue> {
    Interpreter::new(host).call(func, this, args)
}

#[derive(Debug)]
enum Flow {
    Normal,
    Return(JsValue),
    Break,
    Continue,
}

#[derive(Debug, Clone, Copy)]
enum Bind {
    Let,
    Const,
    Assign,
}

impl From<DeclKind> for Bind {
    fn from(kind: DeclKind) -> Self {
        match kind {
            DeclKind::Var => Self::Assign,
            DeclKind::Let => Self::Let,
            DeclKind::Const => Self::Const,
        }
    }
}

/// Resolved assignment target.
enum Place {
    Binding(Name),
    Property(JsValue, String),
}

/// Canonical array index of a property key.
pub(crate) fn array_index(key: &str) -> Option<usize> {
    let index = key.parse::<usize>().ok()?;
    (index.to_string() == key).then_some(index)
}

fn to_primitive(value: &JsValue) -> JsValue {
    match value {
        JsValue::Array(_)
        | JsValue::Object(_)
        | JsValue::Scope(_)
        | JsValue::Function(_)
        | JsValue::Native(_) => JsValue::string(value.to_string()),
        other => other.clone(),
    }
}

fn compare(left: &JsValue, right: &JsValue) -> Option<Ordering> {
    match (to_primitive(left), to_primitive(right)) {
        (JsValue::String(a), JsValue::String(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

fn add(left: &JsValue, right: &JsValue) -> JsValue {
    let (a, b) = (to_primitive(left), to_primitive(right));
    if matches!(a, JsValue::String(_)) || matches!(b, JsValue::String(_)) {
        JsValue::from(format!("{a}{b}"))
    } else {
        JsValue::Number(a.to_number() + b.to_number())
    }
}

pub(crate) fn binary(op: BinaryOperator, left: &JsValue, right: &JsValue) -> EvalResult<JsValue> {
    use BinaryOperator as B;
    let shift = || (right.to_int32() as u32) & 31;
    Ok(match op {
        B::Equality => JsValue::Bool(left.loose_equals(right)),
        B::Inequality => JsValue::Bool(!left.loose_equals(right)),
        B::StrictEquality => JsValue::Bool(left.strict_equals(right)),
        B::StrictInequality => JsValue::Bool(!left.strict_equals(right)),
        B::LessThan => JsValue::Bool(compare(left, right) == Some(Ordering::Less)),
        B::LessEqualThan => JsValue::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        B::GreaterThan => JsValue::Bool(compare(left, right) == Some(Ordering::Greater)),
        B::GreaterEqualThan => JsValue::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        B::Addition => add(left, right),
        B::Subtraction => JsValue::Number(left.to_number() - right.to_number()),
        B::Multiplication => JsValue::Number(left.to_number() * right.to_number()),
        B::Division => JsValue::Number(left.to_number() / right.to_number()),
        B::Remainder => JsValue::Number(left.to_number() % right.to_number()),
        B::Exponential => JsValue::Number(left.to_number().powf(right.to_number())),
        B::ShiftLeft => JsValue::Number(f64::from(left.to_int32().wrapping_shl(shift()))),
        B::ShiftRight => JsValue::Number(f64::from(left.to_int32().wrapping_shr(shift()))),
        B::ShiftRightZeroFill => {
            JsValue::Number(f64::from((left.to_int32() as u32).wrapping_shr(shift())))
        }
        B::BitwiseOR => JsValue::Number(f64::from(left.to_int32() | right.to_int32())),
        B::BitwiseXOR => JsValue::Number(f64::from(left.to_int32() ^ right.to_int32())),
        B::BitwiseAnd => JsValue::Number(f64::from(left.to_int32() & right.to_int32())),
        B::In | B::Instanceof => {
            return Err(EvalError::Unsupported(format!("operator {op:?}")))
        }
    })
}

/// Interpreter state for one run.
pub struct Interpreter<'h, H: Host + ?Sized> {
    pub(crate) host: &'h mut H,
    steps: u64,
    depth: usize,
}

impl<'h, H: Host + ?Sized> Interpreter<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        Self {
            host,
            steps: 0,
            depth: 0,
        }
    }

    fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if self.steps > STEP_BUDGET {
            Err(EvalError::BudgetExhausted)
        } else {
            Ok(())
        }
    }

    // ── calls ───────────────────────────────────────────────────────────

    pub fn call(&mut self, func: &JsValue, this: JsValue, args: Vec<JsValue>) -> EvalResult<JsValue> {
        match func {
            JsValue::Function(closure) => self.call_closure(closure, this, args),
            JsValue::Native(native) => builtins::call_native(self, native, args),
            other => Err(EvalError::Type(format!("{other:?} is not a function"))),
        }
    }

    fn call_closure(
        &mut self,
        closure: &Rc<Closure>,
        this: JsValue,
        args: Vec<JsValue>,
    ) -> EvalResult<JsValue> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::CallDepth);
        }
        let def = &closure.def;
        let env = Rc::new(RefCell::new(Frame {
            vars: FxHashMap::default(),
            this: if def.is_arrow {
                closure.this.clone()
            } else {
                Some(closure.this.clone().unwrap_or(this))
            },
            parent: Some(closure.env.clone()),
        }));

        if !def.is_arrow {
            if let Some(name) = &def.name {
                declare(&env, name, JsValue::Function(closure.clone()), true);
            }
            declare(&env, "arguments", JsValue::array(args.clone()), true);
        }
        for (i, param) in def.params.iter().enumerate() {
            let arg = args.get(i).cloned().unwrap_or_default();
            self.bind(param, arg, &env, Bind::Let)?;
        }
        if let Some(rest) = &def.rest {
            let extra = args.get(def.params.len()..).unwrap_or_default().to_vec();
            self.bind(rest, JsValue::array(extra), &env, Bind::Let)?;
        }
        for name in &def.hoisted {
            if !env.borrow().vars.contains_key(&**name) {
                declare(&env, name, JsValue::Undefined, true);
            }
        }

        self.depth += 1;
        let flow = self.run_body(&def.body, &env);
        self.depth -= 1;
        match flow? {
            Flow::Return(value) => Ok(value),
            _ => Ok(JsValue::Undefined),
        }
    }

    // ── statements ──────────────────────────────────────────────────────

    fn run_body(&mut self, stmts: &[Stmt], env: &Env) -> EvalResult<Flow> {
        for stmt in stmts {
            if let Stmt::Function(name, def) = stmt {
                let closure = JsValue::Function(Rc::new(Closure {
                    def: def.clone(),
                    env: env.clone(),
                    this: None,
                }));
                declare(env, name, closure, true);
            }
        }
        for stmt in stmts {
            match self.exec(stmt, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, stmts: &[Stmt], env: &Env) -> EvalResult<Flow> {
        self.run_body(stmts, &child(env))
    }

    fn exec(&mut self, stmt: &Stmt, env: &Env) -> EvalResult<Flow> {
        self.tick()?;
        Ok(match stmt {
            Stmt::Empty | Stmt::Function(..) => Flow::Normal,
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Flow::Normal
            }
            Stmt::Decl(kind, decls) => {
                for (pattern, init) in decls {
                    let value = match init {
                        Some(init) => self.eval(init, env)?,
                        // `var x;` keeps the hoisted value
                        None if *kind == DeclKind::Var => continue,
                        None => JsValue::Undefined,
                    };
                    self.bind(pattern, value, env, Bind::from(*kind))?;
                }
                Flow::Normal
            }
            Stmt::Return(expr) => Flow::Return(match expr {
                Some(expr) => self.eval(expr, env)?,
                None => JsValue::Undefined,
            }),
            Stmt::If(test, then, otherwise) => {
                if self.eval(test, env)?.truthy() {
                    self.exec(then, env)?
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise, env)?
                } else {
                    Flow::Normal
                }
            }
            Stmt::Block(body) => self.exec_block(body, env)?,
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let mut iteration = child(env);
                if let Some(init) = init {
                    self.exec(init, &iteration)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(test, &iteration)?.truthy() {
                            break;
                        }
                    }
                    match self.exec(body, &iteration)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    iteration = copy_frame(&iteration);
                    if let Some(update) = update {
                        self.eval(update, &iteration)?;
                    }
                }
                Flow::Normal
            }
            Stmt::ForOf {
                decl,
                pattern,
                iterable,
                body,
            } => {
                let items = self.eval(iterable, env)?;
                let items = self.iterate(&items)?;
                self.run_loop(items, *decl, pattern, body, env)?
            }
            Stmt::ForIn {
                decl,
                pattern,
                object,
                body,
            } => {
                let object = self.eval(object, env)?;
                let keys = builtins::own_keys(&object)
                    .into_iter()
                    .map(JsValue::from)
                    .collect();
                self.run_loop(keys, *decl, pattern, body, env)?
            }
            Stmt::While(test, body) => {
                while self.eval(test, env)?.truthy() {
                    match self.exec(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Flow::Normal
            }
            Stmt::DoWhile(body, test) => {
                loop {
                    match self.exec(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(test, env)?.truthy() {
                        break;
                    }
                }
                Flow::Normal
            }
            Stmt::Break => Flow::Break,
            Stmt::Continue => Flow::Continue,
            Stmt::Throw(expr) => return Err(EvalError::Thrown(self.eval(expr, env)?)),
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                let result = match (self.exec_block(block, env), handler) {
                    (Err(err), Some(handler)) if err.is_catchable() => {
                        let catch_env = child(env);
                        if let Some(param) = param {
                            self.bind(param, err.to_thrown(), &catch_env, Bind::Let)?;
                        }
                        self.run_body(handler, &catch_env)
                    }
                    (result, _) => result,
                };
                if let Some(finalizer) = finalizer {
                    match self.exec_block(finalizer, env)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                result?
            }
            Stmt::Switch(discriminant, cases) => {
                let value = self.eval(discriminant, env)?;
                let mut start = None;
                for (i, (test, _)) in cases.iter().enumerate() {
                    if let Some(test) = test {
                        if self.eval(test, env)?.strict_equals(&value) {
                            start = Some(i);
                            break;
                        }
                    }
                }
                let start = start.or_else(|| cases.iter().position(|(test, _)| test.is_none()));
                let Some(start) = start else {
                    return Ok(Flow::Normal);
                };
                let case_env = child(env);
                for (_, body) in &cases[start..] {
                    for stmt in body {
                        match self.exec(stmt, &case_env)? {
                            Flow::Normal => {}
                            Flow::Break => return Ok(Flow::Normal),
                            flow => return Ok(flow),
                        }
                    }
                }
                Flow::Normal
            }
        })
    }

    fn run_loop(
        &mut self,
        items: Vec<JsValue>,
        decl: Option<DeclKind>,
        pattern: &Pattern,
        body: &Stmt,
        env: &Env,
    ) -> EvalResult<Flow> {
        let mode = decl.map_or(Bind::Assign, Bind::from);
        for item in items {
            let iteration = child(env);
            self.bind(pattern, item, &iteration, mode)?;
            match self.exec(body, &iteration)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn bind(&mut self, pattern: &Pattern, value: JsValue, env: &Env, mode: Bind) -> EvalResult<()> {
        match pattern {
            Pattern::Ident(name) => match mode {
                Bind::Assign => assign(env, name, value),
                Bind::Let => {
                    declare(env, name, value, true);
                    Ok(())
                }
                Bind::Const => {
                    declare(env, name, value, false);
                    Ok(())
                }
            },
            Pattern::Default(inner, default) => {
                let value = match value {
                    JsValue::Undefined => self.eval(default, env)?,
                    value => value,
                };
                self.bind(inner, value, env, mode)
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    return Err(EvalError::Type(format!("Cannot destructure '{value}'")));
                }
                let mut used = Vec::with_capacity(props.len());
                for (key, inner) in props {
                    let key = self.prop_key(key, env)?;
                    let field = self.get_member(&value, &key)?;
                    used.push(key);
                    self.bind(inner, field, env, mode)?;
                }
                if let Some(rest) = rest {
                    let mut remaining = Properties::new();
                    if let JsValue::Object(props) = &value {
                        for (k, v) in props.borrow().iter() {
                            if !used.contains(k) {
                                remaining.insert(k.clone(), v.clone());
                            }
                        }
                    }
                    self.bind(rest, JsValue::object(remaining), env, mode)?;
                }
                Ok(())
            }
            Pattern::Array { items, rest } => {
                let list = self.iterate(&value)?;
                for (i, inner) in items.iter().enumerate() {
                    if let Some(inner) = inner {
                        let item = list.get(i).cloned().unwrap_or_default();
                        self.bind(inner, item, env, mode)?;
                    }
                }
                if let Some(rest) = rest {
                    let tail = list.get(items.len()..).unwrap_or_default().to_vec();
                    self.bind(rest, JsValue::array(tail), env, mode)?;
                }
                Ok(())
            }
            Pattern::Target(target) => {
                let place = self.resolve_place(target, env)?;
                self.put(&place, value, env)
            }
        }
    }

    // ── expressions ─────────────────────────────────────────────────────

    pub(crate) fn eval(&mut self, expr: &Expr, env: &Env) -> EvalResult<JsValue> {
        self.tick()?;
        Ok(match expr {
            Expr::Undefined => JsValue::Undefined,
            Expr::Null => JsValue::Null,
            Expr::Bool(b) => JsValue::Bool(*b),
            Expr::Number(n) => JsValue::Number(*n),
            Expr::Str(s) => JsValue::String(s.clone()),
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = exprs.get(i) {
                        out.push_str(&self.eval(expr, env)?.to_string());
                    }
                }
                JsValue::from(out)
            }
            Expr::Ident(name) => {
                lookup(env, name).ok_or_else(|| EvalError::Reference(name.to_string()))?
            }
            Expr::This => this_of(env),
            Expr::Array(items) => JsValue::array(self.eval_items(items, env)?),
            Expr::Object(props) => self.eval_object(props, env)?,
            Expr::Function(def) => JsValue::Function(Rc::new(Closure {
                def: def.clone(),
                env: env.clone(),
                this: None,
            })),
            Expr::Unary(op, arg) => self.eval_unary(*op, arg, env)?,
            Expr::Update { op, prefix, target } => {
                let place = self.resolve_place(target, env)?;
                let old = self.get_place(&place, env)?.to_number();
                let new = match op {
                    UpdateOperator::Increment => old + 1.0,
                    UpdateOperator::Decrement => old - 1.0,
                };
                self.put(&place, JsValue::Number(new), env)?;
                JsValue::Number(if *prefix { new } else { old })
            }
            Expr::Binary(BinaryOperator::In, left, right) => {
                let key = self.eval(left, env)?.to_string();
                let object = self.eval(right, env)?;
                JsValue::Bool(self.has_property(&object, &key)?)
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                binary(*op, &left, &right)?
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left, env)?;
                let short = match op {
                    LogicalOperator::Or => left.truthy(),
                    LogicalOperator::And => !left.truthy(),
                    LogicalOperator::Coalesce => !left.is_nullish(),
                };
                if short {
                    left
                } else {
                    self.eval(right, env)?
                }
            }
            Expr::Assign { op, target, value } => {
                let place = self.resolve_place(target, env)?;
                match op {
                    AssignOp::Assign => {
                        let value = self.eval(value, env)?;
                        self.put(&place, value.clone(), env)?;
                        value
                    }
                    AssignOp::Binary(op) => {
                        let current = self.get_place(&place, env)?;
                        let rhs = self.eval(value, env)?;
                        let value = binary(*op, &current, &rhs)?;
                        self.put(&place, value.clone(), env)?;
                        value
                    }
                    AssignOp::Logical(op) => {
                        let current = self.get_place(&place, env)?;
                        let keep = match op {
                            LogicalOperator::Or => current.truthy(),
                            LogicalOperator::And => !current.truthy(),
                            LogicalOperator::Coalesce => !current.is_nullish(),
                        };
                        if keep {
                            current
                        } else {
                            let value = self.eval(value, env)?;
                            self.put(&place, value.clone(), env)?;
                            value
                        }
                    }
                }
            }
            Expr::Conditional(test, then, otherwise) => {
                if self.eval(test, env)?.truthy() {
                    self.eval(then, env)?
                } else {
                    self.eval(otherwise, env)?
                }
            }
            Expr::Member { .. } | Expr::Call { .. } => {
                self.eval_chain(expr, env)?.unwrap_or_default()
            }
            Expr::Chain(inner) => self.eval_chain(inner, env)?.unwrap_or_default(),
            Expr::Sequence(exprs) => {
                let mut last = JsValue::Undefined;
                for expr in exprs {
                    last = self.eval(expr, env)?;
                }
                last
            }
        })
    }

    /// Evaluate a member or call; `None` when an optional link short-circuits.
    fn eval_chain(&mut self, expr: &Expr, env: &Env) -> EvalResult<Option<JsValue>> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(object) = self.eval_chain(object, env)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.prop_key(property, env)?;
                self.get_member(&object, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                let (func, this) = match &**callee {
                    Expr::Member {
                        object,
                        property,
                        optional: member_optional,
                    } => {
                        let Some(object) = self.eval_chain(object, env)? else {
                            return Ok(None);
                        };
                        if *member_optional && object.is_nullish() {
                            return Ok(None);
                        }
                        let key = self.prop_key(property, env)?;
                        let func = self.get_member(&object, &key)?;
                        if !*optional && !func.is_callable() {
                            return Err(EvalError::Type(format!("{key} is not a function")));
                        }
                        (func, object)
                    }
                    other => {
                        let Some(func) = self.eval_chain(other, env)? else {
                            return Ok(None);
                        };
                        (func, JsValue::Undefined)
                    }
                };
                if *optional && func.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_items(args, env)?;
                self.call(&func, this, args).map(Some)
            }
            other => self.eval(other, env).map(Some),
        }
    }

    fn eval_unary(&mut self, op: UnaryOperator, arg: &Expr, env: &Env) -> EvalResult<JsValue> {
        match op {
            UnaryOperator::Typeof => {
                let value = match arg {
                    Expr::Ident(name) => lookup(env, name).unwrap_or_default(),
                    other => self.eval(other, env)?,
                };
                Ok(JsValue::from(value.type_of()))
            }
            UnaryOperator::Delete => {
                let Expr::Member {
                    object, property, ..
                } = arg
                else {
                    return Ok(JsValue::Bool(true));
                };
                let object = self.eval(object, env)?;
                let key = self.prop_key(property, env)?;
                match &object {
                    JsValue::Object(props) => {
                        props.borrow_mut().shift_remove(&key);
                    }
                    JsValue::Array(items) => {
                        if let Some(index) = array_index(&key) {
                            if let Some(slot) = items.borrow_mut().get_mut(index) {
                                *slot = JsValue::Undefined;
                            }
                        }
                    }
                    _ => {}
                }
                Ok(JsValue::Bool(true))
            }
            UnaryOperator::UnaryNegation => Ok(JsValue::Number(-self.eval(arg, env)?.to_number())),
            UnaryOperator::UnaryPlus => Ok(JsValue::Number(self.eval(arg, env)?.to_number())),
            UnaryOperator::LogicalNot => Ok(JsValue::Bool(!self.eval(arg, env)?.truthy())),
            UnaryOperator::BitwiseNot => {
                Ok(JsValue::Number(f64::from(!self.eval(arg, env)?.to_int32())))
            }
            UnaryOperator::Void => {
                self.eval(arg, env)?;
                Ok(JsValue::Undefined)
            }
        }
    }

    fn eval_items(&mut self, items: &[ArrayItem], env: &Env) -> EvalResult<Vec<JsValue>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ArrayItem::Item(expr) => out.push(self.eval(expr, env)?),
                ArrayItem::Spread(expr) => {
                    let value = self.eval(expr, env)?;
                    out.extend(self.iterate(&value)?);
                }
                ArrayItem::Hole => out.push(JsValue::Undefined),
            }
        }
        Ok(out)
    }

    fn eval_object(&mut self, props: &[Prop], env: &Env) -> EvalResult<JsValue> {
        let mut out = Properties::new();
        for prop in props {
            match prop {
                Prop::KeyValue(key, value) => {
                    let key = self.prop_key(key, env)?;
                    let value = self.eval(value, env)?;
                    out.insert(key, value);
                }
                Prop::Spread(expr) => {
                    let value = self.eval(expr, env)?;
                    for key in builtins::own_keys(&value) {
                        let field = self.get_member(&value, &key)?;
                        out.insert(key, field);
                    }
                }
            }
        }
        Ok(JsValue::object(out))
    }

    fn prop_key(&mut self, name: &PropName, env: &Env) -> EvalResult<String> {
        match name {
            PropName::Static(name) => Ok(name.to_string()),
            PropName::Computed(expr) => Ok(self.eval(expr, env)?.to_string()),
        }
    }

    /// Elements visited by spread, destructuring and `for…of`.
    pub(crate) fn iterate(&mut self, value: &JsValue) -> EvalResult<Vec<JsValue>> {
        match value {
            JsValue::Array(items) => Ok(items.borrow().clone()),
            JsValue::String(s) => Ok(s.chars().map(|c| JsValue::from(c.to_string())).collect()),
            other => Err(EvalError::Type(format!("{other:?} is not iterable"))),
        }
    }

    // ── properties ──────────────────────────────────────────────────────

    pub(crate) fn get_member(&mut self, object: &JsValue, key: &str) -> EvalResult<JsValue> {
        Ok(match object {
            JsValue::Undefined | JsValue::Null => {
                return Err(EvalError::Type(format!(
                    "Cannot read properties of {object} (reading '{key}')"
                )))
            }
            JsValue::Object(props) => props.borrow().get(key).cloned().unwrap_or_default(),
            JsValue::Array(items) => {
                if key == "length" {
                    JsValue::Number(items.borrow().len() as f64)
                } else if let Some(index) = array_index(key) {
                    items.borrow().get(index).cloned().unwrap_or_default()
                } else {
                    builtins::method(object, key)
                }
            }
            JsValue::String(s) => {
                if key == "length" {
                    JsValue::Number(s.chars().count() as f64)
                } else if let Some(index) = array_index(key) {
                    s.chars()
                        .nth(index)
                        .map_or(JsValue::Undefined, |c| JsValue::from(c.to_string()))
                } else {
                    builtins::method(object, key)
                }
            }
            JsValue::Number(_) => builtins::method(object, key),
            JsValue::Scope(scope) => self.host.get_property(*scope, key)?,
            _ => JsValue::Undefined,
        })
    }

    pub(crate) fn set_member(&mut self, object: &JsValue, key: &str, value: JsValue) -> EvalResult<()> {
        match object {
            JsValue::Undefined | JsValue::Null => Err(EvalError::Type(format!(
                "Cannot set properties of {object} (setting '{key}')"
            ))),
            JsValue::Object(props) => {
                props.borrow_mut().insert(key.to_string(), value);
                Ok(())
            }
            JsValue::Array(items) => {
                if key == "length" {
                    let len = checked_length(value.to_number(), "array length")?;
                    items.borrow_mut().resize(len, JsValue::Undefined);
                } else if let Some(index) = array_index(key) {
                    let mut items = items.borrow_mut();
                    if index >= items.len() {
                        let len = checked_length(index as f64 + 1.0, "array length")?;
                        items.resize(len, JsValue::Undefined);
                    }
                    items[index] = value;
                }
                Ok(())
            }
            JsValue::Scope(scope) => self.host.set_property(*scope, key, value),
            _ => Ok(()),
        }
    }

    fn has_property(&mut self, object: &JsValue, key: &str) -> EvalResult<bool> {
        match object {
            JsValue::Object(props) => Ok(props.borrow().contains_key(key)),
            JsValue::Array(items) => Ok(key == "length"
                || array_index(key).is_some_and(|i| i < items.borrow().len())),
            JsValue::Scope(scope) => Ok(!self.host.get_property(*scope, key)?.is_nullish()),
            other => Err(EvalError::Type(format!(
                "Cannot use 'in' operator to search for '{key}' in {other}"
            ))),
        }
    }

    fn resolve_place(&mut self, target: &Target, env: &Env) -> EvalResult<Place> {
        Ok(match target {
            Target::Ident(name) => Place::Binding(name.clone()),
            Target::Member(object, property) => {
                let object = self.eval(object, env)?;
                let key = self.prop_key(property, env)?;
                Place::Property(object, key)
            }
        })
    }

    fn get_place(&mut self, place: &Place, env: &Env) -> EvalResult<JsValue> {
        match place {
            Place::Binding(name) => {
                lookup(env, name).ok_or_else(|| EvalError::Reference(name.to_string()))
            }
            Place::Property(object, key) => self.get_member(object, key),
        }
    }

    fn put(&mut self, place: &Place, value: JsValue, env: &Env) -> EvalResult<()> {
        match place {
            Place::Binding(name) => assign(env, name, value),
            Place::Property(object, key) => self.set_member(object, key, value),
        }
    }
}
