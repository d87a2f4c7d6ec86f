//! Tree-walking evaluator with a single `place` capability.

use super::ast::*;
use crate::error::{Result, SceneError};
use crate::types::{Voxel, VoxelList};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

/// Coordinates beyond this magnitude are rejected by `place`.
const MAX_COORDINATE: f64 = 1.0e6;
/// Upper bound on array and string lengths built by a program.
const MAX_COLLECTION_LEN: usize = 1 << 20;
/// Deepest recursion through statements and expressions, calls included.
const MAX_EVAL_NESTING: usize = 512;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(ArrayRef),
    Function(Rc<Closure>),
    Builtin(Builtin),
    /// A method bound to its receiver, e.g. `list.push`.
    Method(Box<Value>, Method),
    Namespace(Namespace),
}

pub struct Closure {
    def: Rc<FunctionDef>,
    env: Env,
}

/// Shared, mutable array storage.
#[derive(Clone)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    fn borrow_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.0.borrow_mut()
    }

    fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn id(&self) -> *const RefCell<Vec<Value>> {
        Rc::as_ptr(&self.0)
    }

    /// Move the items out when this is the last handle.
    fn drain_into(&self, values: &mut Vec<Value>) {
        if Rc::strong_count(&self.0) == 1 {
            if let Ok(mut items) = self.0.try_borrow_mut() {
                values.append(&mut items);
            }
        }
    }
}

impl Drop for ArrayRef {
    fn drop(&mut self) {
        let mut values = Vec::new();
        self.drain_into(&mut values);
        if !values.is_empty() {
            dismantle(values, Vec::new());
        }
    }
}

/// Drop values without recursing through nested arrays, closures and
/// scopes. Each container is emptied before it is released.
fn dismantle(mut values: Vec<Value>, mut scopes: Vec<Env>) {
    loop {
        if let Some(scope) = scopes.pop() {
            scope.drain_into(&mut values, &mut scopes);
            continue;
        }
        let Some(value) = values.pop() else {
            return;
        };
        match value {
            Value::Array(array) => array.drain_into(&mut values),
            Value::Function(closure) => {
                if let Ok(closure) = Rc::try_unwrap(closure) {
                    scopes.push(closure.env);
                }
            }
            Value::Method(receiver, _) => values.push(*receiver),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Place,
    Math(MathFn),
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Floor,
    Ceil,
    Round,
    Abs,
    Min,
    Max,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Atan2,
    Pow,
    Sign,
    Trunc,
    Hypot,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Push,
    Pop,
    ForEach,
    Map,
    Filter,
    Includes,
    IndexOf,
    Join,
    Slice,
    ToLowerCase,
    ToUpperCase,
    Trim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Math,
    Console,
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Array(items) => write!(f, "[{}]", join(items, ",")),
            Value::Function(closure) => {
                write!(f, "function {}", closure.def.name.as_deref().unwrap_or("<anonymous>"))
            }
            Value::Builtin(b) => write!(f, "builtin {:?}", b),
            Value::Method(_, m) => write!(f, "method {:?}", m),
            Value::Namespace(ns) => write!(f, "{:?}", ns),
            other => f.write_str(&other.to_display()),
        }
    }
}

impl Value {
    fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(_) => Value::str(&self.to_display()).to_number(),
            _ => f64::NAN,
        }
    }

    pub fn to_display(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_js_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(items) => join(items, ","),
            Value::Namespace(_) => "[object Object]".to_string(),
            _ => "function".to_string(),
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Namespace(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Builtin(_) | Value::Method(..) => "function",
        }
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Namespace(a), Value::Namespace(b)) => a == b,
            _ => false,
        }
    }

    fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(_), Value::Str(_))
            | (Value::Str(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }
}

fn format_js_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else {
        crate::postprocess::format_number(n)
    }
}

/// Join an array's items, nested arrays with commas.
///
/// Walks iteratively. An array already being joined further up renders as
/// an empty string, and output stops growing just past
/// `MAX_COLLECTION_LEN` so callers can reject it.
fn join(root: &ArrayRef, separator: &str) -> String {
    let mut out = String::new();
    let mut open = HashSet::from([root.id()]);
    let mut stack = vec![(root.clone(), 0usize)];

    while let Some((array, index)) = stack.last_mut() {
        let position = *index;
        *index += 1;
        let item = array.borrow().get(position).cloned();
        let Some(item) = item else {
            let finished = array.id();
            open.remove(&finished);
            stack.pop();
            continue;
        };
        if position > 0 {
            out.push_str(if stack.len() == 1 { separator } else { "," });
        }

        match item {
            Value::Undefined | Value::Null => {}
            Value::Array(inner) => {
                if open.insert(inner.id()) {
                    stack.push((inner, 0));
                }
            }
            other => out.push_str(&other.to_display()),
        }
        if out.len() > MAX_COLLECTION_LEN {
            break;
        }
    }
    out
}

fn to_i32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}

struct Binding {
    value: Value,
    mutable: bool,
}

struct Scope {
    vars: HashMap<String, Binding>,
    parent: Option<Env>,
    function_scope: bool,
}

/// A lexical scope chain.
#[derive(Clone)]
pub struct Env(Rc<RefCell<Scope>>);

impl Env {
    fn root() -> Self {
        Env(Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: None,
            function_scope: true,
        })))
    }

    fn child(&self, function_scope: bool) -> Self {
        Env(Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(self.clone()),
            function_scope,
        })))
    }

    fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.0
            .borrow_mut()
            .vars
            .insert(name.to_string(), Binding { value, mutable });
    }

    /// `var` binds in the nearest function scope.
    fn declare_var(&self, name: &str, value: Value) {
        let mut scope = self.clone();
        loop {
            let parent = {
                let inner = scope.0.borrow();
                if inner.function_scope {
                    None
                } else {
                    inner.parent.clone()
                }
            };
            match parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        scope.declare(name, value, true);
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = self.clone();
        loop {
            let parent = {
                let inner = scope.0.borrow();
                if let Some(binding) = inner.vars.get(name) {
                    return Some(binding.value.clone());
                }
                inner.parent.clone()
            };
            scope = parent?;
        }
    }

    /// Assign to an existing binding; undeclared names become globals.
    fn assign(&self, name: &str, value: Value) -> Result<()> {
        let mut scope = self.clone();
        loop {
            let parent = {
                let mut inner = scope.0.borrow_mut();
                if let Some(binding) = inner.vars.get_mut(name) {
                    if !binding.mutable {
                        return Err(SceneError::Runtime(format!(
                            "assignment to constant variable '{}'",
                            name
                        )));
                    }
                    binding.value = value;
                    return Ok(());
                }
                inner.parent.clone()
            };
            match parent {
                Some(parent) => scope = parent,
                None => {
                    scope.declare(name, value, true);
                    return Ok(());
                }
            }
        }
    }

    /// Move the bindings and parent out when this is the last handle.
    fn drain_into(&self, values: &mut Vec<Value>, scopes: &mut Vec<Env>) {
        if Rc::strong_count(&self.0) == 1 {
            self.empty_into(values, scopes);
        }
    }

    fn empty_into(&self, values: &mut Vec<Value>, scopes: &mut Vec<Env>) {
        if let Ok(mut scope) = self.0.try_borrow_mut() {
            values.extend(scope.vars.drain().map(|(_, binding)| binding.value));
            scopes.extend(scope.parent.take());
        }
    }
}

impl Drop for Env {
    fn drop(&mut self) {
        let mut values = Vec::new();
        let mut scopes = Vec::new();
        self.drain_into(&mut values, &mut scopes);
        if !values.is_empty() || !scopes.is_empty() {
            dismantle(values, scopes);
        }
    }
}

/// Weak handles to everything a run allocated that can take part in a
/// reference cycle.
#[derive(Default)]
struct Allocations {
    scopes: Vec<Weak<RefCell<Scope>>>,
    arrays: Vec<Weak<RefCell<Vec<Value>>>>,
}

impl Allocations {
    fn track<T>(list: &mut Vec<Weak<T>>, handle: &Rc<T>) {
        if list.last().is_some_and(|last| last.as_ptr() == Rc::as_ptr(handle)) {
            return;
        }
        if list.len() >= 1024 && list.len() == list.capacity() {
            list.retain(|weak| weak.strong_count() > 0);
        }
        list.push(Rc::downgrade(handle));
    }

    /// Empty every live scope and array, then let them go.
    fn release(&mut self, global: &Env) {
        let scopes: Vec<Env> = self.scopes.drain(..).filter_map(|weak| weak.upgrade()).map(Env).collect();
        let arrays: Vec<ArrayRef> = self.arrays.drain(..).filter_map(|weak| weak.upgrade()).map(ArrayRef).collect();

        let mut values = Vec::new();
        let mut parents = Vec::new();
        global.empty_into(&mut values, &mut parents);
        for scope in &scopes {
            scope.empty_into(&mut values, &mut parents);
        }
        for array in &arrays {
            if let Ok(mut items) = array.0.try_borrow_mut() {
                values.append(&mut items);
            }
        }
        log::trace!(
            "released {} scope(s) and {} array(s)",
            scopes.len(),
            arrays.len()
        );
        dismantle(values, parents);
    }
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Resource ceilings for one program run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub max_steps: u64,
    pub max_voxels: usize,
    pub max_call_depth: usize,
}

/// Evaluation state for one program run.
pub(crate) struct Machine {
    limits: Limits,
    steps: u64,
    depth: usize,
    nesting: usize,
    voxels: VoxelList,
    rng: ChaCha8Rng,
    invoked: HashSet<*const FunctionDef>,
    allocations: Allocations,
}

impl Machine {
    pub fn new(limits: Limits, seed: u64) -> Self {
        Self {
            limits,
            steps: 0,
            depth: 0,
            nesting: 0,
            voxels: VoxelList::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            invoked: HashSet::new(),
            allocations: Allocations::default(),
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Run a program, then its entry point if the program never called it.
    pub fn run(&mut self, program: &[Stmt], entry_point: &str) -> Result<VoxelList> {
        let global = Env::root();
        global.declare("place", Value::Builtin(Builtin::Place), true);
        global.declare("Math", Value::Namespace(Namespace::Math), true);
        global.declare("console", Value::Namespace(Namespace::Console), true);

        let result = self.run_in(program, entry_point, &global);
        self.allocations.release(&global);
        result?;

        Ok(std::mem::take(&mut self.voxels))
    }

    fn run_in(&mut self, program: &[Stmt], entry_point: &str, global: &Env) -> Result<()> {
        self.exec_block(program, global)?;

        if let Some(Value::Function(closure)) = global.lookup(entry_point) {
            if !self.invoked.contains(&Rc::as_ptr(&closure.def)) {
                log::debug!("invoking entry point '{}'", entry_point);
                self.call_closure(&closure, Vec::new())?;
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(SceneError::LimitExceeded(format!(
                "step budget of {} exhausted",
                self.limits.max_steps
            )));
        }
        Ok(())
    }

    // ----- statements -----

    fn exec_block(&mut self, stmts: &[Stmt], env: &Env) -> Result<Flow> {
        for stmt in stmts {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    env.declare(name, self.closure(def, env), true);
                }
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

    fn enter(&mut self) -> Result<()> {
        if self.nesting >= MAX_EVAL_NESTING {
            return Err(SceneError::LimitExceeded(format!(
                "evaluation nests deeper than {} levels",
                MAX_EVAL_NESTING
            )));
        }
        self.nesting += 1;
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt, env: &Env) -> Result<Flow> {
        self.enter()?;
        let flow = self.exec_inner(stmt, env);
        self.nesting -= 1;
        flow
    }

    fn exec_inner(&mut self, stmt: &Stmt, env: &Env) -> Result<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Empty | Stmt::Function(_) => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Declare(kind, bindings) => {
                for (name, init) in bindings {
                    let value = match init {
                        Some(expr) => self.eval(expr, env)?,
                        None if *kind == DeclKind::Const => {
                            return Err(SceneError::Runtime(format!(
                                "missing initializer in const declaration '{}'",
                                name
                            )))
                        }
                        None => Value::Undefined,
                    };
                    match kind {
                        DeclKind::Var => env.declare_var(name, value),
                        DeclKind::Let => env.declare(name, value, true),
                        DeclKind::Const => env.declare(name, value, false),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::If(test, then, otherwise) => {
                if self.eval(test, env)?.truthy() {
                    self.exec(then, env)
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Block(stmts) => self.exec_block(stmts, &env.child(false)),
            Stmt::While(test, body) => {
                while self.eval(test, env)?.truthy() {
                    match self.exec(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
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
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let scope = env.child(false);
                if let Some(init) = init {
                    self.exec(init, &scope)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(test, &scope)?.truthy() {
                            break;
                        }
                    }
                    match self.exec(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForOf {
                kind,
                name,
                iterable,
                body,
            } => {
                let items: Vec<Value> = match self.eval(iterable, env)? {
                    Value::Array(items) => items.borrow().clone(),
                    Value::Str(s) => s.chars().map(|c| Value::str(&c.to_string())).collect(),
                    other => {
                        return Err(SceneError::Runtime(format!(
                            "{} is not iterable",
                            other.type_of()
                        )))
                    }
                };
                for item in items {
                    let scope = env.child(false);
                    scope.declare(name, item, *kind != DeclKind::Const);
                    match self.exec(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
        }
    }

    // ----- expressions -----

    fn closure(&mut self, def: &Rc<FunctionDef>, env: &Env) -> Value {
        Allocations::track(&mut self.allocations.scopes, &env.0);
        Value::Function(Rc::new(Closure {
            def: Rc::clone(def),
            env: env.clone(),
        }))
    }

    fn array(&mut self, items: Vec<Value>) -> Value {
        let array = Rc::new(RefCell::new(items));
        Allocations::track(&mut self.allocations.arrays, &array);
        Value::Array(ArrayRef(array))
    }

    fn eval(&mut self, expr: &Expr, env: &Env) -> Result<Value> {
        self.enter()?;
        let value = self.eval_inner(expr, env);
        self.nesting -= 1;
        value
    }

    fn eval_inner(&mut self, expr: &Expr, env: &Env) -> Result<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::str(s)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(expr) => out.push_str(&self.eval(expr, env)?.to_display()),
                    }
                    if out.len() > MAX_COLLECTION_LEN {
                        return Err(SceneError::LimitExceeded("string too large".to_string()));
                    }
                }
                Ok(Value::str(&out))
            }
            Expr::Ident(name) => env
                .lookup(name)
                .ok_or_else(|| SceneError::Runtime(format!("{} is not defined", name))),
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item, env))
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.array(values))
            }
            Expr::Unary(UnaryOp::TypeOf, operand) => {
                if let Expr::Ident(name) = operand.as_ref() {
                    if env.lookup(name).is_none() {
                        return Ok(Value::str("undefined"));
                    }
                }
                Ok(Value::str(self.eval(operand, env)?.type_of()))
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand, env)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::BitNot => Value::Number(f64::from(!to_i32(value.to_number()))),
                    UnaryOp::TypeOf => Value::str(value.type_of()),
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs, env)?;
                let rhs = self.eval(rhs, env)?;
                binary(*op, &lhs, &rhs)
            }
            Expr::Logical(op, lhs, rhs) => {
                let lhs = self.eval(lhs, env)?;
                let short_circuit = match op {
                    LogicalOp::And => !lhs.truthy(),
                    LogicalOp::Or => lhs.truthy(),
                    LogicalOp::Nullish => !matches!(lhs, Value::Null | Value::Undefined),
                };
                if short_circuit {
                    Ok(lhs)
                } else {
                    self.eval(rhs, env)
                }
            }
            Expr::Conditional(test, then, otherwise) => {
                if self.eval(test, env)?.truthy() {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            Expr::Assign(op, target, value) => {
                let value = match op {
                    None => self.eval(value, env)?,
                    Some(op) => {
                        let current = self.eval(target, env)?;
                        let rhs = self.eval(value, env)?;
                        binary(*op, &current, &rhs)?
                    }
                };
                self.store(target, value.clone(), env)?;
                Ok(value)
            }
            Expr::Update {
                delta,
                prefix,
                target,
            } => {
                let old = self.eval(target, env)?.to_number();
                let new = old + delta;
                self.store(target, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Call(callee, args) => {
                let callee = self.eval(callee, env)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, env))
                    .collect::<Result<Vec<_>>>()?;
                self.call(callee, args)
            }
            Expr::Member(object, name) => {
                let object = self.eval(object, env)?;
                member(&object, name)
            }
            Expr::Index(object, index) => {
                let object = self.eval(object, env)?;
                let index = self.eval(index, env)?;
                match (&object, &index) {
                    (Value::Array(items), Value::Number(n)) => {
                        let items = items.borrow();
                        Ok(array_slot(*n, items.len())
                            .map(|i| items[i].clone())
                            .unwrap_or(Value::Undefined))
                    }
                    (Value::Str(s), Value::Number(n)) => Ok(array_slot(*n, s.chars().count())
                        .and_then(|i| s.chars().nth(i))
                        .map(|c| Value::str(&c.to_string()))
                        .unwrap_or(Value::Undefined)),
                    _ => member(&object, &index.to_display()),
                }
            }
            Expr::Function(def) => Ok(self.closure(def, env)),
            Expr::Sequence(items) => {
                let mut last = Value::Undefined;
                for item in items {
                    last = self.eval(item, env)?;
                }
                Ok(last)
            }
        }
    }

    fn store(&mut self, target: &Expr, value: Value, env: &Env) -> Result<()> {
        match target {
            Expr::Ident(name) => env.assign(name, value),
            Expr::Index(object, index) => {
                let object = self.eval(object, env)?;
                let index = self.eval(index, env)?.to_number();
                let Value::Array(items) = object else {
                    return Err(SceneError::Runtime(format!(
                        "cannot assign an index on {}",
                        object.type_of()
                    )));
                };
                if index < 0.0 || index.fract() != 0.0 || index >= MAX_COLLECTION_LEN as f64 {
                    return Err(SceneError::Runtime(format!("invalid array index {}", format_js_number(index))));
                }
                let index = index as usize;
                let mut items = items.borrow_mut();
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                Ok(())
            }
            Expr::Member(_, name) => Err(SceneError::Runtime(format!(
                "cannot assign property '{}'",
                name
            ))),
            _ => Err(SceneError::Runtime("invalid assignment target".to_string())),
        }
    }

    // ----- calls -----

    fn call(&mut self, callee: Value, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Function(closure) => self.call_closure(&closure, args),
            Value::Builtin(Builtin::Place) => self.place(&args),
            Value::Builtin(Builtin::Math(f)) => Ok(Value::Number(self.math(f, &args))),
            Value::Builtin(Builtin::Log) => {
                let line: Vec<String> = args.iter().map(Value::to_display).collect();
                log::debug!("program: {}", line.join(" "));
                Ok(Value::Undefined)
            }
            Value::Method(receiver, method) => self.call_method(*receiver, method, args),
            other => Err(SceneError::Runtime(format!(
                "{} is not a function",
                other.type_of()
            ))),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Result<Value> {
        self.tick()?;
        if self.depth >= self.limits.max_call_depth {
            return Err(SceneError::LimitExceeded(format!(
                "call depth exceeded {}",
                self.limits.max_call_depth
            )));
        }
        self.invoked.insert(Rc::as_ptr(&closure.def));

        let scope = closure.env.child(true);
        let mut args = args.into_iter();
        for param in &closure.def.params {
            scope.declare(param, args.next().unwrap_or(Value::Undefined), true);
        }

        self.depth += 1;
        let result = match &closure.def.body {
            FunctionBody::Block(stmts) => self.exec_block(stmts, &scope).map(|flow| match flow {
                Flow::Return(value) => value,
                _ => Value::Undefined,
            }),
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
        };
        self.depth -= 1;
        result
    }

    fn place(&mut self, args: &[Value]) -> Result<Value> {
        if self.voxels.len() >= self.limits.max_voxels {
            return Err(SceneError::LimitExceeded(format!(
                "more than {} voxels placed",
                self.limits.max_voxels
            )));
        }

        let mut coords = [0i32; 3];
        for (axis, slot) in coords.iter_mut().enumerate() {
            let n = args.get(axis).map_or(f64::NAN, Value::to_number);
            if !n.is_finite() || n.abs() > MAX_COORDINATE {
                return Err(SceneError::Runtime(format!(
                    "place: invalid {} coordinate {}",
                    ["x", "y", "z"][axis],
                    format_js_number(n)
                )));
            }
            *slot = n.floor() as i32;
        }

        let block_type = match args.get(3) {
            Some(Value::Str(s)) => s,
            Some(other) => {
                return Err(SceneError::Runtime(format!(
                    "place: block type must be a string, got {}",
                    other.type_of()
                )))
            }
            None => return Err(SceneError::Runtime("place: missing block type".to_string())),
        };

        let voxel = Voxel::new(coords[0], coords[1], coords[2], block_type);
        if voxel.block_type.is_empty() {
            return Err(SceneError::Runtime("place: empty block type".to_string()));
        }
        self.voxels.push(voxel);
        Ok(Value::Undefined)
    }

    fn math(&mut self, f: MathFn, args: &[Value]) -> f64 {
        let nums: Vec<f64> = args.iter().map(Value::to_number).collect();
        let arg = |i: usize| nums.get(i).copied().unwrap_or(f64::NAN);
        match f {
            MathFn::Floor => arg(0).floor(),
            MathFn::Ceil => arg(0).ceil(),
            MathFn::Round => (arg(0) + 0.5).floor(),
            MathFn::Abs => arg(0).abs(),
            MathFn::Min => nums
                .iter()
                .fold(f64::INFINITY, |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(*n) }),
            MathFn::Max => nums
                .iter()
                .fold(f64::NEG_INFINITY, |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(*n) }),
            MathFn::Sqrt => arg(0).sqrt(),
            MathFn::Sin => arg(0).sin(),
            MathFn::Cos => arg(0).cos(),
            MathFn::Tan => arg(0).tan(),
            MathFn::Atan2 => arg(0).atan2(arg(1)),
            MathFn::Pow => arg(0).powf(arg(1)),
            MathFn::Sign => {
                let n = arg(0);
                if n == 0.0 || n.is_nan() {
                    n
                } else {
                    n.signum()
                }
            }
            MathFn::Trunc => arg(0).trunc(),
            MathFn::Hypot => nums.iter().map(|n| n * n).sum::<f64>().sqrt(),
            MathFn::Random => self.rng.gen::<f64>(),
        }
    }

    fn call_method(&mut self, receiver: Value, method: Method, args: Vec<Value>) -> Result<Value> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);

        if let Value::Str(s) = &receiver {
            return Ok(match method {
                Method::ToLowerCase => Value::str(&s.to_lowercase()),
                Method::ToUpperCase => Value::str(&s.to_uppercase()),
                Method::Trim => Value::str(s.trim()),
                Method::Includes => Value::Bool(s.contains(arg(0).to_display().as_str())),
                Method::IndexOf => Value::Number(
                    s.find(arg(0).to_display().as_str())
                        .map_or(-1.0, |byte| s[..byte].chars().count() as f64),
                ),
                _ => return Err(SceneError::Runtime(format!("string has no method {:?}", method))),
            });
        }

        let Value::Array(items) = receiver else {
            return Err(SceneError::Runtime(format!(
                "{} has no method {:?}",
                receiver.type_of(),
                method
            )));
        };

        match method {
            Method::Push => {
                let mut items = items.borrow_mut();
                if items.len() + args.len() > MAX_COLLECTION_LEN {
                    return Err(SceneError::LimitExceeded("array too large".to_string()));
                }
                items.extend(args.iter().cloned());
                Ok(Value::Number(items.len() as f64))
            }
            Method::Pop => Ok(items.borrow_mut().pop().unwrap_or(Value::Undefined)),
            Method::ForEach | Method::Map | Method::Filter => {
                let callback = arg(0);
                // Snapshot so callbacks may mutate the array.
                let snapshot = items.borrow().clone();
                let mut out = Vec::new();
                for (i, item) in snapshot.into_iter().enumerate() {
                    let result = self.call(
                        callback.clone(),
                        vec![item.clone(), Value::Number(i as f64), Value::Array(items.clone())],
                    )?;
                    match method {
                        Method::Map => out.push(result),
                        Method::Filter if result.truthy() => out.push(item),
                        _ => {}
                    }
                }
                if method == Method::ForEach {
                    Ok(Value::Undefined)
                } else {
                    Ok(self.array(out))
                }
            }
            Method::Includes => {
                let needle = arg(0);
                Ok(Value::Bool(items.borrow().iter().any(|v| v.strict_equals(&needle))))
            }
            Method::IndexOf => {
                let needle = arg(0);
                Ok(Value::Number(
                    items
                        .borrow()
                        .iter()
                        .position(|v| v.strict_equals(&needle))
                        .map_or(-1.0, |i| i as f64),
                ))
            }
            Method::Join => {
                let separator = match arg(0) {
                    Value::Undefined => ",".to_string(),
                    other => other.to_display(),
                };
                let joined = join(&items, &separator);
                if joined.len() > MAX_COLLECTION_LEN {
                    return Err(SceneError::LimitExceeded("string too large".to_string()));
                }
                Ok(Value::str(&joined))
            }
            Method::Slice => {
                let slice = {
                    let items = items.borrow();
                    let len = items.len() as f64;
                    let bound = |v: Value, default: f64| {
                        let n = match v {
                            Value::Undefined => default,
                            other => other.to_number().trunc(),
                        };
                        let n = if n.is_nan() { 0.0 } else { n };
                        (if n < 0.0 { len + n } else { n }).clamp(0.0, len) as usize
                    };
                    let start = bound(arg(0), 0.0);
                    let end = bound(arg(1), len);
                    if start < end {
                        items[start..end].to_vec()
                    } else {
                        Vec::new()
                    }
                };
                Ok(self.array(slice))
            }
            Method::ToLowerCase | Method::ToUpperCase | Method::Trim => Err(SceneError::Runtime(
                format!("array has no method {:?}", method),
            )),
        }
    }
}

fn array_slot(n: f64, len: usize) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0 && n < len as f64).then_some(n as usize)
}

fn member(object: &Value, name: &str) -> Result<Value> {
    let method = |m: Method| Value::Method(Box::new(object.clone()), m);
    Ok(match (object, name) {
        (Value::Undefined | Value::Null, _) => {
            return Err(SceneError::Runtime(format!(
                "cannot read property '{}' of {}",
                name,
                object.to_display()
            )))
        }
        (Value::Array(items), "length") => Value::Number(items.borrow().len() as f64),
        (Value::Str(s), "length") => Value::Number(s.chars().count() as f64),
        (Value::Array(_), _) => match name {
            "push" => method(Method::Push),
            "pop" => method(Method::Pop),
            "forEach" => method(Method::ForEach),
            "map" => method(Method::Map),
            "filter" => method(Method::Filter),
            "includes" => method(Method::Includes),
            "indexOf" => method(Method::IndexOf),
            "join" => method(Method::Join),
            "slice" => method(Method::Slice),
            _ => Value::Undefined,
        },
        (Value::Str(_), _) => match name {
            "toLowerCase" => method(Method::ToLowerCase),
            "toUpperCase" => method(Method::ToUpperCase),
            "trim" => method(Method::Trim),
            "includes" => method(Method::Includes),
            "indexOf" => method(Method::IndexOf),
            _ => Value::Undefined,
        },
        (Value::Namespace(Namespace::Math), _) => match name {
            "PI" => Value::Number(std::f64::consts::PI),
            "E" => Value::Number(std::f64::consts::E),
            "SQRT2" => Value::Number(std::f64::consts::SQRT_2),
            _ => match math_fn(name) {
                Some(f) => Value::Builtin(Builtin::Math(f)),
                None => Value::Undefined,
            },
        },
        (Value::Namespace(Namespace::Console), "log" | "info" | "warn" | "error" | "debug") => {
            Value::Builtin(Builtin::Log)
        }
        _ => Value::Undefined,
    })
}

fn math_fn(name: &str) -> Option<MathFn> {
    Some(match name {
        "floor" => MathFn::Floor,
        "ceil" => MathFn::Ceil,
        "round" => MathFn::Round,
        "abs" => MathFn::Abs,
        "min" => MathFn::Min,
        "max" => MathFn::Max,
        "sqrt" => MathFn::Sqrt,
        "sin" => MathFn::Sin,
        "cos" => MathFn::Cos,
        "tan" => MathFn::Tan,
        "atan2" => MathFn::Atan2,
        "pow" => MathFn::Pow,
        "sign" => MathFn::Sign,
        "trunc" => MathFn::Trunc,
        "hypot" => MathFn::Hypot,
        "random" => MathFn::Random,
        _ => return None,
    })
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    use BinaryOp::*;

    if op == Add {
        let stringy = |v: &Value| matches!(v, Value::Str(_) | Value::Array(_));
        if stringy(lhs) || stringy(rhs) {
            let joined = lhs.to_display() + &rhs.to_display();
            if joined.len() > MAX_COLLECTION_LEN {
                return Err(SceneError::LimitExceeded("string too large".to_string()));
            }
            return Ok(Value::str(&joined));
        }
    }

    if matches!(op, Lt | LtEq | Gt | GtEq) {
        let ordering = match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => lhs.to_number().partial_cmp(&rhs.to_number()),
        };
        let Some(ordering) = ordering else {
            return Ok(Value::Bool(false));
        };
        return Ok(Value::Bool(match op {
            Lt => ordering.is_lt(),
            LtEq => ordering.is_le(),
            Gt => ordering.is_gt(),
            _ => ordering.is_ge(),
        }));
    }

    let a = lhs.to_number();
    let b = rhs.to_number();
    Ok(match op {
        Add => Value::Number(a + b),
        Sub => Value::Number(a - b),
        Mul => Value::Number(a * b),
        Div => Value::Number(a / b),
        Rem => Value::Number(a % b),
        Pow => Value::Number(a.powf(b)),
        Eq => Value::Bool(lhs.loose_equals(rhs)),
        NotEq => Value::Bool(!lhs.loose_equals(rhs)),
        StrictEq => Value::Bool(lhs.strict_equals(rhs)),
        StrictNotEq => Value::Bool(!lhs.strict_equals(rhs)),
        BitAnd => Value::Number(f64::from(to_i32(a) & to_i32(b))),
        BitOr => Value::Number(f64::from(to_i32(a) | to_i32(b))),
        BitXor => Value::Number(f64::from(to_i32(a) ^ to_i32(b))),
        Shl => Value::Number(f64::from(to_i32(a).wrapping_shl(to_i32(b) as u32 & 31))),
        Shr => Value::Number(f64::from(to_i32(a).wrapping_shr(to_i32(b) as u32 & 31))),
        Lt | LtEq | Gt | GtEq => unreachable!("comparisons handled above"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_display() {
        assert_eq!(Value::Number(3.0).to_display(), "3");
        assert_eq!(Value::Number(-0.0).to_display(), "0");
        assert_eq!(Value::Number(0.75).to_display(), "0.75");
        assert_eq!(Value::Number(f64::NAN).to_display(), "NaN");
        assert_eq!(Value::Number(f64::NEG_INFINITY).to_display(), "-Infinity");
    }

    #[test]
    fn test_coercions() {
        assert_eq!(Value::str(" 12 ").to_number(), 12.0);
        assert_eq!(Value::str("").to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
        assert!(!Value::str("").truthy());
        assert!(Value::str("0").truthy());
        assert!(!Value::Number(f64::NAN).truthy());
    }

    #[test]
    fn test_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(Value::str("1").loose_equals(&Value::Number(1.0)));
        assert!(!Value::str("1").strict_equals(&Value::Number(1.0)));
    }

    #[test]
    fn test_binary_ops() {
        let two = Value::Number(2.0);
        let s = Value::str("a");
        assert_eq!(binary(BinaryOp::Add, &s, &two).unwrap().to_display(), "a2");
        assert_eq!(binary(BinaryOp::Pow, &two, &Value::Number(10.0)).unwrap().to_number(), 1024.0);
        assert_eq!(binary(BinaryOp::Rem, &Value::Number(-7.0), &two).unwrap().to_number(), -1.0);
        assert_eq!(binary(BinaryOp::Shl, &Value::Number(1.0), &Value::Number(4.0)).unwrap().to_number(), 16.0);
        assert!(binary(BinaryOp::Lt, &Value::str("a"), &Value::str("b")).unwrap().truthy());
        assert!(!binary(BinaryOp::Lt, &Value::Number(f64::NAN), &two).unwrap().truthy());
    }

    fn array(items: Vec<Value>) -> ArrayRef {
        ArrayRef(Rc::new(RefCell::new(items)))
    }

    #[test]
    fn test_array_display_nests_and_skips_cycles() {
        let inner = array(vec![Value::Number(1.0), Value::Number(2.0)]);
        let outer = array(vec![Value::Array(inner.clone()), Value::Null, Value::Number(3.0)]);
        assert_eq!(join(&outer, "-"), "1,2--3");

        // Shared but acyclic entries render every time.
        let shared = array(vec![Value::Array(inner.clone()), Value::Array(inner)]);
        assert_eq!(Value::Array(shared).to_display(), "1,2,1,2");

        let cyclic = array(vec![Value::str("oak")]);
        cyclic.borrow_mut().push(Value::Array(cyclic.clone()));
        let value = Value::Array(cyclic.clone());
        assert_eq!(value.to_display(), "oak,");
        assert_eq!(format!("{:?}", value), "[oak,]");
        assert!(value.to_number().is_nan());
        cyclic.borrow_mut().clear();
    }

    #[test]
    fn test_array_to_number_goes_through_string() {
        assert_eq!(Value::Array(array(Vec::new())).to_number(), 0.0);
        let nested = array(vec![Value::Array(array(vec![Value::str(" 7 ")]))]);
        assert_eq!(Value::Array(nested).to_number(), 7.0);
    }

    #[test]
    fn test_join_output_is_bounded() {
        let mut value = array(vec![Value::str(&"x".repeat(1000))]);
        for _ in 0..20 {
            value = array(vec![Value::Array(value.clone()), Value::Array(value)]);
        }
        let joined = join(&value, ",");
        assert!(joined.len() > MAX_COLLECTION_LEN);
        assert!(joined.len() < MAX_COLLECTION_LEN + 2000);
    }

    #[test]
    fn test_deep_values_drop_iteratively() {
        let mut value = Value::Undefined;
        for _ in 0..200_000 {
            value = Value::Array(array(vec![value]));
        }
        drop(value);

        let mut scope = Env::root();
        for i in 0..200_000 {
            scope = scope.child(i % 2 == 0);
        }
        drop(scope);
    }

    #[test]
    fn test_release_breaks_reference_cycles() {
        let limits = Limits {
            max_steps: 100,
            max_voxels: 10,
            max_call_depth: 4,
        };
        let mut machine = Machine::new(limits, 1);
        let global = Env::root();

        // A helper closure bound in the scope it captures.
        let body = global.child(true);
        let def = Rc::new(FunctionDef {
            name: Some("helper".to_string()),
            params: Vec::new(),
            body: FunctionBody::Expr(Expr::Number(1.0)),
        });
        let helper = machine.closure(&def, &body);
        body.declare("helper", helper, true);
        let scope_handle = Rc::downgrade(&body.0);

        // An array that contains itself.
        let list = machine.array(Vec::new());
        let Value::Array(items) = &list else {
            panic!("expected array");
        };
        items.borrow_mut().push(list.clone());
        let array_handle = Rc::downgrade(&items.0);

        drop(body);
        drop(list);
        assert_eq!(scope_handle.strong_count(), 1);
        assert_eq!(array_handle.strong_count(), 1);

        machine.allocations.release(&global);
        assert_eq!(scope_handle.strong_count(), 0);
        assert_eq!(array_handle.strong_count(), 0);
    }

    #[test]
    fn test_to_i32_wraps() {
        assert_eq!(to_i32(4_294_967_297.0), 1);
        assert_eq!(to_i32(-1.0), -1);
        assert_eq!(to_i32(f64::INFINITY), 0);
    }
}
